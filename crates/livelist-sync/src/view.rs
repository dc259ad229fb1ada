// File: livelist-sync/src/view.rs
// Purpose: Per-view driver task serializing page loads and push events

use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::bus::{MessageBus, Subscription};
use crate::error::Result;
use crate::event::Notification;
use crate::live_list::{ApplyOutcome, ListSnapshot, LiveList, LoadOutcome, LoadTicket};
use crate::record::Record;
use crate::source::{PageQuery, PageResponse, PageSource};

const EVENT_BUFFER: usize = 256;

/// Requests a view owner can make
#[derive(Debug, Clone, PartialEq)]
pub enum ViewCommand {
    /// New filters/sort/search; loads immediately
    SetQuery(PageQuery),
    GoToPage(u32),
    /// Reload the current query
    Refresh,
    Shutdown,
}

/// Side-channel output of a view
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    Notification(Notification),
    Pushed(ApplyOutcome),
    Loaded(LoadOutcome),
    LoadFailed(String),
}

/// Handle to a running view.
///
/// The task ends on `shutdown`, or when the handle is dropped.
pub struct LiveView<R: Record> {
    commands: mpsc::UnboundedSender<ViewCommand>,
    snapshots: watch::Receiver<ListSnapshot<R>>,
    events: Option<mpsc::Receiver<ViewEvent>>,
    task: JoinHandle<()>,
}

impl<R: Record> LiveView<R> {
    /// Subscribe to `bus`, start loading the list's current query and keep
    /// the list live until shut down.
    pub fn spawn(list: LiveList<R>, source: Arc<dyn PageSource>, bus: &MessageBus) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(list.snapshot());
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let (done_tx, done_rx) = mpsc::unbounded_channel();

        let driver = Driver {
            list,
            source,
            snapshots: snapshot_tx,
            events: event_tx,
            done: done_tx,
        };
        // Subscribe before the first load so nothing pushed meanwhile is missed
        let subscription = bus.subscribe();
        let task = tokio::spawn(driver.run(subscription, command_rx, done_rx));

        Self {
            commands: command_tx,
            snapshots: snapshot_rx,
            events: Some(event_rx),
            task,
        }
    }

    pub fn set_query(&self, query: PageQuery) {
        self.send(ViewCommand::SetQuery(query));
    }

    pub fn go_to_page(&self, page: u32) {
        self.send(ViewCommand::GoToPage(page));
    }

    pub fn refresh(&self) {
        self.send(ViewCommand::Refresh);
    }

    pub fn send(&self, command: ViewCommand) {
        if self.commands.send(command).is_err() {
            tracing::debug!(kind = %R::KIND, "View task already stopped, command ignored");
        }
    }

    pub fn snapshot(&self) -> ListSnapshot<R> {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ListSnapshot<R>> {
        self.snapshots.clone()
    }

    /// Side-channel receiver; only the first caller gets it
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<ViewEvent>> {
        self.events.take()
    }

    /// Close the side channel; later events are dropped silently
    pub fn discard_events(&mut self) {
        self.events = None;
    }

    /// Wait until a published snapshot satisfies `predicate`
    pub async fn wait_for(&self, predicate: impl FnMut(&ListSnapshot<R>) -> bool) -> Option<ListSnapshot<R>> {
        let mut rx = self.snapshots.clone();
        let snapshot = rx.wait_for(predicate).await.ok()?;
        Some(snapshot.clone())
    }

    pub async fn shutdown(self) {
        let _ = self.commands.send(ViewCommand::Shutdown);
        if let Err(e) = self.task.await {
            tracing::error!("View task failed: {}", e);
        }
    }
}

type Completion = (LoadTicket, Result<PageResponse>);

struct Driver<R: Record> {
    list: LiveList<R>,
    source: Arc<dyn PageSource>,
    snapshots: watch::Sender<ListSnapshot<R>>,
    events: mpsc::Sender<ViewEvent>,
    done: mpsc::UnboundedSender<Completion>,
}

impl<R: Record> Driver<R> {
    async fn run(
        mut self,
        mut subscription: Subscription,
        mut commands: mpsc::UnboundedReceiver<ViewCommand>,
        mut done: mpsc::UnboundedReceiver<Completion>,
    ) {
        tracing::debug!(kind = %R::KIND, "View started");
        self.start_load(self.list.query().clone());
        let mut bus_open = true;

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(ViewCommand::SetQuery(query)) => self.start_load(query),
                    Some(ViewCommand::GoToPage(page)) => {
                        let query = self.list.query().clone().with_page(page);
                        self.start_load(query);
                    }
                    Some(ViewCommand::Refresh) => self.start_load(self.list.query().clone()),
                    Some(ViewCommand::Shutdown) | None => break,
                },
                Some((ticket, result)) = done.recv() => self.complete_load(ticket, result),
                frame = subscription.recv(), if bus_open => match frame {
                    Some(frame) => {
                        let outcome = self.list.apply_frame(&frame);
                        self.report_push(outcome);
                    }
                    None => {
                        tracing::warn!(kind = %R::KIND, "Message bus closed, view no longer live");
                        bus_open = false;
                    }
                },
            }
        }

        tracing::debug!(kind = %R::KIND, "View stopped");
    }

    /// Fetches run on their own task so push events keep flowing meanwhile
    fn start_load(&mut self, query: PageQuery) {
        let ticket = self.list.begin_load(query.clone());
        self.publish();

        let source = Arc::clone(&self.source);
        let done = self.done.clone();
        tokio::spawn(async move {
            let result = source.fetch(R::KIND, &query).await;
            let _ = done.send((ticket, result));
        });
    }

    fn complete_load(&mut self, ticket: LoadTicket, result: Result<PageResponse>) {
        match self.list.finish_load(ticket, result) {
            Ok(LoadOutcome::Stale) => return,
            Ok(outcome) => self.emit(ViewEvent::Loaded(outcome)),
            Err(err) => self.emit(ViewEvent::LoadFailed(err.to_string())),
        }
        self.publish();
    }

    fn report_push(&mut self, outcome: ApplyOutcome) {
        if outcome.changed() {
            self.publish();
        }
        match outcome {
            ApplyOutcome::Notified(notification) => self.emit(ViewEvent::Notification(notification)),
            ApplyOutcome::Ignored => {}
            other => self.emit(ViewEvent::Pushed(other)),
        }
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.list.snapshot());
    }

    fn emit(&self, event: ViewEvent) {
        match self.events.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::debug!(kind = %R::KIND, "View event buffer full, event dropped");
            }
            // Nobody listens
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}
