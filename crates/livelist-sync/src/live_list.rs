// File: livelist-sync/src/live_list.rs
// Purpose: One view's record collection, kept current by page loads and push events

use crate::collection::RecordCollection;
use crate::config::StaleResponsePolicy;
use crate::error::{Result, SyncError};
use crate::event::{EventEffect, Notification, PushEvent, PushFrame};
use crate::record::{Record, RecordId};
use crate::source::{total_pages_for, PageQuery, PageResponse, PageSource};

/// Where a list is in its load cycle
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
    Ready,
    /// Last load failed; holds the message to display
    Error(String),
}

/// Identifies one started page load.
///
/// Tickets are ordered: a later `begin_load` always yields a greater ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LoadTicket {
    seq: u64,
    page: u32,
    page_size: u32,
}

impl LoadTicket {
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

/// Result of handing a completed load to the list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The page replaced the collection
    Applied { records: usize, total_count: u64 },
    /// A newer load was started after this one; nothing changed
    Stale,
}

/// What a push event did to the list
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    /// An existing record was merged with the payload
    Updated(RecordId),
    /// A new record was put at the top of page 1
    Inserted(RecordId),
    /// A record was created off-page; only the total count moved
    CountedOnly,
    /// Not about any record; forward to the user
    Notified(Notification),
    /// Targeted a record that is not on this page
    Dropped(RecordId),
    /// Unknown type, other record kind, or nothing to do
    Ignored,
    /// Could not be decoded; logged and discarded
    Malformed(String),
}

impl ApplyOutcome {
    /// Whether the visible collection or count changed
    pub fn changed(&self) -> bool {
        matches!(
            self,
            ApplyOutcome::Updated(_) | ApplyOutcome::Inserted(_) | ApplyOutcome::CountedOnly
        )
    }
}

/// Point-in-time copy of a list, as published to observers
#[derive(Debug, Clone, PartialEq)]
pub struct ListSnapshot<R: Record> {
    pub records: Vec<R>,
    pub total_count: u64,
    pub total_pages: u32,
    pub page: u32,
    pub page_size: u32,
    pub state: LoadState,
}

/// Live synchronizer for one paginated view.
///
/// Full loads replace the collection wholesale; push events patch it in
/// place. All mutation goes through `&mut self`, so a single owner (the
/// view task) serializes loads and events.
#[derive(Debug)]
pub struct LiveList<R: Record> {
    query: PageQuery,
    collection: RecordCollection<R>,
    total_count: u64,
    total_pages: u32,
    state: LoadState,
    stale_policy: StaleResponsePolicy,
    last_seq: u64,
    latest: Option<LoadTicket>,
}

impl<R: Record> LiveList<R> {
    pub fn new(query: PageQuery) -> Self {
        Self::with_policy(query, StaleResponsePolicy::default())
    }

    pub fn with_policy(query: PageQuery, stale_policy: StaleResponsePolicy) -> Self {
        Self {
            query,
            collection: RecordCollection::new(),
            total_count: 0,
            total_pages: 1,
            state: LoadState::Idle,
            stale_policy,
            last_seq: 0,
            latest: None,
        }
    }

    /// Start loading `query`; it becomes the list's current query right away.
    pub fn begin_load(&mut self, query: PageQuery) -> LoadTicket {
        self.last_seq += 1;
        let ticket = LoadTicket {
            seq: self.last_seq,
            page: query.page(),
            page_size: query.page_size(),
        };
        tracing::debug!(kind = %R::KIND, ticket = ticket.seq, query = %query, "Page load started");
        self.query = query;
        self.latest = Some(ticket);
        self.state = LoadState::Loading;
        ticket
    }

    /// Hand back the result of the load identified by `ticket`.
    ///
    /// On success the collection is replaced by the page. On failure the
    /// collection is cleared, the count reset and the error returned. A
    /// completion superseded by a newer `begin_load` is discarded under
    /// `StaleResponsePolicy::Discard`.
    pub fn finish_load(&mut self, ticket: LoadTicket, result: Result<PageResponse>) -> Result<LoadOutcome> {
        let is_latest = self.latest == Some(ticket);
        if !is_latest && self.stale_policy == StaleResponsePolicy::Discard {
            tracing::debug!(
                kind = %R::KIND,
                ticket = ticket.seq,
                latest = self.last_seq,
                "Discarding stale page load"
            );
            return Ok(LoadOutcome::Stale);
        }

        let records = result.and_then(|page| {
            let records = page
                .results
                .into_iter()
                .map(R::from_value)
                .collect::<Result<Vec<R>>>()?;
            let total_pages = total_pages_for(page.count, ticket.page_size, page.total_pages);
            Ok((records, page.count, total_pages))
        });

        match records {
            Ok((records, count, total_pages)) => {
                let dropped = self.collection.replace_all(records);
                self.total_count = count;
                self.total_pages = total_pages;
                if is_latest {
                    self.state = LoadState::Ready;
                }
                tracing::debug!(
                    kind = %R::KIND,
                    ticket = ticket.seq,
                    page = ticket.page,
                    records = self.collection.len(),
                    dropped,
                    total_count = count,
                    total_pages,
                    "Page load applied"
                );
                Ok(LoadOutcome::Applied {
                    records: self.collection.len(),
                    total_count: count,
                })
            }
            Err(err) => {
                tracing::warn!(kind = %R::KIND, ticket = ticket.seq, error = %err, "Page load failed");
                self.collection.clear();
                self.total_count = 0;
                self.total_pages = 1;
                // An older failure must not hide a load still in flight
                if is_latest {
                    self.state = LoadState::Error(err.to_string());
                }
                Err(err)
            }
        }
    }

    /// Fetch `query` from `source` and apply it in one step
    pub async fn load_page<S>(&mut self, source: &S, query: PageQuery) -> Result<&[R]>
    where
        S: PageSource + ?Sized,
    {
        let ticket = self.begin_load(query);
        let result = source.fetch(R::KIND, &self.query).await;
        self.finish_load(ticket, result)?;
        Ok(self.collection.as_slice())
    }

    /// Decode and apply a raw frame. Never fails.
    pub fn apply_frame(&mut self, frame: &PushFrame) -> ApplyOutcome {
        match frame.decode() {
            Ok(event) => self.apply_event(&event),
            Err(err) => self.malformed(err),
        }
    }

    pub fn apply_text(&mut self, text: &str) -> ApplyOutcome {
        match PushEvent::decode(text) {
            Ok(event) => self.apply_event(&event),
            Err(err) => self.malformed(err),
        }
    }

    /// Apply one push event to the collection. Never fails.
    pub fn apply_event(&mut self, event: &PushEvent) -> ApplyOutcome {
        let effect = event.effect();
        let outcome = match effect {
            EventEffect::Ignore => ApplyOutcome::Ignored,
            EventEffect::Notify(notification) => ApplyOutcome::Notified(notification),
            ref effect if !effect.targets(R::KIND) => ApplyOutcome::Ignored,
            EventEffect::Patch { id, fields, .. } => {
                if self.collection.merge_into(&id, &fields) {
                    ApplyOutcome::Updated(id)
                } else {
                    ApplyOutcome::Dropped(id)
                }
            }
            EventEffect::Create { record, .. } => match R::from_value(record) {
                Ok(record) => self.apply_create(record),
                Err(err) => return self.malformed(err),
            },
        };

        tracing::debug!(kind = %R::KIND, event = event.name(), outcome = ?outcome, "Push event applied");
        outcome
    }

    fn apply_create(&mut self, record: R) -> ApplyOutcome {
        if !self.query.is_first_page() {
            self.total_count += 1;
            return ApplyOutcome::CountedOnly;
        }

        let id = record.id().clone();
        if self.collection.contains(&id) {
            self.collection.prepend(record, None);
            return ApplyOutcome::Updated(id);
        }

        self.total_count += 1;
        self.collection
            .prepend(record, Some(self.query.page_size() as usize));
        ApplyOutcome::Inserted(id)
    }

    fn malformed(&self, err: SyncError) -> ApplyOutcome {
        tracing::warn!(kind = %R::KIND, error = %err, "Discarding malformed push event");
        ApplyOutcome::Malformed(err.to_string())
    }

    pub fn records(&self) -> &[R] {
        self.collection.as_slice()
    }

    pub fn collection(&self) -> &RecordCollection<R> {
        &self.collection
    }

    pub fn get(&self, id: &RecordId) -> Option<&R> {
        self.collection.get(id)
    }

    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    pub fn current_page(&self) -> u32 {
        self.query.page()
    }

    pub fn query(&self) -> &PageQuery {
        &self.query
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn is_loading(&self) -> bool {
        self.state == LoadState::Loading
    }

    pub fn error(&self) -> Option<&str> {
        match &self.state {
            LoadState::Error(message) => Some(message),
            _ => None,
        }
    }

    pub fn stale_policy(&self) -> StaleResponsePolicy {
        self.stale_policy
    }

    pub fn snapshot(&self) -> ListSnapshot<R> {
        ListSnapshot {
            records: self.collection.to_vec(),
            total_count: self.total_count,
            total_pages: self.total_pages,
            page: self.query.page(),
            page_size: self.query.page_size(),
            state: self.state.clone(),
        }
    }
}
