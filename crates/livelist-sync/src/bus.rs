// File: livelist-sync/src/bus.rs
// Purpose: Fan-out of raw push frames from one connection to every live view

use tokio::sync::broadcast;

use crate::event::PushFrame;

pub const DEFAULT_BUS_CAPACITY: usize = 1000;

/// Shared publish/subscribe hub for push frames.
///
/// Cloning is cheap and every clone publishes to the same subscribers. The
/// bus is passed explicitly to whoever needs it; there is no global instance.
#[derive(Debug, Clone)]
pub struct MessageBus {
    tx: broadcast::Sender<PushFrame>,
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}

impl MessageBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish a frame; returns how many subscribers will see it.
    ///
    /// Having no subscribers is not an error, the frame is simply dropped.
    pub fn publish(&self, frame: PushFrame) -> usize {
        self.tx.send(frame).unwrap_or(0)
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Receiving half held by one view
#[derive(Debug)]
pub struct Subscription {
    rx: broadcast::Receiver<PushFrame>,
}

impl Subscription {
    /// Next frame, or `None` once every publisher is gone.
    ///
    /// A subscriber that falls behind skips the frames it missed and keeps
    /// going.
    pub async fn recv(&mut self) -> Option<PushFrame> {
        loop {
            match self.rx.recv().await {
                Ok(frame) => return Some(frame),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Push subscriber lagged, frames dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
