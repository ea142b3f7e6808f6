//! Row-level change notifications for the cleanings table.
//!
//! The store publishes one [`ChangeEvent`] per committed write. Each
//! subscription is bound to a [`Viewer`] and drops events that viewer could
//! not see before or after the change, so rows outside a viewer's scope never
//! reach it.

use serde::Serialize;
use tokio::sync::broadcast;

use super::domain::CleaningRecord;
use super::visibility::Viewer;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeEvent {
    Insert {
        record: CleaningRecord,
    },
    Update {
        previous: CleaningRecord,
        record: CleaningRecord,
    },
    Delete {
        previous: CleaningRecord,
    },
}

impl ChangeEvent {
    /// Whether the viewer should receive this event at all.
    pub fn concerns(&self, viewer: &Viewer) -> bool {
        match self {
            ChangeEvent::Insert { record } => viewer.can_see(record),
            ChangeEvent::Update { previous, record } => {
                viewer.can_see(previous) || viewer.can_see(record)
            }
            ChangeEvent::Delete { previous } => viewer.can_see(previous),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FeedError {
    #[error("change feed closed")]
    Closed,
    #[error("subscriber fell behind by {0} events; reload required")]
    Lagged(u64),
}

/// Publish side of the notification relay.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Returns how many subscriptions the event was handed to.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self, viewer: Viewer) -> FeedSubscription {
        FeedSubscription {
            viewer,
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(256)
    }
}

/// One viewer's filtered stream of change events.
#[derive(Debug)]
pub struct FeedSubscription {
    viewer: Viewer,
    receiver: broadcast::Receiver<ChangeEvent>,
}

impl FeedSubscription {
    /// Wait for the next event relevant to this viewer.
    pub async fn recv(&mut self) -> Result<ChangeEvent, FeedError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if event.concerns(&self.viewer) => return Ok(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    return Err(FeedError::Lagged(skipped))
                }
                Err(broadcast::error::RecvError::Closed) => return Err(FeedError::Closed),
            }
        }
    }

    /// Next relevant event already buffered, without waiting.
    pub fn try_recv(&mut self) -> Result<Option<ChangeEvent>, FeedError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if event.concerns(&self.viewer) => return Ok(Some(event)),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    return Err(FeedError::Lagged(skipped))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Err(FeedError::Closed),
            }
        }
    }
}
