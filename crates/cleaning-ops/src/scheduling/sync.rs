//! Per-viewer live cleaning lists.

use super::domain::{CleaningId, CleaningRecord, CleaningStatus};
use super::feed::{ChangeEvent, FeedError, FeedSubscription};
use super::visibility::Viewer;

/// What applying one event did to the local list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewChange {
    Added(CleaningId),
    Replaced(CleaningId),
    Removed(CleaningId),
    Unchanged,
}

/// Local copy of the cleanings one viewer may see, kept ordered by
/// schedule and updated in place from change events.
#[derive(Debug, Clone)]
pub struct ViewSynchronizer {
    viewer: Viewer,
    rows: Vec<CleaningRecord>,
}

impl ViewSynchronizer {
    pub fn new(viewer: Viewer, initial: Vec<CleaningRecord>) -> Self {
        let mut synchronizer = Self {
            viewer,
            rows: Vec::new(),
        };
        synchronizer.reset(initial);
        synchronizer
    }

    pub fn viewer(&self) -> &Viewer {
        &self.viewer
    }

    pub fn rows(&self) -> &[CleaningRecord] {
        &self.rows
    }

    pub fn with_status(&self, status: CleaningStatus) -> Vec<&CleaningRecord> {
        self.rows
            .iter()
            .filter(|record| record.cleaning.status == status)
            .collect()
    }

    /// Replace the list wholesale, e.g. after a reload from the store.
    pub fn reset(&mut self, rows: Vec<CleaningRecord>) {
        let viewer = self.viewer;
        self.rows = rows
            .into_iter()
            .filter(|record| viewer.can_see(record))
            .collect();
        self.sort();
    }

    pub fn apply(&mut self, event: &ChangeEvent) -> ViewChange {
        match event {
            ChangeEvent::Insert { record } => {
                if self.viewer.can_see(record) {
                    self.upsert(record.clone())
                } else {
                    ViewChange::Unchanged
                }
            }
            ChangeEvent::Update { record, .. } => {
                if self.viewer.can_see(record) {
                    self.upsert(record.clone())
                } else {
                    // Row left this viewer's scope, e.g. cleaner unassigned.
                    self.remove(record.id())
                }
            }
            ChangeEvent::Delete { previous } => self.remove(previous.id()),
        }
    }

    fn upsert(&mut self, record: CleaningRecord) -> ViewChange {
        let id = record.id();
        let change = match self.position(id) {
            Some(index) => {
                self.rows[index] = record;
                ViewChange::Replaced(id)
            }
            None => {
                self.rows.push(record);
                ViewChange::Added(id)
            }
        };
        self.sort();
        change
    }

    fn remove(&mut self, id: CleaningId) -> ViewChange {
        match self.position(id) {
            Some(index) => {
                self.rows.remove(index);
                ViewChange::Removed(id)
            }
            None => ViewChange::Unchanged,
        }
    }

    fn position(&self, id: CleaningId) -> Option<usize> {
        self.rows.iter().position(|record| record.id() == id)
    }

    fn sort(&mut self) {
        self.rows.sort_by(|a, b| {
            (a.cleaning.scheduled_date, a.cleaning.start_time, a.cleaning.id).cmp(&(
                b.cleaning.scheduled_date,
                b.cleaning.start_time,
                b.cleaning.id,
            ))
        });
    }
}

/// A synchronizer bound to its feed subscription.
#[derive(Debug)]
pub struct LiveView {
    synchronizer: ViewSynchronizer,
    subscription: FeedSubscription,
}

impl LiveView {
    /// The subscription should be opened before `synchronizer` is seeded so
    /// no write falls between the initial read and the first event.
    pub fn new(synchronizer: ViewSynchronizer, subscription: FeedSubscription) -> Self {
        Self {
            synchronizer,
            subscription,
        }
    }

    pub fn viewer(&self) -> &Viewer {
        self.synchronizer.viewer()
    }

    pub fn rows(&self) -> &[CleaningRecord] {
        self.synchronizer.rows()
    }

    pub fn synchronizer(&self) -> &ViewSynchronizer {
        &self.synchronizer
    }

    /// Wait for the next relevant event and apply it.
    ///
    /// `FeedError::Lagged` means events were dropped; reload and call
    /// [`LiveView::resync`].
    pub async fn next_change(&mut self) -> Result<ViewChange, FeedError> {
        let event = self.subscription.recv().await?;
        Ok(self.synchronizer.apply(&event))
    }

    /// Apply every event already buffered, without waiting.
    pub fn drain(&mut self) -> Result<Vec<ViewChange>, FeedError> {
        let mut changes = Vec::new();
        while let Some(event) = self.subscription.try_recv()? {
            changes.push(self.synchronizer.apply(&event));
        }
        Ok(changes)
    }

    pub fn resync(&mut self, rows: Vec<CleaningRecord>) {
        self.synchronizer.reset(rows);
    }
}
