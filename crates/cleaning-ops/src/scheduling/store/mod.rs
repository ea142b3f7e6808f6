//! Storage boundary for profiles, houses, cleanings and assignments.
//!
//! The relational store is an external collaborator; these traits are the
//! only way the service talks to it. Writes that touch more than one table
//! are single calls here so an adapter can make them atomic.

mod memory;

pub use memory::InMemoryStore;

use super::domain::{
    Assignment, Cleaning, CleaningId, CleaningRecord, CleaningStatus, House, HouseId, Profile,
    ProfileId, Role,
};
use super::visibility::Viewer;

/// Error enumeration for storage failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists")]
    Duplicate,
    #[error("record not found")]
    NotFound,
    #[error("stale write: expected version {expected}, stored version {actual}")]
    Conflict { expected: u64, actual: u64 },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Filter for cleaning listings. Visibility is applied by the store so
/// out-of-scope rows never leave it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleaningQuery {
    pub viewer: Viewer,
    pub status: Option<CleaningStatus>,
}

impl CleaningQuery {
    pub fn visible_to(viewer: Viewer) -> Self {
        Self {
            viewer,
            status: None,
        }
    }

    pub fn with_status(mut self, status: Option<CleaningStatus>) -> Self {
        self.status = status;
        self
    }

    pub fn matches(&self, record: &CleaningRecord) -> bool {
        self.viewer.can_see(record)
            && self
                .status
                .map_or(true, |status| record.cleaning.status == status)
    }
}

pub trait ProfileStore: Send + Sync {
    fn insert_profile(&self, profile: Profile) -> Result<Profile, StoreError>;
    fn fetch_profile(&self, id: ProfileId) -> Result<Option<Profile>, StoreError>;
    fn list_profiles(&self) -> Result<Vec<Profile>, StoreError>;
    /// A cleaner moved to another role loses its assignment rows in the same
    /// write.
    fn update_profile_role(&self, id: ProfileId, role: Role) -> Result<Profile, StoreError>;
    /// Removes the profile together with the houses and cleanings it owns
    /// and any assignment rows naming it.
    fn delete_profile(&self, id: ProfileId) -> Result<Profile, StoreError>;
}

pub trait HouseStore: Send + Sync {
    fn insert_house(&self, house: House) -> Result<House, StoreError>;
    fn fetch_house(&self, id: HouseId) -> Result<Option<House>, StoreError>;
    fn list_houses(&self, client_id: Option<ProfileId>) -> Result<Vec<House>, StoreError>;
    fn update_house(&self, house: House) -> Result<House, StoreError>;
    /// Removes the house and every cleaning that references it.
    fn delete_house(&self, id: HouseId) -> Result<House, StoreError>;
}

pub trait CleaningStore: Send + Sync {
    /// Writes the row and its assignment rows, or nothing.
    fn insert_cleaning(
        &self,
        cleaning: Cleaning,
        assignments: Vec<Assignment>,
    ) -> Result<CleaningRecord, StoreError>;

    fn fetch_cleaning(&self, id: CleaningId) -> Result<Option<CleaningRecord>, StoreError>;

    fn list_cleanings(&self, query: &CleaningQuery) -> Result<Vec<CleaningRecord>, StoreError>;

    /// Compare-and-swap on `expected_version`. When `assignments` is given the
    /// existing rows are deleted and replaced in the same write.
    fn update_cleaning(
        &self,
        cleaning: Cleaning,
        expected_version: u64,
        assignments: Option<Vec<Assignment>>,
    ) -> Result<CleaningRecord, StoreError>;

    fn delete_cleaning(&self, id: CleaningId) -> Result<CleaningRecord, StoreError>;

    /// Live lookup against the join relation.
    fn is_assigned(&self, cleaning_id: CleaningId, cleaner_id: ProfileId)
        -> Result<bool, StoreError>;
}

/// Everything the scheduling service needs from storage.
pub trait EntityStore: ProfileStore + HouseStore + CleaningStore {}

impl<T> EntityStore for T where T: ProfileStore + HouseStore + CleaningStore {}
