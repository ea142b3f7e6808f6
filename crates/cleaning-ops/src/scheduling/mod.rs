//! Houses, cleanings and the rules governing who may move a cleaning through
//! its lifecycle.

pub mod assignments;
pub mod auth;
pub mod domain;
pub mod error;
pub mod feed;
pub mod houses;
pub mod lifecycle;
pub mod router;
pub mod service;
pub mod store;
pub mod sync;
pub mod visibility;

#[cfg(test)]
mod tests;

pub use auth::{
    AccessGuard, Caller, IdentityError, IdentityProvider, RoleSource, Session, SessionClaims,
    StaticIdentityProvider,
};
pub use domain::{
    Assignment, Cleaning, CleaningId, CleaningPatch, CleaningRecord, CleaningStatus,
    CleaningUpdate, House, HouseId, HousePatch, NewCleaning, NewHouse, Profile, ProfileId, Role,
    RoleChange,
};
pub use error::SchedulingError;
pub use feed::{ChangeEvent, ChangeFeed, FeedError, FeedSubscription};
pub use lifecycle::{apply_mutation, derive_status, Actor, MutationPlan};
pub use router::scheduling_router;
pub use service::SchedulingService;
pub use store::{
    CleaningQuery, CleaningStore, EntityStore, HouseStore, InMemoryStore, ProfileStore,
    StoreError,
};
pub use sync::{LiveView, ViewChange, ViewSynchronizer};
pub use visibility::Viewer;
