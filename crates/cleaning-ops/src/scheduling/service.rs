use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use super::assignments::{ensure_cleaners, ensure_client, replacement_rows};
use super::auth::{AccessGuard, Caller, IdentityProvider, RoleSource, Session};
use super::domain::{
    CleaningId, CleaningPatch, CleaningRecord, CleaningStatus, CleaningUpdate, House, HouseId,
    HousePatch, NewCleaning, NewHouse, Profile, ProfileId, Role,
};
use super::error::SchedulingError;
use super::feed::ChangeFeed;
use super::houses::{apply_house_patch, draft_house};
use super::lifecycle::{self, Actor};
use super::store::{CleaningQuery, EntityStore, StoreError};
use super::sync::{LiveView, ViewSynchronizer};
use super::visibility::Viewer;
use crate::config::SchedulingConfig;

const ANY_ROLE: &[Role] = &[Role::Admin, Role::Cleaner, Role::Client];
const ADMIN_ONLY: &[Role] = &[Role::Admin];
const CLEANING_EDITORS: &[Role] = &[Role::Admin, Role::Cleaner];
const HOUSE_VIEWERS: &[Role] = &[Role::Admin, Role::Client];

/// Service composing the access guard, the entity store and the lifecycle
/// rules. Every entry point authorizes first, then reads, validates and
/// writes.
pub struct SchedulingService<S, I> {
    store: Arc<S>,
    guard: AccessGuard<I>,
    feed: ChangeFeed,
}

impl<S, I> SchedulingService<S, I>
where
    S: EntityStore + 'static,
    I: IdentityProvider + 'static,
{
    /// `feed` must be the feed `store` publishes to.
    pub fn new(
        store: Arc<S>,
        identity: Arc<I>,
        feed: ChangeFeed,
        config: &SchedulingConfig,
    ) -> Self {
        Self {
            store,
            guard: AccessGuard::new(identity, config.role_source),
            feed,
        }
    }

    fn authorize(&self, session: &Session, accepted: &[Role]) -> Result<Caller, SchedulingError> {
        self.guard.authorize(session, accepted, self.store.as_ref())
    }

    /// Profile-table writes use the session metadata rather than a live
    /// profile read.
    fn authorize_profile_write(&self, session: &Session) -> Result<Caller, SchedulingError> {
        self.guard
            .authorize_with(RoleSource::Metadata, session, ADMIN_ONLY, self.store.as_ref())
    }

    /// Resolve the session's caller without requiring a particular role.
    pub fn authenticate(&self, session: &Session) -> Result<Caller, SchedulingError> {
        self.authorize(session, ANY_ROLE)
    }

    pub fn whoami(&self, session: &Session) -> Result<Profile, SchedulingError> {
        let caller = self.authorize(session, ANY_ROLE)?;
        self.store
            .fetch_profile(caller.id)?
            .ok_or_else(|| SchedulingError::not_found("profile", caller.id))
    }

    pub fn list_cleanings(
        &self,
        session: &Session,
        status: Option<CleaningStatus>,
    ) -> Result<Vec<CleaningRecord>, SchedulingError> {
        let caller = self.authorize(session, ANY_ROLE)?;
        let query = CleaningQuery::visible_to(Viewer::for_caller(&caller)).with_status(status);
        Ok(self.store.list_cleanings(&query)?)
    }

    /// Hidden rows report as missing rather than forbidden.
    pub fn get_cleaning(
        &self,
        session: &Session,
        id: CleaningId,
    ) -> Result<CleaningRecord, SchedulingError> {
        let caller = self.authorize(session, ANY_ROLE)?;
        let viewer = Viewer::for_caller(&caller);
        self.store
            .fetch_cleaning(id)?
            .filter(|record| viewer.can_see(record))
            .ok_or_else(|| SchedulingError::not_found("cleaning", id))
    }

    pub fn create_cleaning(
        &self,
        session: &Session,
        request: NewCleaning,
    ) -> Result<CleaningRecord, SchedulingError> {
        let caller = self.authorize(session, ADMIN_ONLY)?;

        let house = match request.house_id {
            Some(house_id) => Some(
                self.store
                    .fetch_house(house_id)?
                    .ok_or_else(|| SchedulingError::not_found("house", house_id))?,
            ),
            None => None,
        };

        let now = Utc::now();
        let (cleaning, cleaner_ids) = lifecycle::draft_cleaning(&request, house.as_ref(), now)?;
        ensure_client(self.store.as_ref(), cleaning.client_id)?;
        ensure_cleaners(self.store.as_ref(), &cleaner_ids)?;

        let rows = replacement_rows(cleaning.id, &cleaner_ids, now);
        let record = self.store.insert_cleaning(cleaning, rows)?;

        info!(
            cleaning_id = %record.id(),
            admin_id = %caller.id,
            cleaners = record.cleaners.len(),
            "cleaning scheduled"
        );
        Ok(record)
    }

    pub fn update_cleaning(
        &self,
        session: &Session,
        id: CleaningId,
        patch: CleaningPatch,
    ) -> Result<CleaningUpdate, SchedulingError> {
        let caller = self.authorize(session, CLEANING_EDITORS)?;

        let current = self
            .store
            .fetch_cleaning(id)?
            .ok_or_else(|| SchedulingError::not_found("cleaning", id))?;

        let actor = match caller.role {
            Role::Admin => Actor::Admin,
            Role::Cleaner => Actor::Cleaner {
                assigned: self.store.is_assigned(id, caller.id)?,
            },
            Role::Client => Actor::Client,
        };

        let now = Utc::now();
        let plan = lifecycle::apply_mutation(actor, &current.cleaning, &patch, now)
            .map_err(|err| {
                if let SchedulingError::Forbidden { reason } = &err {
                    warn!(
                        cleaning_id = %id,
                        caller_id = %caller.id,
                        %reason,
                        "cleaning mutation refused"
                    );
                }
                err
            })?;

        if plan.is_noop(&current.cleaning) {
            return Ok(CleaningUpdate {
                record: current,
                ignored_fields: plan.ignored_fields,
            });
        }

        if plan.client_changed(&current.cleaning) {
            ensure_client(self.store.as_ref(), plan.cleaning.client_id)?;
        }
        let assignments = match plan.cleaner_ids.as_deref() {
            Some(cleaner_ids) => {
                ensure_cleaners(self.store.as_ref(), cleaner_ids)?;
                Some(replacement_rows(id, cleaner_ids, now))
            }
            None => None,
        };

        let record = self
            .store
            .update_cleaning(plan.cleaning, current.cleaning.version, assignments)
            .map_err(|err| match err {
                StoreError::Conflict { expected, actual } => {
                    warn!(cleaning_id = %id, expected, actual, "concurrent cleaning write");
                    SchedulingError::Conflict { expected, actual }
                }
                StoreError::NotFound => SchedulingError::not_found("cleaning", id),
                other => SchedulingError::Store(other),
            })?;

        info!(
            cleaning_id = %id,
            role = %caller.role,
            status = %record.cleaning.status,
            progress = %record.cleaning.progress_label(),
            "cleaning updated"
        );

        Ok(CleaningUpdate {
            record,
            ignored_fields: plan.ignored_fields,
        })
    }

    pub fn delete_cleaning(
        &self,
        session: &Session,
        id: CleaningId,
    ) -> Result<CleaningRecord, SchedulingError> {
        let caller = self.authorize(session, ADMIN_ONLY)?;
        let record = self.store.delete_cleaning(id).map_err(|err| match err {
            StoreError::NotFound => SchedulingError::not_found("cleaning", id),
            other => SchedulingError::Store(other),
        })?;
        info!(cleaning_id = %id, admin_id = %caller.id, "cleaning deleted");
        Ok(record)
    }

    pub fn list_houses(&self, session: &Session) -> Result<Vec<House>, SchedulingError> {
        let caller = self.authorize(session, HOUSE_VIEWERS)?;
        let owner = match Viewer::for_caller(&caller) {
            Viewer::Admin => None,
            Viewer::Client(id) | Viewer::Cleaner(id) => Some(id),
        };
        Ok(self.store.list_houses(owner)?)
    }

    pub fn create_house(
        &self,
        session: &Session,
        request: NewHouse,
    ) -> Result<House, SchedulingError> {
        let caller = self.authorize(session, ADMIN_ONLY)?;
        let house = draft_house(&request, Utc::now())?;
        ensure_client(self.store.as_ref(), house.client_id)?;
        let house = self.store.insert_house(house)?;
        info!(house_id = %house.id, admin_id = %caller.id, "house created");
        Ok(house)
    }

    pub fn update_house(
        &self,
        session: &Session,
        id: HouseId,
        patch: HousePatch,
    ) -> Result<House, SchedulingError> {
        let caller = self.authorize(session, ADMIN_ONLY)?;
        let current = self
            .store
            .fetch_house(id)?
            .ok_or_else(|| SchedulingError::not_found("house", id))?;
        let next = apply_house_patch(&current, &patch, Utc::now())?;
        if next.client_id != current.client_id {
            ensure_client(self.store.as_ref(), next.client_id)?;
            let booked = self
                .store
                .list_cleanings(&CleaningQuery::visible_to(Viewer::Admin))?
                .iter()
                .filter(|record| record.cleaning.house_id == Some(id))
                .count();
            if booked > 0 {
                return Err(SchedulingError::validation(
                    "client_id",
                    format!("house still has {booked} cleaning(s) for its current client"),
                ));
            }
        }
        let house = self.store.update_house(next)?;
        info!(house_id = %id, admin_id = %caller.id, "house updated");
        Ok(house)
    }

    pub fn delete_house(&self, session: &Session, id: HouseId) -> Result<House, SchedulingError> {
        let caller = self.authorize(session, ADMIN_ONLY)?;
        let house = self.store.delete_house(id).map_err(|err| match err {
            StoreError::NotFound => SchedulingError::not_found("house", id),
            other => SchedulingError::Store(other),
        })?;
        info!(house_id = %id, admin_id = %caller.id, "house deleted");
        Ok(house)
    }

    pub fn list_profiles(&self, session: &Session) -> Result<Vec<Profile>, SchedulingError> {
        self.authorize(session, ADMIN_ONLY)?;
        Ok(self.store.list_profiles()?)
    }

    pub fn change_user_role(
        &self,
        session: &Session,
        user_id: ProfileId,
        role: Role,
    ) -> Result<Profile, SchedulingError> {
        let caller = self.authorize_profile_write(session)?;
        if caller.id == user_id {
            return Err(SchedulingError::validation(
                "user_id",
                "you cannot change your own role",
            ));
        }
        let target = self
            .store
            .fetch_profile(user_id)?
            .ok_or_else(|| SchedulingError::not_found("profile", user_id))?;
        if target.role == Role::Client && role != Role::Client {
            self.ensure_owns_nothing(user_id)?;
        }

        let profile = self
            .store
            .update_profile_role(user_id, role)
            .map_err(|err| match err {
                StoreError::NotFound => SchedulingError::not_found("profile", user_id),
                other => SchedulingError::Store(other),
            })?;
        info!(user_id = %user_id, %role, admin_id = %caller.id, "user role changed");
        Ok(profile)
    }

    fn ensure_owns_nothing(&self, client_id: ProfileId) -> Result<(), SchedulingError> {
        let houses = self.store.list_houses(Some(client_id))?.len();
        let cleanings = self
            .store
            .list_cleanings(&CleaningQuery::visible_to(Viewer::Client(client_id)))?
            .len();
        if houses + cleanings > 0 {
            return Err(SchedulingError::validation(
                "role",
                format!("client still owns {houses} house(s) and {cleanings} cleaning(s)"),
            ));
        }
        Ok(())
    }

    pub fn delete_user(
        &self,
        session: &Session,
        user_id: ProfileId,
    ) -> Result<Profile, SchedulingError> {
        let caller = self.authorize_profile_write(session)?;
        if caller.id == user_id {
            return Err(SchedulingError::validation(
                "user_id",
                "you cannot delete your own account",
            ));
        }
        let profile = self.store.delete_profile(user_id).map_err(|err| match err {
            StoreError::NotFound => SchedulingError::not_found("profile", user_id),
            other => SchedulingError::Store(other),
        })?;
        info!(user_id = %user_id, admin_id = %caller.id, "user deleted");
        Ok(profile)
    }

    /// Open a live, role-scoped cleaning list for the session.
    pub fn open_live_view(&self, session: &Session) -> Result<LiveView, SchedulingError> {
        let caller = self.authorize(session, ANY_ROLE)?;
        let viewer = Viewer::for_caller(&caller);
        let subscription = self.feed.subscribe(viewer);
        let initial = self
            .store
            .list_cleanings(&CleaningQuery::visible_to(viewer))?;
        Ok(LiveView::new(
            ViewSynchronizer::new(viewer, initial),
            subscription,
        ))
    }

    /// Reload a view that fell behind the feed.
    pub fn resync_live_view(&self, view: &mut LiveView) -> Result<(), SchedulingError> {
        let rows = self
            .store
            .list_cleanings(&CleaningQuery::visible_to(*view.viewer()))?;
        view.resync(rows);
        Ok(())
    }
}
