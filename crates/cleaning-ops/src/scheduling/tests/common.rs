use std::sync::Arc;

use axum::response::Response;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde_json::Value;

use crate::config::SchedulingConfig;
use crate::scheduling::auth::{RoleSource, Session, SessionClaims, StaticIdentityProvider};
use crate::scheduling::domain::{
    Assignment, Cleaning, CleaningId, CleaningPatch, CleaningRecord, CleaningStatus, House,
    HouseId, NewCleaning, Profile, ProfileId, Role,
};
use crate::scheduling::feed::ChangeFeed;
use crate::scheduling::router::scheduling_router;
use crate::scheduling::service::SchedulingService;
use crate::scheduling::store::{
    CleaningQuery, CleaningStore, HouseStore, InMemoryStore, ProfileStore, StoreError,
};

pub(super) type MemoryService = SchedulingService<InMemoryStore, StaticIdentityProvider>;

pub(super) struct Fixture {
    pub(super) service: Arc<MemoryService>,
    pub(super) store: Arc<InMemoryStore>,
    pub(super) identity: Arc<StaticIdentityProvider>,
    pub(super) feed: ChangeFeed,
    pub(super) admin: Profile,
    pub(super) cleaner_x: Profile,
    pub(super) cleaner_y: Profile,
    pub(super) cleaner_z: Profile,
    pub(super) client_a: Profile,
    pub(super) client_b: Profile,
}

impl Fixture {
    pub(super) fn session(&self, profile: &Profile) -> Session {
        Session::bearer(token_for(profile))
    }

    pub(super) fn router(&self) -> axum::Router {
        scheduling_router(self.service.clone())
    }

    /// Admin-created cleaning for `client` with the given cleaners.
    pub(super) fn schedule(
        &self,
        client: &Profile,
        total_steps: i64,
        cleaners: &[&Profile],
    ) -> CleaningRecord {
        self.service
            .create_cleaning(
                &self.session(&self.admin),
                new_cleaning(client.id, total_steps, cleaners),
            )
            .expect("admin schedules cleaning")
    }

    pub(super) fn stored(&self, id: CleaningId) -> CleaningRecord {
        self.store
            .fetch_cleaning(id)
            .expect("fetch succeeds")
            .expect("cleaning present")
    }
}

pub(super) fn fixture() -> Fixture {
    fixture_with(RoleSource::Store)
}

pub(super) fn fixture_with(role_source: RoleSource) -> Fixture {
    let feed = ChangeFeed::new(64);
    let store = Arc::new(InMemoryStore::new(feed.clone()));
    let identity = Arc::new(StaticIdentityProvider::default());

    let register = |role: Role, email: &str| {
        let profile = profile(role, email);
        store
            .insert_profile(profile.clone())
            .expect("profile inserts");
        identity.issue(
            token_for(&profile),
            SessionClaims {
                user_id: profile.id,
                email: profile.email.clone(),
                role: Some(profile.role),
            },
        );
        profile
    };

    let admin = register(Role::Admin, "dispatch@sparkle.test");
    let cleaner_x = register(Role::Cleaner, "xavier@sparkle.test");
    let cleaner_y = register(Role::Cleaner, "yara@sparkle.test");
    let cleaner_z = register(Role::Cleaner, "zoe@sparkle.test");
    let client_a = register(Role::Client, "alice@example.test");
    let client_b = register(Role::Client, "bruno@example.test");

    let config = SchedulingConfig {
        role_source,
        ..SchedulingConfig::default()
    };
    let service = Arc::new(SchedulingService::new(
        store.clone(),
        identity.clone(),
        feed.clone(),
        &config,
    ));

    Fixture {
        service,
        store,
        identity,
        feed,
        admin,
        cleaner_x,
        cleaner_y,
        cleaner_z,
        client_a,
        client_b,
    }
}

pub(super) fn token_for(profile: &Profile) -> String {
    format!("token-{}", profile.email)
}

pub(super) fn profile(role: Role, email: &str) -> Profile {
    Profile {
        id: ProfileId::new(),
        email: email.to_string(),
        full_name: email.split('@').next().unwrap_or(email).to_string(),
        phone: None,
        role,
        created_at: Utc::now(),
    }
}

pub(super) fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 11, 4).expect("valid date")
}

pub(super) fn time(hour: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, 0, 0).expect("valid time")
}

pub(super) fn long_ago() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2020, 1, 1, 8, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn new_cleaning(
    client_id: ProfileId,
    total_steps: i64,
    cleaners: &[&Profile],
) -> NewCleaning {
    NewCleaning {
        client_id: Some(client_id),
        house_id: None,
        address: Some("41 Harbor Lane".to_string()),
        total_steps: Some(total_steps),
        scheduled_date: Some(date()),
        start_time: Some(time(9)),
        end_time: Some(time(12)),
        notes: Some("Key under the mat".to_string()),
        cleaner_ids: cleaners.iter().map(|profile| profile.id).collect(),
    }
}

/// A stored-looking row for exercising the lifecycle rules directly.
pub(super) fn cleaning(total_steps: u32, current_step: u32, status: CleaningStatus) -> Cleaning {
    Cleaning {
        id: CleaningId::new(),
        client_id: ProfileId::new(),
        house_id: None,
        address: "41 Harbor Lane".to_string(),
        total_steps,
        current_step,
        status,
        scheduled_date: date(),
        start_time: time(9),
        end_time: time(12),
        notes: None,
        version: 3,
        created_at: long_ago(),
        updated_at: long_ago(),
    }
}

pub(super) fn house(client_id: ProfileId) -> House {
    House {
        id: HouseId::new(),
        client_id,
        address: "7 Orchard Row".to_string(),
        sectors_count: 6,
        notes: None,
        created_at: long_ago(),
        updated_at: long_ago(),
    }
}

pub(super) fn assignment(cleaning_id: CleaningId, cleaner: &Profile) -> Assignment {
    Assignment {
        cleaning_id,
        cleaner_id: cleaner.id,
        assigned_at: long_ago(),
    }
}

pub(super) fn step_patch(step: i64) -> CleaningPatch {
    CleaningPatch {
        current_step: Some(step),
        ..CleaningPatch::default()
    }
}

pub(super) fn status_patch(status: CleaningStatus) -> CleaningPatch {
    CleaningPatch {
        status: Some(status),
        ..CleaningPatch::default()
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

/// Store whose every call fails, for exercising the 500 path.
pub(super) struct UnavailableStore;

fn offline<T>() -> Result<T, StoreError> {
    Err(StoreError::Unavailable("database offline".to_string()))
}

impl ProfileStore for UnavailableStore {
    fn insert_profile(&self, _profile: Profile) -> Result<Profile, StoreError> {
        offline()
    }

    fn fetch_profile(&self, _id: ProfileId) -> Result<Option<Profile>, StoreError> {
        offline()
    }

    fn list_profiles(&self) -> Result<Vec<Profile>, StoreError> {
        offline()
    }

    fn update_profile_role(&self, _id: ProfileId, _role: Role) -> Result<Profile, StoreError> {
        offline()
    }

    fn delete_profile(&self, _id: ProfileId) -> Result<Profile, StoreError> {
        offline()
    }
}

impl HouseStore for UnavailableStore {
    fn insert_house(&self, _house: House) -> Result<House, StoreError> {
        offline()
    }

    fn fetch_house(&self, _id: HouseId) -> Result<Option<House>, StoreError> {
        offline()
    }

    fn list_houses(&self, _client_id: Option<ProfileId>) -> Result<Vec<House>, StoreError> {
        offline()
    }

    fn update_house(&self, _house: House) -> Result<House, StoreError> {
        offline()
    }

    fn delete_house(&self, _id: HouseId) -> Result<House, StoreError> {
        offline()
    }
}

impl CleaningStore for UnavailableStore {
    fn insert_cleaning(
        &self,
        _cleaning: Cleaning,
        _assignments: Vec<Assignment>,
    ) -> Result<CleaningRecord, StoreError> {
        offline()
    }

    fn fetch_cleaning(&self, _id: CleaningId) -> Result<Option<CleaningRecord>, StoreError> {
        offline()
    }

    fn list_cleanings(&self, _query: &CleaningQuery) -> Result<Vec<CleaningRecord>, StoreError> {
        offline()
    }

    fn update_cleaning(
        &self,
        _cleaning: Cleaning,
        _expected_version: u64,
        _assignments: Option<Vec<Assignment>>,
    ) -> Result<CleaningRecord, StoreError> {
        offline()
    }

    fn delete_cleaning(&self, _id: CleaningId) -> Result<CleaningRecord, StoreError> {
        offline()
    }

    fn is_assigned(
        &self,
        _cleaning_id: CleaningId,
        _cleaner_id: ProfileId,
    ) -> Result<bool, StoreError> {
        offline()
    }
}
