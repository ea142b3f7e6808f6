use chrono::{NaiveDate, Utc};
use cleaning_ops::config::SchedulingConfig;
use cleaning_ops::scheduling::houses::draft_house;
use cleaning_ops::scheduling::{
    ChangeFeed, HouseStore, InMemoryStore, NewHouse, Profile, ProfileId, ProfileStore, Role,
    SchedulingError, SchedulingService, SessionClaims, StaticIdentityProvider,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

pub(crate) type MemoryService = SchedulingService<InMemoryStore, StaticIdentityProvider>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// In-process store, token table and service sharing one change feed.
pub(crate) struct Backend {
    pub(crate) service: Arc<MemoryService>,
    pub(crate) store: Arc<InMemoryStore>,
    pub(crate) identity: Arc<StaticIdentityProvider>,
}

pub(crate) fn build_backend(config: &SchedulingConfig) -> Backend {
    let feed = ChangeFeed::new(config.feed_capacity);
    let store = Arc::new(InMemoryStore::new(feed.clone()));
    let identity = Arc::new(StaticIdentityProvider::default());
    let service = Arc::new(SchedulingService::new(
        store.clone(),
        identity.clone(),
        feed,
        config,
    ));
    Backend {
        service,
        store,
        identity,
    }
}

#[derive(Debug, Clone)]
pub(crate) struct SeededUser {
    pub(crate) profile: Profile,
    pub(crate) token: String,
}

impl SeededUser {
    pub(crate) fn id(&self) -> ProfileId {
        self.profile.id
    }
}

#[derive(Debug, Clone)]
pub(crate) struct DemoRoster {
    pub(crate) admin: SeededUser,
    pub(crate) cleaners: Vec<SeededUser>,
    pub(crate) clients: Vec<SeededUser>,
}

const DEMO_USERS: &[(Role, &str, &str, &str)] = &[
    (Role::Admin, "demo-admin", "dispatch@tidyhome.test", "Dana Dispatch"),
    (Role::Cleaner, "demo-cleaner-1", "sam@tidyhome.test", "Sam Rivera"),
    (Role::Cleaner, "demo-cleaner-2", "lee@tidyhome.test", "Lee Okafor"),
    (Role::Client, "demo-client-1", "maria@example.test", "Maria Lopez"),
    (Role::Client, "demo-client-2", "tom@example.test", "Tom Becker"),
];

/// Register the demo roster with fixed bearer tokens and one house per
/// client.
pub(crate) fn seed_demo_roster(backend: &Backend) -> Result<DemoRoster, SchedulingError> {
    let mut admin = None;
    let mut cleaners = Vec::new();
    let mut clients = Vec::new();

    for (role, token, email, full_name) in DEMO_USERS {
        let profile = backend.store.insert_profile(Profile {
            id: ProfileId::new(),
            email: (*email).to_string(),
            full_name: (*full_name).to_string(),
            phone: None,
            role: *role,
            created_at: Utc::now(),
        })?;
        backend.identity.issue(
            *token,
            SessionClaims {
                user_id: profile.id,
                email: profile.email.clone(),
                role: Some(profile.role),
            },
        );
        info!(%role, email = %profile.email, token = %token, "demo user seeded");

        let user = SeededUser {
            profile,
            token: (*token).to_string(),
        };
        match role {
            Role::Admin => admin = Some(user),
            Role::Cleaner => cleaners.push(user),
            Role::Client => clients.push(user),
        }
    }

    let admin = admin.ok_or_else(|| SchedulingError::not_found("profile", "demo-admin"))?;

    for (index, client) in clients.iter().enumerate() {
        let house = draft_house(
            &NewHouse {
                client_id: Some(client.id()),
                address: Some(format!("{} Linden Avenue", 10 + index * 4)),
                sectors_count: Some(5),
                notes: None,
            },
            Utc::now(),
        )?;
        backend.store.insert_house(house)?;
    }

    Ok(DemoRoster {
        admin,
        cleaners,
        clients,
    })
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cleaning_ops::scheduling::Session;

    #[test]
    fn roster_tokens_resolve_to_profiles() {
        let backend = build_backend(&SchedulingConfig::default());
        let roster = seed_demo_roster(&backend).expect("roster seeds");
        assert_eq!(roster.cleaners.len(), 2);
        assert_eq!(roster.clients.len(), 2);

        let me = backend
            .service
            .whoami(&Session::bearer(roster.cleaners[0].token.clone()))
            .expect("token resolves");
        assert_eq!(me.id, roster.cleaners[0].id());

        let houses = backend
            .service
            .list_houses(&Session::bearer(roster.admin.token.clone()))
            .expect("admin lists houses");
        assert_eq!(houses.len(), 2);
    }

    #[test]
    fn parse_date_names_expected_format() {
        assert_eq!(
            parse_date(" 2025-12-01 "),
            Ok(NaiveDate::from_ymd_opt(2025, 12, 1).expect("valid date"))
        );
        let err = parse_date("12/01/2025").expect_err("wrong format");
        assert!(err.contains("YYYY-MM-DD"));
    }
}
