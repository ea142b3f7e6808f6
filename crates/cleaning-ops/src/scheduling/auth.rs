//! Session resolution and role gating.
//!
//! Credentials and token issuance live with the external identity provider;
//! this module only turns an opaque bearer token into a [`Caller`] and checks
//! the caller's role against the set an entry point accepts.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::domain::{ProfileId, Role};
use super::error::SchedulingError;
use super::store::ProfileStore;

/// Opaque caller session as presented on a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    token: Option<String>,
}

impl Session {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Parse an `Authorization` header value of the form `Bearer <token>`.
    pub fn from_authorization(header: Option<&str>) -> Self {
        let token = header.and_then(|value| {
            let (scheme, token) = value.trim().split_once(' ')?;
            if !scheme.eq_ignore_ascii_case("bearer") {
                return None;
            }
            let token = token.trim();
            (!token.is_empty()).then(|| token.to_string())
        });
        Self { token }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }
}

/// Claims the identity provider stamped on a session when it was issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub user_id: ProfileId,
    pub email: String,
    /// Role copied into the token metadata at issue time; may be stale.
    #[serde(default)]
    pub role: Option<Role>,
}

/// Thin client over the hosted identity provider.
pub trait IdentityProvider: Send + Sync {
    fn resolve(&self, token: &str) -> Result<Option<SessionClaims>, IdentityError>;
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

/// Token table kept in memory, for local runs and tests.
#[derive(Debug, Default, Clone)]
pub struct StaticIdentityProvider {
    sessions: Arc<RwLock<HashMap<String, SessionClaims>>>,
}

impl StaticIdentityProvider {
    pub fn issue(&self, token: impl Into<String>, claims: SessionClaims) {
        self.sessions
            .write()
            .expect("identity table poisoned")
            .insert(token.into(), claims);
    }

    pub fn revoke(&self, token: &str) {
        self.sessions
            .write()
            .expect("identity table poisoned")
            .remove(token);
    }
}

impl IdentityProvider for StaticIdentityProvider {
    fn resolve(&self, token: &str) -> Result<Option<SessionClaims>, IdentityError> {
        let guard = self.sessions.read().expect("identity table poisoned");
        Ok(guard.get(token).cloned())
    }
}

/// Where the guard reads the caller's role from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleSource {
    /// Role embedded in the session claims. Cheap, but stale after a role change.
    Metadata,
    /// Live lookup of the profile row. Must not gate writes to profiles.
    Store,
}

impl RoleSource {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "metadata" | "claims" => Some(Self::Metadata),
            "store" | "profile" => Some(Self::Store),
            _ => None,
        }
    }
}

/// The resolved identity behind a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Caller {
    pub id: ProfileId,
    pub email: String,
    pub role: Role,
}

/// Gate in front of every service entry point.
pub struct AccessGuard<I> {
    identity: Arc<I>,
    source: RoleSource,
}

impl<I> AccessGuard<I>
where
    I: IdentityProvider,
{
    pub fn new(identity: Arc<I>, source: RoleSource) -> Self {
        Self { identity, source }
    }

    /// Resolve the caller with the configured role source.
    pub fn authorize<P>(
        &self,
        session: &Session,
        accepted: &[Role],
        profiles: &P,
    ) -> Result<Caller, SchedulingError>
    where
        P: ProfileStore + ?Sized,
    {
        self.authorize_with(self.source, session, accepted, profiles)
    }

    pub fn authorize_with<P>(
        &self,
        source: RoleSource,
        session: &Session,
        accepted: &[Role],
        profiles: &P,
    ) -> Result<Caller, SchedulingError>
    where
        P: ProfileStore + ?Sized,
    {
        let token = session.token().ok_or(SchedulingError::Unauthenticated)?;
        let claims = self
            .identity
            .resolve(token)?
            .ok_or(SchedulingError::Unauthenticated)?;

        let role = match source {
            RoleSource::Metadata => claims.role,
            RoleSource::Store => profiles
                .fetch_profile(claims.user_id)?
                .map(|profile| profile.role),
        };

        let Some(role) = role else {
            warn!(user_id = %claims.user_id, ?source, "session has no resolvable role");
            return Err(SchedulingError::forbidden("session has no resolvable role"));
        };

        if !accepted.contains(&role) {
            warn!(user_id = %claims.user_id, %role, ?accepted, "role not permitted");
            return Err(SchedulingError::forbidden(format!(
                "role {role} is not permitted here"
            )));
        }

        Ok(Caller {
            id: claims.user_id,
            email: claims.email,
            role,
        })
    }
}
