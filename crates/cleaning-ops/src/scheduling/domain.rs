use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

entity_id!(
    /// Identifier of a user account, shared with the identity provider.
    ProfileId
);
entity_id!(
    /// Identifier of a client property.
    HouseId
);
entity_id!(
    /// Identifier of a scheduled cleaning job.
    CleaningId
);

/// The single authorization axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Cleaner,
    Client,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Cleaner => "cleaner",
            Role::Client => "client",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "cleaner" => Some(Role::Cleaner),
            "client" => Some(Role::Client),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: ProfileId,
    pub email: String,
    pub full_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// A client property. Cleanings may reference it for their address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct House {
    pub id: HouseId,
    pub client_id: ProfileId,
    pub address: String,
    pub sectors_count: u32,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleaningStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl CleaningStatus {
    pub const fn label(self) -> &'static str {
        match self {
            CleaningStatus::Pending => "pending",
            CleaningStatus::InProgress => "in_progress",
            CleaningStatus::Completed => "completed",
            CleaningStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(CleaningStatus::Pending),
            "in_progress" => Some(CleaningStatus::InProgress),
            "completed" => Some(CleaningStatus::Completed),
            "cancelled" => Some(CleaningStatus::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for CleaningStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One scheduled job, as stored in the `cleanings` table.
///
/// `current_step` stays within `0..=total_steps`, and a completed cleaning
/// always sits at `total_steps`. `version` increases by one on every write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cleaning {
    pub id: CleaningId,
    pub client_id: ProfileId,
    #[serde(default)]
    pub house_id: Option<HouseId>,
    pub address: String,
    pub total_steps: u32,
    pub current_step: u32,
    pub status: CleaningStatus,
    pub scheduled_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    #[serde(default)]
    pub notes: Option<String>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cleaning {
    pub fn progress_label(&self) -> String {
        format!("{}/{}", self.current_step, self.total_steps)
    }
}

/// A row of the `cleaning_cleaners` join relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub cleaning_id: CleaningId,
    pub cleaner_id: ProfileId,
    pub assigned_at: DateTime<Utc>,
}

/// A cleaning joined with its current assignment rows.
///
/// This is what the store returns, what the change feed carries and what
/// viewers hold in their live lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleaningRecord {
    #[serde(flatten)]
    pub cleaning: Cleaning,
    pub cleaners: Vec<Assignment>,
}

impl CleaningRecord {
    pub fn id(&self) -> CleaningId {
        self.cleaning.id
    }

    pub fn is_assigned(&self, cleaner_id: ProfileId) -> bool {
        self.cleaners
            .iter()
            .any(|assignment| assignment.cleaner_id == cleaner_id)
    }

    pub fn cleaner_ids(&self) -> Vec<ProfileId> {
        self.cleaners
            .iter()
            .map(|assignment| assignment.cleaner_id)
            .collect()
    }
}

/// Request body for scheduling a new cleaning.
///
/// Required fields are optional here so that a missing one surfaces as a
/// validation error naming the field rather than a deserialization failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCleaning {
    #[serde(default)]
    pub client_id: Option<ProfileId>,
    #[serde(default)]
    pub house_id: Option<HouseId>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub total_steps: Option<i64>,
    #[serde(default)]
    pub scheduled_date: Option<NaiveDate>,
    #[serde(default)]
    pub start_time: Option<NaiveTime>,
    #[serde(default)]
    pub end_time: Option<NaiveTime>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub cleaner_ids: Vec<ProfileId>,
}

/// Partial update of a cleaning. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleaningPatch {
    #[serde(default)]
    pub client_id: Option<ProfileId>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub total_steps: Option<i64>,
    #[serde(default)]
    pub scheduled_date: Option<NaiveDate>,
    #[serde(default)]
    pub start_time: Option<NaiveTime>,
    #[serde(default)]
    pub end_time: Option<NaiveTime>,
    #[serde(default)]
    pub status: Option<CleaningStatus>,
    #[serde(default)]
    pub current_step: Option<i64>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Full replacement of the assignment set.
    #[serde(default)]
    pub cleaner_ids: Option<Vec<ProfileId>>,
    /// Version the caller last read; a mismatch is a conflict.
    #[serde(default)]
    pub expected_version: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewHouse {
    #[serde(default)]
    pub client_id: Option<ProfileId>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub sectors_count: Option<i64>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HousePatch {
    #[serde(default)]
    pub client_id: Option<ProfileId>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub sectors_count: Option<i64>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleChange {
    pub role: Role,
}

/// Mutation response for cleanings: the stored record plus any request
/// fields the caller was not allowed to change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleaningUpdate {
    #[serde(flatten)]
    pub record: CleaningRecord,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ignored_fields: Vec<&'static str>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_serializes_as_snake_case() {
        let value = serde_json::to_value(CleaningStatus::InProgress).expect("serializes");
        assert_eq!(value, json!("in_progress"));
        assert_eq!(
            CleaningStatus::parse(" Completed "),
            Some(CleaningStatus::Completed)
        );
        assert_eq!(CleaningStatus::parse("done"), None);
    }

    #[test]
    fn patch_accepts_partial_payloads() {
        let patch: CleaningPatch =
            serde_json::from_value(json!({ "current_step": 3 })).expect("patch parses");
        assert_eq!(patch.current_step, Some(3));
        assert!(patch.status.is_none());
        assert!(patch.cleaner_ids.is_none());
    }

    #[test]
    fn role_parse_is_case_insensitive() {
        assert_eq!(Role::parse("CLEANER"), Some(Role::Cleaner));
        assert_eq!(Role::parse("owner"), None);
    }
}
