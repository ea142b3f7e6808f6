//! Cleaner assignment sets.
//!
//! Assignments are only ever replaced wholesale: every row for the cleaning
//! is dropped and the requested set is written back with a fresh
//! `assigned_at`, unchanged cleaners included.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use super::domain::{Assignment, CleaningId, ProfileId, Role};
use super::error::SchedulingError;
use super::store::ProfileStore;

/// Drop repeated ids, keeping first-seen order.
pub fn dedupe_cleaner_ids(ids: &[ProfileId]) -> Vec<ProfileId> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

/// Every id must name an existing cleaner profile, otherwise the whole set
/// is rejected.
pub fn ensure_cleaners<P>(profiles: &P, ids: &[ProfileId]) -> Result<(), SchedulingError>
where
    P: ProfileStore + ?Sized,
{
    for id in ids {
        let profile = profiles
            .fetch_profile(*id)?
            .ok_or_else(|| SchedulingError::not_found("cleaner", id))?;
        if profile.role != Role::Cleaner {
            return Err(SchedulingError::validation(
                "cleaner_ids",
                format!("{id} is not a cleaner"),
            ));
        }
    }
    Ok(())
}

pub fn ensure_client<P>(profiles: &P, id: ProfileId) -> Result<(), SchedulingError>
where
    P: ProfileStore + ?Sized,
{
    let profile = profiles
        .fetch_profile(id)?
        .ok_or_else(|| SchedulingError::not_found("client", id))?;
    if profile.role != Role::Client {
        return Err(SchedulingError::validation(
            "client_id",
            format!("{id} is not a client"),
        ));
    }
    Ok(())
}

/// Rows to write for a replacement set; all share `now` as `assigned_at`.
pub fn replacement_rows(
    cleaning_id: CleaningId,
    cleaner_ids: &[ProfileId],
    now: DateTime<Utc>,
) -> Vec<Assignment> {
    cleaner_ids
        .iter()
        .map(|cleaner_id| Assignment {
            cleaning_id,
            cleaner_id: *cleaner_id,
            assigned_at: now,
        })
        .collect()
}
