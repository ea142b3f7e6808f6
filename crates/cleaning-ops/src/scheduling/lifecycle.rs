//! Cleaning lifecycle rules.
//!
//! Everything here is pure: the service reads the current row, hands it to
//! [`apply_mutation`] together with the caller's [`Actor`], and writes back
//! whatever comes out. Status and step move together according to these
//! rules:
//!
//! * admins may set any field; `status = completed` pulls `current_step` up
//!   to `total_steps`
//! * assigned cleaners may only move `current_step` (within
//!   `0..=total_steps`) and set `status` to `in_progress` or `completed`
//! * a step change re-derives the status (see [`derive_status`]) before an
//!   explicit status in the same request is considered

use chrono::{DateTime, NaiveTime, Utc};

use super::assignments::dedupe_cleaner_ids;
use super::domain::{
    Cleaning, CleaningId, CleaningPatch, CleaningStatus, House, NewCleaning, ProfileId,
};
use super::error::SchedulingError;
use super::houses::{normalize_notes, validate_address};

pub const MIN_TOTAL_STEPS: i64 = 1;
pub const MAX_TOTAL_STEPS: i64 = 20;

/// The caller as the lifecycle rules see it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Admin,
    /// `assigned` must come from a live lookup of the join relation.
    Cleaner {
        assigned: bool,
    },
    Client,
}

/// Result of applying a mutation request to the current row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationPlan {
    pub cleaning: Cleaning,
    /// Replacement assignment set, when the request carried one.
    pub cleaner_ids: Option<Vec<ProfileId>>,
    /// Request fields that were accepted but not applied.
    pub ignored_fields: Vec<&'static str>,
}

impl MutationPlan {
    pub fn client_changed(&self, current: &Cleaning) -> bool {
        self.cleaning.client_id != current.client_id
    }

    /// True when writing the plan would leave the stored row as it is.
    pub fn is_noop(&self, current: &Cleaning) -> bool {
        let unchanged = Cleaning {
            updated_at: current.updated_at,
            ..self.cleaning.clone()
        };
        self.cleaner_ids.is_none() && unchanged == *current
    }
}

/// Status implied by moving to `new_step`, given the status before the move.
pub fn derive_status(prior: CleaningStatus, new_step: u32, total_steps: u32) -> CleaningStatus {
    if new_step == total_steps {
        CleaningStatus::Completed
    } else if prior == CleaningStatus::Completed {
        CleaningStatus::InProgress
    } else if new_step > 0 && prior == CleaningStatus::Pending {
        CleaningStatus::InProgress
    } else {
        prior
    }
}

pub fn validate_total_steps(raw: i64) -> Result<u32, SchedulingError> {
    if (MIN_TOTAL_STEPS..=MAX_TOTAL_STEPS).contains(&raw) {
        Ok(raw as u32)
    } else {
        Err(SchedulingError::validation(
            "total_steps",
            format!("must be between {MIN_TOTAL_STEPS} and {MAX_TOTAL_STEPS} (got {raw})"),
        ))
    }
}

pub fn validate_current_step(raw: i64, total_steps: u32) -> Result<u32, SchedulingError> {
    if (0..=i64::from(total_steps)).contains(&raw) {
        Ok(raw as u32)
    } else {
        Err(SchedulingError::validation(
            "current_step",
            format!("must be between 0 and {total_steps} (got {raw})"),
        ))
    }
}

fn validate_window(start: NaiveTime, end: NaiveTime) -> Result<(), SchedulingError> {
    if end <= start {
        return Err(SchedulingError::validation(
            "end_time",
            format!("must be after start_time ({start})"),
        ));
    }
    Ok(())
}

fn required<T>(value: Option<T>, field: &'static str) -> Result<T, SchedulingError> {
    value.ok_or_else(|| SchedulingError::validation(field, "is required"))
}

/// Build the initial row for a new cleaning.
///
/// `house` is the row referenced by `request.house_id`, already fetched by
/// the caller. Returns the row (pending, step 0, version 1) and the
/// de-duplicated initial assignment set.
pub fn draft_cleaning(
    request: &NewCleaning,
    house: Option<&House>,
    now: DateTime<Utc>,
) -> Result<(Cleaning, Vec<ProfileId>), SchedulingError> {
    let client_id = required(request.client_id, "client_id")?;

    if let Some(house) = house {
        if house.client_id != client_id {
            return Err(SchedulingError::validation(
                "house_id",
                "house belongs to a different client",
            ));
        }
    }

    let address = match (request.address.as_deref(), house) {
        (Some(address), _) => validate_address(address)?,
        (None, Some(house)) => house.address.clone(),
        (None, None) => return Err(SchedulingError::validation("address", "is required")),
    };

    let total_steps = validate_total_steps(required(request.total_steps, "total_steps")?)?;
    let scheduled_date = required(request.scheduled_date, "scheduled_date")?;
    let start_time = required(request.start_time, "start_time")?;
    let end_time = required(request.end_time, "end_time")?;
    validate_window(start_time, end_time)?;

    let cleaning = Cleaning {
        id: CleaningId::new(),
        client_id,
        house_id: house.map(|house| house.id),
        address,
        total_steps,
        current_step: 0,
        status: CleaningStatus::Pending,
        scheduled_date,
        start_time,
        end_time,
        notes: request.notes.as_deref().and_then(normalize_notes),
        version: 1,
        created_at: now,
        updated_at: now,
    };

    Ok((cleaning, dedupe_cleaner_ids(&request.cleaner_ids)))
}

/// Validate `patch` against the freshly read `current` row and compute the
/// row to write.
pub fn apply_mutation(
    actor: Actor,
    current: &Cleaning,
    patch: &CleaningPatch,
    now: DateTime<Utc>,
) -> Result<MutationPlan, SchedulingError> {
    match actor {
        Actor::Admin => {
            check_version(current, patch)?;
            apply_admin(current, patch, now)
        }
        Actor::Cleaner { assigned: true } => {
            check_version(current, patch)?;
            apply_cleaner(current, patch, now)
        }
        Actor::Cleaner { assigned: false } => Err(SchedulingError::forbidden(
            "cleaner is not assigned to this cleaning",
        )),
        Actor::Client => Err(SchedulingError::forbidden("clients cannot modify cleanings")),
    }
}

fn check_version(current: &Cleaning, patch: &CleaningPatch) -> Result<(), SchedulingError> {
    match patch.expected_version {
        Some(expected) if expected != current.version => Err(SchedulingError::Conflict {
            expected,
            actual: current.version,
        }),
        _ => Ok(()),
    }
}

fn apply_admin(
    current: &Cleaning,
    patch: &CleaningPatch,
    now: DateTime<Utc>,
) -> Result<MutationPlan, SchedulingError> {
    let mut next = current.clone();

    if let Some(client_id) = patch.client_id {
        if client_id != current.client_id {
            // The linked house belongs to the previous client.
            next.house_id = None;
        }
        next.client_id = client_id;
    }
    if let Some(address) = patch.address.as_deref() {
        next.address = validate_address(address)?;
    }
    if let Some(total) = patch.total_steps {
        next.total_steps = validate_total_steps(total)?;
    }
    if let Some(date) = patch.scheduled_date {
        next.scheduled_date = date;
    }
    if let Some(start) = patch.start_time {
        next.start_time = start;
    }
    if let Some(end) = patch.end_time {
        next.end_time = end;
    }
    if patch.start_time.is_some() || patch.end_time.is_some() {
        validate_window(next.start_time, next.end_time)?;
    }
    if let Some(notes) = patch.notes.as_deref() {
        next.notes = normalize_notes(notes);
    }

    match patch.current_step {
        Some(step) => next.current_step = validate_current_step(step, next.total_steps)?,
        None if next.current_step > next.total_steps => {
            return Err(SchedulingError::validation(
                "total_steps",
                format!(
                    "cannot be lower than the current step ({})",
                    next.current_step
                ),
            ));
        }
        None => {}
    }

    let progress_moved =
        next.current_step != current.current_step || next.total_steps != current.total_steps;

    match patch.status {
        Some(CleaningStatus::Completed) => {
            next.status = CleaningStatus::Completed;
            next.current_step = next.total_steps;
        }
        Some(status) => next.status = status,
        None if progress_moved => {
            next.status = derive_status(current.status, next.current_step, next.total_steps);
        }
        None => {}
    }

    next.updated_at = now;

    Ok(MutationPlan {
        cleaning: next,
        cleaner_ids: patch.cleaner_ids.as_deref().map(dedupe_cleaner_ids),
        ignored_fields: Vec::new(),
    })
}

fn apply_cleaner(
    current: &Cleaning,
    patch: &CleaningPatch,
    now: DateTime<Utc>,
) -> Result<MutationPlan, SchedulingError> {
    let mut ignored_fields = admin_only_fields(patch);

    let touches_progress = patch.current_step.is_some() || patch.status.is_some();
    if touches_progress && current.status == CleaningStatus::Cancelled {
        return Err(SchedulingError::validation(
            "status",
            "cleaning has been cancelled",
        ));
    }

    let mut next = current.clone();

    if let Some(raw) = patch.current_step {
        let step = validate_current_step(raw, current.total_steps)?;
        // Re-sending the stored step must not move the status.
        if step != current.current_step {
            next.current_step = step;
            next.status = derive_status(current.status, step, current.total_steps);
        }
    }

    match patch.status {
        Some(CleaningStatus::Completed) => {
            if next.current_step != next.total_steps {
                return Err(SchedulingError::validation(
                    "status",
                    format!(
                        "cannot mark completed: steps are incomplete ({})",
                        next.progress_label()
                    ),
                ));
            }
            next.status = CleaningStatus::Completed;
        }
        Some(CleaningStatus::InProgress) => next.status = CleaningStatus::InProgress,
        Some(CleaningStatus::Pending | CleaningStatus::Cancelled) => {
            ignored_fields.push("status");
        }
        None => {}
    }

    next.updated_at = now;

    Ok(MutationPlan {
        cleaning: next,
        cleaner_ids: None,
        ignored_fields,
    })
}

fn admin_only_fields(patch: &CleaningPatch) -> Vec<&'static str> {
    [
        ("client_id", patch.client_id.is_some()),
        ("address", patch.address.is_some()),
        ("total_steps", patch.total_steps.is_some()),
        ("scheduled_date", patch.scheduled_date.is_some()),
        ("start_time", patch.start_time.is_some()),
        ("end_time", patch.end_time.is_some()),
        ("notes", patch.notes.is_some()),
        ("cleaner_ids", patch.cleaner_ids.is_some()),
    ]
    .into_iter()
    .filter_map(|(field, present)| present.then_some(field))
    .collect()
}
