use chrono::{DateTime, Utc};

use super::domain::{House, HouseId, HousePatch, NewHouse};
use super::error::SchedulingError;

pub const MIN_SECTORS: i64 = 1;
pub const MAX_SECTORS: i64 = 20;

fn validate_sectors(raw: i64) -> Result<u32, SchedulingError> {
    if (MIN_SECTORS..=MAX_SECTORS).contains(&raw) {
        Ok(raw as u32)
    } else {
        Err(SchedulingError::validation(
            "sectors_count",
            format!("must be between {MIN_SECTORS} and {MAX_SECTORS} (got {raw})"),
        ))
    }
}

pub(super) fn validate_address(raw: &str) -> Result<String, SchedulingError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(SchedulingError::validation("address", "must not be empty"));
    }
    Ok(trimmed.to_string())
}

pub(super) fn normalize_notes(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

pub fn draft_house(request: &NewHouse, now: DateTime<Utc>) -> Result<House, SchedulingError> {
    let client_id = request
        .client_id
        .ok_or_else(|| SchedulingError::validation("client_id", "is required"))?;
    let address = request
        .address
        .as_deref()
        .ok_or_else(|| SchedulingError::validation("address", "is required"))
        .and_then(validate_address)?;
    let sectors_count = request
        .sectors_count
        .ok_or_else(|| SchedulingError::validation("sectors_count", "is required"))
        .and_then(validate_sectors)?;

    Ok(House {
        id: HouseId::new(),
        client_id,
        address,
        sectors_count,
        notes: request.notes.as_deref().and_then(normalize_notes),
        created_at: now,
        updated_at: now,
    })
}

pub fn apply_house_patch(
    current: &House,
    patch: &HousePatch,
    now: DateTime<Utc>,
) -> Result<House, SchedulingError> {
    let mut next = current.clone();
    if let Some(client_id) = patch.client_id {
        next.client_id = client_id;
    }
    if let Some(address) = patch.address.as_deref() {
        next.address = validate_address(address)?;
    }
    if let Some(sectors) = patch.sectors_count {
        next.sectors_count = validate_sectors(sectors)?;
    }
    if let Some(notes) = patch.notes.as_deref() {
        next.notes = normalize_notes(notes);
    }
    next.updated_at = now;
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduling::domain::ProfileId;

    #[test]
    fn draft_requires_bounded_sectors() {
        let request = NewHouse {
            client_id: Some(ProfileId::new()),
            address: Some("12 Elm Street".to_string()),
            sectors_count: Some(21),
            notes: None,
        };
        match draft_house(&request, Utc::now()) {
            Err(SchedulingError::Validation { field, .. }) => assert_eq!(field, "sectors_count"),
            other => panic!("expected sectors validation error, got {other:?}"),
        }

        let request = NewHouse {
            sectors_count: Some(4),
            notes: Some("  ".to_string()),
            ..request
        };
        let house = draft_house(&request, Utc::now()).expect("house drafts");
        assert_eq!(house.sectors_count, 4);
        assert_eq!(house.notes, None);
    }

    #[test]
    fn draft_names_missing_fields() {
        let request = NewHouse {
            client_id: Some(ProfileId::new()),
            ..NewHouse::default()
        };
        match draft_house(&request, Utc::now()) {
            Err(SchedulingError::Validation { field, .. }) => assert_eq!(field, "address"),
            other => panic!("expected address validation error, got {other:?}"),
        }
    }

    #[test]
    fn patch_rejects_zero_sectors() {
        let request = NewHouse {
            client_id: Some(ProfileId::new()),
            address: Some("12 Elm Street".to_string()),
            sectors_count: Some(3),
            notes: None,
        };
        let house = draft_house(&request, Utc::now()).expect("house drafts");
        let patch = HousePatch {
            sectors_count: Some(0),
            ..HousePatch::default()
        };
        assert!(apply_house_patch(&house, &patch, Utc::now()).is_err());
    }
}
