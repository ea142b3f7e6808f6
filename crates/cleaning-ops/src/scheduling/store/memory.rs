use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{CleaningQuery, CleaningStore, HouseStore, ProfileStore, StoreError};
use crate::scheduling::domain::{
    Assignment, Cleaning, CleaningId, CleaningRecord, House, HouseId, Profile, ProfileId, Role,
};
use crate::scheduling::feed::{ChangeEvent, ChangeFeed};

#[derive(Default)]
struct Tables {
    profiles: HashMap<ProfileId, Profile>,
    houses: HashMap<HouseId, House>,
    cleanings: HashMap<CleaningId, Cleaning>,
    assignments: Vec<Assignment>,
}

impl Tables {
    fn record(&self, cleaning: &Cleaning) -> CleaningRecord {
        let mut cleaners: Vec<Assignment> = self
            .assignments
            .iter()
            .filter(|assignment| assignment.cleaning_id == cleaning.id)
            .cloned()
            .collect();
        cleaners.sort_by(|a, b| {
            a.assigned_at
                .cmp(&b.assigned_at)
                .then(a.cleaner_id.cmp(&b.cleaner_id))
        });
        CleaningRecord {
            cleaning: cleaning.clone(),
            cleaners,
        }
    }

    fn record_by_id(&self, id: CleaningId) -> Option<CleaningRecord> {
        self.cleanings.get(&id).map(|cleaning| self.record(cleaning))
    }

    fn remove_cleaning(&mut self, id: CleaningId) -> Option<CleaningRecord> {
        let previous = self.record_by_id(id)?;
        self.cleanings.remove(&id);
        self.assignments
            .retain(|assignment| assignment.cleaning_id != id);
        Some(previous)
    }
}

/// Process-local store that behaves like the hosted relational store:
/// cascading deletes, atomic multi-row writes and a change event per
/// committed cleaning write.
#[derive(Clone)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
    feed: ChangeFeed,
}

impl InMemoryStore {
    pub fn new(feed: ChangeFeed) -> Self {
        Self {
            tables: Arc::new(Mutex::new(Tables::default())),
            feed,
        }
    }

    /// Raw assignment rows for one cleaning, as stored.
    pub fn assignment_rows(&self, cleaning_id: CleaningId) -> Vec<Assignment> {
        self.lock()
            .assignments
            .iter()
            .filter(|assignment| assignment.cleaning_id == cleaning_id)
            .cloned()
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().expect("store mutex poisoned")
    }

    /// Drop every assignment row naming `cleaner_id`, publishing one update
    /// per affected cleaning.
    fn unassign_cleaner(&self, tables: &mut Tables, cleaner_id: ProfileId) {
        let mut touched: Vec<CleaningId> = tables
            .assignments
            .iter()
            .filter(|assignment| assignment.cleaner_id == cleaner_id)
            .map(|assignment| assignment.cleaning_id)
            .collect();
        touched.sort();
        touched.dedup();
        for cleaning_id in touched {
            let Some(previous) = tables.record_by_id(cleaning_id) else {
                continue;
            };
            tables.assignments.retain(|assignment| {
                !(assignment.cleaning_id == cleaning_id && assignment.cleaner_id == cleaner_id)
            });
            if let Some(record) = tables.record_by_id(cleaning_id) {
                self.feed.publish(ChangeEvent::Update { previous, record });
            }
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(ChangeFeed::default())
    }
}

impl ProfileStore for InMemoryStore {
    fn insert_profile(&self, profile: Profile) -> Result<Profile, StoreError> {
        let mut tables = self.lock();
        let duplicate_email = tables
            .profiles
            .values()
            .any(|existing| existing.email.eq_ignore_ascii_case(&profile.email));
        if tables.profiles.contains_key(&profile.id) || duplicate_email {
            return Err(StoreError::Duplicate);
        }
        tables.profiles.insert(profile.id, profile.clone());
        Ok(profile)
    }

    fn fetch_profile(&self, id: ProfileId) -> Result<Option<Profile>, StoreError> {
        Ok(self.lock().profiles.get(&id).cloned())
    }

    fn list_profiles(&self) -> Result<Vec<Profile>, StoreError> {
        let mut profiles: Vec<Profile> = self.lock().profiles.values().cloned().collect();
        profiles.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(profiles)
    }

    fn update_profile_role(&self, id: ProfileId, role: Role) -> Result<Profile, StoreError> {
        let mut tables = self.lock();
        let profile = tables.profiles.get_mut(&id).ok_or(StoreError::NotFound)?;
        let was_cleaner = profile.role == Role::Cleaner;
        profile.role = role;
        let profile = profile.clone();

        if was_cleaner && role != Role::Cleaner {
            self.unassign_cleaner(&mut tables, id);
        }
        Ok(profile)
    }

    fn delete_profile(&self, id: ProfileId) -> Result<Profile, StoreError> {
        let mut tables = self.lock();
        let profile = tables.profiles.remove(&id).ok_or(StoreError::NotFound)?;

        tables.houses.retain(|_, house| house.client_id != id);

        let owned: Vec<CleaningId> = tables
            .cleanings
            .values()
            .filter(|cleaning| cleaning.client_id == id)
            .map(|cleaning| cleaning.id)
            .collect();
        for cleaning_id in owned {
            if let Some(previous) = tables.remove_cleaning(cleaning_id) {
                self.feed.publish(ChangeEvent::Delete { previous });
            }
        }

        self.unassign_cleaner(&mut tables, id);

        Ok(profile)
    }
}

impl HouseStore for InMemoryStore {
    fn insert_house(&self, house: House) -> Result<House, StoreError> {
        let mut tables = self.lock();
        if tables.houses.contains_key(&house.id) {
            return Err(StoreError::Duplicate);
        }
        tables.houses.insert(house.id, house.clone());
        Ok(house)
    }

    fn fetch_house(&self, id: HouseId) -> Result<Option<House>, StoreError> {
        Ok(self.lock().houses.get(&id).cloned())
    }

    fn list_houses(&self, client_id: Option<ProfileId>) -> Result<Vec<House>, StoreError> {
        let tables = self.lock();
        let mut houses: Vec<House> = tables
            .houses
            .values()
            .filter(|house| client_id.map_or(true, |id| house.client_id == id))
            .cloned()
            .collect();
        houses.sort_by(|a, b| a.address.cmp(&b.address).then(a.id.cmp(&b.id)));
        Ok(houses)
    }

    fn update_house(&self, house: House) -> Result<House, StoreError> {
        let mut tables = self.lock();
        let slot = tables.houses.get_mut(&house.id).ok_or(StoreError::NotFound)?;
        *slot = house.clone();
        Ok(house)
    }

    fn delete_house(&self, id: HouseId) -> Result<House, StoreError> {
        let mut tables = self.lock();
        let house = tables.houses.remove(&id).ok_or(StoreError::NotFound)?;

        let dependents: Vec<CleaningId> = tables
            .cleanings
            .values()
            .filter(|cleaning| cleaning.house_id == Some(id))
            .map(|cleaning| cleaning.id)
            .collect();
        for cleaning_id in dependents {
            if let Some(previous) = tables.remove_cleaning(cleaning_id) {
                self.feed.publish(ChangeEvent::Delete { previous });
            }
        }

        Ok(house)
    }
}

impl CleaningStore for InMemoryStore {
    fn insert_cleaning(
        &self,
        cleaning: Cleaning,
        assignments: Vec<Assignment>,
    ) -> Result<CleaningRecord, StoreError> {
        let mut tables = self.lock();
        if tables.cleanings.contains_key(&cleaning.id) {
            return Err(StoreError::Duplicate);
        }
        if assignments
            .iter()
            .any(|assignment| assignment.cleaning_id != cleaning.id)
        {
            return Err(StoreError::Unavailable(
                "assignment rows reference a different cleaning".to_string(),
            ));
        }

        tables.cleanings.insert(cleaning.id, cleaning.clone());
        tables.assignments.extend(assignments);

        let record = tables.record(&cleaning);
        self.feed.publish(ChangeEvent::Insert {
            record: record.clone(),
        });
        Ok(record)
    }

    fn fetch_cleaning(&self, id: CleaningId) -> Result<Option<CleaningRecord>, StoreError> {
        Ok(self.lock().record_by_id(id))
    }

    fn list_cleanings(&self, query: &CleaningQuery) -> Result<Vec<CleaningRecord>, StoreError> {
        let tables = self.lock();
        let mut records: Vec<CleaningRecord> = tables
            .cleanings
            .values()
            .map(|cleaning| tables.record(cleaning))
            .filter(|record| query.matches(record))
            .collect();
        records.sort_by(|a, b| {
            (a.cleaning.scheduled_date, a.cleaning.start_time, a.cleaning.id).cmp(&(
                b.cleaning.scheduled_date,
                b.cleaning.start_time,
                b.cleaning.id,
            ))
        });
        Ok(records)
    }

    fn update_cleaning(
        &self,
        mut cleaning: Cleaning,
        expected_version: u64,
        assignments: Option<Vec<Assignment>>,
    ) -> Result<CleaningRecord, StoreError> {
        let mut tables = self.lock();
        let previous = tables
            .record_by_id(cleaning.id)
            .ok_or(StoreError::NotFound)?;

        let actual = previous.cleaning.version;
        if actual != expected_version {
            return Err(StoreError::Conflict {
                expected: expected_version,
                actual,
            });
        }

        let id = cleaning.id;
        cleaning.version = actual + 1;
        tables.cleanings.insert(id, cleaning);

        if let Some(rows) = assignments {
            tables
                .assignments
                .retain(|assignment| assignment.cleaning_id != id);
            tables.assignments.extend(rows);
        }

        let record = tables.record_by_id(id).ok_or(StoreError::NotFound)?;
        self.feed.publish(ChangeEvent::Update {
            previous,
            record: record.clone(),
        });
        Ok(record)
    }

    fn delete_cleaning(&self, id: CleaningId) -> Result<CleaningRecord, StoreError> {
        let mut tables = self.lock();
        let previous = tables.remove_cleaning(id).ok_or(StoreError::NotFound)?;
        self.feed.publish(ChangeEvent::Delete {
            previous: previous.clone(),
        });
        Ok(previous)
    }

    fn is_assigned(
        &self,
        cleaning_id: CleaningId,
        cleaner_id: ProfileId,
    ) -> Result<bool, StoreError> {
        Ok(self.lock().assignments.iter().any(|assignment| {
            assignment.cleaning_id == cleaning_id && assignment.cleaner_id == cleaner_id
        }))
    }
}
