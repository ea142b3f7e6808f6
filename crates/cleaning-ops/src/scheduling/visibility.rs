use super::auth::Caller;
use super::domain::{CleaningRecord, ProfileId, Role};

/// Who is looking at cleaning data, reduced to what decides visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer {
    Admin,
    Cleaner(ProfileId),
    Client(ProfileId),
}

impl Viewer {
    pub fn for_caller(caller: &Caller) -> Self {
        match caller.role {
            Role::Admin => Viewer::Admin,
            Role::Cleaner => Viewer::Cleaner(caller.id),
            Role::Client => Viewer::Client(caller.id),
        }
    }

    /// Cleaners are matched against the record's live assignment set, so
    /// (un)assignment takes effect on the next event that carries the row.
    pub fn can_see(&self, record: &CleaningRecord) -> bool {
        match self {
            Viewer::Admin => true,
            Viewer::Client(id) => record.cleaning.client_id == *id,
            Viewer::Cleaner(id) => record.is_assigned(*id),
        }
    }
}
