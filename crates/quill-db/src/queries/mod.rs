mod chapters;
mod comments;
mod drafts;
mod novels;
mod sessions;
mod settings;
mod users;

use anyhow::Result;
use quill_types::models::{NovelStatus, Role};
use rusqlite::ErrorCode;
use tracing::warn;

use crate::Conflict;

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Turn a uniqueness violation into a typed [`Conflict`] so callers can tell it
/// apart from storage faults.
pub(crate) fn map_conflict(err: rusqlite::Error, what: &'static str) -> anyhow::Error {
    match err {
        rusqlite::Error::SqliteFailure(ref e, _) if e.code == ErrorCode::ConstraintViolation => {
            Conflict(what).into()
        }
        other => other.into(),
    }
}

pub(crate) fn parse_role(raw: String, user_id: i64) -> Role {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt role on user {}: {}", user_id, e);
        Role::Reader
    })
}

pub(crate) fn parse_status(raw: String, novel_id: i64) -> NovelStatus {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt status on novel {}: {}", novel_id, e);
        NovelStatus::Ongoing
    })
}
