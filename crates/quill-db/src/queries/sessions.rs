use anyhow::Result;

use super::OptionalExt;
use super::users::user_from_row;
use crate::models::UserRow;
use crate::{Database, now};

impl Database {
    pub fn create_session(&self, id: &str, user_id: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sessions (id, user_id, created_at) VALUES (?1, ?2, ?3)",
                (id, user_id, now()),
            )?;
            Ok(())
        })
    }

    /// Resolve a session id to its user, reading the role as it is now.
    pub fn get_session_user(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT u.id, u.username, u.email, u.password, u.role, u.created_at
                 FROM sessions s
                 JOIN users u ON s.user_id = u.id
                 WHERE s.id = ?1",
                [id],
                user_from_row,
            )
            .optional()
        })
    }

    pub fn delete_session(&self, id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM sessions WHERE id = ?1", [id])?;
            Ok(())
        })
    }
}
