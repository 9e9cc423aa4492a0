use anyhow::{Result, anyhow};
use rusqlite::{Connection, Row};

use super::OptionalExt;
use crate::models::{SettingsRow, SettingsUpdate};
use crate::{Database, now};

impl Database {
    pub fn get_settings(&self, user_id: i64) -> Result<Option<SettingsRow>> {
        self.with_conn(|conn| query_settings(conn, user_id))
    }

    /// Settings rows are created lazily, on first access.
    pub fn get_or_create_settings(&self, user_id: i64) -> Result<SettingsRow> {
        self.with_conn(|conn| {
            let ts = now();
            conn.execute(
                "INSERT OR IGNORE INTO user_settings (user_id, created_at, updated_at) VALUES (?1, ?2, ?2)",
                (user_id, &ts),
            )?;
            query_settings(conn, user_id)?
                .ok_or_else(|| anyhow!("Settings for user {} vanished after insert", user_id))
        })
    }

    /// Blank AI fields are stored as NULL.
    pub fn update_settings(&self, user_id: i64, update: &SettingsUpdate<'_>) -> Result<()> {
        fn blank_to_null(s: &str) -> Option<&str> {
            Some(s.trim()).filter(|s| !s.is_empty())
        }

        self.with_conn(|conn| {
            conn.execute(
                "UPDATE user_settings
                 SET nickname = COALESCE(?1, nickname),
                     openai_api_key = ?2,
                     openai_base_url = ?3,
                     openai_model = ?4,
                     updated_at = ?5
                 WHERE user_id = ?6",
                (
                    update.nickname,
                    blank_to_null(update.openai_api_key),
                    blank_to_null(update.openai_base_url),
                    blank_to_null(update.openai_model),
                    now(),
                    user_id,
                ),
            )?;
            Ok(())
        })
    }
}

fn query_settings(conn: &Connection, user_id: i64) -> Result<Option<SettingsRow>> {
    conn.query_row(
        "SELECT user_id, nickname, openai_api_key, openai_base_url, openai_model, updated_at
         FROM user_settings WHERE user_id = ?1",
        [user_id],
        settings_from_row,
    )
    .optional()
}

fn settings_from_row(row: &Row<'_>) -> rusqlite::Result<SettingsRow> {
    Ok(SettingsRow {
        user_id: row.get(0)?,
        nickname: row.get(1)?,
        openai_api_key: row.get(2)?,
        openai_base_url: row.get(3)?,
        openai_model: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::fixtures;

    #[test]
    fn created_lazily_once() {
        let db = Database::open_in_memory().unwrap();
        let uid = fixtures::user(&db, "alice");
        assert!(db.get_settings(uid).unwrap().is_none());

        let first = db.get_or_create_settings(uid).unwrap();
        assert!(first.openai_api_key.is_none());
        db.get_or_create_settings(uid).unwrap();

        let rows: i64 = db
            .with_conn(|c| Ok(c.query_row("SELECT COUNT(*) FROM user_settings", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn update_keeps_nickname_unless_given() {
        let db = Database::open_in_memory().unwrap();
        let uid = fixtures::user(&db, "alice");
        db.get_or_create_settings(uid).unwrap();

        let mut update = SettingsUpdate {
            nickname: Some("Al"),
            openai_api_key: "sk-1",
            openai_base_url: "",
            openai_model: "m",
        };
        db.update_settings(uid, &update).unwrap();
        update.nickname = None;
        update.openai_api_key = " ";
        db.update_settings(uid, &update).unwrap();

        let s = db.get_settings(uid).unwrap().unwrap();
        assert_eq!(s.nickname.as_deref(), Some("Al"));
        assert_eq!(s.openai_api_key, None);
        assert_eq!(s.openai_base_url, None);
        assert_eq!(s.openai_model.as_deref(), Some("m"));
    }
}
