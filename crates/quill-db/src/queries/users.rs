use anyhow::Result;
use quill_types::models::Role;
use rusqlite::{Connection, Row};

use super::{OptionalExt, map_conflict, parse_role};
use crate::models::UserRow;
use crate::{Database, now};

const USER_COLUMNS: &str = "id, username, email, password, role, created_at";

impl Database {
    /// Insert a user. A taken username or email surfaces as [`crate::Conflict`].
    pub fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (username, email, password, role, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                (username, email, password_hash, role.as_str(), now()),
            )
            .map_err(|e| map_conflict(e, "username or email"))?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username", &username))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", &email))
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", &id))
    }

    pub fn list_users(&self) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))?;
            let rows = stmt
                .query_map([], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn count_users(&self) -> Result<usize> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?;
            Ok(n as usize)
        })
    }

    pub fn has_user_with_role(&self, role: Role) -> Result<bool> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM users WHERE role = ?1",
                [role.as_str()],
                |r| r.get(0),
            )?;
            Ok(n > 0)
        })
    }

    /// Returns false when no such user exists.
    pub fn update_user_role(&self, id: i64, role: Role) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET role = ?1 WHERE id = ?2",
                (role.as_str(), id),
            )?;
            Ok(changed > 0)
        })
    }

    pub fn update_password(&self, id: i64, password_hash: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET password = ?1 WHERE id = ?2",
                (password_hash, id),
            )?;
            Ok(())
        })
    }
}

fn query_user(
    conn: &Connection,
    column: &str,
    value: &dyn rusqlite::types::ToSql,
) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1"))?;
    stmt.query_row([value], user_from_row).optional()
}

pub(crate) fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    let id: i64 = row.get(0)?;
    Ok(UserRow {
        id,
        username: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        role: parse_role(row.get(4)?, id),
        created_at: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Conflict;

    #[test]
    fn duplicate_username_or_email_is_a_conflict() {
        let db = Database::open_in_memory().unwrap();
        db.create_user("alice", "a@x.com", "h", Role::Reader).unwrap();

        let err = db.create_user("alice", "other@x.com", "h", Role::Reader).unwrap_err();
        assert!(err.downcast_ref::<Conflict>().is_some());
        let err = db.create_user("alicia", "a@x.com", "h", Role::Reader).unwrap_err();
        assert!(err.downcast_ref::<Conflict>().is_some());

        assert_eq!(db.count_users().unwrap(), 1);
    }

    #[test]
    fn lookup_and_role_update() {
        let db = Database::open_in_memory().unwrap();
        let id = db.create_user("bob", "b@x.com", "h", Role::Reader).unwrap();

        let user = db.get_user_by_username("bob").unwrap().unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.role, Role::Reader);
        assert!(db.get_user_by_email("b@x.com").unwrap().is_some());
        assert!(db.get_user_by_id(id + 1).unwrap().is_none());

        assert!(db.update_user_role(id, Role::Admin).unwrap());
        assert_eq!(db.get_user_by_id(id).unwrap().unwrap().role, Role::Admin);
        assert!(!db.update_user_role(id + 1, Role::Admin).unwrap());
        assert!(!db.has_user_with_role(Role::SuperAdmin).unwrap());
    }
}
