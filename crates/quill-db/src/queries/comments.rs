use anyhow::{Result, anyhow};
use rusqlite::Row;

use super::OptionalExt;
use crate::models::CommentRow;
use crate::{Database, now};

const COMMENT_SELECT: &str = "SELECT c.id, c.content, c.user_id, COALESCE(u.username, 'unknown'),
        c.novel_id, c.chapter_id, c.created_at
     FROM comments c
     LEFT JOIN users u ON c.user_id = u.id";

impl Database {
    /// Comments are append-only; there is no update or single-row delete.
    pub fn create_comment(
        &self,
        novel_id: i64,
        user_id: i64,
        content: &str,
        chapter_id: Option<i64>,
    ) -> Result<CommentRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO comments (content, user_id, novel_id, chapter_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                (content, user_id, novel_id, chapter_id, now()),
            )?;
            let id = conn.last_insert_rowid();
            conn.query_row(&format!("{COMMENT_SELECT} WHERE c.id = ?1"), [id], comment_from_row)
                .optional()?
                .ok_or_else(|| anyhow!("Comment {} vanished after insert", id))
        })
    }

    /// Newest first.
    pub fn list_recent_comments(&self, novel_id: i64, limit: u32) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{COMMENT_SELECT} WHERE c.novel_id = ?1 ORDER BY c.created_at DESC, c.id DESC LIMIT ?2"
            ))?;
            let rows = stmt
                .query_map(rusqlite::params![novel_id, limit], comment_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<CommentRow> {
    Ok(CommentRow {
        id: row.get(0)?,
        content: row.get(1)?,
        user_id: row.get(2)?,
        username: row.get(3)?,
        novel_id: row.get(4)?,
        chapter_id: row.get(5)?,
        created_at: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::fixtures;

    #[test]
    fn recent_comments_newest_first_and_limited() {
        let db = Database::open_in_memory().unwrap();
        let uid = fixtures::user(&db, "alice");
        let nid = fixtures::novel(&db, uid);
        for i in 0..12 {
            db.create_comment(nid, uid, &format!("c{i}"), None).unwrap();
        }

        let comments = db.list_recent_comments(nid, 10).unwrap();
        assert_eq!(comments.len(), 10);
        assert_eq!(comments[0].content, "c11");
        assert_eq!(comments[0].username, "alice");
        assert_eq!(comments[9].content, "c2");
    }

    #[test]
    fn comment_on_missing_novel_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let uid = fixtures::user(&db, "alice");
        assert!(db.create_comment(404, uid, "hello", None).is_err());
    }
}
