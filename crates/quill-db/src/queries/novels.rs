use anyhow::Result;
use rusqlite::{Connection, Row};

use super::{OptionalExt, parse_status};
use crate::models::{NovelRow, NovelUpdate};
use crate::{Database, now};

// JOIN users to fetch the author's username in the same query
const NOVEL_SELECT: &str = "SELECT n.id, n.title, n.description, n.cover_image, n.author_id,
        COALESCE(u.username, 'unknown'), n.status, n.created_at, n.updated_at
     FROM novels n
     LEFT JOIN users u ON n.author_id = u.id";

impl Database {
    pub fn create_novel(
        &self,
        author_id: i64,
        title: &str,
        description: &str,
        cover_image: &str,
    ) -> Result<NovelRow> {
        self.with_conn(|conn| {
            let ts = now();
            conn.execute(
                "INSERT INTO novels (title, description, cover_image, author_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                (title, description, cover_image, author_id, &ts),
            )?;
            let id = conn.last_insert_rowid();
            query_novel(conn, id)?.ok_or_else(|| anyhow::anyhow!("Novel {} vanished after insert", id))
        })
    }

    pub fn get_novel(&self, id: i64) -> Result<Option<NovelRow>> {
        self.with_conn(|conn| query_novel(conn, id))
    }

    /// Most recently updated first.
    pub fn list_recent_novels(&self, limit: u32) -> Result<Vec<NovelRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{NOVEL_SELECT} ORDER BY n.updated_at DESC, n.id DESC LIMIT ?1"
            ))?;
            let rows = stmt
                .query_map([limit], novel_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn list_novels_by_author(&self, author_id: i64) -> Result<Vec<NovelRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{NOVEL_SELECT} WHERE n.author_id = ?1 ORDER BY n.updated_at DESC, n.id DESC"
            ))?;
            let rows = stmt
                .query_map([author_id], novel_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn list_novels(&self) -> Result<Vec<NovelRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{NOVEL_SELECT} ORDER BY n.id"))?;
            let rows = stmt
                .query_map([], novel_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Update the editable fields and advance `updated_at`.
    pub fn update_novel(&self, id: i64, update: &NovelUpdate<'_>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE novels
                 SET title = ?1, description = ?2, status = ?3, cover_image = ?4, updated_at = ?5
                 WHERE id = ?6",
                (
                    update.title,
                    update.description,
                    update.status.as_str(),
                    update.cover_image,
                    now(),
                    id,
                ),
            )?;
            Ok(())
        })
    }

    /// Delete a novel together with its comments, drafts and chapters.
    /// Children go first; the whole sequence is one transaction.
    pub fn delete_novel(&self, id: i64) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM comments WHERE novel_id = ?1", [id])?;
            tx.execute("DELETE FROM drafts WHERE novel_id = ?1", [id])?;
            tx.execute("DELETE FROM chapters WHERE novel_id = ?1", [id])?;
            tx.execute("DELETE FROM novels WHERE id = ?1", [id])?;
            tx.commit()?;
            Ok(())
        })
    }

    /// Chapters across all novels, or only those of one author's novels.
    pub fn count_chapters(&self, author_id: Option<i64>) -> Result<usize> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM chapters c
                 JOIN novels n ON c.novel_id = n.id
                 WHERE ?1 IS NULL OR n.author_id = ?1",
                [author_id],
                |r| r.get(0),
            )?;
            Ok(n as usize)
        })
    }

    /// Comments across all novels, or only those on one author's novels.
    pub fn count_comments(&self, author_id: Option<i64>) -> Result<usize> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM comments c
                 JOIN novels n ON c.novel_id = n.id
                 WHERE ?1 IS NULL OR n.author_id = ?1",
                [author_id],
                |r| r.get(0),
            )?;
            Ok(n as usize)
        })
    }
}

pub(crate) fn query_novel(conn: &Connection, id: i64) -> Result<Option<NovelRow>> {
    conn.query_row(&format!("{NOVEL_SELECT} WHERE n.id = ?1"), [id], novel_from_row)
        .optional()
}

/// Advance a novel's `updated_at`; called whenever one of its chapters changes.
pub(crate) fn touch_novel(conn: &Connection, id: i64, ts: &str) -> Result<()> {
    conn.execute("UPDATE novels SET updated_at = ?1 WHERE id = ?2", (ts, id))?;
    Ok(())
}

fn novel_from_row(row: &Row<'_>) -> rusqlite::Result<NovelRow> {
    let id: i64 = row.get(0)?;
    Ok(NovelRow {
        id,
        title: row.get(1)?,
        description: row.get(2)?,
        cover_image: row.get(3)?,
        author_id: row.get(4)?,
        author_username: row.get(5)?,
        status: parse_status(row.get(6)?, id),
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}
