use anyhow::{Result, anyhow};
use rusqlite::{Connection, Row};

use super::OptionalExt;
use super::chapters::{insert_next_chapter, query_chapter};
use super::novels::touch_novel;
use crate::models::{ChapterDraft, ChapterRow, DraftRow};
use crate::{Conflict, Database, now};

const DRAFT_COLUMNS: &str =
    "id, title, content, novel_id, user_id, is_published, chapter_number, created_at, updated_at";

impl Database {
    pub fn create_draft(&self, novel_id: i64, user_id: i64, title: &str) -> Result<DraftRow> {
        self.with_conn(|conn| {
            let ts = now();
            conn.execute(
                "INSERT INTO drafts (title, content, novel_id, user_id, created_at, updated_at)
                 VALUES (?1, '', ?2, ?3, ?4, ?4)",
                (title, novel_id, user_id, &ts),
            )?;
            let id = conn.last_insert_rowid();
            query_draft(conn, id)?.ok_or_else(|| anyhow!("Draft {} vanished after insert", id))
        })
    }

    pub fn get_draft(&self, id: i64) -> Result<Option<DraftRow>> {
        self.with_conn(|conn| query_draft(conn, id))
    }

    /// One author's drafts for a novel, most recently touched first.
    pub fn list_drafts(&self, novel_id: i64, user_id: i64) -> Result<Vec<DraftRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {DRAFT_COLUMNS} FROM drafts
                 WHERE novel_id = ?1 AND user_id = ?2
                 ORDER BY updated_at DESC, id DESC"
            ))?;
            let rows = stmt
                .query_map([novel_id, user_id], draft_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Partial update; `None` keeps the stored value. Returns the new `updated_at`.
    pub fn update_draft(
        &self,
        id: i64,
        title: Option<&str>,
        content: Option<&str>,
    ) -> Result<String> {
        self.with_conn(|conn| {
            let ts = now();
            conn.execute(
                "UPDATE drafts
                 SET title = COALESCE(?1, title), content = COALESCE(?2, content), updated_at = ?3
                 WHERE id = ?4",
                (title, content, &ts, id),
            )?;
            Ok(ts)
        })
    }

    /// Turn a draft into the next chapter of its novel.
    ///
    /// Allocates the number exactly as [`Database::create_chapter`] does, marks
    /// the draft published with that number, and advances the novel's
    /// `updated_at`, all in one transaction. The draft row is kept. Publishing
    /// an already-published draft fails with [`Conflict`].
    pub fn publish_draft(&self, id: i64) -> Result<ChapterRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let draft = query_draft(&tx, id)?.ok_or_else(|| anyhow!("Draft not found: {}", id))?;
            if draft.is_published {
                return Err(Conflict("published chapter for this draft").into());
            }

            let ts = now();
            let chapter = ChapterDraft {
                title: &draft.title,
                content: &draft.content,
                author_note: "",
            };
            let chapter_id = insert_next_chapter(&tx, draft.novel_id, &chapter, &ts)?;
            let row = query_chapter(&tx, chapter_id)?
                .ok_or_else(|| anyhow!("Chapter {} vanished after insert", chapter_id))?;

            tx.execute(
                "UPDATE drafts SET is_published = 1, chapter_number = ?1, updated_at = ?2 WHERE id = ?3",
                (row.chapter_number, &ts, id),
            )?;
            touch_novel(&tx, draft.novel_id, &ts)?;
            tx.commit()?;
            Ok(row)
        })
    }

    pub fn delete_draft(&self, id: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM drafts WHERE id = ?1", [id])?;
            Ok(())
        })
    }
}

fn query_draft(conn: &Connection, id: i64) -> Result<Option<DraftRow>> {
    conn.query_row(
        &format!("SELECT {DRAFT_COLUMNS} FROM drafts WHERE id = ?1"),
        [id],
        draft_from_row,
    )
    .optional()
}

fn draft_from_row(row: &Row<'_>) -> rusqlite::Result<DraftRow> {
    Ok(DraftRow {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        novel_id: row.get(3)?,
        user_id: row.get(4)?,
        is_published: row.get(5)?,
        chapter_number: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}
