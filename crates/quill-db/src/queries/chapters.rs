use anyhow::{Result, anyhow};
use rusqlite::{Connection, Row};

use super::novels::touch_novel;
use super::{OptionalExt, map_conflict};
use crate::models::{ChapterDraft, ChapterRow};
use crate::{Database, now};

const CHAPTER_COLUMNS: &str =
    "id, novel_id, title, content, author_note, chapter_number, created_at, updated_at";

impl Database {
    /// Append a chapter to a novel under the next free chapter number and
    /// advance the novel's `updated_at`.
    pub fn create_chapter(&self, novel_id: i64, chapter: &ChapterDraft<'_>) -> Result<ChapterRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let ts = now();
            let id = insert_next_chapter(&tx, novel_id, chapter, &ts)?;
            touch_novel(&tx, novel_id, &ts)?;
            let row = query_chapter(&tx, id)?.ok_or_else(|| anyhow!("Chapter {} vanished after insert", id))?;
            tx.commit()?;
            Ok(row)
        })
    }

    pub fn get_chapter(&self, id: i64) -> Result<Option<ChapterRow>> {
        self.with_conn(|conn| query_chapter(conn, id))
    }

    pub fn get_chapter_by_number(&self, novel_id: i64, number: i64) -> Result<Option<ChapterRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!(
                    "SELECT {CHAPTER_COLUMNS} FROM chapters WHERE novel_id = ?1 AND chapter_number = ?2"
                ),
                [novel_id, number],
                chapter_from_row,
            )
            .optional()
        })
    }

    /// Chapters of a novel in reading order.
    pub fn list_chapters(&self, novel_id: i64) -> Result<Vec<ChapterRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CHAPTER_COLUMNS} FROM chapters WHERE novel_id = ?1 ORDER BY chapter_number"
            ))?;
            let rows = stmt
                .query_map([novel_id], chapter_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_chapter(&self, id: i64, chapter: &ChapterDraft<'_>) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let ts = now();
            let novel_id: i64 =
                tx.query_row("SELECT novel_id FROM chapters WHERE id = ?1", [id], |r| r.get(0))?;
            tx.execute(
                "UPDATE chapters SET title = ?1, content = ?2, author_note = ?3, updated_at = ?4
                 WHERE id = ?5",
                (chapter.title, chapter.content, chapter.author_note, &ts, id),
            )?;
            touch_novel(&tx, novel_id, &ts)?;
            tx.commit()?;
            Ok(())
        })
    }

    /// Remove one chapter. Remaining chapters keep their numbers.
    pub fn delete_chapter(&self, id: i64) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let novel_id: i64 =
                tx.query_row("SELECT novel_id FROM chapters WHERE id = ?1", [id], |r| r.get(0))?;
            tx.execute("DELETE FROM chapters WHERE id = ?1", [id])?;
            touch_novel(&tx, novel_id, &now())?;
            tx.commit()?;
            Ok(())
        })
    }
}

/// Reserve the next chapter number for a novel.
///
/// The novel keeps a high-water mark, so a number is never handed out twice
/// even after the highest chapter is deleted. Must run inside the caller's
/// transaction together with the insert that uses the number.
pub(crate) fn allocate_chapter_number(conn: &Connection, novel_id: i64) -> Result<i64> {
    let changed = conn.execute(
        "UPDATE novels
         SET last_chapter_number = MAX(
             last_chapter_number,
             COALESCE((SELECT MAX(chapter_number) FROM chapters WHERE novel_id = ?1), 0)
         ) + 1
         WHERE id = ?1",
        [novel_id],
    )?;
    if changed == 0 {
        return Err(anyhow!("Novel not found: {}", novel_id));
    }

    let number = conn.query_row(
        "SELECT last_chapter_number FROM novels WHERE id = ?1",
        [novel_id],
        |r| r.get(0),
    )?;
    Ok(number)
}

/// Allocate a number and insert the chapter under it. Returns the new row id.
pub(crate) fn insert_next_chapter(
    conn: &Connection,
    novel_id: i64,
    chapter: &ChapterDraft<'_>,
    ts: &str,
) -> Result<i64> {
    let number = allocate_chapter_number(conn, novel_id)?;
    conn.execute(
        "INSERT INTO chapters (novel_id, title, content, author_note, chapter_number, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        (novel_id, chapter.title, chapter.content, chapter.author_note, number, ts),
    )
    .map_err(|e| map_conflict(e, "chapter number"))?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn query_chapter(conn: &Connection, id: i64) -> Result<Option<ChapterRow>> {
    conn.query_row(
        &format!("SELECT {CHAPTER_COLUMNS} FROM chapters WHERE id = ?1"),
        [id],
        chapter_from_row,
    )
    .optional()
}

fn chapter_from_row(row: &Row<'_>) -> rusqlite::Result<ChapterRow> {
    Ok(ChapterRow {
        id: row.get(0)?,
        novel_id: row.get(1)?,
        title: row.get(2)?,
        content: row.get(3)?,
        author_note: row.get(4)?,
        chapter_number: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}
