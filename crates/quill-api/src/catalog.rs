use axum::{
    extract::{Path, State},
    response::Response,
};
use axum_extra::extract::CookieJar;

use quill_db::Database;
use quill_db::models::{ChapterRow, CommentRow, NovelRow};

use crate::auth::AppState;
use crate::error::{AppError, PageError};
use crate::middleware::Viewer;
use crate::views;

pub const RECENT_NOVELS: u32 = 12;
pub const RECENT_COMMENTS: u32 = 10;

pub fn list_recent_novels(db: &Database, limit: u32) -> Result<Vec<NovelRow>, AppError> {
    Ok(db.list_recent_novels(limit)?)
}

pub fn get_novel(db: &Database, id: i64) -> Result<NovelRow, AppError> {
    db.get_novel(id)?.ok_or(AppError::NotFound("novel"))
}

/// A chapter with its neighbours. A missing neighbour is just an absent link.
#[derive(Debug)]
pub struct ChapterView {
    pub chapter: ChapterRow,
    pub prev: Option<ChapterRow>,
    pub next: Option<ChapterRow>,
}

pub fn get_chapter_by_number(db: &Database, novel_id: i64, number: i64) -> Result<ChapterView, AppError> {
    let chapter = db
        .get_chapter_by_number(novel_id, number)?
        .ok_or(AppError::NotFound("chapter"))?;
    let prev = match number.checked_sub(1) {
        Some(n) if n > 0 => db.get_chapter_by_number(novel_id, n)?,
        _ => None,
    };
    let next = match number.checked_add(1) {
        Some(n) => db.get_chapter_by_number(novel_id, n)?,
        None => None,
    };
    Ok(ChapterView { chapter, prev, next })
}

#[derive(Debug)]
pub struct NovelDetail {
    pub novel: NovelRow,
    pub chapters: Vec<ChapterRow>,
    pub comments: Vec<CommentRow>,
}

pub fn novel_detail(db: &Database, id: i64) -> Result<NovelDetail, AppError> {
    let novel = get_novel(db, id)?;
    Ok(NovelDetail {
        chapters: db.list_chapters(id)?,
        comments: db.list_recent_comments(id, RECENT_COMMENTS)?,
        novel,
    })
}

// -- Handlers --

pub async fn index(
    State(state): State<AppState>,
    viewer: Viewer,
    jar: CookieJar,
) -> Result<Response, PageError> {
    let novels = list_recent_novels(&state.db, RECENT_NOVELS)?;
    Ok(views::render(jar, viewer.0.as_ref(), "Latest novels", views::index(&novels)))
}

pub async fn novel_page(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    viewer: Viewer,
    jar: CookieJar,
) -> Result<Response, PageError> {
    let detail = novel_detail(&state.db, id)?;
    let body = views::novel_detail(&detail, viewer.0.as_ref());
    Ok(views::render(jar, viewer.0.as_ref(), &detail.novel.title, body))
}

pub async fn read_chapter(
    State(state): State<AppState>,
    Path((novel_id, number)): Path<(i64, i64)>,
    viewer: Viewer,
    jar: CookieJar,
) -> Result<Response, PageError> {
    let novel = get_novel(&state.db, novel_id)?;
    let view = get_chapter_by_number(&state.db, novel_id, number)?;
    let toc = state.db.list_chapters(novel_id).map_err(AppError::from)?;
    let title = format!("{} · {}", novel.title, view.chapter.title);
    let body = views::read(&novel, &view, &toc, viewer.0.as_ref());
    Ok(views::render(jar, viewer.0.as_ref(), &title, body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_db::models::ChapterDraft;
    use quill_types::models::Role;

    fn seeded() -> (Database, i64) {
        let db = Database::open_in_memory().unwrap();
        let uid = db.create_user("alice", "a@x.com", "h", Role::Reader).unwrap();
        let nid = db.create_novel(uid, "Tale", "", "").unwrap().id;
        for title in ["One", "Two", "Three"] {
            db.create_chapter(nid, &ChapterDraft { title, content: "...", author_note: "" })
                .unwrap();
        }
        (db, nid)
    }

    #[test]
    fn neighbours_resolve_or_are_absent() {
        let (db, nid) = seeded();

        let first = get_chapter_by_number(&db, nid, 1).unwrap();
        assert!(first.prev.is_none());
        assert_eq!(first.next.unwrap().chapter_number, 2);

        let middle = get_chapter_by_number(&db, nid, 2).unwrap();
        assert_eq!(middle.prev.unwrap().chapter_number, 1);
        assert_eq!(middle.next.unwrap().chapter_number, 3);

        let last = get_chapter_by_number(&db, nid, 3).unwrap();
        assert!(last.next.is_none());
    }

    #[test]
    fn gap_from_deletion_is_an_absent_link() {
        let (db, nid) = seeded();
        let two = db.get_chapter_by_number(nid, 2).unwrap().unwrap();
        db.delete_chapter(two.id).unwrap();

        let one = get_chapter_by_number(&db, nid, 1).unwrap();
        assert!(one.next.is_none());
        assert!(matches!(get_chapter_by_number(&db, nid, 2), Err(AppError::NotFound("chapter"))));
    }

    #[test]
    fn missing_novel_is_not_found() {
        let (db, _) = seeded();
        assert!(matches!(get_novel(&db, 999), Err(AppError::NotFound("novel"))));
        assert!(matches!(novel_detail(&db, 999), Err(AppError::NotFound("novel"))));
    }

    #[test]
    fn detail_lists_chapters_in_order() {
        let (db, nid) = seeded();
        let detail = novel_detail(&db, nid).unwrap();
        let numbers: Vec<i64> = detail.chapters.iter().map(|c| c.chapter_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert!(detail.comments.is_empty());
    }
}
