use axum::{
    Form,
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use tracing::info;

use quill_db::Database;
use quill_db::models::{ChapterDraft, ChapterRow, NovelRow, NovelUpdate};
use quill_types::api::{ChapterForm, EditNovelForm, NewNovelForm};
use quill_types::models::{AuthorStats, NovelStatus};

use crate::auth::AppState;
use crate::catalog::get_novel;
use crate::error::{AppError, OrBack, PageError};
use crate::flash::{self, Level};
use crate::guard::{Capability, require};
use crate::middleware::Session;
use crate::views;

const DASHBOARD: &str = "/author/dashboard";

// -- Novels --

pub fn create_novel(
    db: &Database,
    session: &Session,
    title: &str,
    description: &str,
    cover_image: &str,
) -> Result<NovelRow, AppError> {
    if title.trim().is_empty() {
        return Err(AppError::validation("title is required"));
    }
    let novel = db.create_novel(session.user_id, title.trim(), description, cover_image)?;
    info!("User {} created novel {} '{}'", session.username, novel.id, novel.title);
    Ok(novel)
}

/// Fetch a novel the caller may edit or delete.
pub fn editable_novel(db: &Database, session: &Session, novel_id: i64) -> Result<NovelRow, AppError> {
    let novel = get_novel(db, novel_id)?;
    require(session, Capability::OwnerOrAdmin(novel.author_id))?;
    Ok(novel)
}

/// Fetch a novel only its author may extend with chapters or drafts.
pub fn owned_novel(db: &Database, session: &Session, novel_id: i64) -> Result<NovelRow, AppError> {
    let novel = get_novel(db, novel_id)?;
    require(session, Capability::Owner(novel.author_id))?;
    Ok(novel)
}

pub fn edit_novel(
    db: &Database,
    session: &Session,
    novel_id: i64,
    form: &EditNovelForm,
) -> Result<NovelRow, AppError> {
    let novel = editable_novel(db, session, novel_id)?;
    let status: NovelStatus = form
        .status
        .parse()
        .map_err(|e: quill_types::models::UnknownStatus| AppError::validation(e.to_string()))?;
    if form.title.trim().is_empty() {
        return Err(AppError::validation("title is required"));
    }

    db.update_novel(
        novel.id,
        &NovelUpdate {
            title: form.title.trim(),
            description: &form.description,
            status,
            cover_image: &form.cover_image,
        },
    )?;
    info!("User {} edited novel {}", session.username, novel.id);
    get_novel(db, novel.id)
}

/// Deletes the novel's comments, drafts and chapters, then the novel.
pub fn delete_novel(db: &Database, session: &Session, novel_id: i64) -> Result<(), AppError> {
    let novel = editable_novel(db, session, novel_id)?;
    db.delete_novel(novel.id)?;
    info!("User {} deleted novel {} '{}'", session.username, novel.id, novel.title);
    Ok(())
}

// -- Chapters --

fn chapter_fields(form: &ChapterForm) -> Result<ChapterDraft<'_>, AppError> {
    if form.title.trim().is_empty() {
        return Err(AppError::validation("chapter title is required"));
    }
    Ok(ChapterDraft {
        title: form.title.trim(),
        content: &form.content,
        author_note: &form.author_note,
    })
}

/// Only the novel's author may add chapters; admins get no bypass here.
pub fn create_chapter(
    db: &Database,
    session: &Session,
    novel_id: i64,
    form: &ChapterForm,
) -> Result<ChapterRow, AppError> {
    let novel = owned_novel(db, session, novel_id)?;
    let chapter = db.create_chapter(novel.id, &chapter_fields(form)?)?;
    info!(
        "User {} published chapter {} of novel {}",
        session.username, chapter.chapter_number, novel.id
    );
    Ok(chapter)
}

/// Fetch a chapter together with its novel, if the caller may change it.
pub fn editable_chapter(
    db: &Database,
    session: &Session,
    chapter_id: i64,
) -> Result<(ChapterRow, NovelRow), AppError> {
    let chapter = db.get_chapter(chapter_id)?.ok_or(AppError::NotFound("chapter"))?;
    let novel = editable_novel(db, session, chapter.novel_id)?;
    Ok((chapter, novel))
}

pub fn edit_chapter(
    db: &Database,
    session: &Session,
    chapter_id: i64,
    form: &ChapterForm,
) -> Result<ChapterRow, AppError> {
    let (chapter, novel) = editable_chapter(db, session, chapter_id)?;
    db.update_chapter(chapter.id, &chapter_fields(form)?)?;
    info!("User {} edited chapter {} of novel {}", session.username, chapter.chapter_number, novel.id);
    db.get_chapter(chapter.id)?.ok_or(AppError::NotFound("chapter"))
}

/// Returns the parent novel's id. Remaining chapters keep their numbers.
pub fn delete_chapter(db: &Database, session: &Session, chapter_id: i64) -> Result<i64, AppError> {
    let (chapter, novel) = editable_chapter(db, session, chapter_id)?;
    db.delete_chapter(chapter.id)?;
    info!("User {} deleted chapter {} of novel {}", session.username, chapter.chapter_number, novel.id);
    Ok(novel.id)
}

// -- Dashboard --

pub fn dashboard(db: &Database, session: &Session) -> Result<(Vec<NovelRow>, AuthorStats), AppError> {
    let novels = db.list_novels_by_author(session.user_id)?;
    let stats = AuthorStats {
        total_chapters: db.count_chapters(Some(session.user_id))?,
        total_comments: db.count_comments(Some(session.user_id))?,
        ongoing_novels: novels.iter().filter(|n| n.status == NovelStatus::Ongoing).count(),
    };
    Ok((novels, stats))
}

// -- Handlers --

fn redirect_with(jar: CookieJar, msg: &str, to: &str) -> Response {
    (flash::push(jar, Level::Success, msg), Redirect::to(to)).into_response()
}

pub async fn dashboard_page(
    State(state): State<AppState>,
    session: Session,
    jar: CookieJar,
) -> Result<Response, PageError> {
    let (novels, stats) = dashboard(&state.db, &session)?;
    Ok(views::render(jar, Some(&session), "Author dashboard", views::dashboard(&novels, &stats)))
}

pub async fn new_novel_page(session: Session, jar: CookieJar) -> Response {
    views::render(jar, Some(&session), "New novel", views::novel_form(None))
}

pub async fn new_novel_submit(
    State(state): State<AppState>,
    session: Session,
    jar: CookieJar,
    Form(form): Form<NewNovelForm>,
) -> Result<Response, PageError> {
    create_novel(&state.db, &session, &form.title, &form.description, &form.cover_image)
        .or_back("/author/novel/new")?;
    Ok(redirect_with(jar, "novel created", DASHBOARD))
}

pub async fn edit_novel_page(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    session: Session,
    jar: CookieJar,
) -> Result<Response, PageError> {
    let novel = editable_novel(&state.db, &session, id).or_back(DASHBOARD)?;
    Ok(views::render(jar, Some(&session), "Edit novel", views::novel_form(Some(&novel))))
}

pub async fn edit_novel_submit(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    session: Session,
    jar: CookieJar,
    Form(form): Form<EditNovelForm>,
) -> Result<Response, PageError> {
    edit_novel(&state.db, &session, id, &form).or_back(DASHBOARD)?;
    Ok(redirect_with(jar, "novel updated", DASHBOARD))
}

pub async fn delete_novel_submit(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    session: Session,
    jar: CookieJar,
) -> Result<Response, PageError> {
    delete_novel(&state.db, &session, id).or_back(DASHBOARD)?;
    Ok(redirect_with(jar, "novel deleted", DASHBOARD))
}

pub async fn new_chapter_page(
    State(state): State<AppState>,
    Path(novel_id): Path<i64>,
    session: Session,
    jar: CookieJar,
) -> Result<Response, PageError> {
    let novel = owned_novel(&state.db, &session, novel_id).or_back(DASHBOARD)?;
    Ok(views::render(jar, Some(&session), "New chapter", views::chapter_form(&novel, None)))
}

pub async fn new_chapter_submit(
    State(state): State<AppState>,
    Path(novel_id): Path<i64>,
    session: Session,
    jar: CookieJar,
    Form(form): Form<ChapterForm>,
) -> Result<Response, PageError> {
    create_chapter(&state.db, &session, novel_id, &form).or_back(DASHBOARD)?;
    Ok(redirect_with(jar, "chapter published", &format!("/novel/{}", novel_id)))
}

pub async fn edit_chapter_page(
    State(state): State<AppState>,
    Path(chapter_id): Path<i64>,
    session: Session,
    jar: CookieJar,
) -> Result<Response, PageError> {
    let (chapter, novel) = editable_chapter(&state.db, &session, chapter_id).or_back(DASHBOARD)?;
    let body = views::chapter_form(&novel, Some(&chapter));
    Ok(views::render(jar, Some(&session), "Edit chapter", body))
}

pub async fn edit_chapter_submit(
    State(state): State<AppState>,
    Path(chapter_id): Path<i64>,
    session: Session,
    jar: CookieJar,
    Form(form): Form<ChapterForm>,
) -> Result<Response, PageError> {
    let chapter = edit_chapter(&state.db, &session, chapter_id, &form).or_back(DASHBOARD)?;
    Ok(redirect_with(jar, "chapter updated", &format!("/novel/{}", chapter.novel_id)))
}

pub async fn delete_chapter_submit(
    State(state): State<AppState>,
    Path(chapter_id): Path<i64>,
    session: Session,
    jar: CookieJar,
) -> Result<Response, PageError> {
    let novel_id = delete_chapter(&state.db, &session, chapter_id).or_back(DASHBOARD)?;
    Ok(redirect_with(jar, "chapter deleted", &format!("/novel/{}", novel_id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_types::models::Role;

    use crate::guard::session_for;

    struct World {
        db: Database,
        alice: Session,
        bob: Session,
        admin: Session,
    }

    fn world() -> World {
        let db = Database::open_in_memory().unwrap();
        let alice = db.create_user("alice", "a@x.com", "h", Role::Reader).unwrap();
        let bob = db.create_user("bob", "b@x.com", "h", Role::Reader).unwrap();
        let admin = db.create_user("root", "r@x.com", "h", Role::Admin).unwrap();
        World {
            db,
            alice: session_for(alice, Role::Reader),
            bob: session_for(bob, Role::Reader),
            admin: session_for(admin, Role::Admin),
        }
    }

    fn chapter(title: &str) -> ChapterForm {
        ChapterForm { title: title.into(), content: "text".into(), author_note: String::new() }
    }

    fn edit_form(title: &str, status: &str) -> EditNovelForm {
        EditNovelForm {
            title: title.into(),
            description: "d".into(),
            status: status.into(),
            cover_image: String::new(),
        }
    }

    #[test]
    fn chapter_numbering_survives_deletion() {
        let w = world();
        let novel = create_novel(&w.db, &w.alice, "Tale", "", "").unwrap();
        assert_eq!(novel.status, NovelStatus::Ongoing);

        let ch1 = create_chapter(&w.db, &w.alice, novel.id, &chapter("Ch1")).unwrap();
        assert_eq!(ch1.chapter_number, 1);
        let ch2 = create_chapter(&w.db, &w.alice, novel.id, &chapter("Ch2")).unwrap();
        assert_eq!(ch2.chapter_number, 2);

        assert_eq!(delete_chapter(&w.db, &w.alice, ch1.id).unwrap(), novel.id);
        let remaining: Vec<i64> = w.db.list_chapters(novel.id).unwrap().iter().map(|c| c.chapter_number).collect();
        assert_eq!(remaining, vec![2]);

        let ch3 = create_chapter(&w.db, &w.alice, novel.id, &chapter("Ch3")).unwrap();
        assert_eq!(ch3.chapter_number, 3);
    }

    #[test]
    fn only_owner_or_admin_may_edit_novel() {
        let w = world();
        let novel = create_novel(&w.db, &w.alice, "Tale", "", "").unwrap();

        let err = edit_novel(&w.db, &w.bob, novel.id, &edit_form("Mine now", "ongoing")).unwrap_err();
        assert!(matches!(err, AppError::AuthorizationDenied));

        let edited = edit_novel(&w.db, &w.admin, novel.id, &edit_form("Tale (rev)", "completed")).unwrap();
        assert_eq!(edited.title, "Tale (rev)");
        assert_eq!(edited.status, NovelStatus::Completed);
        assert!(edited.updated_at >= novel.updated_at);
    }

    #[test]
    fn unknown_status_is_rejected() {
        let w = world();
        let novel = create_novel(&w.db, &w.alice, "Tale", "", "").unwrap();
        let err = edit_novel(&w.db, &w.alice, novel.id, &edit_form("Tale", "paused")).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn admin_cannot_add_chapters_to_someone_elses_novel() {
        let w = world();
        let novel = create_novel(&w.db, &w.alice, "Tale", "", "").unwrap();

        let err = create_chapter(&w.db, &w.admin, novel.id, &chapter("Hijack")).unwrap_err();
        assert!(matches!(err, AppError::AuthorizationDenied));
        assert!(w.db.list_chapters(novel.id).unwrap().is_empty());
    }

    #[test]
    fn chapter_edit_and_delete_follow_owner_or_admin() {
        let w = world();
        let novel = create_novel(&w.db, &w.alice, "Tale", "", "").unwrap();
        let ch = create_chapter(&w.db, &w.alice, novel.id, &chapter("Ch1")).unwrap();

        assert!(matches!(
            edit_chapter(&w.db, &w.bob, ch.id, &chapter("x")),
            Err(AppError::AuthorizationDenied)
        ));
        assert!(matches!(delete_chapter(&w.db, &w.bob, ch.id), Err(AppError::AuthorizationDenied)));

        let edited = edit_chapter(&w.db, &w.admin, ch.id, &chapter("Ch1 (fixed)")).unwrap();
        assert_eq!(edited.title, "Ch1 (fixed)");
        assert_eq!(edited.chapter_number, 1);

        delete_chapter(&w.db, &w.admin, ch.id).unwrap();
        assert!(matches!(
            delete_chapter(&w.db, &w.admin, ch.id),
            Err(AppError::NotFound("chapter"))
        ));
    }

    #[test]
    fn delete_novel_requires_owner_or_admin() {
        let w = world();
        let novel = create_novel(&w.db, &w.alice, "Tale", "", "").unwrap();
        create_chapter(&w.db, &w.alice, novel.id, &chapter("Ch1")).unwrap();

        assert!(matches!(delete_novel(&w.db, &w.bob, novel.id), Err(AppError::AuthorizationDenied)));
        delete_novel(&w.db, &w.alice, novel.id).unwrap();
        assert!(matches!(get_novel(&w.db, novel.id), Err(AppError::NotFound("novel"))));
    }

    #[test]
    fn dashboard_counts_own_work() {
        let w = world();
        let a = create_novel(&w.db, &w.alice, "A", "", "").unwrap();
        let b = create_novel(&w.db, &w.alice, "B", "", "").unwrap();
        create_novel(&w.db, &w.bob, "Other", "", "").unwrap();
        create_chapter(&w.db, &w.alice, a.id, &chapter("1")).unwrap();
        create_chapter(&w.db, &w.alice, b.id, &chapter("1")).unwrap();
        edit_novel(&w.db, &w.alice, b.id, &edit_form("B", "completed")).unwrap();

        let (novels, stats) = dashboard(&w.db, &w.alice).unwrap();
        assert_eq!(novels.len(), 2);
        assert_eq!(novels[0].id, b.id);
        assert_eq!(stats, AuthorStats { total_chapters: 2, total_comments: 0, ongoing_novels: 1 });
    }
}
