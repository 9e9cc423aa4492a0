use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use tracing::{info, warn};

use quill_db::Database;
use quill_db::models::{ChapterRow, DraftRow, NovelRow, SettingsRow};
use quill_types::api::{SaveDraftRequest, SaveDraftResponse};

use crate::auth::AppState;
use crate::authoring::owned_novel;
use crate::catalog::get_novel;
use crate::error::{AppError, OrBack, PageError};
use crate::flash::{self, Level};
use crate::guard::{Capability, require};
use crate::middleware::{Session, Viewer};
use crate::views;

pub const UNTITLED: &str = "Untitled Draft";

const DASHBOARD: &str = "/author/dashboard";

/// Fetch a draft only its author may touch.
pub fn owned_draft(db: &Database, session: &Session, draft_id: i64) -> Result<DraftRow, AppError> {
    let draft = db.get_draft(draft_id)?.ok_or(AppError::NotFound("draft"))?;
    require(session, Capability::Owner(draft.user_id))?;
    Ok(draft)
}

pub fn list_drafts(db: &Database, session: &Session, novel_id: i64) -> Result<(NovelRow, Vec<DraftRow>), AppError> {
    let novel = owned_novel(db, session, novel_id)?;
    let drafts = db.list_drafts(novel.id, session.user_id)?;
    Ok((novel, drafts))
}

pub fn create_draft(db: &Database, session: &Session, novel_id: i64) -> Result<DraftRow, AppError> {
    let novel = owned_novel(db, session, novel_id)?;
    let draft = db.create_draft(novel.id, session.user_id, UNTITLED)?;
    info!("User {} started draft {} for novel {}", session.username, draft.id, novel.id);
    Ok(draft)
}

/// Everything the draft editor needs: the draft, its novel and the
/// author's settings (to decide whether AI assist is offered).
pub struct DraftEditor {
    pub draft: DraftRow,
    pub novel: NovelRow,
    pub settings: SettingsRow,
}

pub fn open_draft(db: &Database, session: &Session, draft_id: i64) -> Result<DraftEditor, AppError> {
    let draft = owned_draft(db, session, draft_id)?;
    let novel = get_novel(db, draft.novel_id)?;
    let settings = db.get_or_create_settings(session.user_id)?;
    Ok(DraftEditor { draft, novel, settings })
}

/// Partial update. Returns the new `updated_at`. A published draft is frozen.
pub fn save_draft(
    db: &Database,
    session: &Session,
    draft_id: i64,
    req: &SaveDraftRequest,
) -> Result<String, AppError> {
    let draft = owned_draft(db, session, draft_id)?;
    if draft.is_published {
        return Err(AppError::validation("draft is already published"));
    }
    let updated_at = db.update_draft(draft.id, req.title.as_deref(), req.content.as_deref())?;
    Ok(updated_at)
}

/// Publishing twice is refused; the draft row is kept either way.
pub fn publish_draft(db: &Database, session: &Session, draft_id: i64) -> Result<ChapterRow, AppError> {
    let draft = owned_draft(db, session, draft_id)?;
    if draft.is_published {
        return Err(AppError::validation("draft is already published"));
    }
    let chapter = db.publish_draft(draft.id)?;
    info!(
        "User {} published draft {} as chapter {} of novel {}",
        session.username, draft.id, chapter.chapter_number, draft.novel_id
    );
    Ok(chapter)
}

/// Returns the novel the draft belonged to.
pub fn delete_draft(db: &Database, session: &Session, draft_id: i64) -> Result<i64, AppError> {
    let draft = owned_draft(db, session, draft_id)?;
    db.delete_draft(draft.id)?;
    info!("User {} deleted draft {}", session.username, draft.id);
    Ok(draft.novel_id)
}

// -- Handlers --

pub async fn drafts_page(
    State(state): State<AppState>,
    Path(novel_id): Path<i64>,
    session: Session,
    jar: CookieJar,
) -> Result<Response, PageError> {
    let (novel, drafts) = list_drafts(&state.db, &session, novel_id).or_back(DASHBOARD)?;
    let title = format!("Drafts · {}", novel.title);
    Ok(views::render(jar, Some(&session), &title, views::drafts(&novel, &drafts)))
}

pub async fn new_draft(
    State(state): State<AppState>,
    Path(novel_id): Path<i64>,
    session: Session,
) -> Result<Redirect, PageError> {
    let draft = create_draft(&state.db, &session, novel_id).or_back(DASHBOARD)?;
    Ok(Redirect::to(&format!("/author/draft/{}", draft.id)))
}

pub async fn editor_page(
    State(state): State<AppState>,
    Path(draft_id): Path<i64>,
    session: Session,
    jar: CookieJar,
) -> Result<Response, PageError> {
    let editor = open_draft(&state.db, &session, draft_id).or_back(DASHBOARD)?;
    let title = format!("Draft · {}", editor.draft.title);
    Ok(views::render(jar, Some(&session), &title, views::draft_editor(&editor)))
}

/// POST /author/draft/{id}/save. Every outcome, including a missing
/// session or an unreadable body, is reported in the JSON payload.
pub async fn save_handler(
    State(state): State<AppState>,
    Path(draft_id): Path<i64>,
    viewer: Viewer,
    body: Result<Json<SaveDraftRequest>, JsonRejection>,
) -> Json<SaveDraftResponse> {
    let Some(session) = viewer.0 else {
        return Json(SaveDraftResponse::failed(AppError::AuthenticationRequired.to_string()));
    };
    let req = match body {
        Ok(Json(req)) => req,
        Err(rejection) => return Json(SaveDraftResponse::failed(rejection.body_text())),
    };

    match save_draft(&state.db, &session, draft_id, &req) {
        Ok(updated_at) => Json(SaveDraftResponse::saved(updated_at)),
        Err(e) => {
            warn!("Autosave of draft {} failed for {}: {}", draft_id, session.username, e);
            Json(SaveDraftResponse::failed(e.public_message()))
        }
    }
}

pub async fn publish_submit(
    State(state): State<AppState>,
    Path(draft_id): Path<i64>,
    session: Session,
    jar: CookieJar,
) -> Result<Response, PageError> {
    let back = format!("/author/draft/{}", draft_id);
    let chapter = publish_draft(&state.db, &session, draft_id).or_back(back)?;
    let jar = flash::push(
        jar,
        Level::Success,
        format!("draft published as chapter {}", chapter.chapter_number),
    );
    let to = format!("/read/{}/{}", chapter.novel_id, chapter.chapter_number);
    Ok((jar, Redirect::to(&to)).into_response())
}

pub async fn delete_submit(
    State(state): State<AppState>,
    Path(draft_id): Path<i64>,
    session: Session,
    jar: CookieJar,
) -> Result<Response, PageError> {
    let novel_id = delete_draft(&state.db, &session, draft_id).or_back(DASHBOARD)?;
    let jar = flash::push(jar, Level::Success, "draft deleted");
    Ok((jar, Redirect::to(&format!("/author/novel/{}/drafts", novel_id))).into_response())
}
