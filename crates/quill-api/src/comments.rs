use axum::{
    Form,
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use tracing::info;

use quill_db::Database;
use quill_db::models::CommentRow;
use quill_types::api::CommentForm;

use crate::auth::AppState;
use crate::catalog::get_novel;
use crate::error::{AppError, OrBack, PageError};
use crate::flash::{self, Level};
use crate::middleware::Session;

/// Any signed-in user may comment on a novel, optionally on one of its chapters.
pub fn add_comment(
    db: &Database,
    session: &Session,
    novel_id: i64,
    content: &str,
    chapter_id: Option<i64>,
) -> Result<CommentRow, AppError> {
    let novel = get_novel(db, novel_id)?;
    let content = content.trim();
    if content.is_empty() {
        return Err(AppError::validation("comment cannot be empty"));
    }
    if let Some(chapter_id) = chapter_id {
        match db.get_chapter(chapter_id)? {
            Some(chapter) if chapter.novel_id == novel.id => {}
            _ => return Err(AppError::validation("chapter does not belong to this novel")),
        }
    }

    let comment = db.create_comment(novel.id, session.user_id, content, chapter_id)?;
    info!("User {} commented on novel {}", session.username, novel.id);
    Ok(comment)
}

pub async fn comment_submit(
    State(state): State<AppState>,
    Path(novel_id): Path<i64>,
    session: Session,
    jar: CookieJar,
    Form(form): Form<CommentForm>,
) -> Result<Response, PageError> {
    let back = format!("/novel/{}", novel_id);
    let chapter_id = form
        .chapter_id()
        .map_err(|_| AppError::validation("invalid chapter id"))
        .or_back(back.clone())?;
    add_comment(&state.db, &session, novel_id, &form.content, chapter_id).or_back(back.clone())?;
    let jar = flash::push(jar, Level::Success, "comment posted");
    Ok((jar, Redirect::to(&back)).into_response())
}
