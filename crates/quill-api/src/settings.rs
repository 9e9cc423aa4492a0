use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use tracing::info;

use quill_db::Database;
use quill_db::models::{SettingsRow, SettingsUpdate, UserRow};
use quill_types::api::SettingsForm;

use crate::auth::{AppState, hash_password, verify_password};
use crate::error::{AppError, OrBack, PageError};
use crate::flash::{self, Flash, Level};
use crate::middleware::Session;
use crate::views;

const SETTINGS: &str = "/author/settings";

/// The caller's account and settings. The settings row is created on first access.
pub fn load(db: &Database, session: &Session) -> Result<(UserRow, SettingsRow), AppError> {
    let user = db.get_user_by_id(session.user_id)?.ok_or(AppError::NotFound("user"))?;
    let settings = db.get_or_create_settings(session.user_id)?;
    Ok((user, settings))
}

/// Apply a settings submission.
///
/// A blank nickname leaves the stored one alone. The password changes only
/// when all three password fields are filled in; a wrong current password
/// or a mismatched confirmation is reported but does not block the rest of
/// the form. AI fields are overwritten every time.
pub fn update(db: &Database, session: &Session, form: &SettingsForm) -> Result<Vec<Flash>, AppError> {
    let (user, _) = load(db, session)?;
    let mut outcome = Vec::new();

    if !form.current_password.is_empty() && !form.new_password.is_empty() && !form.confirm_password.is_empty() {
        if !verify_password(&form.current_password, &user.password) {
            outcome.push(Flash::new(Level::Danger, "current password is incorrect"));
        } else if form.new_password != form.confirm_password {
            outcome.push(Flash::new(Level::Danger, "passwords do not match"));
        } else {
            db.update_password(user.id, &hash_password(&form.new_password)?)?;
            info!("User {} changed password", user.username);
            outcome.push(Flash::new(Level::Success, "password updated"));
        }
    }

    let nickname = form.nickname.trim();
    db.update_settings(
        user.id,
        &SettingsUpdate {
            nickname: Some(nickname).filter(|n| !n.is_empty()),
            openai_api_key: &form.openai_api_key,
            openai_base_url: &form.openai_base_url,
            openai_model: &form.openai_model,
        },
    )?;
    outcome.push(Flash::new(Level::Success, "settings saved"));
    Ok(outcome)
}

// -- Handlers --

pub async fn settings_page(
    State(state): State<AppState>,
    session: Session,
    jar: CookieJar,
) -> Result<Response, PageError> {
    let (user, settings) = load(&state.db, &session)?;
    Ok(views::render(jar, Some(&session), "Settings", views::settings(&user, &settings)))
}

pub async fn settings_submit(
    State(state): State<AppState>,
    session: Session,
    jar: CookieJar,
    Form(form): Form<SettingsForm>,
) -> Result<Response, PageError> {
    let outcome = update(&state.db, &session, &form).or_back(SETTINGS)?;
    Ok((flash::push_all(jar, outcome), Redirect::to(SETTINGS)).into_response())
}
