use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use tracing::{info, warn};
use uuid::Uuid;

use quill_db::Database;
use quill_types::api::{LoginForm, RegisterForm};
use quill_types::models::Role;

use crate::assist::AssistClient;
use crate::error::{AppError, OrBack, PageError};
use crate::flash::{self, Level};
use crate::middleware::{Session, Viewer, clear_session_cookie, session_cookie};
use crate::views;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub assist: AssistClient,
    /// Mark the session cookie `Secure` (HTTPS deployments).
    pub secure_cookies: bool,
}

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("password hashing failed: {}", e)))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Create a reader account. Duplicate username or email is a validation error.
pub fn register(db: &Database, username: &str, email: &str, password: &str) -> Result<i64, AppError> {
    let username = username.trim();
    let email = email.trim();
    if username.is_empty() || email.is_empty() || password.is_empty() {
        return Err(AppError::validation("username, email and password are required"));
    }

    if db.get_user_by_username(username)?.is_some() {
        return Err(AppError::validation("username already exists"));
    }
    if db.get_user_by_email(email)?.is_some() {
        return Err(AppError::validation("email is already registered"));
    }

    let password_hash = hash_password(password)?;
    let id = db.create_user(username, email, &password_hash, Role::Reader)?;
    info!("Registered user {} ({})", username, id);
    Ok(id)
}

/// Verify credentials and open a server-side session. Unknown user and wrong
/// password fail identically.
pub fn login(db: &Database, username: &str, password: &str) -> Result<Session, AppError> {
    let invalid = || AppError::validation("invalid username or password");

    let user = db.get_user_by_username(username.trim())?.ok_or_else(invalid)?;
    if !verify_password(password, &user.password) {
        warn!("Failed login for {}", user.username);
        return Err(invalid());
    }

    let session_id = Uuid::new_v4().to_string();
    db.create_session(&session_id, user.id)?;
    info!("User {} logged in", user.username);
    Ok(Session::from_user(session_id, &user))
}

pub fn logout(db: &Database, session_id: &str) -> Result<(), AppError> {
    db.delete_session(session_id)?;
    Ok(())
}

/// Create the bootstrap super admin unless one already exists.
/// Returns whether an account was created.
pub fn ensure_super_admin(
    db: &Database,
    username: &str,
    email: &str,
    password: &str,
) -> Result<bool, AppError> {
    if db.has_user_with_role(Role::SuperAdmin)? {
        return Ok(false);
    }
    let password_hash = hash_password(password)?;
    db.create_user(username, email, &password_hash, Role::SuperAdmin)?;
    info!("Created super admin account '{}'", username);
    Ok(true)
}

// -- Handlers --

pub async fn register_page(viewer: Viewer, jar: CookieJar) -> Response {
    views::render(jar, viewer.0.as_ref(), "Register", views::register_form())
}

pub async fn register_submit(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<RegisterForm>,
) -> Result<Response, PageError> {
    register(&state.db, &form.username, &form.email, &form.password).or_back("/register")?;
    let jar = flash::push(jar, Level::Success, "registration successful, please log in");
    Ok((jar, Redirect::to("/login")).into_response())
}

pub async fn login_page(viewer: Viewer, jar: CookieJar) -> Response {
    views::render(jar, viewer.0.as_ref(), "Log in", views::login_form())
}

pub async fn login_submit(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response, PageError> {
    let session = login(&state.db, &form.username, &form.password).or_back("/login")?;
    let jar = jar.add(session_cookie(session.id, state.secure_cookies));
    let jar = flash::push(jar, Level::Success, "logged in");
    Ok((jar, Redirect::to("/")).into_response())
}

/// Always succeeds, signed in or not.
pub async fn logout_handler(
    State(state): State<AppState>,
    viewer: Viewer,
    jar: CookieJar,
) -> Result<Response, PageError> {
    if let Some(session) = viewer.0 {
        logout(&state.db, &session.id)?;
        info!("User {} logged out", session.username);
    }
    let jar = flash::push(clear_session_cookie(jar), Level::Info, "logged out");
    Ok((jar, Redirect::to("/")).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_registration_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        register(&db, "alice", "a@x.com", "pw1").unwrap();

        let err = register(&db, "alice", "other@x.com", "pw2").unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m == "username already exists"));
        let err = register(&db, "alicia", "a@x.com", "pw2").unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m == "email is already registered"));

        assert_eq!(db.count_users().unwrap(), 1);
        assert_eq!(db.get_user_by_username("alice").unwrap().unwrap().role, Role::Reader);
    }

    #[test]
    fn blank_fields_are_rejected() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(register(&db, " ", "a@x.com", "pw"), Err(AppError::Validation(_))));
        assert!(matches!(register(&db, "a", "a@x.com", ""), Err(AppError::Validation(_))));
    }

    #[test]
    fn password_is_hashed_and_verified() {
        let db = Database::open_in_memory().unwrap();
        register(&db, "alice", "a@x.com", "pw1").unwrap();
        let stored = db.get_user_by_username("alice").unwrap().unwrap().password;
        assert_ne!(stored, "pw1");
        assert!(verify_password("pw1", &stored));
        assert!(!verify_password("pw2", &stored));
        assert!(!verify_password("pw1", "not-a-hash"));
    }

    #[test]
    fn login_failures_are_indistinguishable() {
        let db = Database::open_in_memory().unwrap();
        register(&db, "alice", "a@x.com", "pw1").unwrap();

        let wrong_password = login(&db, "alice", "nope").unwrap_err().to_string();
        let unknown_user = login(&db, "mallory", "pw1").unwrap_err().to_string();
        assert_eq!(wrong_password, unknown_user);
    }

    #[test]
    fn login_opens_and_logout_closes_session() {
        let db = Database::open_in_memory().unwrap();
        let id = register(&db, "alice", "a@x.com", "pw1").unwrap();

        let session = login(&db, "alice", "pw1").unwrap();
        assert_eq!(session.user_id, id);
        assert_eq!(session.username, "alice");
        assert_eq!(session.role, Role::Reader);
        assert!(db.get_session_user(&session.id).unwrap().is_some());

        logout(&db, &session.id).unwrap();
        assert!(db.get_session_user(&session.id).unwrap().is_none());
    }

    #[test]
    fn bootstrap_runs_once() {
        let db = Database::open_in_memory().unwrap();
        assert!(ensure_super_admin(&db, "admin", "admin@novel.com", "admin123").unwrap());
        assert!(!ensure_super_admin(&db, "admin2", "admin2@novel.com", "x").unwrap());
        let admin = db.get_user_by_username("admin").unwrap().unwrap();
        assert_eq!(admin.role, Role::SuperAdmin);
    }
}
