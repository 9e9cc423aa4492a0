use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use tracing::{debug, error};

use quill_db::models::UserRow;
use quill_types::models::Role;

use crate::auth::AppState;
use crate::error::{AppError, PageError};

pub const SESSION_COOKIE: &str = "quill_session";

/// Request-scoped identity. Created at login, destroyed at logout, read-only
/// while a request is handled.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub user_id: i64,
    pub username: String,
    pub role: Role,
}

impl Session {
    pub fn from_user(id: String, user: &UserRow) -> Self {
        Self {
            id,
            user_id: user.id,
            username: user.username.clone(),
            role: user.role,
        }
    }
}

pub fn session_cookie(session_id: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, session_id))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .build()
}

pub fn clear_session_cookie(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(SESSION_COOKIE).path("/"))
}

/// Resolve the session cookie, if any, into a [`Session`] extension.
/// Anonymous requests pass through untouched.
pub async fn load_session(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        match state.db.get_session_user(cookie.value()) {
            Ok(Some(user)) => {
                let session = Session::from_user(cookie.value().to_string(), &user);
                req.extensions_mut().insert(session);
            }
            Ok(None) => debug!("Ignoring unknown session cookie"),
            Err(e) => error!("Session lookup failed: {:#}", e),
        }
    }
    next.run(req).await
}

/// Reject anonymous requests with a redirect to the login page.
pub async fn require_auth(req: Request, next: Next) -> Result<Response, PageError> {
    if req.extensions().get::<Session>().is_none() {
        return Err(AppError::AuthenticationRequired.into());
    }
    Ok(next.run(req).await)
}

/// Authenticated and role ∈ {admin, super_admin}.
pub async fn require_admin(req: Request, next: Next) -> Result<Response, PageError> {
    match req.extensions().get::<Session>() {
        None => Err(AppError::AuthenticationRequired.into()),
        Some(session) if !session.role.is_admin() => Err(AppError::AuthorizationDenied.into()),
        Some(_) => Ok(next.run(req).await),
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Session {
    type Rejection = PageError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| AppError::AuthenticationRequired.into())
    }
}

/// The signed-in user on public pages, if there is one.
#[derive(Debug, Clone)]
pub struct Viewer(pub Option<Session>);

impl<S: Send + Sync> FromRequestParts<S> for Viewer {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Viewer(parts.extensions.get::<Session>().cloned()))
    }
}
