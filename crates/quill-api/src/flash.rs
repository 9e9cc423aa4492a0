//! One-shot status messages carried across a redirect in a cookie.

use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64;
use serde::{Deserialize, Serialize};
use tracing::debug;

const FLASH_COOKIE: &str = "quill_flash";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Success,
    Info,
    Warning,
    Danger,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Success => "success",
            Level::Info => "info",
            Level::Warning => "warning",
            Level::Danger => "danger",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub level: Level,
    pub message: String,
}

impl Flash {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self { level, message: message.into() }
    }
}

fn read(jar: &CookieJar) -> Vec<Flash> {
    let Some(cookie) = jar.get(FLASH_COOKIE) else {
        return Vec::new();
    };
    B64.decode(cookie.value())
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        .unwrap_or_else(|| {
            debug!("Discarding unreadable flash cookie");
            Vec::new()
        })
}

/// Queue messages for the next rendered page.
pub fn push_all(jar: CookieJar, flashes: impl IntoIterator<Item = Flash>) -> CookieJar {
    let mut queued = read(&jar);
    queued.extend(flashes);
    let encoded = match serde_json::to_vec(&queued) {
        Ok(bytes) => B64.encode(bytes),
        Err(_) => return jar,
    };
    jar.add(
        Cookie::build((FLASH_COOKIE, encoded))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .build(),
    )
}

pub fn push(jar: CookieJar, level: Level, message: impl Into<String>) -> CookieJar {
    push_all(jar, [Flash::new(level, message)])
}

/// Drain queued messages; the returned jar clears the cookie.
pub fn take(jar: CookieJar) -> (CookieJar, Vec<Flash>) {
    let flashes = read(&jar);
    if jar.get(FLASH_COOKIE).is_none() {
        return (jar, flashes);
    }
    (jar.remove(Cookie::build(FLASH_COOKIE).path("/")), flashes)
}

/// Messages attached to a response built without the request's cookie jar,
/// such as an error redirect. [`carry`] queues them behind the request's own.
#[derive(Debug, Clone)]
pub struct Pending(pub Vec<Flash>);

pub async fn carry(jar: CookieJar, req: Request, next: Next) -> Response {
    let mut resp = next.run(req).await;
    match resp.extensions_mut().remove::<Pending>() {
        Some(Pending(flashes)) => (push_all(jar, flashes), resp).into_response(),
        None => resp,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, body::Body, http::header, middleware, response::Redirect, routing::get};
    use tower::ServiceExt;

    #[test]
    fn queued_messages_are_taken_once() {
        let jar = push(CookieJar::new(), Level::Success, "saved");
        let jar = push(jar, Level::Danger, "but not that");

        let (jar, flashes) = take(jar);
        assert_eq!(
            flashes,
            vec![Flash::new(Level::Success, "saved"), Flash::new(Level::Danger, "but not that")]
        );
        assert!(take(jar).1.is_empty());
    }

    #[test]
    fn garbage_cookie_is_ignored() {
        let jar = CookieJar::new().add(Cookie::new(FLASH_COOKIE, "%%%"));
        assert!(take(jar).1.is_empty());
    }

    #[tokio::test]
    async fn pending_messages_join_the_queue() {
        let app = Router::new()
            .route(
                "/",
                get(|| async {
                    let mut resp = Redirect::to("/login").into_response();
                    resp.extensions_mut().insert(Pending(vec![Flash::new(Level::Warning, "log in")]));
                    resp
                }),
            )
            .layer(middleware::from_fn(carry));

        let queued = push(CookieJar::new(), Level::Success, "registered");
        let cookie = format!("{FLASH_COOKIE}={}", queued.get(FLASH_COOKIE).unwrap().value());
        let req = axum::http::Request::builder()
            .uri("/")
            .header(header::COOKIE, cookie)
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();

        let value = resp
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(|v| v.strip_prefix("quill_flash="))
            .and_then(|v| v.split(';').next())
            .unwrap()
            .to_string();
        let (_, flashes) = take(CookieJar::new().add(Cookie::new(FLASH_COOKIE, value)));
        assert_eq!(
            flashes,
            vec![Flash::new(Level::Success, "registered"), Flash::new(Level::Warning, "log in")]
        );
    }
}
