//! AI writing assistant: a pass-through to an OpenAI-compatible
//! chat-completion endpoint using the caller's stored credentials.

use std::time::Duration;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use quill_db::Database;
use quill_types::api::{AssistRequest, AssistResponse};

use crate::auth::AppState;
use crate::error::AppError;
use crate::middleware::{Session, Viewer};

pub const DEFAULT_BASE_URL: &str = "https://api.deepseek.com";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
const SYSTEM_PROMPT: &str = "You are a professional novel-writing assistant who helps authors \
                             draft and polish their fiction.";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Credentials resolved from a user's settings, with defaults applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

impl Credentials {
    /// Fails with [`AppError::ConfigurationMissing`] when no API key is stored.
    pub fn load(db: &Database, user_id: i64) -> Result<Self, AppError> {
        let settings = db.get_settings(user_id)?;
        let settings = settings.ok_or(AppError::ConfigurationMissing)?;
        let api_key = settings
            .openai_api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or(AppError::ConfigurationMissing)?;

        Ok(Self {
            api_key,
            base_url: settings
                .openai_base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: settings.openai_model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

pub fn user_message(context: &str, prompt: &str) -> String {
    format!("Context: {}\n\nRequest: {}", context, prompt)
}

/// Shared HTTP client with a bounded request timeout.
#[derive(Clone)]
pub struct AssistClient {
    http: reqwest::Client,
}

impl AssistClient {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }

    /// One synchronous completion round-trip. Every transport, auth or
    /// provider failure comes back as [`AppError::ExternalService`] carrying
    /// the raw error text.
    pub async fn complete(&self, creds: &Credentials, context: &str, prompt: &str) -> Result<String, AppError> {
        let user = user_message(context, prompt);
        let body = ChatRequest {
            model: &creds.model,
            messages: vec![
                ChatMessage { role: "system", content: SYSTEM_PROMPT },
                ChatMessage { role: "user", content: &user },
            ],
            stream: false,
        };

        let resp = self
            .http
            .post(creds.endpoint())
            .bearer_auth(&creds.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("AI request failed: {}", e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(AppError::ExternalService(format!(
                "AI provider error: {} {}",
                status.as_u16(),
                text
            )));
        }

        let data: ChatResponse = resp
            .json()
            .await
            .map_err(|e| AppError::ExternalService(format!("Failed to parse AI response: {}", e)))?;

        data.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AppError::ExternalService("AI response contained no choices".into()))
    }
}

pub async fn assist(
    db: &Database,
    client: &AssistClient,
    session: &Session,
    req: &AssistRequest,
) -> Result<String, AppError> {
    let creds = Credentials::load(db, session.user_id)?;
    let result = client.complete(&creds, &req.context, &req.prompt).await?;
    info!("AI assist for {} returned {} bytes", session.username, result.len());
    Ok(result)
}

/// POST /author/ai/assist. Like draft autosave, never answers with a redirect.
pub async fn assist_handler(
    State(state): State<AppState>,
    viewer: Viewer,
    body: Result<Json<AssistRequest>, JsonRejection>,
) -> Json<AssistResponse> {
    let Some(session) = viewer.0 else {
        return Json(AssistResponse::failed(AppError::AuthenticationRequired.to_string()));
    };
    let req = match body {
        Ok(Json(req)) => req,
        Err(rejection) => return Json(AssistResponse::failed(rejection.body_text())),
    };

    match assist(&state.db, &state.assist, &session, &req).await {
        Ok(result) => Json(AssistResponse::completed(result)),
        Err(e) => {
            warn!("AI assist failed for {}: {}", session.username, e);
            Json(AssistResponse::failed(e.public_message()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_db::models::SettingsUpdate;
    use quill_types::models::Role;

    use crate::guard::session_for;

    fn setup() -> (Database, Session) {
        let db = Database::open_in_memory().unwrap();
        let id = db.create_user("alice", "a@x.com", "h", Role::Reader).unwrap();
        (db, session_for(id, Role::Reader))
    }

    fn configure(db: &Database, user_id: i64, key: &str, base: &str, model: &str) {
        db.get_or_create_settings(user_id).unwrap();
        db.update_settings(
            user_id,
            &SettingsUpdate { nickname: None, openai_api_key: key, openai_base_url: base, openai_model: model },
        )
        .unwrap();
    }

    #[tokio::test]
    async fn missing_key_is_a_configuration_error() {
        let (db, session) = setup();
        let client = AssistClient::new(Duration::from_secs(1)).unwrap();
        let req = AssistRequest { prompt: "polish".into(), context: "text".into() };

        let err = assist(&db, &client, &session, &req).await.unwrap_err();
        assert!(matches!(err, AppError::ConfigurationMissing));

        configure(&db, session.user_id, "", "", "");
        let err = assist(&db, &client, &session, &req).await.unwrap_err();
        assert!(matches!(err, AppError::ConfigurationMissing));
    }

    #[test]
    fn defaults_fill_blank_settings() {
        let (db, session) = setup();
        configure(&db, session.user_id, "sk-test", "", "");

        let creds = Credentials::load(&db, session.user_id).unwrap();
        assert_eq!(creds.base_url, DEFAULT_BASE_URL);
        assert_eq!(creds.model, DEFAULT_MODEL);
        assert_eq!(creds.endpoint(), "https://api.deepseek.com/chat/completions");
    }

    #[test]
    fn custom_endpoint_drops_trailing_slash() {
        let (db, session) = setup();
        configure(&db, session.user_id, "sk-test", "http://localhost:8080/v1/", "local");

        let creds = Credentials::load(&db, session.user_id).unwrap();
        assert_eq!(creds.endpoint(), "http://localhost:8080/v1/chat/completions");
        assert_eq!(creds.model, "local");
    }

    #[test]
    fn prompt_carries_context_first() {
        assert_eq!(user_message("ctx", "fix it"), "Context: ctx\n\nRequest: fix it");
    }

    #[tokio::test]
    async fn transport_failure_is_reported_not_raised() {
        let (db, session) = setup();
        // Nothing listens on port 9 of localhost in a test sandbox.
        configure(&db, session.user_id, "sk-test", "http://127.0.0.1:9", "m");
        let client = AssistClient::new(Duration::from_secs(2)).unwrap();
        let req = AssistRequest { prompt: "p".into(), context: "c".into() };

        let err = assist(&db, &client, &session, &req).await.unwrap_err();
        assert!(matches!(err, AppError::ExternalService(ref m) if m.starts_with("AI request failed")));
    }

    async fn serve(app: axum::Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{}", addr)
    }

    fn mock_provider() -> axum::Router {
        use axum::http::{HeaderMap, StatusCode, header};
        use axum::routing::post;
        use serde_json::{Value, json};

        axum::Router::new()
            .route(
                "/ok/chat/completions",
                post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                    let authorized = headers
                        .get(header::AUTHORIZATION)
                        .and_then(|v| v.to_str().ok())
                        == Some("Bearer sk-test");
                    let well_formed = body["model"] == "m"
                        && body["stream"] == false
                        && body["messages"][0]["role"] == "system"
                        && body["messages"][0]["content"] == SYSTEM_PROMPT
                        && body["messages"][1]["role"] == "user"
                        && body["messages"][1]["content"] == "Context: ch1\n\nRequest: polish";
                    if authorized && well_formed {
                        (StatusCode::OK, Json(json!({ "choices": [{ "message": { "content": "polished" } }] })))
                    } else {
                        (StatusCode::BAD_REQUEST, Json(json!({ "error": "unexpected request" })))
                    }
                }),
            )
            .route(
                "/denied/chat/completions",
                post(|| async { (StatusCode::UNAUTHORIZED, "bad key") }),
            )
    }

    fn creds(base_url: String) -> Credentials {
        Credentials { api_key: "sk-test".into(), base_url, model: "m".into() }
    }

    #[tokio::test]
    async fn completion_returns_first_choice_text() {
        let base = serve(mock_provider()).await;
        let client = AssistClient::new(Duration::from_secs(5)).unwrap();

        let result = client.complete(&creds(format!("{base}/ok")), "ch1", "polish").await;
        assert_eq!(result.unwrap(), "polished");
    }

    #[tokio::test]
    async fn provider_rejection_is_an_external_service_error() {
        let base = serve(mock_provider()).await;
        let client = AssistClient::new(Duration::from_secs(5)).unwrap();

        let err = client.complete(&creds(format!("{base}/denied")), "ch1", "polish").await.unwrap_err();
        assert!(matches!(err, AppError::ExternalService(ref m) if m == "AI provider error: 401 bad key"));
    }
}
