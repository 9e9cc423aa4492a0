use std::num::ParseIntError;

use serde::{Deserialize, Serialize};

// -- Auth --

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

// -- Novels --

#[derive(Debug, Deserialize)]
pub struct NewNovelForm {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub cover_image: String,
}

#[derive(Debug, Deserialize)]
pub struct EditNovelForm {
    pub title: String,
    pub description: String,
    pub status: String,
    #[serde(default)]
    pub cover_image: String,
}

// -- Chapters --

#[derive(Debug, Deserialize)]
pub struct ChapterForm {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub author_note: String,
}

// -- Comments --

/// HTML forms post an empty `chapter_id` when the comment is on the novel itself.
#[derive(Debug, Deserialize)]
pub struct CommentForm {
    pub content: String,
    #[serde(default)]
    pub chapter_id: Option<String>,
}

impl CommentForm {
    pub fn chapter_id(&self) -> Result<Option<i64>, ParseIntError> {
        self.chapter_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse)
            .transpose()
    }
}

// -- Admin --

#[derive(Debug, Deserialize)]
pub struct RoleForm {
    pub role: String,
}

// -- Drafts --

/// Autosave body. Absent fields are left untouched.
#[derive(Debug, Default, Deserialize)]
pub struct SaveDraftRequest {
    pub title: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SaveDraftResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SaveDraftResponse {
    pub fn saved(updated_at: String) -> Self {
        Self { success: true, updated_at: Some(updated_at), error: None }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self { success: false, updated_at: None, error: Some(error.into()) }
    }
}

// -- Settings --

#[derive(Debug, Default, Deserialize)]
pub struct SettingsForm {
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
    #[serde(default)]
    pub confirm_password: String,
    #[serde(default)]
    pub openai_api_key: String,
    #[serde(default)]
    pub openai_base_url: String,
    #[serde(default)]
    pub openai_model: String,
}

// -- AI assist --

#[derive(Debug, Default, Deserialize)]
pub struct AssistRequest {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub context: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AssistResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AssistResponse {
    pub fn completed(result: String) -> Self {
        Self { success: true, result: Some(result), error: None }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self { success: false, result: None, error: Some(error.into()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_chapter_id_means_novel_comment() {
        let form = CommentForm { content: "hi".into(), chapter_id: Some(" ".into()) };
        assert_eq!(form.chapter_id(), Ok(None));
        let form = CommentForm { content: "hi".into(), chapter_id: None };
        assert_eq!(form.chapter_id(), Ok(None));
        let form = CommentForm { content: "hi".into(), chapter_id: Some("7".into()) };
        assert_eq!(form.chapter_id(), Ok(Some(7)));
    }

    #[test]
    fn malformed_chapter_id_is_an_error() {
        let form = CommentForm { content: "hi".into(), chapter_id: Some("abc".into()) };
        assert!(form.chapter_id().is_err());
        let form = CommentForm { content: "hi".into(), chapter_id: Some("7x".into()) };
        assert!(form.chapter_id().is_err());
    }

    #[test]
    fn failure_payload_omits_absent_fields() {
        let json = serde_json::to_value(SaveDraftResponse::failed("nope")).unwrap();
        assert_eq!(json, serde_json::json!({ "success": false, "error": "nope" }));

        let json = serde_json::to_value(AssistResponse::completed("text".into())).unwrap();
        assert_eq!(json, serde_json::json!({ "success": true, "result": "text" }));
    }
}
