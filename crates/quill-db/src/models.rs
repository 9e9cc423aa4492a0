//! Database row types, mapped directly from SQLite rows.
//! Distinct from quill-types payloads to keep the DB layer independent.
use quill_types::models::{NovelStatus, Role};

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NovelRow {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub cover_image: String,
    pub author_id: i64,
    pub author_username: String,
    pub status: NovelStatus,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct ChapterRow {
    pub id: i64,
    pub novel_id: i64,
    pub title: String,
    pub content: String,
    pub author_note: String,
    pub chapter_number: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct CommentRow {
    pub id: i64,
    pub content: String,
    pub user_id: i64,
    pub username: String,
    pub novel_id: i64,
    pub chapter_id: Option<i64>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct DraftRow {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub novel_id: i64,
    pub user_id: i64,
    pub is_published: bool,
    pub chapter_number: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct SettingsRow {
    pub user_id: i64,
    pub nickname: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub openai_model: Option<String>,
    pub updated_at: String,
}

/// Fields a novel edit may change.
#[derive(Debug, Clone)]
pub struct NovelUpdate<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub status: NovelStatus,
    pub cover_image: &'a str,
}

/// Fields a chapter create or edit supplies.
#[derive(Debug, Clone)]
pub struct ChapterDraft<'a> {
    pub title: &'a str,
    pub content: &'a str,
    pub author_note: &'a str,
}

/// AI credentials and nickname as submitted from the settings page.
/// `nickname: None` leaves the stored nickname alone.
#[derive(Debug, Clone)]
pub struct SettingsUpdate<'a> {
    pub nickname: Option<&'a str>,
    pub openai_api_key: &'a str,
    pub openai_base_url: &'a str,
    pub openai_model: &'a str,
}
