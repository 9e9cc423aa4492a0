pub mod admin;
pub mod assist;
pub mod auth;
pub mod authoring;
pub mod catalog;
pub mod comments;
pub mod drafts;
pub mod error;
pub mod flash;
pub mod guard;
pub mod middleware;
pub mod router;
pub mod settings;
pub mod views;

pub use router::router;
