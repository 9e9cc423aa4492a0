use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use thiserror::Error;
use tracing::{error, warn};

use quill_db::Conflict;

use crate::flash::{Flash, Level, Pending};
use crate::views;

/// Failure taxonomy shared by every operation.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("please log in first")]
    AuthenticationRequired,

    #[error("permission denied")]
    AuthorizationDenied,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("please configure your AI settings first")]
    ConfigurationMissing,

    #[error("{0}")]
    ExternalService(String),

    #[error("internal error")]
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast_ref::<Conflict>() {
            Some(conflict) => AppError::Validation(conflict.to_string()),
            None => AppError::Internal(err),
        }
    }
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    /// Text safe to show a client. Storage faults are logged, not echoed.
    pub fn public_message(&self) -> String {
        if let AppError::Internal(e) = self {
            error!("Internal error: {:#}", e);
        }
        self.to_string()
    }
}

/// A failed page request: the error plus the page to send the user back to.
#[derive(Debug)]
pub struct PageError {
    pub error: AppError,
    pub back: String,
}

impl From<AppError> for PageError {
    fn from(error: AppError) -> Self {
        PageError { error, back: "/".into() }
    }
}

pub trait OrBack<T> {
    /// Attach the redirect target used when the error is shown as a flash.
    fn or_back(self, back: impl Into<String>) -> Result<T, PageError>;
}

impl<T> OrBack<T> for Result<T, AppError> {
    fn or_back(self, back: impl Into<String>) -> Result<T, PageError> {
        self.map_err(|error| PageError { error, back: back.into() })
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let flash_back = |level: Level, msg: String, to: &str| {
            let mut resp = Redirect::to(to).into_response();
            resp.extensions_mut().insert(Pending(vec![Flash::new(level, msg)]));
            resp
        };

        match self.error {
            AppError::AuthenticationRequired => {
                flash_back(Level::Warning, self.error.to_string(), "/login")
            }
            AppError::AuthorizationDenied => {
                warn!("Authorization denied; redirecting to {}", self.back);
                flash_back(Level::Danger, self.error.to_string(), self.back.as_str())
            }
            AppError::Validation(_) | AppError::ConfigurationMissing | AppError::ExternalService(_) => {
                flash_back(Level::Danger, self.error.to_string(), self.back.as_str())
            }
            AppError::NotFound(what) => {
                (StatusCode::NOT_FOUND, Html(views::not_found(what))).into_response()
            }
            AppError::Internal(e) => {
                error!("Internal error: {:#}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, Html(views::internal_error())).into_response()
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        PageError::from(self).into_response()
    }
}
