//! Unified client error model.
//! Every component returns `AppError`; the variant tells the caller how to react:
//! an inline validation message, a sign-in redirect, the server's own words, or a
//! generic retry notice.

use serde::{Deserialize, Serialize};

/// Text shown for infrastructure failures. The underlying detail goes to the log.
pub const GENERIC_RETRY_MESSAGE: &str = "Something went wrong. Please try again.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    /// Rejected locally before any network call.
    #[error("{code}: {message}")]
    Validation { code: String, message: String },
    /// Missing, expired or invalid credential.
    #[error("{code}: {message}")]
    Auth { code: String, message: String },
    /// Well-formed request the server refused (duplicate email, booking conflict, ...).
    #[error("{code}: {message}")]
    Business { code: String, message: String },
    /// Network failure, timeout or server-side outage.
    #[error("{code}: {message}")]
    Transport { code: String, message: String },
    /// The server answered with something that does not match the operation's shape.
    #[error("{code}: {message}")]
    Malformed { code: String, message: String },
    /// Local credential persistence failed.
    #[error("{code}: {message}")]
    Storage { code: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Auth,
    Business,
    Transport,
    Malformed,
    Storage,
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation { .. } => ErrorKind::Validation,
            AppError::Auth { .. } => ErrorKind::Auth,
            AppError::Business { .. } => ErrorKind::Business,
            AppError::Transport { .. } => ErrorKind::Transport,
            AppError::Malformed { .. } => ErrorKind::Malformed,
            AppError::Storage { .. } => ErrorKind::Storage,
        }
    }

    pub fn code_str(&self) -> &str {
        match self {
            AppError::Validation { code, .. }
            | AppError::Auth { code, .. }
            | AppError::Business { code, .. }
            | AppError::Transport { code, .. }
            | AppError::Malformed { code, .. }
            | AppError::Storage { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::Validation { message, .. }
            | AppError::Auth { message, .. }
            | AppError::Business { message, .. }
            | AppError::Transport { message, .. }
            | AppError::Malformed { message, .. }
            | AppError::Storage { message, .. } => message.as_str(),
        }
    }

    pub fn validation(code: impl Into<String>, msg: impl Into<String>) -> Self { AppError::Validation { code: code.into(), message: msg.into() } }
    pub fn auth(code: impl Into<String>, msg: impl Into<String>) -> Self { AppError::Auth { code: code.into(), message: msg.into() } }
    pub fn business(code: impl Into<String>, msg: impl Into<String>) -> Self { AppError::Business { code: code.into(), message: msg.into() } }
    pub fn transport(code: impl Into<String>, msg: impl Into<String>) -> Self { AppError::Transport { code: code.into(), message: msg.into() } }
    pub fn malformed(code: impl Into<String>, msg: impl Into<String>) -> Self { AppError::Malformed { code: code.into(), message: msg.into() } }
    pub fn storage(code: impl Into<String>, msg: impl Into<String>) -> Self { AppError::Storage { code: code.into(), message: msg.into() } }

    pub fn is_auth(&self) -> bool { matches!(self, AppError::Auth { .. }) }

    /// Transport and malformed-response failures may succeed on a later attempt.
    /// Nothing in this crate retries automatically; callers decide.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Transport { .. } | AppError::Malformed { .. })
    }

    /// Message suitable for a banner or an inline form error.
    pub fn user_facing(&self) -> String {
        match self {
            AppError::Validation { message, .. }
            | AppError::Auth { message, .. }
            | AppError::Business { message, .. } => message.clone(),
            AppError::Transport { .. } | AppError::Malformed { .. } | AppError::Storage { .. } => {
                GENERIC_RETRY_MESSAGE.to_string()
            }
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::transport("timeout", err.to_string())
        } else if err.is_connect() {
            AppError::transport("connect", err.to_string())
        } else if err.is_decode() {
            AppError::malformed("decode", err.to_string())
        } else {
            AppError::transport("http", err.to_string())
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::malformed("json", err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::storage("io", err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::transport("internal", err.to_string())
    }
}
