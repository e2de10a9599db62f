//! Error types for CDE

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CdeError {
    #[error("no baseline document resolves for scope {scope} (looked for {})", path.display())]
    ConfigNotFound { scope: String, path: PathBuf },

    #[error("baseline document {} is invalid: {reason}", path.display())]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("invalid input: {0}")]
    InputInvalid(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CdeError>;

impl CdeError {
    pub fn config_invalid(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn input_invalid(reason: impl Into<String>) -> Self {
        Self::InputInvalid(reason.into())
    }

    /// Failures the caller caused (malformed turn or scope key)
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InputInvalid(_))
    }

    /// Short machine-readable tag, used in partial-failure reports
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigNotFound { .. } => "config_not_found",
            Self::ConfigInvalid { .. } => "config_invalid",
            Self::InputInvalid(_) => "input_invalid",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
        }
    }
}
