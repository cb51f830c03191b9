use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DmmError {
    #[error("Manifest not found at '{}': {reason}", .path.display())]
    ManifestNotFound { path: PathBuf, reason: String },

    #[error("No matching modules in the manifest for: {}", .requested.join(", "))]
    NoMatchingModules { requested: Vec<String> },

    #[error("Failed to resolve '{module}': {reason}")]
    Resolution { module: String, reason: String },

    #[error("Module registry error: {0}")]
    Registry(String),

    #[error("{url} is unavailable: {reason}")]
    Unavailable { url: String, reason: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl DmmError {
    pub fn resolution(module: impl Into<String>, reason: impl Into<String>) -> Self {
        DmmError::Resolution {
            module: module.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DmmError>;
