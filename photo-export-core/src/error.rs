//! Error taxonomy for the export pipeline.
//!
//! Every adapter and the orchestrator return [`ExportError`]. The orchestrator
//! uses [`ExportError::is_fatal`] to decide whether a failure ends only the
//! current grouping or the whole export.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    /// Credentials invalid, or the subject/account is not accessible.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Fetching or transmitting a single photo failed.
    #[error("Transfer of {file_name} failed: {reason}")]
    Transfer { file_name: String, reason: String },

    /// A folder on the flat-path sink could not be created.
    #[error("Could not create remote folder {path}: {reason}")]
    FolderCreation { path: String, reason: String },

    /// The source provider has no such grouping (e.g. a wall on Instagram).
    #[error("{provider} does not support the {grouping} grouping")]
    UnsupportedGrouping {
        provider: &'static str,
        grouping: String,
    },

    /// The count selector answered outside `[1, available]`.
    #[error("Requested {requested} photos, but only 1..={available} can be transferred")]
    InvalidCount { requested: usize, available: usize },

    /// A provider API answered with a non-success status.
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to write manifest: {0}")]
    Manifest(#[from] std::io::Error),

    #[error("Failed to serialize manifest: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl ExportError {
    /// Fatal errors stop the whole export; everything else only ends the
    /// grouping currently being transferred.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ExportError::Auth(_) | ExportError::FolderCreation { .. }
        )
    }

    pub(crate) fn transfer(file_name: &str, reason: impl ToString) -> Self {
        ExportError::Transfer {
            file_name: file_name.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ExportError>;
