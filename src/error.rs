//! Error types for the sms-transcript-export library.
//!
//! This module provides the export error taxonomy using `thiserror`. Store-level
//! errors abort a run; every other variant is scoped to a single contact (or a
//! single attachment) and is collected into the run summary instead.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while exporting transcripts.
#[derive(Error, Debug)]
pub enum ExportError {
    /// The message store is missing, unreadable, or has the wrong schema shape
    #[error("Message store unavailable at {path}: {reason}")]
    StoreUnavailable {
        /// Path that was opened
        path: PathBuf,
        /// What went wrong
        reason: String,
    },

    /// A contact string that is empty after trimming
    #[error("Invalid contact format: {0:?}")]
    InvalidContactFormat(String),

    /// No handle matches the normalized identifier
    #[error("Contact not found: {0}")]
    ContactNotFound(String),

    /// Handles matched but their chats hold no messages
    #[error("No messages found for contact: {0}")]
    EmptyThread(String),

    /// Referenced attachment file is absent from the backup
    #[error("Attachment {attachment_id} of message {message_id} missing on disk: {token}")]
    AttachmentMissing {
        /// Owning message
        message_id: i64,
        /// Attachment row id
        attachment_id: i64,
        /// Raw path token from the store
        token: String,
    },

    /// Output already exists and overwrite is disabled
    #[error("Destination already exists: {}", .0.display())]
    DestinationConflict(PathBuf),

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Transcript encoding errors
    #[error("Render error: {0}")]
    Render(String),
}

impl ExportError {
    /// Short stable name used in log fields and metric labels
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::StoreUnavailable { .. } => "store_unavailable",
            Self::InvalidContactFormat(_) => "invalid_contact_format",
            Self::ContactNotFound(_) => "contact_not_found",
            Self::EmptyThread(_) => "empty_thread",
            Self::AttachmentMissing { .. } => "attachment_missing",
            Self::DestinationConflict(_) => "destination_conflict",
            Self::Database(_) => "database",
            Self::Io(_) => "io",
            Self::Render(_) => "render",
        }
    }

    /// True for failures that happen before anything is rendered for a contact
    #[must_use]
    pub const fn is_resolution_failure(&self) -> bool {
        matches!(
            self,
            Self::InvalidContactFormat(_) | Self::ContactNotFound(_) | Self::EmptyThread(_)
        )
    }

    /// True for failures of the message store itself, which end the whole run
    #[must_use]
    pub const fn is_store_failure(&self) -> bool {
        matches!(self, Self::StoreUnavailable { .. } | Self::Database(_))
    }

    pub(crate) fn store_unavailable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::StoreUnavailable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Convenience type alias for Result with ExportError
pub type Result<T> = std::result::Result<T, ExportError>;

impl From<csv::Error> for ExportError {
    fn from(err: csv::Error) -> Self {
        Self::Render(err.to_string())
    }
}

impl From<serde_json::Error> for ExportError {
    fn from(err: serde_json::Error) -> Self {
        Self::Render(err.to_string())
    }
}
