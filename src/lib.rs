//! SMS Transcript Export
//!
//! Reads the `sms.db` message store from an iOS device backup and writes one
//! chronological plain-text transcript per requested contact, optionally with
//! the contact's media files copied alongside.
//!
//! # Pipeline
//!
//! - Resolve each contact's identifiers to handles and chats
//! - Merge every chat into one ordered thread
//! - Locate attachments inside the backup
//! - Render TXT, CSV, or JSON and persist it under the output directory
//!
//! The store is only ever opened read-only.

/// Attachment location and destination naming
pub mod attachments;
/// Configuration management
pub mod config;
/// Read-only access to the message store
pub mod db;
/// Error types
pub mod error;
/// Per-contact pipeline and run summary
pub mod export;
/// Transcript persistence
pub mod file_writer;
/// Contact identifier parsing and normalization
pub mod identifier;
/// Logging setup and utilities
pub mod logging;
/// Metrics collection
pub mod metrics;
/// Data models and structures
pub mod models;
/// Transcript rendering
pub mod render;
/// Contact resolution
pub mod resolver;
/// Message store schema names
pub mod schema;
/// Thread assembly
pub mod thread;
/// Filename helpers
pub mod utils;
/// Input validation
pub mod validation;

// Re-export key components for easier access
pub use db::{MessageSource, MessageStore};
pub use error::{ExportError, Result};
pub use export::{export_contact, run_export, ContactExport, ExportOptions, RunSummary};
pub use file_writer::TranscriptWriter;
pub use identifier::ContactIdentifier;
pub use models::OutputFormat;
pub use render::{RenderOptions, TimestampZone};
pub use resolver::ContactRequest;
