//! Data models for message store rows and resolved transcript entries
//!
//! Rows mirror the `sms.db` tables one to one and are never mutated. The
//! derived types (`ThreadEntry`, `ResolvedEntry`) live only for the duration
//! of one contact's export.

use std::cmp::Ordering;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Seconds between the Unix epoch and the Apple epoch (2001-01-01 UTC)
pub const APPLE_EPOCH_OFFSET_SECS: i64 = 978_307_200;

/// Store values above this are nanoseconds, below it seconds
const NANOSECOND_THRESHOLD: i64 = 1_000_000_000_000;

/// Convert a store-native timestamp to a UTC calendar date-time.
///
/// iOS stores nanoseconds since 2001-01-01 on current releases and seconds on
/// older ones. Zero and NULL mean the time is unknown.
#[must_use]
pub fn apple_timestamp_to_datetime(value: Option<i64>) -> Option<NaiveDateTime> {
    let value = value.filter(|v| *v != 0)?;
    let (secs, nanos) = if value > NANOSECOND_THRESHOLD {
        (value.div_euclid(1_000_000_000), value.rem_euclid(1_000_000_000))
    } else {
        (value, 0)
    };
    let nanos = u32::try_from(nanos).ok()?;
    DateTime::from_timestamp(secs.checked_add(APPLE_EPOCH_OFFSET_SECS)?, nanos).map(|dt| dt.naive_utc())
}

/// A communication endpoint as known to the backup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleRow {
    /// `handle.ROWID`
    pub id: i64,
    /// Raw phone number or email string
    pub identifier: String,
    /// Display name, when the store carries one
    pub display_name: Option<String>,
}

/// A conversation thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRow {
    /// `chat.ROWID`
    pub id: i64,
    /// Group or custom name
    pub display_name: Option<String>,
}

/// One message row joined with its chat and originating handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRow {
    /// `message.ROWID`
    pub id: i64,
    /// Owning chat
    pub chat_id: i64,
    /// Originating handle, `None` for outgoing messages
    pub handle_id: Option<i64>,
    /// Raw identifier of the originating handle
    pub sender_identifier: Option<String>,
    /// Display name of the originating handle, when the store carries one
    pub sender_display_name: Option<String>,
    /// Store-native timestamp
    pub date: Option<i64>,
    /// Body text
    pub text: Option<String>,
    /// Sent by the device owner
    pub is_from_me: bool,
}

/// A media file reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentRow {
    /// `attachment.ROWID`
    pub id: i64,
    /// On-backup path token
    pub filename: Option<String>,
    /// Original file name
    pub transfer_name: Option<String>,
    /// MIME type hint
    pub mime_type: Option<String>,
}

impl AttachmentRow {
    /// Best human-facing name for this attachment
    #[must_use]
    pub fn original_name(&self) -> String {
        self.transfer_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .map(str::to_string)
            .or_else(|| {
                self.filename
                    .as_deref()
                    .and_then(|f| f.rsplit(['/', '\\']).next())
                    .filter(|n| !n.is_empty())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| format!("attachment_{}", self.id))
    }
}

/// Who sent a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sender {
    /// The device owner
    Owner,
    /// A correspondent handle
    Handle {
        /// Raw phone number or email
        identifier: String,
        /// Friendlier name, passed through from the store
        display_name: Option<String>,
    },
    /// Incoming message without a handle row
    Unknown,
}

impl Sender {
    /// Label shown in the transcript
    #[must_use]
    pub fn label<'a>(&'a self, owner_label: &'a str) -> &'a str {
        match self {
            Self::Owner => owner_label,
            Self::Handle {
                display_name: Some(name),
                ..
            } => name,
            Self::Handle { identifier, .. } => identifier,
            Self::Unknown => "Unknown",
        }
    }
}

/// Message body after cleanup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// Non-empty text
    Text(String),
    /// No text, one or more attachments
    AttachmentOnly,
    /// No text and no attachment
    Empty,
}

/// A message placed in its thread, before attachment resolution
#[derive(Debug, Clone)]
pub struct ThreadEntry {
    /// `message.ROWID`
    pub id: i64,
    /// Owning chat
    pub chat_id: i64,
    /// Calendar time, `None` when the store has no usable date
    pub timestamp: Option<NaiveDateTime>,
    /// Sender identity
    pub sender: Sender,
    /// Body text or placeholder
    pub body: Body,
    /// Linked attachments in stored order
    pub attachments: Vec<AttachmentRow>,
}

impl ThreadEntry {
    /// Total order key: unknown times first, ties broken by id
    #[must_use]
    pub const fn order_key(&self) -> (Option<NaiveDateTime>, i64) {
        (self.timestamp, self.id)
    }
}

impl PartialEq for ThreadEntry {
    fn eq(&self, other: &Self) -> bool {
        self.order_key() == other.order_key()
    }
}

impl Eq for ThreadEntry {}

impl PartialOrd for ThreadEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ThreadEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.order_key().cmp(&other.order_key())
    }
}

/// Where an attachment stands after resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentStatus {
    /// File located on the backup
    Found(PathBuf),
    /// File referenced but absent
    Missing,
    /// No attachments root configured, existence not checked
    NotExported,
}

/// An attachment with its source location and collision-free destination name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentDescriptor {
    /// `attachment.ROWID`
    pub attachment_id: i64,
    /// Owning message
    pub message_id: i64,
    /// Name as sent
    pub original_name: String,
    /// Name in the export's attachments directory
    pub destination_name: String,
    /// MIME type hint
    pub mime_type: Option<String>,
    /// Resolution outcome
    pub status: AttachmentStatus,
}

/// A fully resolved transcript entry, consumed once by the renderer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEntry {
    /// `message.ROWID`
    pub id: i64,
    /// Calendar time
    pub timestamp: Option<NaiveDateTime>,
    /// Sender identity
    pub sender: Sender,
    /// Body text or placeholder
    pub body: Body,
    /// Resolved attachments in stored order
    pub attachments: Vec<AttachmentDescriptor>,
}

/// Output format for exported transcripts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Plain text format
    #[default]
    Txt,
    /// Comma-separated values format
    Csv,
    /// JSON format
    Json,
}

impl OutputFormat {
    /// Get the file extension for this format
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Txt => "txt",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "txt" | "text" => Ok(Self::Txt),
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|date| date.and_hms_opt(h, min, s))
            .unwrap()
    }

    #[test]
    fn test_apple_timestamp_seconds() {
        assert_eq!(apple_timestamp_to_datetime(Some(1)), Some(at(2001, 1, 1, 0, 0, 1)));
    }

    #[test]
    fn test_apple_timestamp_nanoseconds() {
        // 2025-01-01 00:00:00 UTC
        let ns = 757_382_400_000_000_000_i64;
        assert_eq!(apple_timestamp_to_datetime(Some(ns)), Some(at(2025, 1, 1, 0, 0, 0)));
        assert_eq!(apple_timestamp_to_datetime(Some(757_382_400)), Some(at(2025, 1, 1, 0, 0, 0)));
    }

    #[test]
    fn test_apple_timestamp_unknown() {
        assert_eq!(apple_timestamp_to_datetime(None), None);
        assert_eq!(apple_timestamp_to_datetime(Some(0)), None);
    }

    #[test]
    fn test_original_name_fallbacks() {
        let mut row = AttachmentRow {
            id: 9,
            filename: Some("~/Library/SMS/Attachments/ab/11/GUID/IMG_0001.jpg".to_string()),
            transfer_name: Some("photo.jpg".to_string()),
            mime_type: None,
        };
        assert_eq!(row.original_name(), "photo.jpg");
        row.transfer_name = None;
        assert_eq!(row.original_name(), "IMG_0001.jpg");
        row.filename = None;
        assert_eq!(row.original_name(), "attachment_9");
    }

    #[test]
    fn test_sender_labels() {
        let handle = Sender::Handle {
            identifier: "+491701234567".to_string(),
            display_name: None,
        };
        assert_eq!(Sender::Owner.label("Me"), "Me");
        assert_eq!(handle.label("Me"), "+491701234567");
        assert_eq!(Sender::Unknown.label("Me"), "Unknown");
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("TXT".parse::<OutputFormat>(), Ok(OutputFormat::Txt));
        assert_eq!("json".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert!("pdf".parse::<OutputFormat>().is_err());
    }
}
