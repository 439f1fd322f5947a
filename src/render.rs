//! Transcript rendering.
//!
//! Turns resolved entries into a UTF-8 document. Rendering is pure: the same
//! entries and options always produce byte-identical output.
//!
//! The text format is one line per message:
//!
//! ```text
//! [2024-03-01 18:04:11] +491701234567: See you at 8 (attachment: photo.jpg)
//! ```

use chrono::{Local, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};

use crate::error::{ExportError, Result};
use crate::models::{AttachmentDescriptor, AttachmentStatus, Body, OutputFormat, ResolvedEntry, Sender};

/// Timestamp layout used in every format
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Shown in place of a timestamp the store does not have
pub const UNKNOWN_TIME: &str = "unknown time";

/// Placeholder body for messages that carry only attachments
pub const ATTACHMENT_ONLY_BODY: &str = "(attachment)";

/// Zone timestamps are rendered in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TimestampZone {
    /// The machine's local zone
    #[default]
    Local,
    /// UTC
    Utc,
}

/// How a transcript is rendered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    /// Label for messages sent by the device owner
    pub owner_label: String,
    /// Zone for timestamps
    pub zone: TimestampZone,
    /// Document format
    pub format: OutputFormat,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            owner_label: "Me".to_string(),
            zone: TimestampZone::Local,
            format: OutputFormat::Txt,
        }
    }
}

/// Render the entries in the configured format
pub fn render(entries: &[ResolvedEntry], options: &RenderOptions) -> Result<String> {
    match options.format {
        OutputFormat::Txt => Ok(render_txt(entries, options)),
        OutputFormat::Csv => render_csv(entries, options),
        OutputFormat::Json => render_json(entries, options),
    }
}

/// Format a calendar time in the given zone
#[must_use]
pub fn format_timestamp(timestamp: Option<NaiveDateTime>, zone: TimestampZone) -> String {
    match (timestamp, zone) {
        (None, _) => UNKNOWN_TIME.to_string(),
        (Some(ts), TimestampZone::Utc) => ts.format(TIMESTAMP_FORMAT).to_string(),
        (Some(ts), TimestampZone::Local) => Local.from_utc_datetime(&ts).format(TIMESTAMP_FORMAT).to_string(),
    }
}

/// Parenthesized note for one attachment
#[must_use]
pub fn attachment_note(attachment: &AttachmentDescriptor) -> String {
    match attachment.status {
        AttachmentStatus::Found(_) => format!("(attachment: {})", attachment.destination_name),
        AttachmentStatus::Missing => format!("(missing attachment: {})", attachment.original_name),
        AttachmentStatus::NotExported => {
            format!("(attachment not exported: {})", attachment.original_name)
        },
    }
}

fn body_text(body: &Body) -> &str {
    match body {
        Body::Text(text) => text,
        Body::AttachmentOnly => ATTACHMENT_ONLY_BODY,
        Body::Empty => "",
    }
}

/// Keep a message on one physical line
fn escape_line_breaks(text: &str) -> String {
    text.replace('\n', "\\n")
}

fn render_txt(entries: &[ResolvedEntry], options: &RenderOptions) -> String {
    let mut out = String::new();
    for entry in entries {
        let mut line = format!(
            "[{}] {}:",
            format_timestamp(entry.timestamp, options.zone),
            entry.sender.label(&options.owner_label)
        );
        let body = escape_line_breaks(body_text(&entry.body));
        if !body.is_empty() {
            line.push(' ');
            line.push_str(&body);
        }
        for attachment in &entry.attachments {
            line.push(' ');
            line.push_str(&attachment_note(attachment));
        }
        out.push_str(&line);
        out.push('\n');
    }
    out
}

fn render_csv(entries: &[ResolvedEntry], options: &RenderOptions) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["ID", "Datetime", "Sender", "Message", "Attachments"])?;

    for entry in entries {
        let notes = entry
            .attachments
            .iter()
            .map(attachment_note)
            .collect::<Vec<_>>()
            .join(" ");
        writer.write_record([
            entry.id.to_string().as_str(),
            format_timestamp(entry.timestamp, options.zone).as_str(),
            entry.sender.label(&options.owner_label),
            body_text(&entry.body),
            notes.as_str(),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ExportError::Render(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| ExportError::Render(e.to_string()))
}

fn render_json(entries: &[ResolvedEntry], options: &RenderOptions) -> Result<String> {
    let messages: Vec<serde_json::Value> = entries
        .iter()
        .map(|entry| {
            let attachments: Vec<serde_json::Value> = entry
                .attachments
                .iter()
                .map(|a| {
                    let file = match a.status {
                        AttachmentStatus::Found(_) => Some(a.destination_name.as_str()),
                        AttachmentStatus::Missing | AttachmentStatus::NotExported => None,
                    };
                    serde_json::json!({
                        "name": a.original_name,
                        "file": file,
                        "mime_type": a.mime_type,
                        "missing": a.status == AttachmentStatus::Missing,
                    })
                })
                .collect();
            let text = match &entry.body {
                Body::Text(text) => Some(text.as_str()),
                Body::AttachmentOnly | Body::Empty => None,
            };
            serde_json::json!({
                "id": entry.id,
                "timestamp": format_timestamp(entry.timestamp, options.zone),
                "sender": entry.sender.label(&options.owner_label),
                "from_me": entry.sender == Sender::Owner,
                "text": text,
                "attachments": attachments,
            })
        })
        .collect();

    let mut out = serde_json::to_string_pretty(&messages)?;
    out.push('\n');
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::path::PathBuf;

    fn ts(h: u32, m: u32, s: u32) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(2024, 3, 1).and_then(|d| d.and_hms_opt(h, m, s))
    }

    fn utc() -> RenderOptions {
        RenderOptions {
            zone: TimestampZone::Utc,
            ..RenderOptions::default()
        }
    }

    fn photo(status: AttachmentStatus) -> AttachmentDescriptor {
        AttachmentDescriptor {
            attachment_id: 4,
            message_id: 3,
            original_name: "photo.jpg".to_string(),
            destination_name: "3_photo.jpg".to_string(),
            mime_type: Some("image/jpeg".to_string()),
            status,
        }
    }

    fn sample() -> Vec<ResolvedEntry> {
        vec![
            ResolvedEntry {
                id: 1,
                timestamp: ts(18, 0, 0),
                sender: Sender::Owner,
                body: Body::Text("line one\nline two".to_string()),
                attachments: Vec::new(),
            },
            ResolvedEntry {
                id: 2,
                timestamp: ts(18, 1, 0),
                sender: Sender::Handle {
                    identifier: "+491701234567".to_string(),
                    display_name: None,
                },
                body: Body::Empty,
                attachments: Vec::new(),
            },
            ResolvedEntry {
                id: 3,
                timestamp: None,
                sender: Sender::Handle {
                    identifier: "+491701234567".to_string(),
                    display_name: None,
                },
                body: Body::AttachmentOnly,
                attachments: vec![photo(AttachmentStatus::Found(PathBuf::from("/b/photo.jpg")))],
            },
        ]
    }

    #[test]
    fn test_txt_lines() {
        let text = render(&sample(), &utc()).unwrap();
        assert_eq!(
            text,
            "[2024-03-01 18:00:00] Me: line one\\nline two\n\
             [2024-03-01 18:01:00] +491701234567:\n\
             [unknown time] +491701234567: (attachment) (attachment: 3_photo.jpg)\n"
        );
    }

    #[test]
    fn test_attachment_notes() {
        assert_eq!(attachment_note(&photo(AttachmentStatus::Missing)), "(missing attachment: photo.jpg)");
        assert_eq!(
            attachment_note(&photo(AttachmentStatus::NotExported)),
            "(attachment not exported: photo.jpg)"
        );
    }

    #[test]
    fn test_render_is_deterministic() {
        let options = utc();
        assert_eq!(render(&sample(), &options).unwrap(), render(&sample(), &options).unwrap());
    }

    #[test]
    fn test_csv_has_header_and_rows() {
        let options = RenderOptions {
            format: OutputFormat::Csv,
            ..utc()
        };
        let csv = render(&sample(), &options).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("ID,Datetime,Sender,Message,Attachments"));
        assert!(csv.contains("3,unknown time,+491701234567,(attachment),(attachment: 3_photo.jpg)"));
    }

    #[test]
    fn test_json_structure() {
        let options = RenderOptions {
            format: OutputFormat::Json,
            ..utc()
        };
        let json: serde_json::Value = serde_json::from_str(&render(&sample(), &options).unwrap()).unwrap();
        assert_eq!(json.as_array().map(Vec::len), Some(3));
        assert_eq!(json[0]["from_me"], true);
        assert_eq!(json[1]["text"], serde_json::Value::Null);
        assert_eq!(json[2]["attachments"][0]["file"], "3_photo.jpg");
    }
}
