//! Thread assembly.
//!
//! Merges the messages of every chat in a contact's resolution into one
//! sequence ordered by `(timestamp, message id)`, labels each with its
//! sender, and attaches the stored attachment references. Every message row
//! yields exactly one entry.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::db::MessageSource;
use crate::error::Result;
use crate::models::{apple_timestamp_to_datetime, AttachmentRow, Body, MessageRow, Sender, ThreadEntry};

/// Object replacement character iOS puts in `text` where inline media sat
const OBJECT_REPLACEMENT: char = '\u{fffc}';

/// Fetch, merge, and order all messages of the given chats
pub fn assemble_thread<S>(source: &S, chat_ids: &BTreeSet<i64>) -> Result<Vec<ThreadEntry>>
where
    S: MessageSource + ?Sized,
{
    if chat_ids.is_empty() {
        return Ok(Vec::new());
    }

    let chat_ids: Vec<i64> = chat_ids.iter().copied().collect();
    let rows = source.messages_for_chats(&chat_ids)?;

    let message_ids: Vec<i64> = rows.iter().map(|m| m.id).collect();
    let mut attachments_by_message: BTreeMap<i64, Vec<AttachmentRow>> = BTreeMap::new();
    if !message_ids.is_empty() {
        for (message_id, attachment) in source.attachments_for_messages(&message_ids)? {
            attachments_by_message.entry(message_id).or_default().push(attachment);
        }
    }

    let mut entries: Vec<ThreadEntry> = rows
        .into_iter()
        .map(|row| {
            let attachments = attachments_by_message.remove(&row.id).unwrap_or_default();
            build_entry(row, attachments)
        })
        .collect();
    entries.sort_unstable();

    debug!(
        chats = chat_ids.len(),
        entries = entries.len(),
        "Assembled thread"
    );
    Ok(entries)
}

fn build_entry(row: MessageRow, attachments: Vec<AttachmentRow>) -> ThreadEntry {
    let sender = if row.is_from_me {
        Sender::Owner
    } else {
        match row.sender_identifier {
            Some(identifier) if !identifier.trim().is_empty() => Sender::Handle {
                identifier,
                display_name: row.sender_display_name.filter(|n| !n.trim().is_empty()),
            },
            _ => Sender::Unknown,
        }
    };

    ThreadEntry {
        id: row.id,
        chat_id: row.chat_id,
        timestamp: apple_timestamp_to_datetime(row.date),
        sender,
        body: clean_body(row.text.as_deref(), !attachments.is_empty()),
        attachments,
    }
}

/// Normalize line endings and drop inline-media markers
fn clean_body(text: Option<&str>, has_attachments: bool) -> Body {
    let cleaned: String = text
        .unwrap_or_default()
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .chars()
        .filter(|c| *c != OBJECT_REPLACEMENT)
        .collect();

    if !cleaned.trim().is_empty() {
        Body::Text(cleaned)
    } else if has_attachments {
        Body::AttachmentOnly
    } else {
        Body::Empty
    }
}
