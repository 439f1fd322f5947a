//! Read-only access to the iOS message store (`sms.db`).
//!
//! The store is opened once per run with `SQLITE_OPEN_READ_ONLY` and never
//! written. Its layout is checked up front so that a wrong file fails the run
//! with `StoreUnavailable` instead of surfacing as a query error later.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use rusqlite::types::ValueRef;
use rusqlite::{params, params_from_iter, Connection, OpenFlags, Row};
use tracing::{debug, info};

use crate::error::{ExportError, Result};
use crate::identifier::ContactIdentifier;
use crate::models::{AttachmentRow, ChatRow, HandleRow, MessageRow};
use crate::schema::{
    attachment, chat, chat_handle_join, chat_message_join, handle, message, message_attachment_join,
    REQUIRED_COLUMNS,
};

/// Upper bound on ids bound into a single `IN (...)` clause
const MAX_BOUND_IDS: usize = 500;

/// Typed queries over the message store.
///
/// Every method reflects the same read-only snapshot. Implemented by
/// [`MessageStore`]; the export pipeline only depends on this trait.
#[cfg_attr(test, mockall::automock)]
pub trait MessageSource {
    /// Handles whose stored identifier (phone/email) or display name (name)
    /// normalizes to `identifier`
    fn handles_by_identifier(&self, identifier: &ContactIdentifier) -> Result<Vec<HandleRow>>;

    /// Chats the handle is a member of
    fn chats_for_handle(&self, handle_id: i64) -> Result<Vec<ChatRow>>;

    /// Every message in the given chats, each once, in `(date, ROWID)` order per batch
    fn messages_for_chats(&self, chat_ids: &[i64]) -> Result<Vec<MessageRow>>;

    /// `(message_id, attachment)` links for the given messages in stored order
    fn attachments_for_messages(&self, message_ids: &[i64]) -> Result<Vec<(i64, AttachmentRow)>>;
}

/// Read-only connection to an `sms.db`
#[derive(Debug)]
pub struct MessageStore {
    conn: Connection,
    path: PathBuf,
    handle_display_names: bool,
}

impl MessageStore {
    /// Open the store read-only and verify its schema
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(ExportError::store_unavailable(path, "file does not exist"));
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| ExportError::store_unavailable(path, e))?;

        let handle_display_names =
            Self::verify_schema(&conn).map_err(|reason| ExportError::store_unavailable(path, reason))?;

        info!(
            path = %path.display(),
            handle_display_names,
            "Opened message store read-only"
        );

        Ok(Self {
            conn,
            path: path.to_path_buf(),
            handle_display_names,
        })
    }

    /// Path the store was opened from
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the handle table carries a display name column
    #[must_use]
    pub const fn has_handle_display_names(&self) -> bool {
        self.handle_display_names
    }

    /// Check every required table and column; returns whether handles carry display names
    fn verify_schema(conn: &Connection) -> std::result::Result<bool, String> {
        for (table, columns) in REQUIRED_COLUMNS {
            let present = Self::table_columns(conn, table).map_err(|e| e.to_string())?;
            if present.is_empty() {
                return Err(format!("missing table `{table}`"));
            }
            if let Some(missing) = columns.iter().find(|c| !present.contains(**c)) {
                return Err(format!("table `{table}` has no column `{missing}`"));
            }
        }

        let handle_columns = Self::table_columns(conn, handle::TABLE).map_err(|e| e.to_string())?;
        Ok(handle_columns.contains(handle::DISPLAY_NAME))
    }

    fn table_columns(conn: &Connection, table: &str) -> rusqlite::Result<HashSet<String>> {
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
        let columns = stmt.query_map([], |row| row.get::<_, String>(1))?;
        columns.collect()
    }

    /// Display name column expression, or NULL when the store has none
    fn handle_display_expr(&self, alias: &str) -> String {
        if self.handle_display_names {
            format!("{alias}.{}", handle::DISPLAY_NAME)
        } else {
            "NULL".to_string()
        }
    }

    fn all_handles(&self) -> Result<Vec<HandleRow>> {
        let sql = format!(
            "SELECT h.{}, h.{}, {} FROM {} AS h ORDER BY h.{}",
            handle::ID,
            handle::IDENTIFIER,
            self.handle_display_expr("h"),
            handle::TABLE,
            handle::ID
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            Ok(HandleRow {
                id: row.get(0)?,
                identifier: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                display_name: row.get(2)?,
            })
        })?;

        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn map_message(row: &Row) -> rusqlite::Result<MessageRow> {
        Ok(MessageRow {
            id: row.get(0)?,
            chat_id: row.get(1)?,
            handle_id: row.get::<_, Option<i64>>(2)?.filter(|id| *id != 0),
            sender_identifier: row.get(3)?,
            sender_display_name: row.get(4)?,
            date: store_timestamp(row, 5)?,
            text: row.get(6)?,
            is_from_me: row.get::<_, Option<i64>>(7)?.unwrap_or(0) != 0,
        })
    }

    fn map_attachment(row: &Row) -> rusqlite::Result<(i64, AttachmentRow)> {
        Ok((
            row.get(0)?,
            AttachmentRow {
                id: row.get(1)?,
                filename: row.get(2)?,
                transfer_name: row.get(3)?,
                mime_type: row.get(4)?,
            },
        ))
    }
}

impl MessageSource for MessageStore {
    fn handles_by_identifier(&self, identifier: &ContactIdentifier) -> Result<Vec<HandleRow>> {
        if matches!(identifier, ContactIdentifier::Name(_)) && !self.handle_display_names {
            debug!(%identifier, "Store has no handle display names, name lookup cannot match");
            return Ok(Vec::new());
        }

        let matched: Vec<HandleRow> = self
            .all_handles()?
            .into_iter()
            .filter(|h| match identifier {
                ContactIdentifier::Name(_) => h
                    .display_name
                    .as_deref()
                    .is_some_and(|name| identifier.matches_display_name(name)),
                ContactIdentifier::Phone(_) | ContactIdentifier::Email(_) => {
                    identifier.matches_handle_id(&h.identifier)
                }
            })
            .collect();

        debug!(%identifier, matches = matched.len(), "Looked up handles");
        Ok(matched)
    }

    fn chats_for_handle(&self, handle_id: i64) -> Result<Vec<ChatRow>> {
        let sql = format!(
            "SELECT c.{id}, c.{name} FROM {chat} AS c \
             JOIN {join} AS chj ON chj.{join_chat} = c.{id} \
             WHERE chj.{join_handle} = ?1 ORDER BY c.{id}",
            id = chat::ID,
            name = chat::DISPLAY_NAME,
            chat = chat::TABLE,
            join = chat_handle_join::TABLE,
            join_chat = chat_handle_join::CHAT_ID,
            join_handle = chat_handle_join::HANDLE_ID,
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![handle_id], |row| {
            Ok(ChatRow {
                id: row.get(0)?,
                display_name: row.get(1)?,
            })
        })?;

        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn messages_for_chats(&self, chat_ids: &[i64]) -> Result<Vec<MessageRow>> {
        let mut seen = HashSet::new();
        let mut messages = Vec::new();

        for batch in chat_ids.chunks(MAX_BOUND_IDS) {
            let sql = format!(
                "SELECT m.{id}, MIN(cmj.{cmj_chat}), m.{handle_id}, h.{handle_ident}, {display}, \
                 m.{date}, m.{text}, m.{from_me} \
                 FROM {message} AS m \
                 JOIN {cmj} AS cmj ON cmj.{cmj_message} = m.{id} \
                 LEFT JOIN {handle} AS h ON h.{handle_pk} = m.{handle_id} \
                 WHERE cmj.{cmj_chat} IN ({placeholders}) \
                 GROUP BY m.{id} \
                 ORDER BY m.{date}, m.{id}",
                id = message::ID,
                handle_id = message::HANDLE_ID,
                date = message::DATE,
                text = message::TEXT,
                from_me = message::IS_FROM_ME,
                message = message::TABLE,
                cmj = chat_message_join::TABLE,
                cmj_chat = chat_message_join::CHAT_ID,
                cmj_message = chat_message_join::MESSAGE_ID,
                handle = handle::TABLE,
                handle_pk = handle::ID,
                handle_ident = handle::IDENTIFIER,
                display = self.handle_display_expr("h"),
                placeholders = placeholders(batch.len()),
            );
            let mut stmt = self.conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(batch.iter()), Self::map_message)?;
            for row in rows {
                let row = row?;
                if seen.insert(row.id) {
                    messages.push(row);
                }
            }
        }

        debug!(chats = chat_ids.len(), messages = messages.len(), "Fetched messages");
        Ok(messages)
    }

    fn attachments_for_messages(&self, message_ids: &[i64]) -> Result<Vec<(i64, AttachmentRow)>> {
        let mut links = Vec::new();

        for batch in message_ids.chunks(MAX_BOUND_IDS) {
            let sql = format!(
                "SELECT maj.{maj_message}, a.{id}, a.{filename}, a.{transfer}, a.{mime} \
                 FROM {maj} AS maj \
                 JOIN {attachment} AS a ON a.{id} = maj.{maj_attachment} \
                 WHERE maj.{maj_message} IN ({placeholders}) \
                 ORDER BY maj.{maj_message}, maj.ROWID",
                maj_message = message_attachment_join::MESSAGE_ID,
                maj_attachment = message_attachment_join::ATTACHMENT_ID,
                maj = message_attachment_join::TABLE,
                id = attachment::ID,
                filename = attachment::FILENAME,
                transfer = attachment::TRANSFER_NAME,
                mime = attachment::MIME_TYPE,
                attachment = attachment::TABLE,
                placeholders = placeholders(batch.len()),
            );
            let mut stmt = self.conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(batch.iter()), Self::map_attachment)?;
            for row in rows {
                links.push(row?);
            }
        }

        debug!(messages = message_ids.len(), attachments = links.len(), "Fetched attachment links");
        Ok(links)
    }
}

/// `?, ?, ?` for `n` bound values
fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Read a date column that may be INTEGER, REAL, or NULL depending on iOS version
fn store_timestamp(row: &Row, idx: usize) -> rusqlite::Result<Option<i64>> {
    #[allow(clippy::cast_possible_truncation)]
    let value = match row.get_ref(idx)? {
        ValueRef::Integer(i) => Some(i),
        ValueRef::Real(f) => Some(f as i64),
        ValueRef::Null | ValueRef::Text(_) | ValueRef::Blob(_) => None,
    };
    Ok(value)
}
