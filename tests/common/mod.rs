//! Builds small sms.db stores and backup trees for integration tests.

#![allow(dead_code)]

use rusqlite::{params, Connection};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Seconds from 1970-01-01 to 2001-01-01
const APPLE_EPOCH_OFFSET: i64 = 978_307_200;

/// 2024-03-01 18:00:00 UTC in the store's nanosecond format
pub const MARCH_FIRST_1800: i64 = (1_709_316_000 - APPLE_EPOCH_OFFSET) * 1_000_000_000;

/// Nanosecond store date `minutes` after [`MARCH_FIRST_1800`]
pub const fn at_minute(minutes: i64) -> i64 {
    MARCH_FIRST_1800 + minutes * 60 * 1_000_000_000
}

const SCHEMA: &str = "
    CREATE TABLE handle (ROWID INTEGER PRIMARY KEY AUTOINCREMENT, id TEXT NOT NULL, service TEXT);
    CREATE TABLE chat (ROWID INTEGER PRIMARY KEY AUTOINCREMENT, guid TEXT, display_name TEXT);
    CREATE TABLE chat_handle_join (chat_id INTEGER, handle_id INTEGER);
    CREATE TABLE chat_message_join (chat_id INTEGER, message_id INTEGER);
    CREATE TABLE message (
        ROWID INTEGER PRIMARY KEY AUTOINCREMENT,
        guid TEXT,
        text TEXT,
        handle_id INTEGER DEFAULT 0,
        date INTEGER,
        is_from_me INTEGER DEFAULT 0
    );
    CREATE TABLE attachment (
        ROWID INTEGER PRIMARY KEY AUTOINCREMENT,
        filename TEXT,
        transfer_name TEXT,
        mime_type TEXT
    );
    CREATE TABLE message_attachment_join (message_id INTEGER, attachment_id INTEGER);
";

/// A temporary backup: `sms.db`, a backup root, and an output directory
pub struct Fixture {
    pub dir: TempDir,
    pub db_path: PathBuf,
    pub backup_root: PathBuf,
    pub output_dir: PathBuf,
    conn: Connection,
}

impl Fixture {
    /// Empty store with the standard schema
    pub fn new() -> Self {
        Self::with_schema(SCHEMA)
    }

    /// Empty store whose handle table also carries `display_name`
    pub fn with_handle_display_names() -> Self {
        let fixture = Self::new();
        fixture
            .conn
            .execute_batch("ALTER TABLE handle ADD COLUMN display_name TEXT;")
            .unwrap();
        fixture
    }

    fn with_schema(schema: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("sms.db");
        let backup_root = dir.path().join("backup");
        let output_dir = dir.path().join("out");
        fs::create_dir_all(&backup_root).unwrap();

        let conn = Connection::open(&db_path).unwrap();
        conn.execute_batch(schema).unwrap();

        Self {
            dir,
            db_path,
            backup_root,
            output_dir,
            conn,
        }
    }

    pub fn add_handle(&self, id: i64, identifier: &str) {
        self.conn
            .execute("INSERT INTO handle (ROWID, id) VALUES (?1, ?2)", params![id, identifier])
            .unwrap();
    }

    pub fn set_handle_display_name(&self, id: i64, name: &str) {
        self.conn
            .execute("UPDATE handle SET display_name = ?2 WHERE ROWID = ?1", params![id, name])
            .unwrap();
    }

    /// Chat joined to the given handles
    pub fn add_chat(&self, id: i64, handles: &[i64]) {
        self.conn
            .execute("INSERT INTO chat (ROWID, guid) VALUES (?1, ?2)", params![id, format!("chat{id}")])
            .unwrap();
        for handle in handles {
            self.conn
                .execute(
                    "INSERT INTO chat_handle_join (chat_id, handle_id) VALUES (?1, ?2)",
                    params![id, handle],
                )
                .unwrap();
        }
    }

    /// Message in `chat`; `handle` 0 with `from_me` for outgoing
    pub fn add_message(&self, id: i64, chat: i64, handle: i64, date: Option<i64>, text: Option<&str>, from_me: bool) {
        self.conn
            .execute(
                "INSERT INTO message (ROWID, guid, text, handle_id, date, is_from_me) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![id, format!("msg{id}"), text, handle, date, i64::from(from_me)],
            )
            .unwrap();
        self.conn
            .execute(
                "INSERT INTO chat_message_join (chat_id, message_id) VALUES (?1, ?2)",
                params![chat, id],
            )
            .unwrap();
    }

    /// Attachment row linked to `message`
    pub fn add_attachment(&self, id: i64, message: i64, filename: &str, transfer_name: &str, mime_type: &str) {
        self.conn
            .execute(
                "INSERT INTO attachment (ROWID, filename, transfer_name, mime_type) VALUES (?1, ?2, ?3, ?4)",
                params![id, filename, transfer_name, mime_type],
            )
            .unwrap();
        self.conn
            .execute(
                "INSERT INTO message_attachment_join (message_id, attachment_id) VALUES (?1, ?2)",
                params![message, id],
            )
            .unwrap();
    }

    /// Put a media file at `relative` under `Library/SMS/Attachments` of the backup root
    pub fn add_backup_file(&self, relative: &str, contents: &[u8]) -> PathBuf {
        let path = self.backup_root.join("Library/SMS/Attachments").join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
        path
    }

    pub fn output(&self, name: &str) -> PathBuf {
        self.output_dir.join(name)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

/// The `+49 170 1234567` conversation: three messages, one photo
pub fn german_contact_fixture() -> Fixture {
    let fixture = Fixture::new();
    fixture.add_handle(1, "+491701234567");
    fixture.add_chat(1, &[1]);
    fixture.add_message(1, 1, 1, Some(at_minute(0)), Some("Hallo!"), false);
    fixture.add_message(2, 1, 0, Some(at_minute(1)), Some("Hi, see you at 8"), true);
    fixture.add_message(3, 1, 1, Some(at_minute(2)), Some("\u{fffc}"), false);
    fixture.add_attachment(
        1,
        3,
        "~/Library/SMS/Attachments/ab/11/GUID-1/IMG_0001.jpeg",
        "photo.jpg",
        "image/jpeg",
    );
    fixture.add_backup_file("ab/11/GUID-1/IMG_0001.jpeg", b"\xff\xd8jpeg");
    fixture
}
