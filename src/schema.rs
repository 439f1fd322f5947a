//! Message store schema definitions
//!
//! Table and column names of the iOS `sms.db` that the reader depends on.
//! The layout is owned by the backup, not by this crate, so only columns that
//! have been stable across iOS releases are listed here.

/// Handle table: one row per phone number or email endpoint
pub mod handle {
    /// Table name
    pub const TABLE: &str = "handle";
    /// Primary key column
    pub const ID: &str = "ROWID";
    /// Raw identifier string (phone or email)
    pub const IDENTIFIER: &str = "id";
    /// Optional display name column, present only in some exports
    pub const DISPLAY_NAME: &str = "display_name";
}

/// Chat table: one row per conversation thread
pub mod chat {
    /// Table name
    pub const TABLE: &str = "chat";
    /// Primary key column
    pub const ID: &str = "ROWID";
    /// Group or custom thread name
    pub const DISPLAY_NAME: &str = "display_name";
}

/// Chat membership join
pub mod chat_handle_join {
    /// Table name
    pub const TABLE: &str = "chat_handle_join";
    /// Chat foreign key
    pub const CHAT_ID: &str = "chat_id";
    /// Handle foreign key
    pub const HANDLE_ID: &str = "handle_id";
}

/// Chat to message join
pub mod chat_message_join {
    /// Table name
    pub const TABLE: &str = "chat_message_join";
    /// Chat foreign key
    pub const CHAT_ID: &str = "chat_id";
    /// Message foreign key
    pub const MESSAGE_ID: &str = "message_id";
}

/// Message table
pub mod message {
    /// Table name
    pub const TABLE: &str = "message";
    /// Primary key column
    pub const ID: &str = "ROWID";
    /// Originating handle (0 for outgoing messages)
    pub const HANDLE_ID: &str = "handle_id";
    /// Store-native timestamp, seconds or nanoseconds since 2001-01-01
    pub const DATE: &str = "date";
    /// Body text
    pub const TEXT: &str = "text";
    /// Sent by the device owner
    pub const IS_FROM_ME: &str = "is_from_me";
}

/// Attachment table
pub mod attachment {
    /// Table name
    pub const TABLE: &str = "attachment";
    /// Primary key column
    pub const ID: &str = "ROWID";
    /// On-device path token, e.g. `~/Library/SMS/Attachments/ab/11/GUID/IMG_0001.jpg`
    pub const FILENAME: &str = "filename";
    /// Original file name as sent
    pub const TRANSFER_NAME: &str = "transfer_name";
    /// MIME type hint
    pub const MIME_TYPE: &str = "mime_type";
}

/// Message to attachment join
pub mod message_attachment_join {
    /// Table name
    pub const TABLE: &str = "message_attachment_join";
    /// Message foreign key
    pub const MESSAGE_ID: &str = "message_id";
    /// Attachment foreign key
    pub const ATTACHMENT_ID: &str = "attachment_id";
}

/// Tables and the columns each must expose for the store to be usable
pub const REQUIRED_COLUMNS: &[(&str, &[&str])] = &[
    (handle::TABLE, &[handle::IDENTIFIER]),
    (chat::TABLE, &[chat::DISPLAY_NAME]),
    (chat_handle_join::TABLE, &[chat_handle_join::CHAT_ID, chat_handle_join::HANDLE_ID]),
    (chat_message_join::TABLE, &[chat_message_join::CHAT_ID, chat_message_join::MESSAGE_ID]),
    (
        message::TABLE,
        &[message::HANDLE_ID, message::DATE, message::TEXT, message::IS_FROM_ME],
    ),
    (
        attachment::TABLE,
        &[attachment::FILENAME, attachment::TRANSFER_NAME, attachment::MIME_TYPE],
    ),
    (
        message_attachment_join::TABLE,
        &[message_attachment_join::MESSAGE_ID, message_attachment_join::ATTACHMENT_ID],
    ),
];
