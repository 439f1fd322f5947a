//! Contact identifier normalization.
//!
//! A raw contact string is classified as a phone number, an email address, or
//! a display name and reduced to a canonical form so that differently
//! formatted inputs compare equal. Matching downstream is exact on the
//! canonical form; there is no fuzzy matching.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::error::{ExportError, Result};

/// Phone shape: optional leading `+`, then digits and common separators
fn phone_shape() -> &'static Regex {
    static PHONE: OnceLock<Regex> = OnceLock::new();
    PHONE.get_or_init(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(r"^\+?[0-9\s\-().]*[0-9][0-9\s\-().]*$").unwrap()
    })
}

/// A normalized contact identifier tagged with its detected kind
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ContactIdentifier {
    /// Digits only, leading `+` preserved
    Phone(String),
    /// Lower-cased address
    Email(String),
    /// Lower-cased, whitespace-collapsed display name
    Name(String),
}

impl ContactIdentifier {
    /// Classify and normalize a raw contact string.
    ///
    /// Fails with [`ExportError::InvalidContactFormat`] only when the input is
    /// empty after trimming.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ExportError::InvalidContactFormat(raw.to_string()));
        }

        if trimmed.contains('@') {
            return Ok(Self::Email(trimmed.to_lowercase()));
        }

        if phone_shape().is_match(trimmed) {
            let mut phone = String::with_capacity(trimmed.len());
            if trimmed.starts_with('+') {
                phone.push('+');
            }
            phone.extend(trimmed.chars().filter(char::is_ascii_digit));
            return Ok(Self::Phone(phone));
        }

        Ok(Self::Name(normalize_name(trimmed)))
    }

    /// The canonical string
    #[must_use]
    pub fn value(&self) -> &str {
        match self {
            Self::Phone(v) | Self::Email(v) | Self::Name(v) => v,
        }
    }

    /// Kind tag used in logs and metric labels
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Phone(_) => "phone",
            Self::Email(_) => "email",
            Self::Name(_) => "name",
        }
    }

    /// True when `stored` (a raw `handle.id`) refers to this phone or email.
    ///
    /// Name identifiers never match a stored handle id.
    #[must_use]
    pub fn matches_handle_id(&self, stored: &str) -> bool {
        match (self, Self::parse(stored)) {
            (Self::Phone(a), Ok(Self::Phone(b))) | (Self::Email(a), Ok(Self::Email(b))) => *a == b,
            _ => false,
        }
    }

    /// True when `display_name` normalizes to this name identifier
    #[must_use]
    pub fn matches_display_name(&self, display_name: &str) -> bool {
        match self {
            Self::Name(name) => *name == normalize_name(display_name),
            Self::Phone(_) | Self::Email(_) => false,
        }
    }
}

impl fmt::Display for ContactIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.value())
    }
}

/// Case-insensitive, whitespace-collapsed, NFC form of a display name
fn normalize_name(raw: &str) -> String {
    let lowered = raw.nfc().collect::<String>().to_lowercase();
    lowered
        .nfc()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
