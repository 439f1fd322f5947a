//! Utility functions shared by the export pipeline.

use std::sync::OnceLock;

use regex::Regex;

fn unsafe_runs() -> &'static Regex {
    static UNSAFE: OnceLock<Regex> = OnceLock::new();
    UNSAFE.get_or_init(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(r"[^\w.-]+").unwrap()
    })
}

/// Make a string safe to use as a single file name.
///
/// Runs of characters other than word characters, `.` and `-` collapse to
/// `_`. Names that would be empty or a relative path component fall back to
/// `fallback`.
#[must_use]
pub fn sanitize_filename(raw: &str, fallback: &str) -> String {
    let sanitized = unsafe_runs().replace_all(raw.trim(), "_").into_owned();
    if sanitized.is_empty() || sanitized.chars().all(|c| c == '.') {
        fallback.to_string()
    } else {
        sanitized
    }
}

/// Split `name` into stem and extension (with the dot), `photo.jpg` → (`photo`, `.jpg`)
#[must_use]
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => name.split_at(idx),
        _ => (name, ""),
    }
}
