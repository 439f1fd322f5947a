//! Contact resolution.
//!
//! Maps the identifiers a user gives for one correspondent onto every handle
//! and chat in the store that belongs to that correspondent. A person is often
//! reachable through several handles (phone and email) and appears in several
//! threads (one-to-one plus groups), so both sets are unions.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use crate::db::MessageSource;
use crate::error::{ExportError, Result};
use crate::identifier::ContactIdentifier;

/// Separator between identifiers of one contact on the command line
pub const IDENTIFIER_SEPARATOR: char = ';';

/// One requested correspondent and the raw identifiers that describe them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactRequest {
    /// Name used for the transcript file and in reports
    pub label: String,
    /// Phone numbers, emails, or names, in the order given
    pub identifiers: Vec<String>,
}

impl ContactRequest {
    /// Request with an explicit label
    pub fn new(label: impl Into<String>, identifiers: Vec<String>) -> Self {
        Self {
            label: label.into(),
            identifiers,
        }
    }

    /// Parse a command-line contact such as `+491701234567;max@example.com`.
    ///
    /// The first identifier becomes the label.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let identifiers: Vec<String> = raw
            .split(IDENTIFIER_SEPARATOR)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        let label = identifiers
            .first()
            .cloned()
            .unwrap_or_else(|| raw.trim().to_string());
        Self { label, identifiers }
    }
}

/// Handles and chats that make up one contact's conversation
#[derive(Debug, Default)]
pub struct Resolution {
    /// Every matched handle
    pub handle_ids: BTreeSet<i64>,
    /// Chats per matched handle
    pub chats_by_handle: BTreeMap<i64, BTreeSet<i64>>,
    /// Union of all chats
    pub chat_ids: BTreeSet<i64>,
    /// Identifiers of this contact that were invalid or matched nothing
    pub unmatched: Vec<ExportError>,
}

/// Resolve one contact against the store.
///
/// Identifiers that fail on their own are kept in [`Resolution::unmatched`].
/// The contact fails as a whole with `InvalidContactFormat` when every
/// identifier was unusable, and with `ContactNotFound` when none matched.
pub fn resolve_contact<S>(source: &S, request: &ContactRequest) -> Result<Resolution>
where
    S: MessageSource + ?Sized,
{
    if request.identifiers.is_empty() {
        return Err(ExportError::InvalidContactFormat(request.label.clone()));
    }

    let mut resolution = Resolution::default();
    let mut any_valid = false;

    for raw in &request.identifiers {
        let identifier = match ContactIdentifier::parse(raw) {
            Ok(identifier) => identifier,
            Err(e) => {
                warn!(contact = %request.label, identifier = %raw, "Skipping invalid identifier");
                resolution.unmatched.push(e);
                continue;
            },
        };
        any_valid = true;

        let handles = source.handles_by_identifier(&identifier)?;
        if handles.is_empty() {
            warn!(contact = %request.label, %identifier, "No handle matches identifier");
            resolution
                .unmatched
                .push(ExportError::ContactNotFound(raw.trim().to_string()));
            continue;
        }

        resolution.handle_ids.extend(handles.iter().map(|h| h.id));
    }

    if resolution.handle_ids.is_empty() {
        return Err(if any_valid {
            ExportError::ContactNotFound(request.label.clone())
        } else {
            ExportError::InvalidContactFormat(request.label.clone())
        });
    }

    for &handle_id in &resolution.handle_ids {
        let chats: BTreeSet<i64> = source
            .chats_for_handle(handle_id)?
            .into_iter()
            .map(|c| c.id)
            .collect();
        resolution.chat_ids.extend(chats.iter().copied());
        resolution.chats_by_handle.insert(handle_id, chats);
    }

    debug!(
        contact = %request.label,
        handles = resolution.handle_ids.len(),
        chats = resolution.chat_ids.len(),
        "Resolved contact"
    );
    Ok(resolution)
}
