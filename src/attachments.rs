//! Attachment resolution.
//!
//! Locates each referenced media file inside the backup and assigns it a
//! destination name that is unique within one contact's export. Nothing is
//! copied here; [`StagingPlan`] lists the copies for the persistence layer.

use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::error::ExportError;
use crate::models::{AttachmentDescriptor, AttachmentRow, AttachmentStatus, ResolvedEntry, ThreadEntry};
use crate::utils::{sanitize_filename, split_extension};

/// Directory of the attachment tree inside an iOS backup
const ATTACHMENTS_SUBDIR: [&str; 3] = ["Library", "SMS", "Attachments"];

fn attachment_anchor() -> &'static Regex {
    static ANCHOR: OnceLock<Regex> = OnceLock::new();
    ANCHOR.get_or_init(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(r"Library/SMS/Attachments/(.*)").unwrap()
    })
}

/// One file to copy into the export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedCopy {
    /// Location inside the backup
    pub source: PathBuf,
    /// File name inside the contact's attachments directory
    pub destination_name: String,
}

/// Ordered copies for one contact
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagingPlan {
    /// Copies in transcript order
    pub copies: Vec<StagedCopy>,
}

impl StagingPlan {
    /// Collect every located attachment of the resolved entries
    #[must_use]
    pub fn from_entries(entries: &[ResolvedEntry]) -> Self {
        let copies = entries
            .iter()
            .flat_map(|e| e.attachments.iter())
            .filter_map(|a| match &a.status {
                AttachmentStatus::Found(source) => Some(StagedCopy {
                    source: source.clone(),
                    destination_name: a.destination_name.clone(),
                }),
                AttachmentStatus::Missing | AttachmentStatus::NotExported => None,
            })
            .collect();
        Self { copies }
    }

    /// True when nothing needs copying
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.copies.is_empty()
    }
}

/// Entries with resolved attachments plus the attachments that were not found
#[derive(Debug, Default)]
pub struct ResolvedThread {
    /// Entries in transcript order
    pub entries: Vec<ResolvedEntry>,
    /// One `AttachmentMissing` per absent file
    pub missing: Vec<ExportError>,
}

/// Resolves attachment path tokens against a backup root
#[derive(Debug, Clone, Default)]
pub struct AttachmentResolver {
    root: Option<PathBuf>,
}

impl AttachmentResolver {
    /// Resolver for `root`; without a root nothing is checked on disk
    #[must_use]
    pub const fn new(root: Option<PathBuf>) -> Self {
        Self { root }
    }

    /// Locate the file a path token refers to
    #[must_use]
    pub fn locate(&self, token: Option<&str>) -> AttachmentStatus {
        let Some(root) = &self.root else {
            return AttachmentStatus::NotExported;
        };
        let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) else {
            return AttachmentStatus::Missing;
        };

        let normalized = token.replace('\\', "/");
        let candidates = match attachment_anchor().captures(&normalized) {
            Some(caps) => {
                let relative = caps.get(1).map_or("", |m| m.as_str());
                let mut anchored = root.clone();
                anchored.extend(ATTACHMENTS_SUBDIR);
                vec![join_inside(&anchored, relative), join_inside(root, relative)]
            },
            None => {
                let relative = normalized.strip_prefix("~/").unwrap_or(&normalized);
                if Path::new(relative).is_absolute() {
                    Vec::new()
                } else {
                    vec![join_inside(root, relative)]
                }
            },
        };

        candidates
            .into_iter()
            .flatten()
            .find(|candidate| candidate.is_file())
            .map_or(AttachmentStatus::Missing, AttachmentStatus::Found)
    }

    /// Resolve every attachment of the thread and assign destination names
    #[must_use]
    pub fn resolve(&self, entries: Vec<ThreadEntry>) -> ResolvedThread {
        let names = destination_names(&entries);
        let mut names = names.into_iter();
        let mut missing = Vec::new();

        let entries = entries
            .into_iter()
            .map(|entry| {
                let attachments = entry
                    .attachments
                    .iter()
                    .map(|row| {
                        let status = self.locate(row.filename.as_deref());
                        if status == AttachmentStatus::Missing {
                            warn!(
                                message_id = entry.id,
                                attachment_id = row.id,
                                "Attachment file not found in backup"
                            );
                            missing.push(ExportError::AttachmentMissing {
                                message_id: entry.id,
                                attachment_id: row.id,
                                token: row.filename.clone().unwrap_or_default(),
                            });
                        }
                        AttachmentDescriptor {
                            attachment_id: row.id,
                            message_id: entry.id,
                            original_name: row.original_name(),
                            destination_name: names.next().unwrap_or_else(|| fallback_name(row)),
                            mime_type: row.mime_type.clone(),
                            status,
                        }
                    })
                    .collect();

                ResolvedEntry {
                    id: entry.id,
                    timestamp: entry.timestamp,
                    sender: entry.sender,
                    body: entry.body,
                    attachments,
                }
            })
            .collect();

        debug!(missing = missing.len(), "Resolved attachments");
        ResolvedThread { entries, missing }
    }
}

/// Join a token-derived relative path under `base`, refusing to climb out of it
fn join_inside(base: &Path, relative: &str) -> Option<PathBuf> {
    let relative = Path::new(relative);
    let escapes = relative
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
    if escapes || relative.as_os_str().is_empty() {
        None
    } else {
        Some(base.join(relative))
    }
}

fn fallback_name(row: &AttachmentRow) -> String {
    format!("attachment_{}", row.id)
}

/// Collision-free destination names for every attachment, in thread order.
///
/// Names used by more than one attachment get the owning message id as a
/// prefix; anything still clashing after that gets a numeric suffix.
fn destination_names(entries: &[ThreadEntry]) -> Vec<String> {
    let base: Vec<(i64, String)> = entries
        .iter()
        .flat_map(|e| e.attachments.iter().map(move |a| (e.id, a)))
        .map(|(message_id, row)| {
            let fallback = fallback_name(row);
            (message_id, sanitize_filename(&row.original_name(), &fallback))
        })
        .collect();

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for (_, name) in &base {
        *counts.entry(name.as_str()).or_default() += 1;
    }

    let prefixed: Vec<String> = base
        .iter()
        .map(|(message_id, name)| {
            if counts.get(name.as_str()).copied().unwrap_or(0) > 1 {
                format!("{message_id}_{name}")
            } else {
                name.clone()
            }
        })
        .collect();

    let mut used: HashSet<String> = HashSet::new();
    prefixed
        .into_iter()
        .map(|name| {
            if used.insert(name.clone()) {
                return name;
            }
            let (stem, ext) = split_extension(&name);
            let mut n = 2;
            loop {
                let candidate = format!("{stem}_{n}{ext}");
                if used.insert(candidate.clone()) {
                    return candidate;
                }
                n += 1;
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Body, Sender};
    use std::fs;

    fn row(id: i64, token: &str, transfer: Option<&str>) -> AttachmentRow {
        AttachmentRow {
            id,
            filename: Some(token.to_string()),
            transfer_name: transfer.map(str::to_string),
            mime_type: None,
        }
    }

    fn entry(id: i64, attachments: Vec<AttachmentRow>) -> ThreadEntry {
        ThreadEntry {
            id,
            chat_id: 1,
            timestamp: None,
            sender: Sender::Owner,
            body: Body::AttachmentOnly,
            attachments,
        }
    }

    #[test]
    fn test_locate_under_anchored_tree() {
        let root = tempfile::tempdir().unwrap();
        let file = root.path().join("Library/SMS/Attachments/ab/11/GUID/photo.jpg");
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(&file, b"jpeg").unwrap();

        let resolver = AttachmentResolver::new(Some(root.path().to_path_buf()));
        let status = resolver.locate(Some("~/Library/SMS/Attachments/ab/11/GUID/photo.jpg"));
        assert_eq!(status, AttachmentStatus::Found(file));
    }

    #[test]
    fn test_locate_falls_back_to_flat_root() {
        let root = tempfile::tempdir().unwrap();
        let file = root.path().join("ab/11/GUID/photo.jpg");
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(&file, b"jpeg").unwrap();

        let resolver = AttachmentResolver::new(Some(root.path().to_path_buf()));
        let status = resolver.locate(Some("/var/mobile/Library/SMS/Attachments/ab/11/GUID/photo.jpg"));
        assert_eq!(status, AttachmentStatus::Found(file));
    }

    #[test]
    fn test_locate_missing_and_unchecked() {
        let root = tempfile::tempdir().unwrap();
        let resolver = AttachmentResolver::new(Some(root.path().to_path_buf()));
        assert_eq!(
            resolver.locate(Some("~/Library/SMS/Attachments/zz/none.jpg")),
            AttachmentStatus::Missing
        );
        assert_eq!(resolver.locate(None), AttachmentStatus::Missing);

        let unchecked = AttachmentResolver::new(None);
        assert_eq!(
            unchecked.locate(Some("~/Library/SMS/Attachments/zz/none.jpg")),
            AttachmentStatus::NotExported
        );
    }

    #[test]
    fn test_locate_refuses_parent_components() {
        let root = tempfile::tempdir().unwrap();
        let inner = root.path().join("backup");
        fs::create_dir_all(&inner).unwrap();
        fs::write(root.path().join("secret.txt"), b"x").unwrap();

        let resolver = AttachmentResolver::new(Some(inner));
        assert_eq!(resolver.locate(Some("../secret.txt")), AttachmentStatus::Missing);
    }

    #[test]
    fn test_duplicate_names_prefixed_with_message_id() {
        let entries = vec![
            entry(10, vec![row(1, "a/photo.jpg", Some("photo.jpg"))]),
            entry(11, vec![row(2, "b/photo.jpg", Some("photo.jpg")), row(3, "c/clip.mov", None)]),
        ];
        let names = destination_names(&entries);
        assert_eq!(names, vec!["10_photo.jpg", "11_photo.jpg", "clip.mov"]);
    }

    #[test]
    fn test_same_message_duplicates_get_suffix() {
        let entries = vec![entry(
            10,
            vec![row(1, "a/photo.jpg", Some("photo.jpg")), row(2, "b/photo.jpg", Some("photo.jpg"))],
        )];
        let names = destination_names(&entries);
        assert_eq!(names, vec!["10_photo.jpg", "10_photo_2.jpg"]);
    }

    #[test]
    fn test_resolve_marks_missing_without_failing() {
        let root = tempfile::tempdir().unwrap();
        let resolver = AttachmentResolver::new(Some(root.path().to_path_buf()));
        let thread = resolver.resolve(vec![entry(
            10,
            vec![row(1, "~/Library/SMS/Attachments/x/photo.jpg", Some("photo.jpg"))],
        )]);

        assert_eq!(thread.entries.len(), 1);
        assert_eq!(thread.entries[0].attachments[0].status, AttachmentStatus::Missing);
        assert_eq!(thread.missing.len(), 1);
        assert_eq!(thread.missing[0].kind(), "attachment_missing");
        assert!(StagingPlan::from_entries(&thread.entries).is_empty());
    }
}
