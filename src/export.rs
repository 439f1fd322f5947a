//! Per-contact export pipeline and run summary.
//!
//! [`export_contact`] runs resolve → assemble → resolve attachments → render
//! for one contact and returns the document without touching the disk.
//! [`run_export`] drives it across all requested contacts, hands each result
//! to the [`TranscriptWriter`], and isolates per-contact failures.

use std::collections::HashSet;
use std::path::PathBuf;

use tracing::{error, info, warn};

use crate::attachments::{AttachmentResolver, StagingPlan};
use crate::db::MessageSource;
use crate::error::{ExportError, Result};
use crate::file_writer::{TranscriptWriter, WrittenExport};
use crate::logging::OperationTimer;
use crate::metrics::MetricsCollector;
use crate::render::{render, RenderOptions};
use crate::resolver::{resolve_contact, ContactRequest};
use crate::thread::assemble_thread;
use crate::utils::sanitize_filename;

/// Fallback file stem for labels that sanitize to nothing
const DEFAULT_STEM: &str = "contact";

/// Options shared by every contact in a run
#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    /// Rendering options
    pub render: RenderOptions,
    /// Root of the backup's attachment tree, consulted only with `include_media`
    pub attachments_root: Option<PathBuf>,
    /// Stage media files next to the transcript
    pub include_media: bool,
}

/// A rendered transcript ready for persistence
#[derive(Debug)]
pub struct ContactExport {
    /// Contact label as requested
    pub label: String,
    /// Sanitized file stem derived from the label
    pub file_stem: String,
    /// Transcript file name, stem plus format extension
    pub file_name: String,
    /// Rendered document
    pub document: String,
    /// Number of message entries rendered
    pub message_count: usize,
    /// Media copies, present only when media inclusion is requested
    pub staging: Option<StagingPlan>,
    /// Non-fatal problems: unmatched identifiers and missing attachments
    pub diagnostics: Vec<ExportError>,
}

impl ContactExport {
    /// Name of the directory staged attachments go into
    #[must_use]
    pub fn attachments_dir_name(&self) -> String {
        format!("{}_attachments", self.file_stem)
    }
}

/// Export one contact. Pure with respect to the filesystem outputs.
pub fn export_contact<S>(source: &S, request: &ContactRequest, options: &ExportOptions) -> Result<ContactExport>
where
    S: MessageSource + ?Sized,
{
    let resolution = resolve_contact(source, request)?;

    let thread = assemble_thread(source, &resolution.chat_ids)?;
    if thread.is_empty() {
        return Err(ExportError::EmptyThread(request.label.clone()));
    }

    // Without media inclusion nothing is located, every note reads "not exported"
    let root = options.attachments_root.clone().filter(|_| options.include_media);
    let resolver = AttachmentResolver::new(root);
    let resolved = resolver.resolve(thread);
    let document = render(&resolved.entries, &options.render)?;

    let staging = options
        .include_media
        .then(|| StagingPlan::from_entries(&resolved.entries));

    let file_stem = sanitize_filename(&request.label, DEFAULT_STEM);
    let file_name = format!("{file_stem}.{}", options.render.format.extension());

    let mut diagnostics = resolution.unmatched;
    diagnostics.extend(resolved.missing);

    Ok(ContactExport {
        label: request.label.clone(),
        file_stem,
        file_name,
        document,
        message_count: resolved.entries.len(),
        staging,
        diagnostics,
    })
}

/// A contact that was exported
#[derive(Debug)]
pub struct ExportedContact {
    /// Contact label
    pub label: String,
    /// What was written
    pub written: WrittenExport,
    /// Messages in the transcript
    pub message_count: usize,
}

/// A contact that was not exported, with the reason
#[derive(Debug)]
pub struct FailedContact {
    /// Contact label
    pub label: String,
    /// Why
    pub error: ExportError,
}

/// Outcome of a whole run
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Contacts fully exported
    pub exported: Vec<ExportedContact>,
    /// Contacts skipped because resolution failed
    pub resolution_failures: Vec<FailedContact>,
    /// Contacts skipped because their destination already exists
    pub conflicts: Vec<FailedContact>,
    /// Contacts that failed while writing
    pub write_failures: Vec<FailedContact>,
    /// Non-fatal problems per contact label
    pub warnings: Vec<FailedContact>,
}

impl RunSummary {
    /// Number of contacts attempted
    #[must_use]
    pub fn total(&self) -> usize {
        self.exported.len() + self.failed()
    }

    /// Number of contacts not exported
    #[must_use]
    pub fn failed(&self) -> usize {
        self.resolution_failures.len() + self.conflicts.len() + self.write_failures.len()
    }

    /// True when contacts were requested and none was exported
    #[must_use]
    pub fn all_failed(&self) -> bool {
        self.exported.is_empty() && self.total() > 0
    }

    /// Process exit code: failure only when every contact failed
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        u8::from(self.all_failed())
    }

    /// Identifiers that matched no handle, across all contacts
    pub fn unmatched_identifiers(&self) -> impl Iterator<Item = &str> {
        let from_warnings = self.warnings.iter().filter_map(|w| match &w.error {
            ExportError::ContactNotFound(raw) | ExportError::InvalidContactFormat(raw) => Some(raw.as_str()),
            _ => None,
        });
        let from_failures = self.resolution_failures.iter().filter_map(|f| match &f.error {
            ExportError::ContactNotFound(raw) | ExportError::InvalidContactFormat(raw) => Some(raw.as_str()),
            _ => None,
        });
        from_failures.chain(from_warnings)
    }

    fn record_failure(&mut self, label: String, error: ExportError) {
        let failed = FailedContact { label, error };
        if failed.error.is_resolution_failure() {
            self.resolution_failures.push(failed);
        } else if matches!(failed.error, ExportError::DestinationConflict(_)) {
            self.conflicts.push(failed);
        } else {
            self.write_failures.push(failed);
        }
    }
}

/// Export every requested contact.
///
/// Store-level errors abort the run and are returned; everything else is
/// recorded per contact and the loop continues.
pub fn run_export<S>(
    source: &S,
    requests: &[ContactRequest],
    options: &ExportOptions,
    writer: &TranscriptWriter,
) -> Result<RunSummary>
where
    S: MessageSource + ?Sized,
{
    let metrics = MetricsCollector;
    let mut summary = RunSummary::default();
    let mut claimed: HashSet<String> = HashSet::new();

    for request in requests {
        let timer = OperationTimer::new("export_contact");
        info!(contact = %request.label, "Exporting messages");

        let outcome = export_and_write(source, request, options, writer, &mut claimed);
        let elapsed = timer.finish();

        match outcome {
            Ok((export, written)) => {
                metrics.record_contact_exported(options.render.format, export.message_count, written.copied, elapsed);
                info!(
                    contact = %request.label,
                    transcript = %written.transcript.display(),
                    messages = export.message_count,
                    attachments = written.copied,
                    "Contact exported"
                );
                summary.warnings.extend(export.diagnostics.into_iter().map(|error| FailedContact {
                    label: request.label.clone(),
                    error,
                }));
                summary.warnings.extend(written.file_errors.iter().map(|error| FailedContact {
                    label: request.label.clone(),
                    error: ExportError::Io(std::io::Error::new(error.kind(), error.to_string())),
                }));
                summary.exported.push(ExportedContact {
                    label: request.label.clone(),
                    message_count: export.message_count,
                    written,
                });
            },
            Err(e) if e.is_store_failure() => {
                error!(contact = %request.label, error = %e, "Message store failed, aborting run");
                return Err(e);
            },
            Err(e) => {
                warn!(contact = %request.label, error = %e, kind = e.kind(), "Contact not exported");
                metrics.record_contact_failed(e.kind());
                summary.record_failure(request.label.clone(), e);
            },
        }
    }

    Ok(summary)
}

/// Export one contact and persist it, claiming its file name for the run
fn export_and_write<S>(
    source: &S,
    request: &ContactRequest,
    options: &ExportOptions,
    writer: &TranscriptWriter,
    claimed: &mut HashSet<String>,
) -> Result<(ContactExport, WrittenExport)>
where
    S: MessageSource + ?Sized,
{
    let export = export_contact(source, request, options)?;

    let missing = export
        .diagnostics
        .iter()
        .filter(|d| matches!(d, ExportError::AttachmentMissing { .. }))
        .count();
    for _ in 0..missing {
        MetricsCollector.record_attachment_missing();
    }

    // Two labels can sanitize to the same file name within one run
    if !claimed.insert(export.file_name.clone()) {
        return Err(ExportError::DestinationConflict(writer.transcript_path(&export)));
    }

    let written = writer.write(&export)?;
    Ok((export, written))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(label: &str, error: ExportError) -> FailedContact {
        FailedContact {
            label: label.to_string(),
            error,
        }
    }

    #[test]
    fn test_exit_code_zero_when_nothing_failed() {
        let summary = RunSummary::default();
        assert_eq!(summary.exit_code(), 0);
    }

    #[test]
    fn test_exit_code_nonzero_when_all_failed() {
        let mut summary = RunSummary::default();
        summary.record_failure("a".to_string(), ExportError::ContactNotFound("a".to_string()));
        summary.record_failure(
            "b".to_string(),
            ExportError::DestinationConflict(PathBuf::from("/out/b.txt")),
        );
        assert_eq!(summary.resolution_failures.len(), 1);
        assert_eq!(summary.conflicts.len(), 1);
        assert_eq!(summary.exit_code(), 1);
    }

    #[test]
    fn test_unmatched_identifiers_collects_both_lists() {
        let mut summary = RunSummary::default();
        summary.record_failure("x".to_string(), ExportError::ContactNotFound("x".to_string()));
        summary
            .warnings
            .push(failure("y", ExportError::ContactNotFound("Max Mustermann".to_string())));
        let unmatched: Vec<&str> = summary.unmatched_identifiers().collect();
        assert_eq!(unmatched, vec!["x", "Max Mustermann"]);
    }
}
