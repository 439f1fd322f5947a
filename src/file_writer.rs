//! Persistence of rendered transcripts.
//!
//! Layout for a contact labelled `+49 170 1234567` exported as text:
//!
//! ```text
//! output_dir/
//!   _49_170_1234567.txt
//!   _49_170_1234567_attachments/
//!     photo.jpg
//! ```

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{ExportError, Result};
use crate::export::ContactExport;

/// What was written for one contact
#[derive(Debug)]
pub struct WrittenExport {
    /// Transcript file
    pub transcript: PathBuf,
    /// Attachments directory, when media was staged
    pub attachments_dir: Option<PathBuf>,
    /// Number of files copied
    pub copied: usize,
    /// Per-file copy failures; the transcript itself was written
    pub file_errors: Vec<io::Error>,
}

/// Writes transcripts and staged media below one output directory
#[derive(Debug, Clone)]
pub struct TranscriptWriter {
    output_dir: PathBuf,
    overwrite: bool,
}

impl TranscriptWriter {
    /// Writer rooted at `output_dir`
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>, overwrite: bool) -> Self {
        Self {
            output_dir: output_dir.into(),
            overwrite,
        }
    }

    /// Output directory
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Where the transcript of `export` goes
    #[must_use]
    pub fn transcript_path(&self, export: &ContactExport) -> PathBuf {
        self.output_dir.join(&export.file_name)
    }

    /// Where the staged media of `export` goes
    #[must_use]
    pub fn attachments_path(&self, export: &ContactExport) -> PathBuf {
        self.output_dir.join(export.attachments_dir_name())
    }

    /// Write the transcript and copy its staged media.
    ///
    /// Without overwrite, an existing transcript or attachments directory is
    /// a `DestinationConflict` and nothing is written.
    pub fn write(&self, export: &ContactExport) -> Result<WrittenExport> {
        let transcript = self.transcript_path(export);
        let attachments_dir = self.attachments_path(export);
        let stages_media = export.staging.as_ref().is_some_and(|plan| !plan.is_empty());

        if !self.overwrite {
            if transcript.exists() {
                return Err(ExportError::DestinationConflict(transcript));
            }
            if stages_media && attachments_dir.exists() {
                return Err(ExportError::DestinationConflict(attachments_dir));
            }
        }

        fs::create_dir_all(&self.output_dir)?;
        write_document(&transcript, &export.document)?;
        debug!(path = %transcript.display(), bytes = export.document.len(), "Transcript written");

        let Some(plan) = export.staging.as_ref().filter(|_| stages_media) else {
            return Ok(WrittenExport {
                transcript,
                attachments_dir: None,
                copied: 0,
                file_errors: Vec::new(),
            });
        };

        if attachments_dir.exists() {
            fs::remove_dir_all(&attachments_dir)?;
        }
        fs::create_dir_all(&attachments_dir)?;

        let mut copied = 0;
        let mut file_errors = Vec::new();
        for copy in &plan.copies {
            let destination = attachments_dir.join(&copy.destination_name);
            if destination.exists() {
                warn!(path = %destination.display(), "Staged attachment already present");
                file_errors.push(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    ExportError::DestinationConflict(destination).to_string(),
                ));
                continue;
            }
            match fs::copy(&copy.source, &destination) {
                Ok(_) => copied += 1,
                Err(e) => {
                    warn!(
                        source = %copy.source.display(),
                        destination = %destination.display(),
                        error = %e,
                        "Attachment copy failed"
                    );
                    file_errors.push(e);
                },
            }
        }

        Ok(WrittenExport {
            transcript,
            attachments_dir: Some(attachments_dir),
            copied,
            file_errors,
        })
    }
}

fn write_document(path: &Path, document: &str) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(document.as_bytes())?;
    writer.flush()?;
    Ok(())
}
