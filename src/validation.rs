use anyhow::{anyhow, Result};
use std::path::Path;

/// Longest accepted contact argument
const MAX_CONTACT_LEN: usize = 1024;

/// Validation of command-line input before any store access
#[derive(Debug, Copy, Clone)]
pub struct InputValidator;

impl InputValidator {
    /// Reject a malformed `--contact` argument such as one with embedded
    /// control characters. Blank contacts pass; they fail later as that
    /// contact's `InvalidContactFormat` without stopping the run.
    pub fn validate_contact(arg: &str) -> Result<()> {
        if arg.len() > MAX_CONTACT_LEN {
            return Err(anyhow!("Contact too long (max {MAX_CONTACT_LEN} characters)"));
        }

        if arg.chars().any(|c| c.is_control() && c != '\t') {
            return Err(anyhow!("Contact contains invalid characters: {arg:?}"));
        }

        Ok(())
    }

    /// Validate the `sms.db` path
    pub fn validate_store_path(path: &Path) -> Result<()> {
        if path.as_os_str().is_empty() {
            return Err(anyhow!("Message store path cannot be empty"));
        }

        if !path.exists() {
            return Err(anyhow!("Message store does not exist: {path:?}"));
        }

        if !path.is_file() {
            return Err(anyhow!("Message store is not a file: {path:?}"));
        }

        Ok(())
    }

    /// Validate the backup root holding the attachment tree
    pub fn validate_attachments_root(path: &Path) -> Result<()> {
        if !path.is_dir() {
            return Err(anyhow!("Attachments root is not a directory: {path:?}"));
        }

        Ok(())
    }

    /// Validate the output directory; it may not exist yet
    pub fn validate_output_dir(path: &Path) -> Result<()> {
        if path.as_os_str().is_empty() {
            return Err(anyhow!("Output directory cannot be empty"));
        }

        if path.exists() && !path.is_dir() {
            return Err(anyhow!("Output path exists and is not a directory: {path:?}"));
        }

        Ok(())
    }
}
