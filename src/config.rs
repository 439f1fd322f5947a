use anyhow::{anyhow, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::models::OutputFormat;
use crate::render::TimestampZone;

/// Application configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub export: ExportConfig,
    pub logging: LoggingConfig,
    pub contacts: ContactsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StoreConfig {
    /// Path to `sms.db`
    pub database_path: Option<PathBuf>,
    /// Root of the backup tree holding `Library/SMS/Attachments`
    pub attachments_root: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub output_directory: PathBuf,
    pub format: OutputFormat,
    pub owner_label: String,
    pub timezone: TimestampZone,
    pub include_media: bool,
    pub overwrite: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file_path: Option<PathBuf>,
    pub format: String, // "json" or "text"
}

/// Named contacts usable in place of an identifier list on the command line
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ContactsConfig {
    pub aliases: BTreeMap<String, Vec<String>>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_directory: PathBuf::from("./output"),
            format: OutputFormat::Txt,
            owner_label: "Me".to_string(),
            timezone: TimestampZone::Local,
            include_media: false,
            overwrite: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_path: None,
            format: "text".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from multiple sources with precedence.
    ///
    /// Defaults, then `config/default`, `config/local` and `sms-export` files
    /// (any format the `config` crate knows), then an explicit file, then
    /// `SMS_EXPORT__SECTION__KEY` environment variables.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let defaults = Config::try_from(&AppConfig::default())
            .map_err(|e| anyhow!("Failed to build default configuration: {}", e))?;

        let mut builder = Config::builder()
            .add_source(defaults)
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(File::with_name("sms-export").required(false));

        if let Some(path) = explicit {
            builder = builder.add_source(File::from(path).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix("SMS_EXPORT")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| anyhow!("Failed to load configuration: {}", e))?;

        let app_config: AppConfig = config
            .try_deserialize()
            .map_err(|e| anyhow!("Failed to deserialize configuration: {}", e))?;

        app_config.validate()?;

        Ok(app_config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(anyhow!(
                "Invalid log level: {}. Must be one of: {:?}",
                self.logging.level,
                valid_levels
            ));
        }

        let valid_formats = ["text", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(anyhow!(
                "Invalid log format: {}. Must be one of: {:?}",
                self.logging.format,
                valid_formats
            ));
        }

        if self.export.owner_label.trim().is_empty() {
            return Err(anyhow!("owner_label cannot be empty"));
        }

        if self.export.output_directory.as_os_str().is_empty() {
            return Err(anyhow!("output_directory cannot be empty"));
        }

        if self.export.include_media && self.store.attachments_root.is_none() {
            return Err(anyhow!("include_media requires store.attachments_root"));
        }

        for (alias, identifiers) in &self.contacts.aliases {
            if alias.trim().is_empty() {
                return Err(anyhow!("Contact alias names cannot be empty"));
            }
            if identifiers.iter().all(|i| i.trim().is_empty()) {
                return Err(anyhow!("Contact alias '{}' has no identifiers", alias));
            }
        }

        Ok(())
    }

    /// Identifiers configured under `alias`, matched case-insensitively
    #[must_use]
    pub fn find_alias(&self, alias: &str) -> Option<&[String]> {
        let wanted = alias.trim();
        self.contacts
            .aliases
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(wanted))
            .map(|(_, identifiers)| identifiers.as_slice())
    }

    /// Get log level from environment or config
    pub fn get_log_level(&self) -> String {
        std::env::var("RUST_LOG").unwrap_or_else(|_| self.logging.level.clone())
    }
}
