use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};

use sms_transcript_export::config::AppConfig;
use sms_transcript_export::logging::{init_logging, OperationTimer};
use sms_transcript_export::validation::InputValidator;
use sms_transcript_export::{
    run_export, ContactRequest, ExportOptions, MessageStore, OutputFormat, RenderOptions, RunSummary, TimestampZone,
    TranscriptWriter,
};

/// Export per-contact transcripts from an iOS backup's sms.db
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to sms.db
    #[arg(long)]
    sms_db: Option<PathBuf>,

    /// Backup root containing Library/SMS/Attachments
    #[arg(long)]
    attachments_root: Option<PathBuf>,

    /// Contact to export; separate several identifiers of one person with ';',
    /// or give a configured alias. Repeat for more contacts.
    #[arg(short, long = "contact", required = true)]
    contacts: Vec<String>,

    /// Output directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Copy media files next to each transcript
    #[arg(long)]
    include_media: bool,

    /// Replace existing transcripts and attachment directories
    #[arg(long)]
    overwrite: bool,

    /// Output format (txt, csv, or json)
    #[arg(short, long)]
    format: Option<OutputFormat>,

    /// Render timestamps in UTC instead of local time
    #[arg(long)]
    utc: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Additional configuration file
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref())?;

    let log_level = cli.log_level.clone().unwrap_or_else(|| config.get_log_level());
    let _log_guard = init_logging(
        Some(log_level.as_str()),
        config.logging.file_path.as_deref(),
        config.logging.format == "json",
    )?;

    info!("Starting sms-export");

    let store_path = cli
        .sms_db
        .clone()
        .or_else(|| config.store.database_path.clone())
        .ok_or_else(|| anyhow!("No message store given; pass --sms-db or set store.database_path"))?;
    InputValidator::validate_store_path(&store_path)?;

    let attachments_root = cli
        .attachments_root
        .clone()
        .or_else(|| config.store.attachments_root.clone());
    if let Some(root) = &attachments_root {
        InputValidator::validate_attachments_root(root)?;
    }

    let include_media = cli.include_media || config.export.include_media;
    if include_media && attachments_root.is_none() {
        return Err(anyhow!("--include-media requires --attachments-root"));
    }

    let output_dir = cli
        .output_dir
        .clone()
        .unwrap_or_else(|| config.export.output_directory.clone());
    InputValidator::validate_output_dir(&output_dir)?;

    let requests = contact_requests(&cli.contacts, &config)?;

    let options = ExportOptions {
        render: RenderOptions {
            owner_label: config.export.owner_label.clone(),
            zone: if cli.utc { TimestampZone::Utc } else { config.export.timezone },
            format: cli.format.unwrap_or(config.export.format),
        },
        attachments_root,
        include_media,
    };
    let writer = TranscriptWriter::new(output_dir, cli.overwrite || config.export.overwrite);

    let timer = OperationTimer::new("export_run");
    let store = MessageStore::open(&store_path)
        .with_context(|| format!("Failed to open message store {}", store_path.display()))?;
    let summary = run_export(&store, &requests, &options, &writer)?;
    timer.finish();

    report(&summary);
    Ok(ExitCode::from(summary.exit_code()))
}

/// Turn `--contact` arguments into requests, expanding configured aliases
fn contact_requests(args: &[String], config: &AppConfig) -> Result<Vec<ContactRequest>> {
    args.iter()
        .map(|arg| {
            InputValidator::validate_contact(arg)?;
            Ok(match config.find_alias(arg) {
                Some(identifiers) => ContactRequest::new(arg.trim(), identifiers.to_vec()),
                None => ContactRequest::parse(arg),
            })
        })
        .collect()
}

fn report(summary: &RunSummary) {
    for exported in &summary.exported {
        info!(
            contact = %exported.label,
            transcript = %exported.written.transcript.display(),
            messages = exported.message_count,
            attachments = exported.written.copied,
            "Exported"
        );
    }
    for warning in &summary.warnings {
        warn!(contact = %warning.label, error = %warning.error, "Export warning");
    }
    for failed in summary
        .resolution_failures
        .iter()
        .chain(&summary.conflicts)
        .chain(&summary.write_failures)
    {
        error!(contact = %failed.label, error = %failed.error, kind = failed.error.kind(), "Not exported");
    }

    let unmatched: Vec<&str> = summary.unmatched_identifiers().collect();
    if !unmatched.is_empty() {
        warn!(identifiers = ?unmatched, "Identifiers with no matching handle");
    }

    info!(
        exported = summary.exported.len(),
        failed = summary.failed(),
        total = summary.total(),
        "Export finished"
    );
}
