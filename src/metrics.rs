use metrics::{counter, histogram};
use std::time::Duration;

use crate::models::OutputFormat;

pub const CONTACTS_EXPORTED_TOTAL: &str = "sms_export_contacts_exported_total";
pub const CONTACTS_FAILED_TOTAL: &str = "sms_export_contacts_failed_total";
pub const MESSAGES_RENDERED_TOTAL: &str = "sms_export_messages_rendered_total";
pub const ATTACHMENTS_STAGED_TOTAL: &str = "sms_export_attachments_staged_total";
pub const ATTACHMENTS_MISSING_TOTAL: &str = "sms_export_attachments_missing_total";
pub const CONTACT_EXPORT_DURATION: &str = "sms_export_contact_duration_seconds";

/// Export metrics, emitted through whatever recorder the binary installs.
/// Without a recorder every call is a no-op.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetricsCollector;

impl MetricsCollector {
    /// Record one successfully written contact
    pub fn record_contact_exported(&self, format: OutputFormat, messages: usize, attachments: usize, duration: Duration) {
        let format = format.to_string();
        counter!(CONTACTS_EXPORTED_TOTAL, "format" => format.clone()).increment(1);
        counter!(MESSAGES_RENDERED_TOTAL, "format" => format).increment(messages as u64);
        counter!(ATTACHMENTS_STAGED_TOTAL).increment(attachments as u64);
        histogram!(CONTACT_EXPORT_DURATION).record(duration.as_secs_f64());
    }

    /// Record a contact that was not exported, labelled by error kind
    pub fn record_contact_failed(&self, kind: &'static str) {
        counter!(CONTACTS_FAILED_TOTAL, "kind" => kind).increment(1);
    }

    /// Record an attachment whose file is absent from the backup
    pub fn record_attachment_missing(&self) {
        counter!(ATTACHMENTS_MISSING_TOTAL).increment(1);
    }
}
