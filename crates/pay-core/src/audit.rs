//! # Security Audit Log
//!
//! Append-only, fire-and-forget audit trail for the webhook pipeline.
//! Every record carries a timestamp, an event name from a fixed vocabulary
//! and the correlation id of the delivery that produced it.
//!
//! ```text
//!  AuditLogger::log(kind, details, correlation_id)
//!        │
//!        ├──▶ TracingAuditSink   (target = "security_audit")
//!        └──▶ MemoryAuditSink    (tests, inspection)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

/// Controlled vocabulary of audit events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventKind {
    WebhookReceived,
    WebhookProcessingFailed,
    SignatureRejected,
    PaymentApproved,
    PaymentApprovedProcessingFailed,
    ContractStatusUpdated,
    ContractNotFound,
    ContractUpdateFailed,
    RecurrencyReceived,
    ChargebackReceived,
    PaymentReceiptGenerated,
    PaymentReceiptGenerationFailed,
    PaymentReceiptGenerationCriticalError,
}

impl AuditEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventKind::WebhookReceived => "webhook_received",
            AuditEventKind::WebhookProcessingFailed => "webhook_processing_failed",
            AuditEventKind::SignatureRejected => "signature_rejected",
            AuditEventKind::PaymentApproved => "payment_approved",
            AuditEventKind::PaymentApprovedProcessingFailed => {
                "payment_approved_processing_failed"
            }
            AuditEventKind::ContractStatusUpdated => "contract_status_updated",
            AuditEventKind::ContractNotFound => "contract_not_found",
            AuditEventKind::ContractUpdateFailed => "contract_update_failed",
            AuditEventKind::RecurrencyReceived => "recurrency_received",
            AuditEventKind::ChargebackReceived => "chargeback_received",
            AuditEventKind::PaymentReceiptGenerated => "payment_receipt_generated",
            AuditEventKind::PaymentReceiptGenerationFailed => "payment_receipt_generation_failed",
            AuditEventKind::PaymentReceiptGenerationCriticalError => {
                "payment_receipt_generation_critical_error"
            }
        }
    }

    /// Severity recorded with this event
    pub fn severity(&self) -> AuditSeverity {
        match self {
            AuditEventKind::WebhookReceived
            | AuditEventKind::PaymentApproved
            | AuditEventKind::ContractStatusUpdated
            | AuditEventKind::RecurrencyReceived
            | AuditEventKind::PaymentReceiptGenerated => AuditSeverity::Info,
            AuditEventKind::ContractNotFound | AuditEventKind::SignatureRejected => {
                AuditSeverity::Warning
            }
            AuditEventKind::WebhookProcessingFailed
            | AuditEventKind::PaymentApprovedProcessingFailed
            | AuditEventKind::ContractUpdateFailed
            | AuditEventKind::PaymentReceiptGenerationFailed => AuditSeverity::Error,
            AuditEventKind::ChargebackReceived
            | AuditEventKind::PaymentReceiptGenerationCriticalError => AuditSeverity::Critical,
        }
    }
}

impl fmt::Display for AuditEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity level for audit events
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

/// One audit record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    pub event: AuditEventKind,
    pub severity: AuditSeverity,
    /// Emitting service
    pub service: String,
    pub correlation_id: String,
    pub details: serde_json::Value,
}

/// Destination for audit records. Implementations must not panic.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: &AuditEvent);
}

/// Writes audit records as structured `tracing` events
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: &AuditEvent) {
        let details = event.details.to_string();
        match event.severity {
            AuditSeverity::Info => info!(
                target: "security_audit",
                event = event.event.as_str(),
                service = %event.service,
                correlation_id = %event.correlation_id,
                timestamp = %event.timestamp.to_rfc3339(),
                details = %details,
                "Security audit event"
            ),
            AuditSeverity::Warning => warn!(
                target: "security_audit",
                event = event.event.as_str(),
                service = %event.service,
                correlation_id = %event.correlation_id,
                timestamp = %event.timestamp.to_rfc3339(),
                details = %details,
                "Security audit event"
            ),
            AuditSeverity::Error | AuditSeverity::Critical => error!(
                target: "security_audit",
                event = event.event.as_str(),
                severity = ?event.severity,
                service = %event.service,
                correlation_id = %event.correlation_id,
                timestamp = %event.timestamp.to_rfc3339(),
                details = %details,
                "Security audit event"
            ),
        }
    }
}

/// Keeps audit records in memory
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all records, oldest first
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Records of one kind
    pub fn of_kind(&self, kind: AuditEventKind) -> Vec<AuditEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.event == kind)
            .collect()
    }

    pub fn count(&self, kind: AuditEventKind) -> usize {
        self.of_kind(kind).len()
    }

    /// Records at exactly this severity
    pub fn with_severity(&self, severity: AuditSeverity) -> Vec<AuditEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.severity == severity)
            .collect()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: &AuditEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event.clone());
    }
}

/// Fans audit records out to every configured sink
#[derive(Clone)]
pub struct AuditLogger {
    service: String,
    sinks: Vec<Arc<dyn AuditSink>>,
}

impl AuditLogger {
    /// Logger with no sinks
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            sinks: Vec::new(),
        }
    }

    /// Logger writing to `tracing`
    pub fn tracing(service: impl Into<String>) -> Self {
        Self::new(service).with_sink(Arc::new(TracingAuditSink))
    }

    /// Builder: add a sink
    pub fn with_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Append one audit record. Never fails.
    pub fn log(&self, kind: AuditEventKind, details: serde_json::Value, correlation_id: &str) {
        let event = AuditEvent {
            timestamp: Utc::now(),
            event: kind,
            severity: kind.severity(),
            service: self.service.clone(),
            correlation_id: correlation_id.to_string(),
            details,
        };

        for sink in &self.sinks {
            sink.record(&event);
        }
    }
}

impl fmt::Debug for AuditLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditLogger")
            .field("service", &self.service)
            .field("sinks", &self.sinks.len())
            .finish()
    }
}
