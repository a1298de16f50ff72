//! # pay-core
//!
//! Core types and traits for the Cielo webhook pipeline.
//!
//! This crate provides:
//! - `WebhookNotification` and `ChangeType` for inbound gateway callbacks
//! - `Contract`, `Client`, `Plan`, `Pet` records of the plan-management system
//! - `PaymentDetails` and `PaymentReceipt` for reconciliation and receipts
//! - Collaborator ports (`PaymentGateway`, `ContractStore`, `ReceiptStore`, `ReceiptIssuer`)
//! - `AuditLogger` for the append-only security audit trail
//! - `PaymentError` for typed error handling
//!
//! ## Example
//!
//! ```rust,ignore
//! use pay_core::{AuditLogger, AuditEventKind, InMemoryStore, WebhookNotification};
//!
//! let audit = AuditLogger::tracing("CieloWebhookService");
//! let notification = WebhookNotification::from_slice(body)?;
//!
//! audit.log(
//!     AuditEventKind::WebhookReceived,
//!     serde_json::json!({ "paymentId": notification.payment_id }),
//!     &correlation_id,
//! );
//! ```

pub mod audit;
pub mod contract;
pub mod error;
pub mod memory;
pub mod notification;
pub mod payment;
pub mod ports;
pub mod receipt;

// Re-exports for convenience
pub use audit::{
    AuditEvent, AuditEventKind, AuditLogger, AuditSeverity, AuditSink, MemoryAuditSink,
    TracingAuditSink,
};
pub use contract::{Client, Contract, ContractStatus, ContractUpdate, Pet, Plan};
pub use error::{PaymentError, PaymentResult};
pub use memory::InMemoryStore;
pub use notification::{ChangeType, WebhookNotification};
pub use payment::PaymentDetails;
pub use ports::{
    ContractStore, PaymentGateway, ReceiptIssuer, ReceiptStore, SharedContractStore,
    SharedPaymentGateway, SharedReceiptIssuer, SharedReceiptStore,
};
pub use receipt::{PaymentMethod, PaymentReceipt, ReceiptRequest, ReceiptResult};
