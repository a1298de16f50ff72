//! # pay-cielo
//!
//! Cielo webhook ingestion and contract reconciliation.
//!
//! A webhook from Cielo only says "payment X changed". This crate:
//!
//! 1. **Authenticates** the delivery (HMAC-SHA256 over the raw body)
//! 2. **Re-queries** the authoritative payment state from the query API
//! 3. **Reconciles** the contract carrying the payment id
//! 4. **Issues** a receipt exactly once for approved payments
//! 5. **Audits** every significant step
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pay_cielo::{CieloClient, CieloConfig, ReceiptService, WebhookService, AUDIT_SERVICE};
//! use pay_core::{AuditLogger, InMemoryStore};
//!
//! let config = CieloConfig::from_env()?;
//! let gateway = Arc::new(CieloClient::new(config.clone())?);
//! let store = Arc::new(InMemoryStore::new());
//! let issuer = Arc::new(ReceiptService::new(gateway.clone(), store.clone()));
//!
//! let service = WebhookService::new(
//!     &config,
//!     gateway,
//!     store,
//!     issuer,
//!     AuditLogger::tracing(AUDIT_SERVICE),
//! )?;
//!
//! // In your webhook endpoint:
//! if service.authenticate(&body, signature, &correlation_id) {
//!     let notification = service.parse(&body, &correlation_id)?;
//!     service.process_notification(&notification, &correlation_id).await?;
//! }
//! ```

pub mod client;
pub mod config;
pub mod issuer;
pub mod mock;
pub mod receipt;
pub mod reconcile;
pub mod signature;
pub mod status;
pub mod webhook;

// Re-exports
pub use client::CieloClient;
pub use config::{CieloConfig, Environment, DEFAULT_QUERY_API_URL};
pub use issuer::{generate_receipt_number, ReceiptService, PENDING_PDF_URL, RECEIPT_PREFIX};
pub use mock::MockGateway;
pub use receipt::{match_client, ReceiptTrigger};
pub use reconcile::{ContractReconciler, ReconcileOutcome, Reconciliation};
pub use signature::{compute_signature, SignatureValidator};
pub use status::{map_status, GatewayStatus, StatusMapping};
pub use webhook::{WebhookConfiguration, WebhookService, AUDIT_SERVICE, WEBHOOK_EVENTS};
