//! # Collaborator Ports
//!
//! Traits for everything the webhook pipeline talks to. Implementations are
//! injected at construction as `Arc<dyn Trait>`, so the pipeline never
//! reaches for a global or loads a collaborator lazily.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      WebhookService                          │
//! └──────────────────────────────────────────────────────────────┘
//!        │                 │                  │
//!  ┌─────┴──────┐   ┌──────┴───────┐   ┌──────┴───────┐
//!  │  Payment   │   │  Contract    │   │   Receipt    │
//!  │  Gateway   │   │  Store       │   │   Issuer     │──▶ ReceiptStore
//!  └────────────┘   └──────────────┘   └──────────────┘
//! ```

use crate::contract::{Client, Contract, ContractUpdate, Pet, Plan};
use crate::error::PaymentResult;
use crate::payment::PaymentDetails;
use crate::receipt::{PaymentReceipt, ReceiptRequest, ReceiptResult};
use async_trait::async_trait;
use std::sync::Arc;

/// Authoritative payment state at the gateway
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Query the current state of a payment.
    async fn query_payment(&self, payment_id: &str) -> PaymentResult<PaymentDetails>;

    /// Gateway name (for logging).
    fn provider_name(&self) -> &'static str;
}

/// Persistence interface of the surrounding plan-management system
#[async_trait]
pub trait ContractStore: Send + Sync {
    /// Contract correlated with a gateway payment id (at most one).
    async fn get_contract_by_external_payment_id(
        &self,
        payment_id: &str,
    ) -> PaymentResult<Option<Contract>>;

    /// Apply a partial update as a last-write-wins set.
    async fn update_contract(&self, id: &str, update: &ContractUpdate) -> PaymentResult<Contract>;

    async fn get_client_by_id(&self, id: &str) -> PaymentResult<Option<Client>>;

    async fn get_plan(&self, id: &str) -> PaymentResult<Option<Plan>>;

    async fn get_pet(&self, id: &str) -> PaymentResult<Option<Pet>>;

    async fn get_all_contracts(&self) -> PaymentResult<Vec<Contract>>;

    async fn get_all_clients(&self) -> PaymentResult<Vec<Client>>;
}

/// Receipt records, unique per gateway payment id
#[async_trait]
pub trait ReceiptStore: Send + Sync {
    async fn get_receipt_by_payment_id(
        &self,
        payment_id: &str,
    ) -> PaymentResult<Option<PaymentReceipt>>;

    /// Insert a receipt. Fails with `PaymentError::DuplicateReceipt` if one
    /// already exists for the same payment id.
    async fn insert_receipt(&self, receipt: PaymentReceipt) -> PaymentResult<PaymentReceipt>;
}

/// Issues the official receipt for an approved payment
#[async_trait]
pub trait ReceiptIssuer: Send + Sync {
    /// `Ok` with `success == false` is an expected failure (e.g. payment not
    /// in a receivable state); `Err` is an unexpected one.
    async fn generate_payment_receipt(
        &self,
        request: &ReceiptRequest,
        correlation_id: &str,
    ) -> PaymentResult<ReceiptResult>;
}

pub type SharedPaymentGateway = Arc<dyn PaymentGateway>;
pub type SharedContractStore = Arc<dyn ContractStore>;
pub type SharedReceiptStore = Arc<dyn ReceiptStore>;
pub type SharedReceiptIssuer = Arc<dyn ReceiptIssuer>;
