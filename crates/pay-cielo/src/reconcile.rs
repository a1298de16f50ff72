//! # Contract Reconciliation
//!
//! Pulls the authoritative payment state from the gateway and writes the
//! mapped status onto the contract that carries the payment id.

use crate::status::{map_status, StatusMapping};
use chrono::Utc;
use pay_core::{
    AuditEventKind, AuditLogger, Contract, ContractStatus, ContractUpdate, PaymentDetails,
    PaymentResult, SharedContractStore, SharedPaymentGateway,
};
use serde_json::json;
use tracing::{error, info, instrument, warn};

/// What happened to the contract
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    Updated {
        contract: Contract,
        previous_status: ContractStatus,
    },
    /// No contract carries this payment id; nothing was written
    ContractNotFound,
}

/// Result of one reconciliation pass
#[derive(Debug, Clone)]
pub struct Reconciliation {
    /// Authoritative gateway state the decision was based on
    pub details: PaymentDetails,
    pub mapping: StatusMapping,
    pub outcome: ReconcileOutcome,
}

impl Reconciliation {
    pub fn contract(&self) -> Option<&Contract> {
        match &self.outcome {
            ReconcileOutcome::Updated { contract, .. } => Some(contract),
            ReconcileOutcome::ContractNotFound => None,
        }
    }
}

pub struct ContractReconciler {
    gateway: SharedPaymentGateway,
    store: SharedContractStore,
    audit: AuditLogger,
}

impl ContractReconciler {
    pub fn new(gateway: SharedPaymentGateway, store: SharedContractStore, audit: AuditLogger) -> Self {
        Self {
            gateway,
            store,
            audit,
        }
    }

    /// Re-query the gateway and persist the mapped contract state.
    #[instrument(skip(self))]
    pub async fn reconcile(
        &self,
        payment_id: &str,
        client_order_id: Option<&str>,
        correlation_id: &str,
    ) -> PaymentResult<Reconciliation> {
        let details = self.gateway.query_payment(payment_id).await?;

        info!(
            correlation_id,
            payment_id,
            status = details.status,
            return_code = %details.return_code,
            return_message = %details.return_message,
            "Payment status refreshed from {}",
            self.gateway.provider_name()
        );

        let mapping = map_status(details.status);
        let outcome = match self
            .persist(payment_id, client_order_id, &details, mapping, correlation_id)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(correlation_id, payment_id, error = %e, "Failed to update contract");
                self.audit.log(
                    AuditEventKind::ContractUpdateFailed,
                    json!({
                        "paymentId": payment_id,
                        "clientOrderId": client_order_id,
                        "error": e.to_string(),
                    }),
                    correlation_id,
                );
                return Err(e);
            }
        };

        Ok(Reconciliation {
            details,
            mapping,
            outcome,
        })
    }

    async fn persist(
        &self,
        payment_id: &str,
        client_order_id: Option<&str>,
        details: &PaymentDetails,
        mapping: StatusMapping,
        correlation_id: &str,
    ) -> PaymentResult<ReconcileOutcome> {
        let Some(contract) = self
            .store
            .get_contract_by_external_payment_id(payment_id)
            .await?
        else {
            warn!(correlation_id, payment_id, ?client_order_id, "No contract found for payment");
            self.audit.log(
                AuditEventKind::ContractNotFound,
                json!({
                    "paymentId": payment_id,
                    "clientOrderId": client_order_id,
                    "cieloStatus": details.status,
                }),
                correlation_id,
            );
            return Ok(ReconcileOutcome::ContractNotFound);
        };

        let now = Utc::now();
        let update = ContractUpdate {
            status: mapping.contract_status,
            return_code: details.return_code.clone(),
            return_message: details.return_message.clone(),
            updated_at: now,
            // First capture date wins so duplicate deliveries write the same state
            received_date: mapping
                .should_stamp_received_date
                .then(|| contract.received_date.unwrap_or(now)),
        };

        let updated = self.store.update_contract(&contract.id, &update).await?;

        info!(
            correlation_id,
            contract_id = %contract.id,
            contract_number = %contract.contract_number,
            old_status = %contract.status,
            new_status = %updated.status,
            cielo_status = details.status,
            "Contract updated"
        );

        self.audit.log(
            AuditEventKind::ContractStatusUpdated,
            json!({
                "contractId": contract.id,
                "contractNumber": contract.contract_number,
                "paymentId": payment_id,
                "oldStatus": contract.status,
                "newStatus": updated.status,
                "cieloStatus": details.status,
            }),
            correlation_id,
        );

        Ok(ReconcileOutcome::Updated {
            previous_status: contract.status,
            contract: updated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockGateway;
    use pay_core::{InMemoryStore, MemoryAuditSink};
    use std::sync::Arc;

    struct Fixture {
        store: Arc<InMemoryStore>,
        gateway: Arc<MockGateway>,
        sink: Arc<MemoryAuditSink>,
        reconciler: ContractReconciler,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        store
            .put_contract(Contract::new("c1", "UNI-0001", "cl1").with_payment_id("P1"))
            .await
            .unwrap();
        let gateway = Arc::new(MockGateway::new());
        let sink = Arc::new(MemoryAuditSink::new());
        let audit = AuditLogger::new("test").with_sink(sink.clone());
        let reconciler = ContractReconciler::new(gateway.clone(), store.clone(), audit);
        Fixture {
            store,
            gateway,
            sink,
            reconciler,
        }
    }

    #[tokio::test]
    async fn test_paid_payment_activates_contract() {
        let f = fixture().await;
        f.gateway
            .set(PaymentDetails::new("P1", 2).with_return("6", "Operation Successful"));

        let result = f.reconciler.reconcile("P1", None, "corr").await.unwrap();

        let contract = f.store.contract("c1").await.unwrap();
        assert_eq!(contract.status, ContractStatus::Active);
        assert!(contract.received_date.is_some());
        assert_eq!(contract.return_code, "6");
        assert!(matches!(
            result.outcome,
            ReconcileOutcome::Updated { previous_status: ContractStatus::Inactive, .. }
        ));

        let events = f.sink.of_kind(AuditEventKind::ContractStatusUpdated);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].details["oldStatus"], "inactive");
        assert_eq!(events[0].details["newStatus"], "active");
        assert_eq!(events[0].details["cieloStatus"], 2);
    }

    #[tokio::test]
    async fn test_voided_payment_cancels_contract() {
        let f = fixture().await;
        f.gateway.set(PaymentDetails::new("P1", 10));

        f.reconciler.reconcile("P1", None, "corr").await.unwrap();

        let contract = f.store.contract("c1").await.unwrap();
        assert_eq!(contract.status, ContractStatus::Cancelled);
        assert!(contract.received_date.is_none());
    }

    #[tokio::test]
    async fn test_reconcile_twice_is_idempotent() {
        let f = fixture().await;
        f.gateway
            .set(PaymentDetails::new("P1", 2).with_return("6", "Operation Successful"));

        f.reconciler.reconcile("P1", None, "corr-1").await.unwrap();
        let mut once = f.store.contract("c1").await.unwrap();

        f.reconciler.reconcile("P1", None, "corr-2").await.unwrap();
        let twice = f.store.contract("c1").await.unwrap();

        assert!(twice.updated_at >= once.updated_at);
        once.updated_at = twice.updated_at;
        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn test_missing_contract_is_a_no_op() {
        let f = fixture().await;
        f.gateway.set(PaymentDetails::new("P404", 2));

        let result = f
            .reconciler
            .reconcile("P404", Some("order-1"), "corr")
            .await
            .unwrap();

        assert_eq!(result.outcome, ReconcileOutcome::ContractNotFound);
        assert!(result.contract().is_none());
        assert_eq!(result.mapping.contract_status, ContractStatus::Active);
        assert_eq!(f.sink.count(AuditEventKind::ContractNotFound), 1);
        assert_eq!(f.store.contract("c1").await.unwrap().status, ContractStatus::Inactive);
    }

    #[tokio::test]
    async fn test_gateway_failure_propagates_without_writes() {
        let f = fixture().await;
        f.gateway.fail_with_network_error("connection refused");

        let err = f.reconciler.reconcile("P1", None, "corr").await.unwrap_err();

        assert!(err.is_retryable());
        assert!(f.sink.events().is_empty());
        assert_eq!(f.store.contract("c1").await.unwrap().status, ContractStatus::Inactive);
    }
}
