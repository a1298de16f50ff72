//! # Receipt Trigger
//!
//! Assembles receipt display data for an approved payment and hands it to
//! the receipt issuer. Failures here are audited and swallowed: a receipt
//! problem must never turn a webhook delivery into a gateway retry.

use pay_core::{
    AuditEventKind, AuditLogger, Client, Contract, PaymentDetails, PaymentError, PaymentResult,
    ReceiptRequest, ReceiptResult, SharedContractStore, SharedReceiptIssuer, WebhookNotification,
};
use serde_json::json;
use tracing::{error, info, instrument, warn};

/// Prefix for structured client references in `ClientOrderId`
pub const CLIENT_REFERENCE_PREFIX: &str = "client:";

/// Resolve a client from a merchant order reference.
///
/// Tried in order: exact client id, exact email (case-insensitive),
/// `client:<id>`, then, only when `legacy_substring` is set, any client whose
/// email or id occurs inside the reference.
pub fn match_client<'a>(
    clients: &'a [Client],
    client_order_id: &str,
    legacy_substring: bool,
) -> Option<&'a Client> {
    let reference = client_order_id.trim();
    if reference.is_empty() {
        return None;
    }

    clients
        .iter()
        .find(|c| c.id == reference)
        .or_else(|| clients.iter().find(|c| c.email.eq_ignore_ascii_case(reference)))
        .or_else(|| {
            reference
                .strip_prefix(CLIENT_REFERENCE_PREFIX)
                .and_then(|id| clients.iter().find(|c| c.id == id))
        })
        .or_else(|| {
            if !legacy_substring {
                return None;
            }
            clients.iter().find(|c| {
                (!c.email.is_empty() && reference.contains(c.email.as_str()))
                    || (!c.id.is_empty() && reference.contains(c.id.as_str()))
            })
        })
}

pub struct ReceiptTrigger {
    store: SharedContractStore,
    issuer: SharedReceiptIssuer,
    audit: AuditLogger,
    legacy_client_matching: bool,
}

impl ReceiptTrigger {
    pub fn new(store: SharedContractStore, issuer: SharedReceiptIssuer, audit: AuditLogger) -> Self {
        Self {
            store,
            issuer,
            audit,
            legacy_client_matching: false,
        }
    }

    /// Builder: enable substring client matching
    pub fn with_legacy_client_matching(mut self, enabled: bool) -> Self {
        self.legacy_client_matching = enabled;
        self
    }

    /// Issue the receipt for an approved payment. Never fails.
    #[instrument(skip_all, fields(payment_id = %notification.payment_id))]
    pub async fn generate_receipt_if_approved(
        &self,
        notification: &WebhookNotification,
        details: &PaymentDetails,
        correlation_id: &str,
    ) -> Option<ReceiptResult> {
        match self.issue(notification, details, correlation_id).await {
            Ok(result) => result,
            Err(e) => {
                error!(correlation_id, error = %e, "Receipt generation aborted");
                self.audit.log(
                    AuditEventKind::PaymentReceiptGenerationCriticalError,
                    json!({
                        "paymentId": notification.payment_id,
                        "error": e.to_string(),
                    }),
                    correlation_id,
                );
                None
            }
        }
    }

    async fn issue(
        &self,
        notification: &WebhookNotification,
        details: &PaymentDetails,
        correlation_id: &str,
    ) -> PaymentResult<Option<ReceiptResult>> {
        let payment_id = notification.payment_id.as_str();
        let contract = self.find_contract(payment_id, correlation_id).await;

        let mut client = match &contract {
            Some(contract) => self.find_client(&contract.client_id, correlation_id).await,
            None => None,
        };

        if client.is_none() {
            if let Some(order_id) = notification.client_order_id.as_deref() {
                client = self.match_order_reference(order_id, correlation_id).await;
            }
        }

        let Some(client) = client else {
            warn!(
                correlation_id,
                payment_id,
                client_order_id = ?notification.client_order_id,
                "No client found for payment, skipping receipt"
            );
            return Ok(None);
        };

        let (plan_name, pet_name) = match &contract {
            Some(contract) => self.display_names(contract, correlation_id).await,
            None => (None, None),
        };

        let request = ReceiptRequest {
            contract_id: contract.as_ref().map(|c| c.id.clone()),
            cielo_payment_id: payment_id.to_string(),
            client_name: client.full_name.clone(),
            client_email: client.email.clone(),
            pet_name,
            plan_name,
        };

        info!(
            correlation_id,
            client_name = %request.client_name,
            pet_name = ?request.pet_name,
            plan_name = ?request.plan_name,
            amount = %details.amount_display(),
            "Generating payment receipt"
        );

        let result = match self
            .issuer
            .generate_payment_receipt(&request, correlation_id)
            .await
        {
            Ok(result) => result,
            Err(PaymentError::DuplicateReceipt { .. }) => {
                info!(correlation_id, payment_id, "Receipt already issued for payment");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        if result.success {
            info!(
                correlation_id,
                receipt_id = ?result.receipt_id,
                pdf_url = ?result.pdf_url,
                already_issued = result.already_issued,
                "Payment receipt generated"
            );
            self.audit.log(
                AuditEventKind::PaymentReceiptGenerated,
                json!({
                    "paymentId": payment_id,
                    "receiptId": result.receipt_id,
                    "alreadyIssued": result.already_issued,
                    "clientEmail": client.email,
                }),
                correlation_id,
            );
        } else {
            error!(correlation_id, error = ?result.error, "Payment receipt generation failed");
            self.audit.log(
                AuditEventKind::PaymentReceiptGenerationFailed,
                json!({
                    "paymentId": payment_id,
                    "error": result.error,
                    "clientEmail": client.email,
                }),
                correlation_id,
            );
        }

        Ok(Some(result))
    }

    async fn find_contract(&self, payment_id: &str, correlation_id: &str) -> Option<Contract> {
        match self.store.get_contract_by_external_payment_id(payment_id).await {
            Ok(found) => found,
            Err(e) => {
                error!(correlation_id, error = %e, "Contract lookup failed");
                None
            }
        }
    }

    async fn find_client(&self, client_id: &str, correlation_id: &str) -> Option<Client> {
        match self.store.get_client_by_id(client_id).await {
            Ok(found) => found,
            Err(e) => {
                error!(correlation_id, error = %e, "Client lookup failed");
                None
            }
        }
    }

    async fn match_order_reference(&self, order_id: &str, correlation_id: &str) -> Option<Client> {
        let clients = match self.store.get_all_clients().await {
            Ok(clients) => clients,
            Err(e) => {
                error!(correlation_id, error = %e, "Client listing failed");
                return None;
            }
        };

        let found = match_client(&clients, order_id, self.legacy_client_matching).cloned();
        if let Some(client) = &found {
            info!(correlation_id, client_id = %client.id, "Client resolved from ClientOrderId");
        }
        found
    }

    async fn display_names(
        &self,
        contract: &Contract,
        correlation_id: &str,
    ) -> (Option<String>, Option<String>) {
        let plan = match &contract.plan_id {
            Some(id) => self.store.get_plan(id).await,
            None => Ok(None),
        };
        let pet = match &contract.pet_id {
            Some(id) => self.store.get_pet(id).await,
            None => Ok(None),
        };

        match (plan, pet) {
            (Ok(plan), Ok(pet)) => (plan.map(|p| p.name), pet.map(|p| p.name)),
            (plan, pet) => {
                error!(correlation_id, "Plan/pet lookup failed");
                (
                    plan.ok().flatten().map(|p| p.name),
                    pet.ok().flatten().map(|p| p.name),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pay_core::{InMemoryStore, MemoryAuditSink, Pet, Plan, ReceiptIssuer};
    use std::sync::{Arc, Mutex};

    /// Records requests and answers with a preset result
    struct RecordingIssuer {
        requests: Mutex<Vec<ReceiptRequest>>,
        answer: fn() -> PaymentResult<ReceiptResult>,
    }

    impl RecordingIssuer {
        fn new(answer: fn() -> PaymentResult<ReceiptResult>) -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
                answer,
            }
        }

        fn requests(&self) -> Vec<ReceiptRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ReceiptIssuer for RecordingIssuer {
        async fn generate_payment_receipt(
            &self,
            request: &ReceiptRequest,
            _correlation_id: &str,
        ) -> PaymentResult<ReceiptResult> {
            self.requests.lock().unwrap().push(request.clone());
            (self.answer)()
        }
    }

    fn ok_result() -> PaymentResult<ReceiptResult> {
        Ok(ReceiptResult {
            success: true,
            already_issued: false,
            receipt_id: Some("r-1".into()),
            receipt_number: Some("UNIPET1".into()),
            pdf_url: Some("pending_storage".into()),
            error: None,
        })
    }

    async fn seeded_store() -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        store
            .put_contract(
                Contract::new("c1", "UNI-0001", "cl1")
                    .with_payment_id("P1")
                    .with_plan("plan-1")
                    .with_pet("pet-1"),
            )
            .await
            .unwrap();
        store
            .put_client(Client::new("cl1", "Ana Souza", "ana@example.com"))
            .await;
        store
            .put_client(Client::new("cl2", "Bruno Lima", "bruno@example.com"))
            .await;
        store
            .put_plan(Plan {
                id: "plan-1".into(),
                name: "INFINITY".into(),
            })
            .await;
        store
            .put_pet(Pet {
                id: "pet-1".into(),
                name: "Thor".into(),
            })
            .await;
        store
    }

    fn build_trigger(
        store: Arc<InMemoryStore>,
        issuer: Arc<RecordingIssuer>,
    ) -> (ReceiptTrigger, Arc<MemoryAuditSink>) {
        let sink = Arc::new(MemoryAuditSink::new());
        let audit = AuditLogger::new("test").with_sink(sink.clone());
        (ReceiptTrigger::new(store, issuer, audit), sink)
    }

    #[test]
    fn test_match_client_prefers_structured_matches() {
        let clients = vec![
            Client::new("cl1", "Ana", "ana@example.com"),
            Client::new("cl2", "Bruno", "bruno@example.com"),
        ];

        assert_eq!(match_client(&clients, "cl2", false).unwrap().id, "cl2");
        assert_eq!(
            match_client(&clients, "BRUNO@example.com", false).unwrap().id,
            "cl2"
        );
        assert_eq!(match_client(&clients, "client:cl1", false).unwrap().id, "cl1");
        assert!(match_client(&clients, "order-bruno@example.com-77", false).is_none());
        assert!(match_client(&clients, "  ", true).is_none());
    }

    #[test]
    fn test_match_client_legacy_substring() {
        let clients = vec![
            Client::new("", "No id", ""),
            Client::new("cl2", "Bruno", "bruno@example.com"),
        ];

        let found = match_client(&clients, "order-bruno@example.com-77", true);
        assert_eq!(found.unwrap().id, "cl2");
    }

    #[tokio::test]
    async fn test_receipt_from_contract_data() {
        let store = seeded_store().await;
        let issuer = Arc::new(RecordingIssuer::new(ok_result));
        let (trigger, sink) = build_trigger(store, issuer.clone());

        let notification = WebhookNotification::new("P1", pay_core::ChangeType::PaymentStatus);
        let result = trigger
            .generate_receipt_if_approved(&notification, &PaymentDetails::new("P1", 2), "corr")
            .await;

        assert!(result.unwrap().success);
        let requests = issuer.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].contract_id.as_deref(), Some("c1"));
        assert_eq!(requests[0].client_name, "Ana Souza");
        assert_eq!(requests[0].plan_name.as_deref(), Some("INFINITY"));
        assert_eq!(requests[0].pet_name.as_deref(), Some("Thor"));

        let events = sink.of_kind(AuditEventKind::PaymentReceiptGenerated);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].details["receiptId"], "r-1");
    }

    #[tokio::test]
    async fn test_receipt_falls_back_to_client_order_id() {
        let store = seeded_store().await;
        let issuer = Arc::new(RecordingIssuer::new(ok_result));
        let (trigger, _sink) = build_trigger(store, issuer.clone());

        let notification = WebhookNotification::new("P-new", pay_core::ChangeType::PaymentStatus)
            .with_client_order_id("bruno@example.com");
        trigger
            .generate_receipt_if_approved(&notification, &PaymentDetails::new("P-new", 2), "corr")
            .await;

        let requests = issuer.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].contract_id.is_none());
        assert_eq!(requests[0].client_email, "bruno@example.com");
        assert!(requests[0].plan_name.is_none());
    }

    #[tokio::test]
    async fn test_no_client_means_no_receipt() {
        let store = seeded_store().await;
        let issuer = Arc::new(RecordingIssuer::new(ok_result));
        let (trigger, sink) = build_trigger(store, issuer.clone());

        let notification = WebhookNotification::new("P-unknown", pay_core::ChangeType::PaymentStatus);
        let result = trigger
            .generate_receipt_if_approved(&notification, &PaymentDetails::new("P-unknown", 2), "corr")
            .await;

        assert!(result.is_none());
        assert!(issuer.requests().is_empty());
        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn test_issuer_failure_is_audited_not_raised() {
        let store = seeded_store().await;
        let issuer = Arc::new(RecordingIssuer::new(|| {
            Ok(ReceiptResult::failed("status not receivable"))
        }));
        let (trigger, sink) = build_trigger(store.clone(), issuer);

        let notification = WebhookNotification::new("P1", pay_core::ChangeType::PaymentStatus);
        let result = trigger
            .generate_receipt_if_approved(&notification, &PaymentDetails::new("P1", 2), "corr")
            .await;

        assert!(!result.unwrap().success);
        assert_eq!(sink.count(AuditEventKind::PaymentReceiptGenerationFailed), 1);

        let issuer = Arc::new(RecordingIssuer::new(|| {
            Err(PaymentError::Internal("boom".into()))
        }));
        let (trigger, sink) = build_trigger(store, issuer);
        let result = trigger
            .generate_receipt_if_approved(&notification, &PaymentDetails::new("P1", 2), "corr")
            .await;

        assert!(result.is_none());
        assert_eq!(
            sink.count(AuditEventKind::PaymentReceiptGenerationCriticalError),
            1
        );
    }

    #[tokio::test]
    async fn test_duplicate_receipt_is_a_no_op() {
        let store = seeded_store().await;
        let issuer = Arc::new(RecordingIssuer::new(|| {
            Err(PaymentError::DuplicateReceipt {
                payment_id: "P1".into(),
            })
        }));
        let (trigger, sink) = build_trigger(store, issuer);

        let notification = WebhookNotification::new("P1", pay_core::ChangeType::PaymentStatus);
        let result = trigger
            .generate_receipt_if_approved(&notification, &PaymentDetails::new("P1", 2), "corr")
            .await;

        assert!(result.is_none());
        assert!(sink.events().is_empty());
    }
}
