//! # Receipt Service
//!
//! `ReceiptIssuer` backed by a `ReceiptStore`. Issuance is idempotent per
//! gateway payment id: an existing receipt is returned instead of a new one.

use crate::status::GatewayStatus;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pay_core::{
    PaymentError, PaymentMethod, PaymentReceipt, PaymentResult, ReceiptIssuer, ReceiptRequest,
    ReceiptResult, SharedPaymentGateway, SharedReceiptStore,
};
use rand::distr::Alphanumeric;
use rand::Rng;
use tracing::{info, instrument, warn};

/// Receipt number prefix
pub const RECEIPT_PREFIX: &str = "UNIPET";

/// Placeholder until the PDF has been uploaded to object storage
pub const PENDING_PDF_URL: &str = "pending_storage";

pub struct ReceiptService {
    gateway: SharedPaymentGateway,
    receipts: SharedReceiptStore,
}

impl ReceiptService {
    pub fn new(gateway: SharedPaymentGateway, receipts: SharedReceiptStore) -> Self {
        Self { gateway, receipts }
    }
}

/// `UNIPET` + timestamp + four random uppercase alphanumerics
pub fn generate_receipt_number(now: DateTime<Utc>) -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .map(char::from)
        .map(|c| c.to_ascii_uppercase())
        .take(4)
        .collect();

    format!("{}{}{}", RECEIPT_PREFIX, now.format("%Y%m%dT%H%M%S"), suffix)
}

#[async_trait]
impl ReceiptIssuer for ReceiptService {
    #[instrument(skip(self, request), fields(payment_id = %request.cielo_payment_id))]
    async fn generate_payment_receipt(
        &self,
        request: &ReceiptRequest,
        correlation_id: &str,
    ) -> PaymentResult<ReceiptResult> {
        let payment_id = request.cielo_payment_id.as_str();

        if let Some(existing) = self.receipts.get_receipt_by_payment_id(payment_id).await? {
            info!(
                correlation_id,
                receipt_number = %existing.receipt_number,
                "Receipt already exists for payment"
            );
            return Ok(ReceiptResult::existing(&existing));
        }

        let details = match self.gateway.query_payment(payment_id).await {
            Ok(details) => details,
            Err(e) => {
                warn!(correlation_id, error = %e, "Could not load payment for receipt");
                return Ok(ReceiptResult::failed(format!(
                    "Payment details unavailable: {}",
                    e
                )));
            }
        };

        let status = GatewayStatus::from_code(details.status);
        if !status.allows_receipt() {
            return Ok(ReceiptResult::failed(format!(
                "Payment status {} ({}) does not allow a receipt",
                details.status, status
            )));
        }

        let now = Utc::now();
        let receipt_number = generate_receipt_number(now);
        let receipt = PaymentReceipt {
            id: uuid::Uuid::new_v4().to_string(),
            contract_id: request.contract_id.clone(),
            cielo_payment_id: payment_id.to_string(),
            pdf_file_name: format!("comprovante_{}.pdf", receipt_number),
            receipt_number,
            payment_amount: details.amount,
            payment_date: details.received_date,
            payment_method: PaymentMethod::from_gateway_type(details.payment_type.as_deref()),
            pdf_url: PENDING_PDF_URL.to_string(),
            proof_of_sale: details.proof_of_sale,
            authorization_code: details.authorization_code,
            tid: details.tid,
            return_code: details.return_code,
            return_message: details.return_message,
            client_name: request.client_name.clone(),
            client_email: request.client_email.clone(),
            pet_name: request.pet_name.clone(),
            plan_name: request.plan_name.clone(),
            created_at: now,
        };

        match self.receipts.insert_receipt(receipt).await {
            Ok(stored) => {
                info!(
                    correlation_id,
                    receipt_number = %stored.receipt_number,
                    "Receipt stored"
                );
                Ok(ReceiptResult::issued(&stored))
            }
            // Lost a race with a concurrent delivery
            Err(PaymentError::DuplicateReceipt { .. }) => {
                match self.receipts.get_receipt_by_payment_id(payment_id).await? {
                    Some(existing) => Ok(ReceiptResult::existing(&existing)),
                    None => Err(PaymentError::DuplicateReceipt {
                        payment_id: payment_id.to_string(),
                    }),
                }
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockGateway;
    use pay_core::{InMemoryStore, PaymentDetails, ReceiptStore};
    use std::sync::Arc;

    fn request(payment_id: &str) -> ReceiptRequest {
        ReceiptRequest {
            contract_id: Some("c1".into()),
            cielo_payment_id: payment_id.into(),
            client_name: "Ana Souza".into(),
            client_email: "ana@example.com".into(),
            pet_name: Some("Thor".into()),
            plan_name: Some("INFINITY".into()),
        }
    }

    fn service(gateway: Arc<MockGateway>) -> (ReceiptService, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        (ReceiptService::new(gateway, store.clone()), store)
    }

    #[test]
    fn test_receipt_number_format() {
        let number = generate_receipt_number(Utc::now());
        assert!(number.starts_with(RECEIPT_PREFIX));
        assert_eq!(number.len(), RECEIPT_PREFIX.len() + 15 + 4);
        assert!(number[RECEIPT_PREFIX.len()..]
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[tokio::test]
    async fn test_issues_receipt_for_paid_payment() {
        let gateway = Arc::new(MockGateway::new().with_payment(
            PaymentDetails::new("P1", 2)
                .with_return("6", "Operation Successful")
                .with_amount(15700)
                .with_payment_type("CreditCard"),
        ));
        let (service, store) = service(gateway);

        let result = service
            .generate_payment_receipt(&request("P1"), "corr")
            .await
            .unwrap();

        assert!(result.success);
        assert!(!result.already_issued);
        assert_eq!(result.pdf_url.as_deref(), Some(PENDING_PDF_URL));

        let stored = store.get_receipt_by_payment_id("P1").await.unwrap().unwrap();
        assert_eq!(stored.payment_amount, 15700);
        assert_eq!(stored.payment_method, PaymentMethod::CreditCard);
        assert_eq!(stored.pet_name.as_deref(), Some("Thor"));
        assert_eq!(
            stored.pdf_file_name,
            format!("comprovante_{}.pdf", stored.receipt_number)
        );
    }

    #[tokio::test]
    async fn test_second_call_returns_existing_receipt() {
        let gateway = Arc::new(MockGateway::new().with_payment(PaymentDetails::new("P1", 2)));
        let (service, store) = service(gateway.clone());

        let first = service
            .generate_payment_receipt(&request("P1"), "corr-1")
            .await
            .unwrap();
        let second = service
            .generate_payment_receipt(&request("P1"), "corr-2")
            .await
            .unwrap();

        assert!(second.success);
        assert!(second.already_issued);
        assert_eq!(first.receipt_id, second.receipt_id);
        assert_eq!(store.receipt_count().await, 1);
        assert_eq!(gateway.query_count(), 1);
    }

    #[tokio::test]
    async fn test_denied_payment_gets_no_receipt() {
        let gateway = Arc::new(MockGateway::new().with_payment(PaymentDetails::new("P1", 3)));
        let (service, store) = service(gateway);

        let result = service
            .generate_payment_receipt(&request("P1"), "corr")
            .await
            .unwrap();

        assert!(!result.success);
        assert!(result.error.unwrap().contains("denied"));
        assert_eq!(store.receipt_count().await, 0);
    }

    #[tokio::test]
    async fn test_gateway_outage_is_an_expected_failure() {
        let gateway = Arc::new(MockGateway::new());
        gateway.fail_with_network_error("timeout");
        let (service, _store) = service(gateway);

        let result = service
            .generate_payment_receipt(&request("P1"), "corr")
            .await
            .unwrap();

        assert!(!result.success);
    }
}
