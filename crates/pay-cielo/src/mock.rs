//! # Mock Gateway
//!
//! In-process `PaymentGateway` returning preset payment states. Used by the
//! development server when no Cielo credentials are configured, and by tests.

use async_trait::async_trait;
use pay_core::{PaymentDetails, PaymentError, PaymentGateway, PaymentResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct MockGateway {
    payments: Mutex<HashMap<String, PaymentDetails>>,
    network_failure: Mutex<Option<String>>,
    queries: AtomicUsize,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set (or replace) the state returned for `details.payment_id`
    pub fn set(&self, details: PaymentDetails) {
        self.payments
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(details.payment_id.clone(), details);
    }

    /// Builder: preset one payment
    pub fn with_payment(self, details: PaymentDetails) -> Self {
        self.set(details);
        self
    }

    /// Make every subsequent query fail with a network error
    pub fn fail_with_network_error(&self, message: impl Into<String>) {
        *self
            .network_failure
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(message.into());
    }

    /// Number of queries served so far
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn query_payment(&self, payment_id: &str) -> PaymentResult<PaymentDetails> {
        self.queries.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = self
            .network_failure
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
        {
            return Err(PaymentError::NetworkError(message));
        }

        self.payments
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(payment_id)
            .cloned()
            .ok_or_else(|| PaymentError::PaymentNotFound {
                payment_id: payment_id.to_string(),
            })
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_gateway_serves_presets() {
        let gateway = MockGateway::new().with_payment(PaymentDetails::new("P1", 2));

        assert_eq!(gateway.query_payment("P1").await.unwrap().status, 2);
        assert!(matches!(
            gateway.query_payment("P2").await,
            Err(PaymentError::PaymentNotFound { .. })
        ));
        assert_eq!(gateway.query_count(), 2);

        gateway.fail_with_network_error("down");
        assert!(gateway.query_payment("P1").await.unwrap_err().is_retryable());
    }
}
