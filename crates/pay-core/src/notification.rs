//! # Webhook Notifications
//!
//! Inbound notification pushed by the gateway. A notification only signals
//! that something changed; authoritative state is always re-queried.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse classification of what changed at the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum ChangeType {
    /// Payment status changed
    PaymentStatus,
    /// Recurring billing event
    Recurrency,
    /// Chargeback opened by the cardholder's bank
    Chargeback,
    /// Code this service does not know about
    Unknown(i64),
}

impl ChangeType {
    /// Gateway numeric code
    pub fn code(&self) -> i64 {
        match self {
            ChangeType::PaymentStatus => 1,
            ChangeType::Recurrency => 2,
            ChangeType::Chargeback => 3,
            ChangeType::Unknown(code) => *code,
        }
    }
}

impl From<i64> for ChangeType {
    fn from(code: i64) -> Self {
        match code {
            1 => ChangeType::PaymentStatus,
            2 => ChangeType::Recurrency,
            3 => ChangeType::Chargeback,
            other => ChangeType::Unknown(other),
        }
    }
}

impl From<ChangeType> for i64 {
    fn from(change: ChangeType) -> Self {
        change.code()
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeType::PaymentStatus => write!(f, "payment_status"),
            ChangeType::Recurrency => write!(f, "recurrency"),
            ChangeType::Chargeback => write!(f, "chargeback"),
            ChangeType::Unknown(code) => write!(f, "unknown({})", code),
        }
    }
}

/// Notification body as delivered by the gateway (PascalCase keys)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WebhookNotification {
    /// Gateway payment identifier
    pub payment_id: String,

    /// What changed
    pub change_type: ChangeType,

    /// Merchant-side order reference, if the checkout set one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_order_id: Option<String>,

    /// Gateway request identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl WebhookNotification {
    pub fn new(payment_id: impl Into<String>, change_type: ChangeType) -> Self {
        Self {
            payment_id: payment_id.into(),
            change_type,
            client_order_id: None,
            request_id: None,
        }
    }

    /// Builder: set client order id
    pub fn with_client_order_id(mut self, client_order_id: impl Into<String>) -> Self {
        self.client_order_id = Some(client_order_id.into());
        self
    }

    /// Parse a raw webhook body
    pub fn from_slice(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_gateway_payload() {
        let body = br#"{"PaymentId":"24bc8366-fc31-4d6c-8555-17049a836a07","ChangeType":1,"ClientOrderId":"ana@example.com"}"#;
        let notification = WebhookNotification::from_slice(body).unwrap();

        assert_eq!(notification.payment_id, "24bc8366-fc31-4d6c-8555-17049a836a07");
        assert_eq!(notification.change_type, ChangeType::PaymentStatus);
        assert_eq!(notification.client_order_id.as_deref(), Some("ana@example.com"));
        assert!(notification.request_id.is_none());
    }

    #[test]
    fn test_unknown_change_type_still_parses() {
        let body = br#"{"PaymentId":"P9","ChangeType":7}"#;
        let notification = WebhookNotification::from_slice(body).unwrap();

        assert_eq!(notification.change_type, ChangeType::Unknown(7));
        assert_eq!(notification.change_type.code(), 7);
    }

    #[test]
    fn test_missing_payment_id_is_rejected() {
        assert!(WebhookNotification::from_slice(br#"{"ChangeType":1}"#).is_err());
    }
}
