//! # Payment Details
//!
//! Authoritative payment state as returned by a gateway query.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Payment state pulled from the gateway by payment id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetails {
    /// Gateway payment identifier
    pub payment_id: String,

    /// Gateway numeric status code
    pub status: i64,

    #[serde(default)]
    pub return_code: String,

    #[serde(default)]
    pub return_message: String,

    /// Amount in cents
    #[serde(default)]
    pub amount: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof_of_sale: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tid: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_code: Option<String>,

    /// Gateway payment type (e.g. "CreditCard", "Pix")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_date: Option<DateTime<Utc>>,
}

impl PaymentDetails {
    pub fn new(payment_id: impl Into<String>, status: i64) -> Self {
        Self {
            payment_id: payment_id.into(),
            status,
            return_code: String::new(),
            return_message: String::new(),
            amount: 0,
            proof_of_sale: None,
            tid: None,
            authorization_code: None,
            payment_type: None,
            received_date: None,
        }
    }

    /// Builder: set return code and message
    pub fn with_return(mut self, code: impl Into<String>, message: impl Into<String>) -> Self {
        self.return_code = code.into();
        self.return_message = message.into();
        self
    }

    /// Builder: set amount in cents
    pub fn with_amount(mut self, amount: i64) -> Self {
        self.amount = amount;
        self
    }

    /// Builder: set payment type
    pub fn with_payment_type(mut self, payment_type: impl Into<String>) -> Self {
        self.payment_type = Some(payment_type.into());
        self
    }

    /// Amount formatted in major units (e.g. "129.90")
    pub fn amount_display(&self) -> String {
        let sign = if self.amount < 0 { "-" } else { "" };
        let cents = self.amount.unsigned_abs();
        format!("{}{}.{:02}", sign, cents / 100, cents % 100)
    }
}
