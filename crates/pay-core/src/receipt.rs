//! # Payment Receipts
//!
//! Receipt request assembled by the webhook pipeline, the stored receipt
//! record, and the result returned by a receipt issuer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Display data needed to issue a receipt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_id: Option<String>,
    pub cielo_payment_id: String,
    pub client_name: String,
    pub client_email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pet_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_name: Option<String>,
}

/// How the customer paid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CreditCard,
    Pix,
    Other,
}

impl PaymentMethod {
    /// Map a gateway payment type ("CreditCard", "Pix", ...)
    pub fn from_gateway_type(payment_type: Option<&str>) -> Self {
        match payment_type.map(|t| t.to_ascii_lowercase()).as_deref() {
            Some("creditcard") => PaymentMethod::CreditCard,
            Some("pix") => PaymentMethod::Pix,
            _ => PaymentMethod::Other,
        }
    }
}

/// Stored receipt. Immutable once created; unique per `cielo_payment_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_id: Option<String>,
    pub cielo_payment_id: String,
    pub receipt_number: String,
    /// Amount in cents
    pub payment_amount: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_date: Option<DateTime<Utc>>,
    pub payment_method: PaymentMethod,
    pub pdf_file_name: String,
    pub pdf_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof_of_sale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tid: Option<String>,
    pub return_code: String,
    pub return_message: String,
    pub client_name: String,
    pub client_email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pet_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Outcome of a receipt issuance call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptResult {
    pub success: bool,
    /// True when the receipt existed before this call
    #[serde(default)]
    pub already_issued: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReceiptResult {
    /// A receipt was created by this call
    pub fn issued(receipt: &PaymentReceipt) -> Self {
        Self {
            success: true,
            already_issued: false,
            receipt_id: Some(receipt.id.clone()),
            receipt_number: Some(receipt.receipt_number.clone()),
            pdf_url: Some(receipt.pdf_url.clone()),
            error: None,
        }
    }

    /// The receipt already existed; treated as success
    pub fn existing(receipt: &PaymentReceipt) -> Self {
        Self {
            already_issued: true,
            ..Self::issued(receipt)
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            already_issued: false,
            receipt_id: None,
            receipt_number: None,
            pdf_url: None,
            error: Some(error.into()),
        }
    }
}
