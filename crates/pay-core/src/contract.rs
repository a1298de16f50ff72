//! # Contract Records
//!
//! Persistent entities owned by the surrounding plan-management system.
//! The webhook pipeline reads them and mutates only the payment-related
//! fields of an existing contract; it never creates one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Contract lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
    Active,
    Inactive,
    Suspended,
    Cancelled,
}

impl ContractStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractStatus::Active => "active",
            ContractStatus::Inactive => "inactive",
            ContractStatus::Suspended => "suspended",
            ContractStatus::Cancelled => "cancelled",
        }
    }
}

impl Default for ContractStatus {
    fn default() -> Self {
        ContractStatus::Inactive
    }
}

impl fmt::Display for ContractStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pet-plan contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    pub id: String,

    /// Human-facing contract number
    pub contract_number: String,

    pub client_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pet_id: Option<String>,

    #[serde(default)]
    pub status: ContractStatus,

    /// Gateway payment id this contract was paid with (correlation key)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cielo_payment_id: Option<String>,

    #[serde(default)]
    pub return_code: String,

    #[serde(default)]
    pub return_message: String,

    /// When the payment was captured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_date: Option<DateTime<Utc>>,

    pub updated_at: DateTime<Utc>,
}

impl Contract {
    pub fn new(
        id: impl Into<String>,
        contract_number: impl Into<String>,
        client_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            contract_number: contract_number.into(),
            client_id: client_id.into(),
            plan_id: None,
            pet_id: None,
            status: ContractStatus::Inactive,
            cielo_payment_id: None,
            return_code: String::new(),
            return_message: String::new(),
            received_date: None,
            updated_at: Utc::now(),
        }
    }

    /// Builder: set the gateway payment id
    pub fn with_payment_id(mut self, payment_id: impl Into<String>) -> Self {
        self.cielo_payment_id = Some(payment_id.into());
        self
    }

    /// Builder: set plan
    pub fn with_plan(mut self, plan_id: impl Into<String>) -> Self {
        self.plan_id = Some(plan_id.into());
        self
    }

    /// Builder: set pet
    pub fn with_pet(mut self, pet_id: impl Into<String>) -> Self {
        self.pet_id = Some(pet_id.into());
        self
    }

    /// Apply a partial update. Every field is a plain set, so applying the
    /// same update twice leaves the contract in the same state.
    pub fn apply(&mut self, update: &ContractUpdate) {
        self.status = update.status;
        self.return_code = update.return_code.clone();
        self.return_message = update.return_message.clone();
        self.updated_at = update.updated_at;
        if let Some(received) = update.received_date {
            self.received_date = Some(received);
        }
    }
}

/// Partial update written by the reconciler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractUpdate {
    pub status: ContractStatus,
    pub return_code: String,
    pub return_message: String,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_date: Option<DateTime<Utc>>,
}

/// Plan holder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: String,
    pub full_name: String,
    pub email: String,
}

impl Client {
    pub fn new(id: impl Into<String>, full_name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            full_name: full_name.into(),
            email: email.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pet {
    pub id: String,
    pub name: String,
}
