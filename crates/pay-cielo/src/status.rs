//! # Payment Status Mapping
//!
//! Cielo numeric payment statuses and their contract-state equivalents.
//!
//! | Code | Meaning                  | Contract  | Stamp received date |
//! |------|--------------------------|-----------|---------------------|
//! | 1    | Authorized, not captured | inactive  | no                  |
//! | 2    | Paid / captured          | active    | yes                 |
//! | 3    | Denied                   | inactive  | no                  |
//! | 10   | Voided / cancelled       | cancelled | no                  |
//! | 11   | Refunded                 | inactive  | no                  |
//! | 12   | Pending                  | inactive  | no                  |
//! | *    | Unknown                  | inactive  | no                  |

use pay_core::ContractStatus;
use std::fmt;
use tracing::warn;

/// Cielo payment status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayStatus {
    Authorized,
    PaymentConfirmed,
    Denied,
    Voided,
    Refunded,
    Pending,
    Unknown(i64),
}

impl GatewayStatus {
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => GatewayStatus::Authorized,
            2 => GatewayStatus::PaymentConfirmed,
            3 => GatewayStatus::Denied,
            10 => GatewayStatus::Voided,
            11 => GatewayStatus::Refunded,
            12 => GatewayStatus::Pending,
            other => GatewayStatus::Unknown(other),
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            GatewayStatus::Authorized => 1,
            GatewayStatus::PaymentConfirmed => 2,
            GatewayStatus::Denied => 3,
            GatewayStatus::Voided => 10,
            GatewayStatus::Refunded => 11,
            GatewayStatus::Pending => 12,
            GatewayStatus::Unknown(code) => *code,
        }
    }

    /// Statuses a receipt may be issued for (paid, or pending PIX)
    pub fn allows_receipt(&self) -> bool {
        matches!(self, GatewayStatus::PaymentConfirmed | GatewayStatus::Pending)
    }
}

impl fmt::Display for GatewayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayStatus::Authorized => write!(f, "authorized"),
            GatewayStatus::PaymentConfirmed => write!(f, "payment_confirmed"),
            GatewayStatus::Denied => write!(f, "denied"),
            GatewayStatus::Voided => write!(f, "voided"),
            GatewayStatus::Refunded => write!(f, "refunded"),
            GatewayStatus::Pending => write!(f, "pending"),
            GatewayStatus::Unknown(code) => write!(f, "unknown({})", code),
        }
    }
}

/// Result of mapping a gateway status onto a contract
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusMapping {
    pub contract_status: ContractStatus,
    pub should_stamp_received_date: bool,
}

/// Map a gateway status code to a contract status. Pure apart from a
/// warning for codes outside the table.
pub fn map_status(code: i64) -> StatusMapping {
    let contract_status = match GatewayStatus::from_code(code) {
        GatewayStatus::PaymentConfirmed => ContractStatus::Active,
        GatewayStatus::Voided => ContractStatus::Cancelled,
        GatewayStatus::Authorized
        | GatewayStatus::Denied
        | GatewayStatus::Refunded
        | GatewayStatus::Pending => ContractStatus::Inactive,
        GatewayStatus::Unknown(code) => {
            warn!(cielo_status = code, "Unknown Cielo payment status, defaulting to inactive");
            ContractStatus::Inactive
        }
    };

    StatusMapping {
        contract_status,
        should_stamp_received_date: contract_status == ContractStatus::Active,
    }
}
