//! # Webhook Signature Verification
//!
//! HMAC-SHA256 over the raw request body, hex encoded, optionally prefixed
//! with `sha256=`. This is the only trust boundary of the pipeline.

use crate::config::{CieloConfig, Environment};
use hmac::{Hmac, Mac};
use pay_core::{PaymentError, PaymentResult};
use sha2::Sha256;
use tracing::{error, warn};

type HmacSha256 = Hmac<Sha256>;

/// Validates webhook signatures against the shared secret
#[derive(Clone)]
pub struct SignatureValidator {
    secret: Option<String>,
    environment: Environment,
}

impl SignatureValidator {
    /// Fails fast when no secret is configured in production or staging.
    pub fn new(secret: Option<String>, environment: Environment) -> PaymentResult<Self> {
        let secret = secret.filter(|s| !s.trim().is_empty());

        if secret.is_none() {
            if environment.requires_webhook_secret() {
                return Err(PaymentError::Configuration(format!(
                    "webhook secret is mandatory in {}",
                    environment
                )));
            }
            warn!(
                environment = %environment,
                "CIELO_WEBHOOK_SECRET not configured, signature validation disabled (development only)"
            );
        }

        Ok(Self {
            secret,
            environment,
        })
    }

    pub fn from_config(config: &CieloConfig) -> PaymentResult<Self> {
        Self::new(config.webhook_secret.clone(), config.environment)
    }

    /// True when signatures are actually checked
    pub fn is_enforcing(&self) -> bool {
        self.secret.is_some()
    }

    /// Check `signature` against `payload`. Never panics and never errors:
    /// anything unexpected is logged and rejected.
    pub fn validate(&self, payload: &[u8], signature: &str, correlation_id: &str) -> bool {
        let signature = signature.trim();
        if signature.is_empty() {
            error!(
                correlation_id,
                environment = %self.environment,
                "Webhook signature missing from request"
            );
            return false;
        }

        let Some(secret) = &self.secret else {
            if self.environment.requires_webhook_secret() {
                error!(
                    correlation_id,
                    environment = %self.environment,
                    "Webhook received without a configured secret"
                );
                return false;
            }
            warn!(
                correlation_id,
                "Webhook secret not configured, skipping signature validation (development only)"
            );
            return true;
        };

        let provided_hex = signature.strip_prefix("sha256=").unwrap_or(signature);
        let provided = match hex::decode(provided_hex) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(correlation_id, error = %e, "Webhook signature is not valid hex");
                return false;
            }
        };

        let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
            Ok(mac) => mac,
            Err(e) => {
                error!(correlation_id, error = %e, "Failed to initialise HMAC");
                return false;
            }
        };
        mac.update(payload);

        // verify_slice compares in constant time
        match mac.verify_slice(&provided) {
            Ok(()) => true,
            Err(_) => {
                error!(
                    correlation_id,
                    expected_length = 32,
                    provided_length = provided.len(),
                    "Invalid webhook signature"
                );
                false
            }
        }
    }
}

impl std::fmt::Debug for SignatureValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureValidator")
            .field("enforcing", &self.is_enforcing())
            .field("environment", &self.environment)
            .finish()
    }
}

/// Hex HMAC-SHA256 of `payload` (what the gateway sends)
pub fn compute_signature(secret: &str, payload: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_cielo_test";
    const PAYLOAD: &[u8] = br#"{"PaymentId":"P1","ChangeType":1}"#;

    fn validator() -> SignatureValidator {
        SignatureValidator::new(Some(SECRET.to_string()), Environment::Production).unwrap()
    }

    #[test]
    fn test_valid_signature_with_and_without_prefix() {
        let sig = compute_signature(SECRET, PAYLOAD);
        assert_eq!(sig.len(), 64);

        let v = validator();
        assert!(v.validate(PAYLOAD, &sig, "c1"));
        assert!(v.validate(PAYLOAD, &format!("sha256={}", sig), "c1"));
        assert!(v.validate(PAYLOAD, &sig.to_uppercase(), "c1"));
    }

    #[test]
    fn test_any_payload_bit_flip_is_rejected() {
        let v = validator();
        let sig = compute_signature(SECRET, PAYLOAD);

        for byte in 0..PAYLOAD.len() {
            for bit in 0..8 {
                let mut tampered = PAYLOAD.to_vec();
                tampered[byte] ^= 1 << bit;
                assert!(!v.validate(&tampered, &sig, "c1"), "byte {} bit {}", byte, bit);
            }
        }
    }

    #[test]
    fn test_any_signature_bit_flip_is_rejected() {
        let v = validator();
        let raw = hex::decode(compute_signature(SECRET, PAYLOAD)).unwrap();

        for byte in 0..raw.len() {
            for bit in 0..8 {
                let mut tampered = raw.clone();
                tampered[byte] ^= 1 << bit;
                assert!(!v.validate(PAYLOAD, &hex::encode(&tampered), "c1"));
            }
        }
    }

    #[test]
    fn test_missing_signature_always_rejected() {
        let enforcing = validator();
        let bypassing = SignatureValidator::new(None, Environment::Development).unwrap();

        for v in [&enforcing, &bypassing] {
            assert!(!v.validate(PAYLOAD, "", "c1"));
            assert!(!v.validate(PAYLOAD, "   ", "c1"));
        }
    }

    #[test]
    fn test_development_bypass() {
        let v = SignatureValidator::new(None, Environment::Development).unwrap();
        assert!(!v.is_enforcing());
        assert!(v.validate(PAYLOAD, "anything", "c1"));
    }

    #[test]
    fn test_strict_environments_require_secret() {
        assert!(SignatureValidator::new(None, Environment::Production).is_err());
        assert!(SignatureValidator::new(Some(String::new()), Environment::Staging).is_err());
    }

    #[test]
    fn test_malformed_signatures_are_rejected() {
        let v = validator();
        assert!(!v.validate(PAYLOAD, "not-hex", "c1"));
        assert!(!v.validate(PAYLOAD, "sha256=abc", "c1"));
        assert!(!v.validate(PAYLOAD, "abcd", "c1"));
        assert!(!v.validate(PAYLOAD, &compute_signature("other-secret", PAYLOAD), "c1"));
    }
}
