//! # Cielo Configuration
//!
//! Configuration management for the Cielo integration.
//! All secrets are loaded from environment variables.

use pay_core::PaymentError;
use std::fmt;

/// Production query endpoint
pub const DEFAULT_QUERY_API_URL: &str = "https://apiquery.cieloecommerce.cielo.com.br";

/// Deployment environment. Anything unrecognised counts as development.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Production,
    Staging,
    Development,
}

impl Environment {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            "staging" => Environment::Staging,
            _ => Environment::Development,
        }
    }

    /// Production and staging require a webhook secret
    pub fn requires_webhook_secret(&self) -> bool {
        matches!(self, Environment::Production | Environment::Staging)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Production => "production",
            Environment::Staging => "staging",
            Environment::Development => "development",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cielo API and webhook configuration
#[derive(Clone)]
pub struct CieloConfig {
    /// Merchant id sent as the `MerchantId` header
    pub merchant_id: String,

    /// Merchant key sent as the `MerchantKey` header
    pub merchant_key: String,

    /// Query API base URL (for testing/mocking)
    pub query_api_url: String,

    /// Shared HMAC secret for webhook signatures
    pub webhook_secret: Option<String>,

    pub environment: Environment,

    /// Public base URL this service is reachable at
    pub webhook_base_url: String,

    /// Allow substring matching of `ClientOrderId` against client email/id
    pub legacy_client_matching: bool,
}

impl CieloConfig {
    /// Load configuration from environment variables.
    ///
    /// Required env vars:
    /// - `CIELO_MERCHANT_ID`
    /// - `CIELO_MERCHANT_KEY`
    /// - `CIELO_WEBHOOK_SECRET` (production and staging only)
    pub fn from_env() -> Result<Self, PaymentError> {
        dotenvy::dotenv().ok(); // Load .env file if present
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, PaymentError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let merchant_id = lookup("CIELO_MERCHANT_ID").ok_or_else(|| {
            PaymentError::Configuration("CIELO_MERCHANT_ID not set".to_string())
        })?;

        let merchant_key = lookup("CIELO_MERCHANT_KEY").ok_or_else(|| {
            PaymentError::Configuration("CIELO_MERCHANT_KEY not set".to_string())
        })?;

        let environment = lookup("ENVIRONMENT")
            .or_else(|| lookup("NODE_ENV"))
            .map(|v| Environment::parse(&v))
            .unwrap_or(Environment::Development);

        let config = Self::from_settings(merchant_id, merchant_key, environment, &lookup);
        config.validate()?;
        Ok(config)
    }

    /// Credential-less configuration for a development server backed by the
    /// mock gateway. Secret, URLs and client matching come from `lookup`
    /// exactly as in [`CieloConfig::from_lookup`].
    pub fn development_from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::from_settings(String::new(), String::new(), Environment::Development, &lookup)
    }

    fn from_settings<F>(
        merchant_id: String,
        merchant_key: String,
        environment: Environment,
        lookup: &F,
    ) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            merchant_id,
            merchant_key,
            query_api_url: lookup("CIELO_QUERY_API_URL")
                .unwrap_or_else(|| DEFAULT_QUERY_API_URL.to_string()),
            webhook_secret: lookup("CIELO_WEBHOOK_SECRET").filter(|s| !s.trim().is_empty()),
            environment,
            webhook_base_url: lookup("WEBHOOK_BASE_URL")
                .unwrap_or_else(|| "https://localhost:3000".to_string()),
            legacy_client_matching: lookup("CIELO_LEGACY_CLIENT_MATCHING")
                .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
                .unwrap_or(false),
        }
    }

    /// Create config with explicit values (for testing)
    pub fn new(
        merchant_id: impl Into<String>,
        merchant_key: impl Into<String>,
        environment: Environment,
    ) -> Self {
        Self {
            merchant_id: merchant_id.into(),
            merchant_key: merchant_key.into(),
            query_api_url: DEFAULT_QUERY_API_URL.to_string(),
            webhook_secret: None,
            environment,
            webhook_base_url: "https://localhost:3000".to_string(),
            legacy_client_matching: false,
        }
    }

    /// Refuse configurations that would accept unsigned webhooks in
    /// production or staging.
    pub fn validate(&self) -> Result<(), PaymentError> {
        if self.environment.requires_webhook_secret() && self.webhook_secret.is_none() {
            return Err(PaymentError::Configuration(format!(
                "CIELO_WEBHOOK_SECRET is mandatory in {}",
                self.environment
            )));
        }
        Ok(())
    }

    /// Builder: set webhook secret
    pub fn with_webhook_secret(mut self, secret: impl Into<String>) -> Self {
        self.webhook_secret = Some(secret.into());
        self
    }

    /// Builder: set custom query API base URL (for testing)
    pub fn with_query_api_url(mut self, url: impl Into<String>) -> Self {
        self.query_api_url = url.into();
        self
    }

    /// Builder: set public base URL
    pub fn with_webhook_base_url(mut self, url: impl Into<String>) -> Self {
        self.webhook_base_url = url.into();
        self
    }

    /// Builder: enable substring client matching
    pub fn with_legacy_client_matching(mut self, enabled: bool) -> Self {
        self.legacy_client_matching = enabled;
        self
    }

    /// Public URL the gateway should deliver webhooks to
    pub fn webhook_endpoint_url(&self) -> String {
        format!(
            "{}/api/webhooks/cielo",
            self.webhook_base_url.trim_end_matches('/')
        )
    }
}

impl fmt::Debug for CieloConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CieloConfig")
            .field("merchant_id", &self.merchant_id)
            .field("merchant_key", &"<redacted>")
            .field("query_api_url", &self.query_api_url)
            .field(
                "webhook_secret",
                &self.webhook_secret.as_ref().map(|_| "<redacted>"),
            )
            .field("environment", &self.environment)
            .field("webhook_base_url", &self.webhook_base_url)
            .field("legacy_client_matching", &self.legacy_client_matching)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_environment_parsing() {
        assert_eq!(Environment::parse("production"), Environment::Production);
        assert_eq!(Environment::parse("Staging"), Environment::Staging);
        assert_eq!(Environment::parse("development"), Environment::Development);
        assert_eq!(Environment::parse("test"), Environment::Development);
        assert!(Environment::Production.requires_webhook_secret());
        assert!(!Environment::Development.requires_webhook_secret());
    }

    #[test]
    fn test_production_requires_secret() {
        let result = CieloConfig::from_lookup(lookup(&[
            ("CIELO_MERCHANT_ID", "mid"),
            ("CIELO_MERCHANT_KEY", "mkey"),
            ("NODE_ENV", "production"),
        ]));
        assert!(matches!(result, Err(PaymentError::Configuration(_))));

        let result = CieloConfig::from_lookup(lookup(&[
            ("CIELO_MERCHANT_ID", "mid"),
            ("CIELO_MERCHANT_KEY", "mkey"),
            ("ENVIRONMENT", "staging"),
            ("CIELO_WEBHOOK_SECRET", "   "),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_development_without_secret() {
        let config = CieloConfig::from_lookup(lookup(&[
            ("CIELO_MERCHANT_ID", "mid"),
            ("CIELO_MERCHANT_KEY", "mkey"),
        ]))
        .unwrap();

        assert_eq!(config.environment, Environment::Development);
        assert!(config.webhook_secret.is_none());
        assert_eq!(config.query_api_url, DEFAULT_QUERY_API_URL);
        assert!(!config.legacy_client_matching);
    }

    #[test]
    fn test_development_from_lookup_reads_optional_settings() {
        let config = CieloConfig::development_from_lookup(lookup(&[
            ("CIELO_WEBHOOK_SECRET", "dev-secret"),
            ("CIELO_LEGACY_CLIENT_MATCHING", "true"),
            ("CIELO_QUERY_API_URL", "http://127.0.0.1:9999"),
            ("WEBHOOK_BASE_URL", "https://dev.example.com"),
        ]));

        assert_eq!(config.environment, Environment::Development);
        assert!(config.merchant_id.is_empty());
        assert_eq!(config.webhook_secret.as_deref(), Some("dev-secret"));
        assert!(config.legacy_client_matching);
        assert_eq!(config.query_api_url, "http://127.0.0.1:9999");
        assert_eq!(config.webhook_base_url, "https://dev.example.com");

        let config =
            CieloConfig::development_from_lookup(lookup(&[("CIELO_WEBHOOK_SECRET", "  ")]));
        assert!(config.webhook_secret.is_none());
        assert!(!config.legacy_client_matching);
    }

    #[test]
    fn test_missing_merchant_id() {
        let result = CieloConfig::from_lookup(lookup(&[("CIELO_MERCHANT_KEY", "mkey")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_webhook_endpoint_url() {
        let config = CieloConfig::new("mid", "mkey", Environment::Development)
            .with_webhook_base_url("https://api.unipet.example/");
        assert_eq!(
            config.webhook_endpoint_url(),
            "https://api.unipet.example/api/webhooks/cielo"
        );
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config =
            CieloConfig::new("mid", "super-key", Environment::Production).with_webhook_secret("s3cret");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("super-key"));
        assert!(!debug.contains("s3cret"));
    }
}
