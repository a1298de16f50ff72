//! # Application State
//!
//! Shared state for the Axum application: the wired webhook pipeline and
//! the server configuration.

use pay_cielo::{
    CieloClient, CieloConfig, Environment, MockGateway, ReceiptService, WebhookService,
    AUDIT_SERVICE,
};
use pay_core::{AuditLogger, InMemoryStore, SharedPaymentGateway};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Public base URL the gateway delivers to
    pub webhook_base_url: String,
    pub environment: Environment,
}

impl AppConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            host: lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            webhook_base_url: lookup("WEBHOOK_BASE_URL")
                .unwrap_or_else(|| "http://localhost:3000".to_string()),
            environment: lookup("ENVIRONMENT")
                .or_else(|| lookup("NODE_ENV"))
                .map(|v| Environment::parse(&v))
                .unwrap_or(Environment::Development),
        }
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid socket address {}:{}: {}", self.host, self.port, e))
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

/// Cielo configuration and the gateway backing it.
///
/// Without credentials a development server falls back to the mock gateway,
/// still reading every other Cielo variable through `lookup`.
fn select_gateway<F>(
    config: &AppConfig,
    lookup: F,
) -> anyhow::Result<(CieloConfig, SharedPaymentGateway)>
where
    F: Fn(&str) -> Option<String>,
{
    match CieloConfig::from_lookup(&lookup) {
        Ok(cielo) => {
            let gateway: SharedPaymentGateway = Arc::new(CieloClient::new(cielo.clone())?);
            Ok((cielo, gateway))
        }
        Err(e) if config.environment == Environment::Development => {
            warn!(error = %e, "Cielo credentials missing, using mock gateway (development only)");
            let cielo = CieloConfig::development_from_lookup(&lookup)
                .with_webhook_base_url(config.webhook_base_url.clone());
            let gateway: SharedPaymentGateway = Arc::new(MockGateway::new());
            Ok((cielo, gateway))
        }
        Err(e) => Err(anyhow::anyhow!("Failed to initialize Cielo: {}", e)),
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub webhooks: Arc<WebhookService>,
    pub config: AppConfig,
    /// Gateway backing reconciliation ("cielo" or "mock")
    pub gateway: &'static str,
}

impl AppState {
    /// Wire the pipeline from environment variables.
    ///
    /// Without Cielo credentials a development server falls back to the
    /// in-process mock gateway; any other environment refuses to start.
    pub fn new() -> anyhow::Result<Self> {
        let config = AppConfig::from_env();
        let (cielo, gateway) = select_gateway(&config, |key| std::env::var(key).ok())?;

        // Persistence belongs to the host system; the server keeps records in memory
        let store = Arc::new(InMemoryStore::new());
        let issuer = Arc::new(ReceiptService::new(gateway.clone(), store.clone()));
        let provider = gateway.provider_name();

        let webhooks = WebhookService::new(
            &cielo,
            gateway,
            store,
            issuer,
            AuditLogger::tracing(AUDIT_SERVICE),
        )?;

        info!(gateway = provider, environment = %config.environment, "Webhook pipeline ready");

        Ok(Self::from_parts(config, webhooks, provider))
    }

    /// Assemble state from an already wired pipeline
    pub fn from_parts(config: AppConfig, webhooks: WebhookService, gateway: &'static str) -> Self {
        Self {
            webhooks: Arc::new(webhooks),
            config,
            gateway,
        }
    }
}
