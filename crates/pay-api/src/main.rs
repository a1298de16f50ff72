//! # cielo-webhooks
//!
//! Cielo payment webhook receiver.
//!
//! ## Usage
//!
//! ```bash
//! # Set environment variables
//! export CIELO_MERCHANT_ID=...
//! export CIELO_MERCHANT_KEY=...
//! export CIELO_WEBHOOK_SECRET=...
//! export ENVIRONMENT=production
//!
//! # Run the server (LOG_FORMAT=json for structured logs)
//! cielo-webhooks
//! ```

use pay_api::{routes, state::AppState};
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    // Initialize application state
    let state = AppState::new()?;

    let addr = state.config.socket_addr()?;
    let is_prod = state.config.is_production();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %state.config.environment,
        gateway = state.gateway,
        "cielo-webhooks starting"
    );

    if !is_prod {
        info!("Health: http://{}/health", addr);
        info!("Webhook: POST {}", state.webhooks.configuration().url);
    }

    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }
}
