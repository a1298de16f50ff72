//! # pay-api
//!
//! HTTP layer for the Cielo webhook service.
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/health` | Health check |
//! | POST | `/api/webhooks/cielo` | Cielo webhook delivery |
//! | GET | `/api/webhooks/cielo/config` | Webhook registration descriptor |

pub mod handlers;
pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::{AppConfig, AppState};
