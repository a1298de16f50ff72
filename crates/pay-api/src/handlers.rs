//! # Request Handlers
//!
//! Axum request handlers for the Cielo webhook endpoint.
//!
//! Status codes returned to the gateway:
//! - `200` accepted, processed or safely ignored (a signed body that is not
//!   a notification is acknowledged with `processed: false`)
//! - `401` signature rejected
//! - `503` transient failure, the gateway should redeliver

use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use pay_core::PaymentError;
use serde::Serialize;
use tracing::{error, info, instrument, warn};

pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";
const REQUEST_ID_HEADER: &str = "x-request-id";

/// Signature headers, in order of preference
pub const SIGNATURE_HEADERS: [&str; 2] = ["x-cielo-signature", "x-signature"];

// =============================================================================
// Response Types
// =============================================================================

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: u16) -> Self {
        Self {
            error: error.into(),
            code,
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Acknowledgement sent back to the gateway
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAck {
    pub received: bool,
    pub processed: bool,
    pub correlation_id: String,
}

fn payment_error_to_response(err: PaymentError) -> (StatusCode, Json<ErrorResponse>) {
    let code = err.status_code();
    let response = ErrorResponse::new(err.to_string(), code);
    (StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR), Json(response))
}

/// Correlation id from `X-Correlation-Id` / `X-Request-Id`, else a fresh UUID
fn correlation_id(headers: &HeaderMap) -> String {
    [CORRELATION_ID_HEADER, REQUEST_ID_HEADER]
        .iter()
        .filter_map(|name| headers.get(*name))
        .filter_map(|value| value.to_str().ok())
        .map(str::trim)
        .find(|value| !value.is_empty() && value.len() <= 128)
        .map(String::from)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

fn signature(headers: &HeaderMap) -> Option<&str> {
    SIGNATURE_HEADERS
        .iter()
        .filter_map(|name| headers.get(*name))
        .find_map(|value| value.to_str().ok())
}

fn with_correlation_id(response: impl IntoResponse, correlation_id: &str) -> Response {
    let mut response = response.into_response();
    if let Ok(value) = HeaderValue::from_str(correlation_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(CORRELATION_ID_HEADER), value);
    }
    response
}

fn acknowledge(correlation_id: &str, processed: bool) -> Response {
    with_correlation_id(
        Json(WebhookAck {
            received: true,
            processed,
            correlation_id: correlation_id.to_string(),
        }),
        correlation_id,
    )
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "cielo-webhooks",
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.environment.as_str(),
        "gateway": state.gateway,
    }))
}

/// Handle a Cielo webhook delivery
#[instrument(skip(state, headers, body), fields(correlation_id = tracing::field::Empty))]
pub async fn cielo_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let correlation_id = correlation_id(&headers);
    tracing::Span::current().record("correlation_id", correlation_id.as_str());

    if !state
        .webhooks
        .authenticate(&body, signature(&headers), &correlation_id)
    {
        warn!(correlation_id = %correlation_id, "Rejected webhook with invalid signature");
        let err =
            PaymentError::WebhookVerificationFailed("invalid or missing signature".to_string());
        return with_correlation_id(payment_error_to_response(err), &correlation_id);
    }

    // Redeliveries are byte-identical, so a signed but malformed body never parses
    let notification = match state.webhooks.parse(&body, &correlation_id) {
        Ok(notification) => notification,
        Err(e) => {
            warn!(
                correlation_id = %correlation_id,
                error = %e,
                "Signed webhook body is not a notification"
            );
            return acknowledge(&correlation_id, false);
        }
    };

    info!(
        correlation_id = %correlation_id,
        payment_id = %notification.payment_id,
        change_type = %notification.change_type,
        "Received Cielo webhook"
    );

    match state
        .webhooks
        .process_notification(&notification, &correlation_id)
        .await
    {
        Ok(()) => acknowledge(&correlation_id, true),
        Err(e) if e.is_retryable() => {
            error!(
                correlation_id = %correlation_id,
                error = %e,
                "Transient failure, asking gateway to retry"
            );
            let response = ErrorResponse::new("Temporarily unable to process webhook", 503)
                .with_details(e.to_string());
            with_correlation_id(
                (StatusCode::SERVICE_UNAVAILABLE, Json(response)),
                &correlation_id,
            )
        }
        Err(e) => {
            // A retry would fail the same way; acknowledge so the gateway stops
            warn!(
                correlation_id = %correlation_id,
                error = %e,
                "Webhook acknowledged without processing"
            );
            acknowledge(&correlation_id, false)
        }
    }
}

/// What to register in the Cielo merchant panel
pub async fn webhook_configuration(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.webhooks.configuration().clone())
}
