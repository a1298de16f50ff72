//! # Cielo Webhook Handling
//!
//! Entry point of the pipeline. A delivery is authenticated, parsed, then
//! dispatched by change type:
//!
//! | ChangeType | Handler                                           |
//! |------------|---------------------------------------------------|
//! | 1          | reconcile contract, issue receipt when approved   |
//! | 2          | recurrency, logged and audited                    |
//! | 3          | chargeback, critical audit record                 |
//! | other      | warning only                                      |

use crate::config::CieloConfig;
use crate::receipt::ReceiptTrigger;
use crate::reconcile::{ContractReconciler, Reconciliation};
use crate::signature::SignatureValidator;
use crate::status::GatewayStatus;
use pay_core::{
    AuditEventKind, AuditLogger, ChangeType, ContractStatus, PaymentError, PaymentResult,
    SharedContractStore, SharedPaymentGateway, SharedReceiptIssuer, WebhookNotification,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Service name stamped on every audit record
pub const AUDIT_SERVICE: &str = "CieloWebhookService";

/// Events to subscribe to in the Cielo merchant panel
pub const WEBHOOK_EVENTS: &[&str] = &[
    "payment.status.changed",
    "recurrency.created",
    "chargeback.received",
];

/// What to register at the gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookConfiguration {
    pub url: String,
    pub events: Vec<String>,
    pub format: String,
}

impl WebhookConfiguration {
    pub fn from_config(config: &CieloConfig) -> Self {
        Self {
            url: config.webhook_endpoint_url(),
            events: WEBHOOK_EVENTS.iter().map(|e| e.to_string()).collect(),
            format: "JSON".to_string(),
        }
    }
}

pub struct WebhookService {
    validator: SignatureValidator,
    reconciler: ContractReconciler,
    trigger: Arc<ReceiptTrigger>,
    audit: AuditLogger,
    configuration: WebhookConfiguration,
}

impl WebhookService {
    /// Wire the pipeline. Fails if the config would accept unsigned
    /// webhooks outside development.
    pub fn new(
        config: &CieloConfig,
        gateway: SharedPaymentGateway,
        store: SharedContractStore,
        issuer: SharedReceiptIssuer,
        audit: AuditLogger,
    ) -> PaymentResult<Self> {
        config.validate()?;

        let validator = SignatureValidator::from_config(config)?;
        let reconciler = ContractReconciler::new(gateway, store.clone(), audit.clone());
        let trigger = ReceiptTrigger::new(store, issuer, audit.clone())
            .with_legacy_client_matching(config.legacy_client_matching);

        Ok(Self {
            validator,
            reconciler,
            trigger: Arc::new(trigger),
            audit,
            configuration: WebhookConfiguration::from_config(config),
        })
    }

    pub fn configuration(&self) -> &WebhookConfiguration {
        &self.configuration
    }

    pub fn audit(&self) -> &AuditLogger {
        &self.audit
    }

    /// Verify the delivery signature. A rejection is audited.
    pub fn authenticate(&self, payload: &[u8], signature: Option<&str>, correlation_id: &str) -> bool {
        if self
            .validator
            .validate(payload, signature.unwrap_or_default(), correlation_id)
        {
            return true;
        }

        self.audit.log(
            AuditEventKind::SignatureRejected,
            json!({
                "signaturePresent": signature.is_some_and(|s| !s.trim().is_empty()),
                "payloadLength": payload.len(),
            }),
            correlation_id,
        );
        false
    }

    /// Parse a delivery body. Malformed bodies are audited.
    pub fn parse(&self, payload: &[u8], correlation_id: &str) -> PaymentResult<WebhookNotification> {
        WebhookNotification::from_slice(payload).map_err(|e| {
            warn!(correlation_id, error = %e, "Malformed webhook payload");
            self.audit.log(
                AuditEventKind::WebhookProcessingFailed,
                json!({ "stage": "parse", "error": e.to_string() }),
                correlation_id,
            );
            PaymentError::WebhookParseError(e.to_string())
        })
    }

    /// Dispatch an authenticated notification. Errors are audited before
    /// being returned so the caller only decides on the HTTP status.
    #[instrument(skip(self, notification), fields(payment_id = %notification.payment_id, change_type = %notification.change_type))]
    pub async fn process_notification(
        &self,
        notification: &WebhookNotification,
        correlation_id: &str,
    ) -> PaymentResult<()> {
        info!(correlation_id, "Processing Cielo webhook");

        self.audit.log(
            AuditEventKind::WebhookReceived,
            json!({
                "paymentId": notification.payment_id,
                "changeType": notification.change_type,
                "clientOrderId": notification.client_order_id,
                "requestId": notification.request_id,
            }),
            correlation_id,
        );

        let result = match notification.change_type {
            ChangeType::PaymentStatus => self.handle_payment_status(notification, correlation_id).await,
            ChangeType::Recurrency => {
                self.handle_recurrency(notification, correlation_id);
                Ok(())
            }
            ChangeType::Chargeback => {
                self.handle_chargeback(notification, correlation_id);
                Ok(())
            }
            ChangeType::Unknown(code) => {
                warn!(correlation_id, change_type = code, "Unknown webhook change type");
                Ok(())
            }
        };

        if let Err(e) = &result {
            error!(correlation_id, error = %e, retryable = e.is_retryable(), "Webhook processing failed");
            self.audit.log(
                AuditEventKind::WebhookProcessingFailed,
                json!({
                    "paymentId": notification.payment_id,
                    "changeType": notification.change_type,
                    "error": e.to_string(),
                    "retryable": e.is_retryable(),
                }),
                correlation_id,
            );
        }

        result
    }

    async fn handle_payment_status(
        &self,
        notification: &WebhookNotification,
        correlation_id: &str,
    ) -> PaymentResult<()> {
        let reconciliation = self
            .reconciler
            .reconcile(
                &notification.payment_id,
                notification.client_order_id.as_deref(),
                correlation_id,
            )
            .await?;

        match GatewayStatus::from_code(reconciliation.details.status) {
            _ if reconciliation.mapping.contract_status == ContractStatus::Active => {
                self.handle_payment_approved(notification, &reconciliation, correlation_id)
                    .await;
            }
            GatewayStatus::Denied => {
                warn!(
                    correlation_id,
                    return_code = %reconciliation.details.return_code,
                    return_message = %reconciliation.details.return_message,
                    "Payment declined"
                );
            }
            GatewayStatus::Voided => {
                info!(correlation_id, "Payment cancelled");
            }
            status => {
                info!(correlation_id, %status, "Payment status recorded");
            }
        }

        Ok(())
    }

    async fn handle_payment_approved(
        &self,
        notification: &WebhookNotification,
        reconciliation: &Reconciliation,
        correlation_id: &str,
    ) {
        let details = &reconciliation.details;
        info!(correlation_id, amount = %details.amount_display(), "Payment approved");

        self.audit.log(
            AuditEventKind::PaymentApproved,
            json!({
                "paymentId": notification.payment_id,
                "amount": details.amount,
                "contractId": reconciliation.contract().map(|c| c.id.clone()),
            }),
            correlation_id,
        );

        // Isolated task so a panicking collaborator cannot take the delivery down
        let trigger = Arc::clone(&self.trigger);
        let task_notification = notification.clone();
        let task_details = details.clone();
        let task_correlation_id = correlation_id.to_string();
        let outcome = tokio::spawn(async move {
            trigger
                .generate_receipt_if_approved(&task_notification, &task_details, &task_correlation_id)
                .await
        })
        .await;

        if let Err(e) = outcome {
            error!(correlation_id, error = %e, "Approved payment processing failed");
            self.audit.log(
                AuditEventKind::PaymentApprovedProcessingFailed,
                json!({
                    "paymentId": notification.payment_id,
                    "error": e.to_string(),
                }),
                correlation_id,
            );
        }
    }

    fn handle_recurrency(&self, notification: &WebhookNotification, correlation_id: &str) {
        info!(correlation_id, payment_id = %notification.payment_id, "Recurrency event received");
        self.audit.log(
            AuditEventKind::RecurrencyReceived,
            json!({
                "paymentId": notification.payment_id,
                "clientOrderId": notification.client_order_id,
            }),
            correlation_id,
        );
    }

    fn handle_chargeback(&self, notification: &WebhookNotification, correlation_id: &str) {
        warn!(correlation_id, payment_id = %notification.payment_id, "Chargeback received");
        self.audit.log(
            AuditEventKind::ChargebackReceived,
            json!({
                "paymentId": notification.payment_id,
                "clientOrderId": notification.client_order_id,
                "requiresManualReview": true,
            }),
            correlation_id,
        );
    }
}

impl std::fmt::Debug for WebhookService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookService")
            .field("validator", &self.validator)
            .field("configuration", &self.configuration)
            .finish()
    }
}
