//! # Cielo Query Client
//!
//! `PaymentGateway` implementation over the Cielo query API:
//! `GET {query_api_url}/1/sales/{payment_id}`.

use crate::config::CieloConfig;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use pay_core::{PaymentDetails, PaymentError, PaymentGateway, PaymentResult};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, error, instrument};

pub struct CieloClient {
    config: CieloConfig,
    client: Client,
}

impl CieloClient {
    /// Create a new query client
    pub fn new(config: CieloConfig) -> PaymentResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| PaymentError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Create from environment variables
    pub fn from_env() -> PaymentResult<Self> {
        Self::new(CieloConfig::from_env()?)
    }

    fn sale_url(&self, payment_id: &str) -> PaymentResult<Url> {
        let mut url = Url::parse(&self.config.query_api_url).map_err(|e| {
            PaymentError::Configuration(format!("Invalid CIELO_QUERY_API_URL: {}", e))
        })?;

        url.path_segments_mut()
            .map_err(|_| {
                PaymentError::Configuration("CIELO_QUERY_API_URL cannot be a base".to_string())
            })?
            .pop_if_empty()
            .extend(["1", "sales", payment_id]);

        Ok(url)
    }
}

/// Gateway payment ids are UUIDs; anything outside `[A-Za-z0-9-]` is refused
/// before it reaches a URL.
fn is_valid_payment_id(payment_id: &str) -> bool {
    !payment_id.is_empty()
        && payment_id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-')
}

#[async_trait]
impl PaymentGateway for CieloClient {
    #[instrument(skip(self))]
    async fn query_payment(&self, payment_id: &str) -> PaymentResult<PaymentDetails> {
        if payment_id.trim().is_empty() {
            return Err(PaymentError::InvalidRequest("Empty payment id".to_string()));
        }

        if !is_valid_payment_id(payment_id) {
            return Err(PaymentError::InvalidRequest(format!(
                "Malformed payment id: {:?}",
                payment_id
            )));
        }

        let response = self
            .client
            .get(self.sale_url(payment_id)?)
            .header("MerchantId", &self.config.merchant_id)
            .header("MerchantKey", &self.config.merchant_key)
            .header("RequestId", uuid::Uuid::new_v4().to_string())
            .send()
            .await
            .map_err(|e| PaymentError::NetworkError(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PaymentError::NetworkError(e.to_string()))?;

        if status == StatusCode::NOT_FOUND {
            return Err(PaymentError::PaymentNotFound {
                payment_id: payment_id.to_string(),
            });
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(PaymentError::RateLimited {
                provider: "cielo".to_string(),
                retry_after_secs: 60,
            });
        }

        if !status.is_success() {
            error!("Cielo API error: status={}, body={}", status, body);

            if let Ok(errors) = serde_json::from_str::<Vec<CieloError>>(&body) {
                if let Some(first) = errors.first() {
                    return Err(PaymentError::ProviderError {
                        provider: "cielo".to_string(),
                        message: format!("{}: {}", first.code, first.message),
                    });
                }
            }

            return Err(PaymentError::ProviderError {
                provider: "cielo".to_string(),
                message: format!("HTTP {}: {}", status, body),
            });
        }

        let sale: CieloSaleResponse = serde_json::from_str(&body).map_err(|e| {
            PaymentError::Serialization(format!("Failed to parse Cielo response: {}", e))
        })?;

        debug!(
            status = sale.payment.status,
            return_code = ?sale.payment.return_code,
            "Queried Cielo payment"
        );

        Ok(sale.into_details(payment_id))
    }

    fn provider_name(&self) -> &'static str {
        "cielo"
    }
}

// =============================================================================
// Cielo API Types
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CieloSaleResponse {
    payment: CieloPayment,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CieloPayment {
    #[serde(default)]
    payment_id: Option<String>,
    status: i64,
    #[serde(default)]
    return_code: Option<String>,
    #[serde(default)]
    return_message: Option<String>,
    #[serde(default)]
    amount: i64,
    #[serde(default)]
    proof_of_sale: Option<String>,
    #[serde(default)]
    tid: Option<String>,
    #[serde(default)]
    authorization_code: Option<String>,
    #[serde(default, rename = "Type")]
    payment_type: Option<String>,
    #[serde(default)]
    received_date: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CieloError {
    code: i64,
    message: String,
}

impl CieloSaleResponse {
    fn into_details(self, requested_id: &str) -> PaymentDetails {
        let p = self.payment;
        PaymentDetails {
            payment_id: p.payment_id.unwrap_or_else(|| requested_id.to_string()),
            status: p.status,
            return_code: p.return_code.unwrap_or_default(),
            return_message: p.return_message.unwrap_or_default(),
            amount: p.amount,
            proof_of_sale: p.proof_of_sale,
            tid: p.tid,
            authorization_code: p.authorization_code,
            payment_type: p.payment_type,
            received_date: p.received_date.as_deref().and_then(parse_cielo_date),
        }
    }
}

/// Cielo sends "2025-03-14 10:22:05" (no zone) or RFC 3339
fn parse_cielo_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> CieloClient {
        let config = CieloConfig::new("merchant-1", "key-1", Environment::Development)
            .with_query_api_url(server.uri());
        CieloClient::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_query_payment_parses_sale() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/1/sales/P1"))
            .and(header("MerchantId", "merchant-1"))
            .and(header("MerchantKey", "key-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "MerchantOrderId": "ana@example.com",
                "Payment": {
                    "PaymentId": "P1",
                    "Status": 2,
                    "ReturnCode": "6",
                    "ReturnMessage": "Operation Successful",
                    "Amount": 15700,
                    "ProofOfSale": "674532",
                    "Tid": "0305020554239",
                    "AuthorizationCode": "123456",
                    "Type": "CreditCard",
                    "ReceivedDate": "2025-03-14 10:22:05"
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let details = client_for(&server).await.query_payment("P1").await.unwrap();

        assert_eq!(details.payment_id, "P1");
        assert_eq!(details.status, 2);
        assert_eq!(details.return_code, "6");
        assert_eq!(details.amount, 15700);
        assert_eq!(details.payment_type.as_deref(), Some("CreditCard"));
        assert_eq!(details.tid.as_deref(), Some("0305020554239"));
        assert!(details.received_date.is_some());
    }

    #[tokio::test]
    async fn test_query_payment_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/1/sales/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let result = client_for(&server).await.query_payment("missing").await;
        assert!(matches!(result, Err(PaymentError::PaymentNotFound { .. })));
    }

    #[tokio::test]
    async fn test_query_payment_provider_error_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/1/sales/P1"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!([
                { "Code": 0, "Message": "Internal error" }
            ])))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .query_payment("P1")
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert!(err.to_string().contains("Internal error"));
    }

    #[tokio::test]
    async fn test_path_traversal_id_never_leaves_sales_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Payment": { "PaymentId": "X", "Status": 2 }
            })))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        for id in ["../other/secret", "P1/../../x", "..", "P1?x=1", "P 1"] {
            let result = client.query_payment(id).await;
            assert!(
                matches!(result, Err(PaymentError::InvalidRequest(_))),
                "{id} should be refused"
            );
        }

        let received = server.received_requests().await.unwrap();
        assert!(received.is_empty());
    }

    #[tokio::test]
    async fn test_sale_url_keeps_base_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/query/1/sales/0a1b-2C3d"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Payment": { "PaymentId": "0a1b-2C3d", "Status": 1 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let config = CieloConfig::new("merchant-1", "key-1", Environment::Development)
            .with_query_api_url(format!("{}/query/", server.uri()));
        let details = CieloClient::new(config)
            .unwrap()
            .query_payment("0a1b-2C3d")
            .await
            .unwrap();
        assert_eq!(details.status, 1);
    }

    #[test]
    fn test_parse_cielo_date() {
        assert!(parse_cielo_date("2025-03-14 10:22:05").is_some());
        assert!(parse_cielo_date("2025-03-14T10:22:05Z").is_some());
        assert!(parse_cielo_date("14/03/2025").is_none());
    }
}
