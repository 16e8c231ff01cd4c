//! Hosted-checkout payment gateway client. The card path asks the provider
//! for a payment session and redirects the shopper to it; confirmation comes
//! back asynchronously through the webhook.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, instrument};

use crate::config::PaymentConfig;
use crate::errors::ServiceError;

/// One provider line item, carrying product metadata and the chosen color.
#[derive(Debug, Clone, Serialize)]
pub struct SessionLineItem {
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub unit_amount: Decimal,
    pub quantity: i32,
}

/// Request for a hosted payment session.
#[derive(Debug, Clone, Serialize)]
pub struct CreateSessionRequest {
    /// Order id, echoed back by the provider for correlation
    pub client_reference_id: String,
    pub customer_email: String,
    pub amount_total: Decimal,
    pub line_items: Vec<SessionLineItem>,
    pub success_url: String,
    pub cancel_url: String,
}

/// A created payment session.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentSession {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Seam for the external payment provider. The production implementation
/// talks HTTP; tests substitute their own.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_session(
        &self,
        request: CreateSessionRequest,
    ) -> Result<PaymentSession, ServiceError>;
}

/// HTTP gateway client with a bounded per-call timeout. On timeout or any
/// transport failure checkout fails with a retryable error and no order row
/// is created.
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpPaymentGateway {
    pub fn new(config: &PaymentConfig) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.gateway_timeout_secs))
            .build()
            .map_err(|e| {
                ServiceError::InternalError(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.gateway_url.trim_end_matches('/').to_string(),
            api_key: config.gateway_api_key.clone(),
        })
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    #[instrument(skip(self, request), fields(reference = %request.client_reference_id))]
    async fn create_session(
        &self,
        request: CreateSessionRequest,
    ) -> Result<PaymentSession, ServiceError> {
        let url = format!("{}/v1/checkout/sessions", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Payment session request failed: {}", e);
                ServiceError::ExternalServiceError(format!(
                    "Payment provider unreachable: {}",
                    e
                ))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(%status, body, "Payment provider rejected session request");
            return Err(ServiceError::ExternalServiceError(format!(
                "Payment provider returned {}",
                status
            )));
        }

        response.json::<PaymentSession>().await.map_err(|e| {
            error!("Malformed payment session response: {}", e);
            ServiceError::ExternalServiceError(format!(
                "Malformed payment provider response: {}",
                e
            ))
        })
    }
}
