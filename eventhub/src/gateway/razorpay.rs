//! Razorpay REST client.

use super::{
    GatewayFuture, GatewayResult, PaymentDetails, PaymentGateway, PaymentLink,
    PaymentLinkRequest, RefundReceipt,
};
use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::types::Money;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

/// Razorpay client using key-id/key-secret basic auth.
#[derive(Clone)]
pub struct RazorpayClient {
    client: Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

impl std::fmt::Debug for RazorpayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RazorpayClient")
            .field("base_url", &self.base_url)
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct RefundResponse {
    id: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    description: String,
}

impl RazorpayClient {
    /// Create a client from gateway settings.
    ///
    /// # Errors
    ///
    /// [`GatewayError::Transport`] if the HTTP client cannot be built.
    pub fn new(config: &GatewayConfig) -> GatewayResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            key_id: config.key_id.clone(),
            key_secret: config.key_secret.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn read<T: DeserializeOwned>(response: Response) -> GatewayResult<T> {
        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| GatewayError::Malformed(e.to_string()));
        }
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorEnvelope>(&body)
            .map(|envelope| envelope.error.description)
            .unwrap_or(body);
        Err(GatewayError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

fn transport(error: &reqwest::Error) -> GatewayError {
    if error.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Transport(error.to_string())
    }
}

impl PaymentGateway for RazorpayClient {
    fn create_payment_link(&self, request: PaymentLinkRequest) -> GatewayFuture<PaymentLink> {
        let this = self.clone();
        Box::pin(async move {
            let body = json!({
                "amount": request.amount.paise(),
                "currency": request.currency,
                "reference_id": request.reference_id,
                "description": request.description,
                "customer": { "contact": request.contact },
                "notify": { "sms": true, "email": false },
                "callback_url": request.callback_url,
                "callback_method": "get",
            });
            let response = this
                .client
                .post(this.url("/v1/payment_links"))
                .basic_auth(&this.key_id, Some(&this.key_secret))
                .json(&body)
                .send()
                .await
                .map_err(|e| transport(&e))?;
            let link: PaymentLink = Self::read(response).await?;
            tracing::debug!(link_id = %link.id, reference = %request.reference_id, "Payment link created");
            Ok(link)
        })
    }

    fn fetch_payment(&self, payment_id: &str) -> GatewayFuture<PaymentDetails> {
        let this = self.clone();
        let payment_id = payment_id.to_string();
        Box::pin(async move {
            let response = this
                .client
                .get(this.url(&format!("/v1/payments/{payment_id}")))
                .basic_auth(&this.key_id, Some(&this.key_secret))
                .send()
                .await
                .map_err(|e| transport(&e))?;
            Self::read(response).await
        })
    }

    fn create_refund(&self, payment_id: &str, amount: Money) -> GatewayFuture<RefundReceipt> {
        let this = self.clone();
        let payment_id = payment_id.to_string();
        Box::pin(async move {
            let response = this
                .client
                .post(this.url(&format!("/v1/payments/{payment_id}/refund")))
                .basic_auth(&this.key_id, Some(&this.key_secret))
                .json(&json!({ "amount": amount.paise() }))
                .send()
                .await
                .map_err(|e| transport(&e))?;
            let refund: RefundResponse = Self::read(response).await?;
            tracing::info!(%payment_id, refund_id = %refund.id, amount = %amount, "Refund accepted");
            Ok(RefundReceipt {
                refund_id: refund.id,
            })
        })
    }
}
