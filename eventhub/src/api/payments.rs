//! Payment provider endpoints.
//!
//! The webhook is authenticated by its body signature, not by the account
//! header; the callback is the customer's browser coming back.

use super::error::webhook_error;
use super::ApiState;
use crate::reconciliation::{RedirectOutcome, RedirectParams, WebhookOutcome};
use crate::store::BookingStore;
use crate::types::AccountId;
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use eventhub_web::{AppError, CorrelationId, MaybeAccount, WebResult};

/// Header carrying the webhook signature
pub const SIGNATURE_HEADER: &str = "X-Razorpay-Signature";

/// Provider webhook.
///
/// # Endpoint
///
/// ```text
/// POST /payments/webhook
/// X-Razorpay-Signature: <hex hmac of body>
/// ```
///
/// 200 for every authentic delivery, including ones that change nothing;
/// 400 for a missing or wrong signature.
pub async fn webhook<S: BookingStore>(
    State(hub): State<ApiState<S>>,
    correlation_id: CorrelationId,
    headers: HeaderMap,
    body: Bytes,
) -> WebResult<Json<WebhookOutcome>> {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    let outcome = hub
        .handle_webhook(&body, signature)
        .await
        .map_err(webhook_error)?;
    tracing::info!(correlation_id = %correlation_id.0, ?outcome, "Webhook handled");
    Ok(Json(outcome))
}

/// Customer redirect after payment.
pub async fn callback<S: BookingStore>(
    State(hub): State<ApiState<S>>,
    MaybeAccount(caller): MaybeAccount,
    Query(params): Query<RedirectParams>,
) -> WebResult<Json<RedirectOutcome>> {
    if params.payment_link_id.is_none() && caller.is_none() {
        return Err(AppError::unauthorized("Sign in to see your booking"));
    }
    let outcome = hub
        .handle_redirect(&params, caller.map(AccountId::from_uuid))
        .await?;
    Ok(Json(outcome))
}
