//! Payment provider abstraction.
//!
//! The pipeline only needs three provider calls: create a hosted payment
//! link, look up a payment, and refund part of a captured payment. Calls are
//! never made while a storage transaction is open; the caller bounds each one
//! with [`GatewayConfig::timeout`](crate::config::GatewayConfig::timeout).

mod razorpay;

pub use razorpay::RazorpayClient;

use crate::error::GatewayError;
use crate::types::Money;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

/// Payment gateway result
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Boxed future returned by gateway calls
pub type GatewayFuture<T> = Pin<Box<dyn Future<Output = GatewayResult<T>> + Send>>;

/// Request for a hosted payment page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentLinkRequest {
    /// Amount to collect
    pub amount: Money,
    /// ISO currency code
    pub currency: String,
    /// Our reference (the booking's order id)
    pub reference_id: String,
    /// Shown to the payer
    pub description: String,
    /// Payer's phone
    pub contact: String,
    /// Where the payer is sent after paying
    pub callback_url: String,
}

/// A created payment link.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaymentLink {
    /// Provider link id
    pub id: String,
    /// Hosted page URL
    pub short_url: String,
}

/// Provider view of one payment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaymentDetails {
    /// Provider payment id
    pub id: String,
    /// Payment method (`upi`, `card`, ...)
    #[serde(default)]
    pub method: Option<String>,
    /// Provider status (`captured`, `failed`, ...)
    #[serde(default)]
    pub status: String,
}

/// Accepted refund.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundReceipt {
    /// Provider refund id
    pub refund_id: String,
}

/// Payment provider.
///
/// Implementations must be cheap to share (`Arc<dyn PaymentGateway>`).
pub trait PaymentGateway: Send + Sync {
    /// Create a hosted payment link
    ///
    /// # Errors
    ///
    /// Provider rejection, transport failure, or an unreadable response
    fn create_payment_link(&self, request: PaymentLinkRequest) -> GatewayFuture<PaymentLink>;

    /// Look up a payment
    ///
    /// # Errors
    ///
    /// Provider rejection, transport failure, or an unreadable response
    fn fetch_payment(&self, payment_id: &str) -> GatewayFuture<PaymentDetails>;

    /// Refund `amount` of a captured payment
    ///
    /// # Errors
    ///
    /// Provider rejection, transport failure, or an unreadable response
    fn create_refund(&self, payment_id: &str, amount: Money) -> GatewayFuture<RefundReceipt>;
}
