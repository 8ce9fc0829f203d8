//! Customer redirect channel.
//!
//! After paying, the provider sends the browser back with the link id,
//! reference, status, payment id, and a signature over
//! `link_id|reference_id|status|payment_id` keyed with the API key secret.

use super::{signature, Capture};
use crate::app::EventHub;
use crate::error::{BookingError, SignatureError};
use crate::metrics;
use crate::store::{BookingStore, StoreTx};
use crate::types::{AccountId, Booking};
use serde::{Deserialize, Serialize};

/// Query parameters of the redirect. The provider's `razorpay_*` names are
/// accepted as aliases.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RedirectParams {
    /// Payment link id
    #[serde(default, alias = "razorpay_payment_link_id")]
    pub payment_link_id: Option<String>,
    /// Our order id, echoed back
    #[serde(default, alias = "razorpay_payment_link_reference_id")]
    pub payment_link_reference_id: Option<String>,
    /// Link status (`paid`, ...)
    #[serde(default, alias = "razorpay_payment_link_status")]
    pub payment_link_status: Option<String>,
    /// Provider payment id
    #[serde(default, alias = "razorpay_payment_id")]
    pub payment_id: Option<String>,
    /// Hex HMAC signature
    #[serde(default, alias = "razorpay_signature")]
    pub signature: Option<String>,
}

/// What the redirect page shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedirectOutcome {
    /// The booking
    pub booking: Booking,
    /// Its seats
    pub seats: Vec<u32>,
    /// This redirect performed the confirmation
    pub confirmed_now: bool,
}

fn present(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

impl<S: BookingStore> EventHub<S> {
    /// Handle a redirect.
    ///
    /// With a link id the signature is verified and a `paid` status confirms
    /// the booking. Without one, the caller's latest booking is shown and
    /// nothing changes.
    ///
    /// # Errors
    ///
    /// - [`BookingError::Signature`]: missing or wrong signature; nothing changed
    /// - [`BookingError::BookingNotFound`]
    /// - [`BookingError::MalformedNotification`]: `paid` without a payment id
    pub async fn handle_redirect(
        &self,
        params: &RedirectParams,
        caller: Option<AccountId>,
    ) -> Result<RedirectOutcome, BookingError> {
        let Some(link_id) = present(params.payment_link_id.as_ref()) else {
            return self.latest_for(caller).await;
        };

        let status = present(params.payment_link_status.as_ref()).unwrap_or_default();
        let payment_id = present(params.payment_id.as_ref()).unwrap_or_default();
        let payload = signature::redirect_payload(
            link_id,
            present(params.payment_link_reference_id.as_ref()).unwrap_or_default(),
            status,
            payment_id,
        );
        let sig = present(params.signature.as_ref());
        let verified = sig
            .ok_or(SignatureError::Missing)
            .and_then(|sig| signature::verify(self.config.gateway.key_secret.as_bytes(), payload.as_bytes(), sig));
        if let Err(error) = verified {
            metrics::record_signature_rejection("redirect");
            tracing::warn!(%link_id, %error, "Redirect rejected");
            return Err(error.into());
        }

        if status != "paid" {
            tracing::info!(%link_id, %status, "Redirect without payment");
            return self.show_link(link_id).await;
        }
        if payment_id.is_empty() {
            return Err(BookingError::MalformedNotification("paid redirect without payment id"));
        }

        // Best effort: the method is informational.
        let method = match self.call(self.gateway.fetch_payment(payment_id)).await {
            Ok(details) => details.method,
            Err(error) => {
                tracing::warn!(%payment_id, %error, "Payment method lookup failed");
                None
            }
        };

        let capture = Capture {
            payment_id: payment_id.to_string(),
            method,
            signature: sig.map(str::to_string),
        };
        let confirmation = self
            .confirm_payment(link_id, capture)
            .await?
            .ok_or_else(|| BookingError::BookingNotFound(link_id.to_string()))?;
        Ok(RedirectOutcome {
            booking: confirmation.booking,
            seats: confirmation.seats,
            confirmed_now: confirmation.newly_paid,
        })
    }

    async fn show_link(&self, link_id: &str) -> Result<RedirectOutcome, BookingError> {
        let mut tx = self.store.begin().await?;
        let booking = tx
            .lock_booking_by_link(link_id)
            .await?
            .ok_or_else(|| BookingError::BookingNotFound(link_id.to_string()))?;
        let seats = tx.seats_of(booking.id).await?;
        Ok(RedirectOutcome {
            booking,
            seats,
            confirmed_now: false,
        })
    }

    async fn latest_for(&self, caller: Option<AccountId>) -> Result<RedirectOutcome, BookingError> {
        let account = caller.ok_or(BookingError::AccountNotFound)?;
        let mut tx = self.store.begin().await?;
        let booking = tx
            .latest_booking_for(account)
            .await?
            .ok_or_else(|| BookingError::BookingNotFound(format!("latest booking of {account}")))?;
        let seats = tx.seats_of(booking.id).await?;
        tracing::info!(account_id = %account, booking_id = %booking.id, "Redirect without link id; showing latest booking");
        Ok(RedirectOutcome {
            booking,
            seats,
            confirmed_now: false,
        })
    }
}
