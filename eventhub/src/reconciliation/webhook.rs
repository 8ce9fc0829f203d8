//! Provider webhook channel.
//!
//! The signature covers the raw body bytes, so it is checked before the body
//! is parsed.

use super::{signature, Capture};
use crate::app::EventHub;
use crate::error::{BookingError, SignatureError};
use crate::metrics;
use crate::store::BookingStore;
use crate::types::BookingId;
use serde::{Deserialize, Serialize};

/// How a webhook delivery was handled. Every variant is acknowledged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum WebhookOutcome {
    /// Booking moved to paid
    Confirmed {
        /// Booking
        booking_id: BookingId,
    },
    /// Booking was already paid (or canceled); nothing changed
    AlreadyConfirmed {
        /// Booking
        booking_id: BookingId,
    },
    /// Booking is paid but could not be seated; operator attention needed
    SeatingFailed {
        /// Booking
        booking_id: BookingId,
    },
    /// Failure recorded (pending bookings only)
    Failed {
        /// Booking
        booking_id: BookingId,
    },
    /// Nothing to do
    Ignored {
        /// Why
        reason: &'static str,
    },
}

#[derive(Debug, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    payload: Payload,
}

#[derive(Debug, Default, Deserialize)]
struct Payload {
    payment: Option<Entity<PaymentEntity>>,
    payment_link: Option<Entity<LinkEntity>>,
}

#[derive(Debug, Deserialize)]
struct Entity<T> {
    entity: T,
}

#[derive(Debug, Deserialize)]
struct PaymentEntity {
    id: String,
    #[serde(default)]
    payment_link_id: Option<String>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LinkEntity {
    id: String,
}

impl Payload {
    fn link_id(&self) -> Option<&str> {
        self.payment
            .as_ref()
            .and_then(|p| p.entity.payment_link_id.as_deref())
            .or_else(|| self.payment_link.as_ref().map(|l| l.entity.id.as_str()))
            .filter(|id| !id.is_empty())
    }
}

impl<S: BookingStore> EventHub<S> {
    /// Handle one webhook delivery.
    ///
    /// `payment.captured` and `payment_link.paid` confirm; `payment.failed`
    /// fails a pending booking. Unknown events and links are acknowledged
    /// and ignored.
    ///
    /// # Errors
    ///
    /// - [`BookingError::Signature`]: missing or wrong signature; nothing changed
    /// - [`BookingError::MalformedNotification`]: authentic but unreadable body
    pub async fn handle_webhook(
        &self,
        body: &[u8],
        signature_header: Option<&str>,
    ) -> Result<WebhookOutcome, BookingError> {
        let verified = signature_header
            .ok_or(SignatureError::Missing)
            .and_then(|sig| signature::verify(self.config.gateway.webhook_secret.as_bytes(), body, sig));
        if let Err(error) = verified {
            metrics::record_signature_rejection("webhook");
            tracing::warn!(%error, body_len = body.len(), "Webhook rejected");
            return Err(error.into());
        }

        let envelope: Envelope = serde_json::from_slice(body).map_err(|error| {
            tracing::warn!(%error, "Webhook body unreadable");
            BookingError::MalformedNotification("webhook body is not a provider event")
        })?;
        tracing::debug!(event = %envelope.event, "Webhook received");

        match envelope.event.as_str() {
            "payment.captured" | "payment_link.paid" => self.webhook_capture(&envelope.payload).await,
            "payment.failed" => self.webhook_failure(&envelope.payload).await,
            _ => Ok(WebhookOutcome::Ignored {
                reason: "unhandled event",
            }),
        }
    }

    async fn webhook_capture(&self, payload: &Payload) -> Result<WebhookOutcome, BookingError> {
        let Some(link_id) = payload.link_id() else {
            return Ok(WebhookOutcome::Ignored {
                reason: "no payment link",
            });
        };
        let Some(payment) = payload.payment.as_ref().map(|p| &p.entity) else {
            return Err(BookingError::MalformedNotification("capture without payment entity"));
        };

        let capture = Capture {
            payment_id: payment.id.clone(),
            method: payment.method.clone(),
            signature: None,
        };
        match self.confirm_payment(link_id, capture).await {
            Ok(Some(confirmation)) if confirmation.newly_paid => Ok(WebhookOutcome::Confirmed {
                booking_id: confirmation.booking.id,
            }),
            Ok(Some(confirmation)) => Ok(WebhookOutcome::AlreadyConfirmed {
                booking_id: confirmation.booking.id,
            }),
            Ok(None) => {
                tracing::info!(%link_id, "Webhook for unknown payment link");
                Ok(WebhookOutcome::Ignored {
                    reason: "unknown payment link",
                })
            }
            Err(BookingError::SeatAllocationFault { booking_id, .. }) => {
                Ok(WebhookOutcome::SeatingFailed { booking_id })
            }
            Err(BookingError::InvalidTransition { status, .. }) => {
                tracing::error!(%link_id, payment_id = %payment.id, %status, "Capture reported for a failed booking; refund manually");
                Ok(WebhookOutcome::Ignored {
                    reason: "booking already failed",
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn webhook_failure(&self, payload: &Payload) -> Result<WebhookOutcome, BookingError> {
        let Some(link_id) = payload.link_id() else {
            return Ok(WebhookOutcome::Ignored {
                reason: "no payment link",
            });
        };
        let reason = payload
            .payment
            .as_ref()
            .and_then(|p| p.entity.error_description.clone())
            .unwrap_or_else(|| "payment failed".to_string());

        Ok(match self.fail_payment(link_id, reason).await? {
            Some(failure) if failure.newly_failed => WebhookOutcome::Failed {
                booking_id: failure.booking.id,
            },
            Some(failure) if failure.booking.is_paid() => WebhookOutcome::AlreadyConfirmed {
                booking_id: failure.booking.id,
            },
            Some(_) => WebhookOutcome::Ignored {
                reason: "booking already settled",
            },
            None => WebhookOutcome::Ignored {
                reason: "unknown payment link",
            },
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn link_id_comes_from_payment_or_link_entity() {
        let captured: Envelope = serde_json::from_str(
            r#"{"event":"payment.captured","payload":{"payment":{"entity":
                {"id":"pay_1","payment_link_id":"plink_1","method":"upi"}}}}"#,
        )
        .unwrap();
        assert_eq!(captured.payload.link_id(), Some("plink_1"));

        let paid: Envelope = serde_json::from_str(
            r#"{"event":"payment_link.paid","payload":{
                "payment_link":{"entity":{"id":"plink_2"}},
                "payment":{"entity":{"id":"pay_2"}}}}"#,
        )
        .unwrap();
        assert_eq!(paid.payload.link_id(), Some("plink_2"));

        let bare: Envelope = serde_json::from_str(r#"{"event":"refund.created"}"#).unwrap();
        assert_eq!(bare.payload.link_id(), None);
    }
}
