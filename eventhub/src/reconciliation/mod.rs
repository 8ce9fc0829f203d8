//! Payment reconciliation.
//!
//! Two independent, authenticated channels report the same payment: the
//! provider's webhook and the customer's browser redirect. Either may arrive
//! first, late, or more than once. Both end in [`EventHub::confirm_payment`],
//! which locks the booking so that only one of them performs the
//! pending → paid transition; the other sees a paid booking and changes
//! nothing (beyond re-checking that the booking is seated).

pub mod redirect;
pub mod signature;
pub mod webhook;

pub use redirect::{RedirectOutcome, RedirectParams};
pub use webhook::WebhookOutcome;

use crate::app::EventHub;
use crate::booking::BookingAction;
use crate::error::BookingError;
use crate::metrics;
use crate::store::{BookingStore, StoreTx};
use crate::types::{Booking, PaymentStatus};
use eventhub_core::reducer::Reducer;

/// A verified report that a payment was captured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    /// Provider payment id
    pub payment_id: String,
    /// Payment method, when known
    pub method: Option<String>,
    /// Redirect signature, kept for audit
    pub signature: Option<String>,
}

/// Result of applying a capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    /// Booking after the capture
    pub booking: Booking,
    /// Seats it holds
    pub seats: Vec<u32>,
    /// This call performed the pending → paid transition
    pub newly_paid: bool,
}

/// Result of applying a payment failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    /// Booking after the report
    pub booking: Booking,
    /// This call performed the pending → failed transition
    pub newly_failed: bool,
}

impl<S: BookingStore> EventHub<S> {
    /// Apply a verified capture to the booking owning `link_id`.
    ///
    /// Payment, seat allocation, token settlement, and the popularity check
    /// commit together. Ticket and notification delivery follow the commit.
    /// Returns `None` for an unknown link.
    ///
    /// # Errors
    ///
    /// - [`BookingError::InvalidTransition`] if the booking already failed
    /// - [`BookingError::SeatAllocationFault`]: the payment was recorded but
    ///   the booking could not be seated; needs operator attention
    pub async fn confirm_payment(
        &self,
        link_id: &str,
        capture: Capture,
    ) -> Result<Option<Confirmation>, BookingError> {
        let (booking, event, mut applied, newly_paid) = {
            let mut tx = self.store.begin().await?;
            let Some(mut booking) = tx.lock_booking_by_link(link_id).await? else {
                return Ok(None);
            };
            let event = tx
                .lock_event(booking.event_id)
                .await?
                .ok_or(BookingError::EventNotFound(booking.event_id))?;

            let was_paid = booking.is_paid();
            let effects = self.reducer.reduce(
                &mut booking,
                BookingAction::PaymentCaptured {
                    payment_id: capture.payment_id,
                    method: capture.method,
                    signature: capture.signature,
                },
                &self.env,
            )?;
            let applied = self.apply_effects(&mut tx, &booking, &event, &effects).await?;
            tx.update_booking(&booking).await?;
            tx.commit().await?;
            let newly_paid = !was_paid && booking.is_paid();
            (booking, event, applied, newly_paid)
        };

        if newly_paid {
            metrics::record_booking("paid");
        }
        self.deliver(&booking, &event, &mut applied).await;

        let seats = std::mem::take(&mut applied.seats);
        applied.into_fault(&booking)?;
        Ok(Some(Confirmation {
            booking,
            seats,
            newly_paid,
        }))
    }

    /// Apply a verified payment failure to the booking owning `link_id`.
    /// Only pending bookings change. Returns `None` for an unknown link.
    ///
    /// # Errors
    ///
    /// Storage failures.
    pub async fn fail_payment(&self, link_id: &str, reason: String) -> Result<Option<Failure>, BookingError> {
        let mut tx = self.store.begin().await?;
        let Some(mut booking) = tx.lock_booking_by_link(link_id).await? else {
            return Ok(None);
        };
        let was_pending = booking.payment_status == PaymentStatus::Pending;
        self.reducer
            .reduce(&mut booking, BookingAction::PaymentFailed { reason }, &self.env)?;
        if was_pending {
            tx.update_booking(&booking).await?;
            tx.commit().await?;
            metrics::record_booking("failed");
        }
        Ok(Some(Failure {
            booking,
            newly_failed: was_pending,
        }))
    }
}
