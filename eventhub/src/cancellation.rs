//! Partial and full cancellation with fee-adjusted refunds.

use crate::app::EventHub;
use crate::booking::BookingAction;
use crate::error::BookingError;
use crate::metrics;
use crate::store::{BookingStore, StoreTx};
use crate::types::{AccountId, Booking, BookingId, Money};
use eventhub_core::reducer::Reducer;
use serde::Serialize;

/// Refund for canceling `count` of `tickets_booked` tickets, withholding
/// `fee_percent`. Rounded down to the paisa.
///
/// ```
/// use eventhub::cancellation::refund_for;
/// use eventhub::types::Money;
///
/// // ₹1000 for 5 tickets, cancel 2, 10% fee
/// let refund = refund_for(Money::from_paise(100_000), 5, 2, 10);
/// assert_eq!(refund, Money::from_paise(36_000));
/// ```
#[must_use]
pub fn refund_for(total: Money, tickets_booked: u32, count: u32, fee_percent: u8) -> Money {
    if tickets_booked == 0 {
        return Money::ZERO;
    }
    let kept = 100 - u128::from(fee_percent.min(100));
    let refund = u128::from(total.paise()) * u128::from(count) * kept
        / (u128::from(tickets_booked) * 100);
    Money::from_paise(u64::try_from(refund).unwrap_or(u64::MAX))
}

/// What happened to the money.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RefundOutcome {
    /// Nothing to refund (nothing was paid through the provider, or nothing left)
    NotApplicable,
    /// Refund accepted
    Refunded {
        /// Amount refunded
        amount: Money,
        /// Provider refund id; `None` in test mode
        refund_id: Option<String>,
    },
    /// Provider rejected the refund; recorded as outstanding
    Failed {
        /// Amount not refunded
        amount: Money,
        /// Provider's reason
        reason: String,
    },
}

/// Result of a cancellation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CancellationReceipt {
    /// Booking after the cancellation
    pub booking: Booking,
    /// Seats returned to the event
    pub released_seats: Vec<u32>,
    /// Refund result
    pub refund: RefundOutcome,
}

impl<S: BookingStore> EventHub<S> {
    /// Cancel `count` of a paid booking's active tickets.
    ///
    /// Seats are freed in the same transaction as the booking update; the
    /// refund is requested after commit. Canceling an already-canceled
    /// booking changes nothing.
    ///
    /// # Errors
    ///
    /// - [`BookingError::BookingNotFound`]; [`BookingError::Forbidden`] for another customer's booking
    /// - [`BookingError::InvalidCancelCount`], [`BookingError::NotCancelable`]
    pub async fn cancel_tickets(
        &self,
        booking_id: BookingId,
        caller: AccountId,
        count: u32,
    ) -> Result<CancellationReceipt, BookingError> {
        let (booking, applied) = {
            let mut tx = self.store.begin().await?;
            let mut booking = tx
                .lock_booking(booking_id)
                .await?
                .ok_or_else(|| BookingError::BookingNotFound(booking_id.to_string()))?;
            if booking.account_id != caller {
                return Err(BookingError::Forbidden);
            }
            let event = tx
                .lock_event(booking.event_id)
                .await?
                .ok_or(BookingError::EventNotFound(booking.event_id))?;

            let effects = self.reducer.reduce(
                &mut booking,
                BookingAction::CancelTickets { count },
                &self.env,
            )?;
            if effects.is_empty() {
                return Ok(CancellationReceipt {
                    booking,
                    released_seats: Vec::new(),
                    refund: RefundOutcome::NotApplicable,
                });
            }
            let applied = self.apply_effects(&mut tx, &booking, &event, &effects).await?;
            tx.update_booking(&booking).await?;
            tx.commit().await?;
            (booking, applied)
        };

        metrics::record_tickets_canceled(count);
        if booking.tokens_used > 0 || booking.tokens_earned > 0 {
            // Tokens are neither restored nor clawed back on cancellation.
            tracing::info!(
                booking_id = %booking.id,
                tokens_used = booking.tokens_used,
                tokens_earned = booking.tokens_earned,
                "Cancellation leaves token balance unchanged"
            );
        }
        if booking.active_tickets() == 0 {
            metrics::record_booking("canceled");
        }

        let Some((payment_id, amount)) = applied.refund else {
            return Ok(CancellationReceipt {
                booking,
                released_seats: applied.released,
                refund: RefundOutcome::NotApplicable,
            });
        };
        let (booking, refund) = self.settle_refund(booking.id, &payment_id, amount).await?;
        Ok(CancellationReceipt {
            booking,
            released_seats: applied.released,
            refund,
        })
    }

    /// Ask the provider for a refund and record the answer.
    ///
    /// In test mode the refund is recorded without calling the provider.
    async fn settle_refund(
        &self,
        booking_id: BookingId,
        payment_id: &str,
        amount: Money,
    ) -> Result<(Booking, RefundOutcome), BookingError> {
        let result = if self.config.gateway.is_test_mode() {
            tracing::info!(%booking_id, amount = %amount, "Test mode: refund recorded without provider call");
            Ok(None)
        } else {
            self.call(self.gateway.create_refund(payment_id, amount))
                .await
                .map(|receipt| Some(receipt.refund_id))
        };

        let (action, outcome) = match result {
            Ok(refund_id) => {
                metrics::record_refund("refunded");
                (
                    BookingAction::RefundSettled {
                        refund_id: refund_id.clone(),
                    },
                    RefundOutcome::Refunded { amount, refund_id },
                )
            }
            Err(error) => {
                metrics::record_refund("failed");
                tracing::warn!(%booking_id, %payment_id, %error, "Refund request failed");
                let reason = error.to_string();
                (
                    BookingAction::RefundRejected {
                        amount,
                        reason: reason.clone(),
                    },
                    RefundOutcome::Failed { amount, reason },
                )
            }
        };

        let mut tx = self.store.begin().await?;
        let mut booking = tx
            .lock_booking(booking_id)
            .await?
            .ok_or_else(|| BookingError::BookingNotFound(booking_id.to_string()))?;
        self.reducer.reduce(&mut booking, action, &self.env)?;
        tx.update_booking(&booking).await?;
        tx.commit().await?;
        Ok((booking, outcome))
    }
}
