//! Tickets and venue check-in.

use crate::app::EventHub;
use crate::booking::BookingAction;
use crate::error::BookingError;
use crate::store::{BookingStore, StoreTx};
use crate::types::{AccountId, Booking, BookingId, Event, EventId, Money, OrderId, PaymentStatus};
use eventhub_core::reducer::Reducer;
use serde::Serialize;

/// What the holder shows at the door.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ticket {
    /// Booking reference
    pub order_id: OrderId,
    /// Event
    pub event_id: EventId,
    /// Event title
    pub event_title: String,
    /// Active tickets
    pub tickets: u32,
    /// Seat numbers, ascending
    pub seats: Vec<u32>,
    /// Price before token discount
    pub total_price: Money,
    /// Tokens redeemed
    pub tokens_used: u64,
    /// Amount actually paid
    pub amount_paid: Money,
    /// Holder's phone
    pub contact: String,
    /// URL encoded in the ticket's QR code
    pub verification_url: String,
}

impl Ticket {
    /// Assemble the ticket for a paid booking.
    #[must_use]
    pub fn for_booking(booking: &Booking, event: &Event, mut seats: Vec<u32>, base_url: &str) -> Self {
        seats.sort_unstable();
        Self {
            order_id: booking.order_id.clone(),
            event_id: event.id,
            event_title: event.title.clone(),
            tickets: booking.active_tickets(),
            seats,
            total_price: booking.total_price,
            tokens_used: booking.tokens_used,
            amount_paid: booking.amount_to_pay,
            contact: booking.contact.clone(),
            verification_url: verification_url(base_url, &booking.order_id),
        }
    }
}

/// `{base}/tickets/{order_id}/verify`
#[must_use]
pub fn verification_url(base_url: &str, order_id: &OrderId) -> String {
    format!("{}/tickets/{order_id}/verify", base_url.trim_end_matches('/'))
}

/// Result of scanning a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckInOutcome {
    /// First scan; holder admitted
    Admitted,
    /// Ticket was already scanned
    AlreadyVerified,
}

/// Check-in response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckIn {
    /// Outcome
    pub outcome: CheckInOutcome,
    /// The scanned ticket
    pub ticket: Ticket,
}

impl<S: BookingStore> EventHub<S> {
    /// The ticket of a paid booking, for its owner.
    ///
    /// # Errors
    ///
    /// - [`BookingError::BookingNotFound`]
    /// - [`BookingError::Forbidden`] if `caller` does not own the booking
    /// - [`BookingError::NoTicket`] unless the booking is paid
    pub async fn ticket(&self, booking_id: BookingId, caller: AccountId) -> Result<Ticket, BookingError> {
        let mut tx = self.store.begin().await?;
        let booking = tx
            .booking(booking_id)
            .await?
            .ok_or_else(|| BookingError::BookingNotFound(booking_id.to_string()))?;
        if booking.account_id != caller {
            return Err(BookingError::Forbidden);
        }
        if booking.payment_status != PaymentStatus::Paid {
            return Err(BookingError::NoTicket(booking.payment_status));
        }
        let event = tx
            .event(booking.event_id)
            .await?
            .ok_or(BookingError::EventNotFound(booking.event_id))?;
        let seats = tx.seats_of(booking.id).await?;
        Ok(Ticket::for_booking(&booking, &event, seats, &self.config.server.public_base_url))
    }

    /// Scan a ticket at the venue. Only the event's organizer may check in.
    ///
    /// # Errors
    ///
    /// - [`BookingError::BookingNotFound`]
    /// - [`BookingError::Forbidden`] if `organizer` does not run the event
    /// - [`BookingError::NotAdmissible`] unless the booking is paid
    pub async fn check_in(&self, order_id: &OrderId, organizer: AccountId) -> Result<CheckIn, BookingError> {
        let mut tx = self.store.begin().await?;
        let mut booking = tx
            .lock_booking_by_order(order_id)
            .await?
            .ok_or_else(|| BookingError::BookingNotFound(order_id.to_string()))?;
        let event = tx
            .event(booking.event_id)
            .await?
            .ok_or(BookingError::EventNotFound(booking.event_id))?;
        if event.organizer != organizer {
            tracing::warn!(%order_id, caller = %organizer, "Check-in by someone other than the organizer");
            return Err(BookingError::Forbidden);
        }

        let already = booking.attended;
        self.reducer
            .reduce(&mut booking, BookingAction::MarkAttended, &self.env)?;
        let seats = tx.seats_of(booking.id).await?;
        if !already {
            tx.update_booking(&booking).await?;
            tx.commit().await?;
            tracing::info!(%order_id, "Ticket checked in");
        }

        Ok(CheckIn {
            outcome: if already {
                CheckInOutcome::AlreadyVerified
            } else {
                CheckInOutcome::Admitted
            },
            ticket: Ticket::for_booking(&booking, &event, seats, &self.config.server.public_base_url),
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn verification_url_ignores_trailing_slash() {
        let order: OrderId = "EVT-0A1B2C3D4E".parse().unwrap();
        assert_eq!(
            verification_url("https://tickets.example.com/", &order),
            format!("https://tickets.example.com/tickets/{order}/verify")
        );
    }
}
