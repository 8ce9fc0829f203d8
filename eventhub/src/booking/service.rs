//! Event, account, and booking-creation operations.

use super::{normalize_phone, PlaceBooking};
use crate::app::EventHub;
use crate::error::BookingError;
use crate::notifications::new_event_notice;
use crate::store::{BookingStore, StoreTx};
use crate::types::{
    Account, AccountId, Booking, BookingId, Event, EventId, Money, PaymentStatus, TokenReason,
    TokenTransaction,
};
use crate::{metrics, seats, tokens};
use chrono::NaiveDate;
use serde::Serialize;

/// Organizer input for a new event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent {
    /// Title
    pub title: String,
    /// Number of seats
    pub capacity: u32,
    /// Price per ticket
    pub price: Money,
    /// Last local date registration is open
    pub registration_deadline: Option<NaiveDate>,
}

/// Account details maintained by the account owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountProfile {
    /// Account
    pub id: AccountId,
    /// Display name
    pub name: String,
    /// Optional phone, used when a booking request has none
    pub phone: Option<String>,
}

/// Customer input for a new booking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingRequest {
    /// Customer
    pub account_id: AccountId,
    /// Event
    pub event_id: EventId,
    /// Tickets wanted
    pub tickets: u32,
    /// Tokens to redeem
    pub tokens_to_use: u64,
    /// Contact phone; the account phone is used when absent
    pub phone: Option<String>,
}

/// Result of creating a booking or retrying its payment link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingReceipt {
    /// The booking after the operation
    pub booking: Booking,
    /// Where to pay, for pending bookings
    pub payment_url: Option<String>,
    /// Seats held (only for bookings paid in full with tokens)
    pub seats: Vec<u32>,
}

/// Token balance with its audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenStatement {
    /// Current balance
    pub balance: u64,
    /// Changes, newest first
    pub history: Vec<TokenTransaction>,
}

impl<S: BookingStore> EventHub<S> {
    /// Create an event with seats `1..=capacity` and announce it.
    ///
    /// # Errors
    ///
    /// [`BookingError::InvalidEvent`] for an empty title or zero capacity;
    /// storage failures.
    pub async fn create_event(&self, organizer: AccountId, new: NewEvent) -> Result<Event, BookingError> {
        let title = new.title.trim();
        if title.is_empty() {
            return Err(BookingError::InvalidEvent("title is required"));
        }
        if new.capacity == 0 {
            return Err(BookingError::InvalidEvent("capacity must be at least 1"));
        }

        let now = self.env.clock.now();
        let event = Event {
            id: EventId::new(),
            organizer,
            title: title.to_string(),
            capacity: new.capacity,
            price: new.price,
            registration_deadline: new.registration_deadline,
            created_at: now,
        };

        let notice = new_event_notice(&event, now);
        let mut tx = self.store.begin().await?;
        tx.insert_event(&event).await?;
        seats::provision(&mut tx, event.id, event.capacity).await?;
        let announced = tx.insert_notification_once(&notice).await?;
        tx.commit().await?;

        tracing::info!(event_id = %event.id, %organizer, capacity = event.capacity, price = %event.price, "Event created");
        if announced {
            self.publish(notice).await;
        }
        Ok(event)
    }

    /// Create or update an account profile. The token balance is untouched.
    ///
    /// # Errors
    ///
    /// [`BookingError::InvalidPhone`] if a phone is given and invalid;
    /// storage failures.
    pub async fn upsert_account(&self, profile: AccountProfile) -> Result<Account, BookingError> {
        let phone = profile
            .phone
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .map(normalize_phone)
            .transpose()?;

        let mut tx = self.store.begin().await?;
        tx.upsert_account(&Account {
            id: profile.id,
            name: profile.name,
            phone,
            tokens: 0,
        })
        .await?;
        let account = tx.account(profile.id).await?.ok_or(BookingError::AccountNotFound)?;
        tx.commit().await?;
        Ok(account)
    }

    /// Credit tokens outside any booking (promotions, support).
    ///
    /// # Errors
    ///
    /// [`BookingError::AccountNotFound`]; storage failures.
    pub async fn grant_tokens(&self, account: AccountId, amount: u64) -> Result<u64, BookingError> {
        let mut tx = self.store.begin().await?;
        let balance = tokens::credit(&mut tx, account, amount, TokenReason::Granted, None).await?;
        tx.commit().await?;
        metrics::record_tokens("granted", amount);
        tracing::info!(account_id = %account, amount, balance, "Tokens granted");
        Ok(balance)
    }

    /// Balance and audit trail of an account's tokens.
    ///
    /// # Errors
    ///
    /// [`BookingError::AccountNotFound`]; storage failures.
    pub async fn token_history(&self, account: AccountId) -> Result<TokenStatement, BookingError> {
        let mut tx = self.store.begin().await?;
        let balance = tokens::balance(&mut tx, account).await?;
        let history = tx.token_history(account).await?;
        Ok(TokenStatement { balance, history })
    }

    /// Create a booking.
    ///
    /// Pending bookings come back with a payment URL. A booking fully paid
    /// with tokens is confirmed, seated, and ticketed at once.
    ///
    /// # Errors
    ///
    /// - Validation faults from [`BookingReducer::place`](super::BookingReducer::place)
    /// - [`BookingError::AccountNotFound`], [`BookingError::EventNotFound`]
    /// - [`BookingError::PaymentLinkUnavailable`]: the booking was saved as
    ///   pending; retry with [`EventHub::retry_payment_link`]
    pub async fn create_booking(&self, request: BookingRequest) -> Result<BookingReceipt, BookingError> {
        let (booking, event, mut applied) = {
            let mut tx = self.store.begin().await?;
            let account = tx
                .account(request.account_id)
                .await?
                .ok_or(BookingError::AccountNotFound)?;
            let event = tx
                .lock_event(request.event_id)
                .await?
                .ok_or(BookingError::EventNotFound(request.event_id))?;
            let owned = tx.owned_seat_count(event.id).await?;
            let available = event.capacity.saturating_sub(owned);

            let contact = request
                .phone
                .filter(|p| !p.trim().is_empty())
                .or(account.phone)
                .unwrap_or_default();
            let (booking, effects) = self.reducer.place(
                PlaceBooking {
                    account_id: request.account_id,
                    event_id: event.id,
                    tickets: request.tickets,
                    tokens_to_use: request.tokens_to_use,
                    contact,
                },
                &event,
                available,
                account.tokens,
                &self.env,
            )?;
            tx.insert_booking(&booking).await?;
            let applied = self.apply_effects(&mut tx, &booking, &event, &effects).await?;
            tx.commit().await?;
            (booking, event, applied)
        };
        metrics::record_booking(booking.payment_status.as_str());

        self.deliver(&booking, &event, &mut applied).await;
        if let Some(amount) = applied.payment_link.take() {
            let booking = self.attach_payment_link(&booking, &event, amount).await?;
            return Ok(BookingReceipt {
                payment_url: booking.payment_link_url.clone(),
                seats: Vec::new(),
                booking,
            });
        }

        let seats = std::mem::take(&mut applied.seats);
        applied.into_fault(&booking)?;
        Ok(BookingReceipt {
            booking,
            payment_url: None,
            seats,
        })
    }

    /// Get a payment link for a pending booking whose link creation failed.
    ///
    /// A booking that already has a link returns it unchanged.
    ///
    /// # Errors
    ///
    /// - [`BookingError::BookingNotFound`]; [`BookingError::Forbidden`] for another customer's booking
    /// - [`BookingError::InvalidTransition`] unless the booking is pending
    /// - [`BookingError::PaymentLinkUnavailable`] if the provider fails again
    pub async fn retry_payment_link(
        &self,
        booking_id: BookingId,
        caller: AccountId,
    ) -> Result<BookingReceipt, BookingError> {
        let (booking, event) = {
            let mut tx = self.store.begin().await?;
            let booking = tx
                .booking(booking_id)
                .await?
                .ok_or_else(|| BookingError::BookingNotFound(booking_id.to_string()))?;
            if booking.account_id != caller {
                return Err(BookingError::Forbidden);
            }
            if booking.payment_status != PaymentStatus::Pending {
                return Err(BookingError::InvalidTransition {
                    status: booking.payment_status,
                    action: "request payment link",
                });
            }
            let event = tx
                .event(booking.event_id)
                .await?
                .ok_or(BookingError::EventNotFound(booking.event_id))?;
            (booking, event)
        };

        if booking.payment_link_url.is_some() {
            return Ok(BookingReceipt {
                payment_url: booking.payment_link_url.clone(),
                seats: Vec::new(),
                booking,
            });
        }

        let amount = booking.amount_to_pay;
        let booking = self.attach_payment_link(&booking, &event, amount).await?;
        tracing::info!(booking_id = %booking.id, "Payment link attached on retry");
        Ok(BookingReceipt {
            payment_url: booking.payment_link_url.clone(),
            seats: Vec::new(),
            booking,
        })
    }
}
