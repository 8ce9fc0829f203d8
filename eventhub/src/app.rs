//! The booking pipeline as one service.
//!
//! [`EventHub`] owns the store and the collaborators (payment gateway,
//! notifier, reminder queue, clock). Operations live next to their concern:
//! [`booking::service`](crate::booking::service), [`reconciliation`](crate::reconciliation),
//! [`cancellation`](crate::cancellation), [`tickets`](crate::tickets), and
//! [`notifications`](crate::notifications).
//!
//! Every operation follows the same shape:
//!
//! 1. Open a transaction and lock the booking, then the event
//! 2. Run the reducer
//! 3. Apply seat, token, and popularity effects in the same transaction
//! 4. Commit
//! 5. Call the provider and notifier, bounded by the gateway timeout

use crate::booking::{BookingAction, BookingEffect, BookingEnvironment, BookingReducer};
use crate::config::Config;
use crate::error::{BookingError, GatewayError, SeatLedgerError};
use crate::gateway::{GatewayFuture, GatewayResult, PaymentGateway, PaymentLinkRequest};
use crate::notifications::{self, Notifier, ReminderQueue, TracingNotifier};
use crate::store::{BookingStore, StoreTx};
use crate::tickets::Ticket;
use crate::types::{Booking, Event, Money, SiteNotification};
use crate::{metrics, seats, tokens};
use eventhub_core::environment::{Clock, SystemClock};
use eventhub_core::reducer::Reducer;
use std::sync::Arc;

/// Booking pipeline over a [`BookingStore`].
pub struct EventHub<S: BookingStore> {
    pub(crate) store: S,
    pub(crate) gateway: Arc<dyn PaymentGateway>,
    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) reminders: Arc<dyn ReminderQueue>,
    pub(crate) config: Arc<Config>,
    pub(crate) env: BookingEnvironment,
    pub(crate) reducer: BookingReducer,
}

impl<S: BookingStore> EventHub<S> {
    /// Create the pipeline with the wall clock and a logging notifier.
    #[must_use]
    pub fn new(store: S, gateway: Arc<dyn PaymentGateway>, config: Config) -> Self {
        let env = BookingEnvironment::new(Arc::new(SystemClock), config.policy.clone());
        Self {
            store,
            gateway,
            notifier: Arc::new(TracingNotifier),
            reminders: Arc::new(TracingNotifier),
            config: Arc::new(config),
            env,
            reducer: BookingReducer::new(),
        }
    }

    /// Replace the clock
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.env.clock = clock;
        self
    }

    /// Replace the ticket and site-notification sender
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Replace the reminder queue
    #[must_use]
    pub fn with_reminders(mut self, reminders: Arc<dyn ReminderQueue>) -> Self {
        self.reminders = reminders;
        self
    }

    /// Underlying store
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run a provider call with the configured bound.
    pub(crate) async fn call<T>(&self, call: GatewayFuture<T>) -> GatewayResult<T> {
        tokio::time::timeout(self.config.gateway.timeout(), call)
            .await
            .unwrap_or(Err(GatewayError::Timeout))
    }

    /// Apply the in-transaction effects of one transition.
    ///
    /// A seat allocation that fails for any reason other than storage is
    /// recorded in [`Applied::allocation_fault`] rather than returned, so the
    /// payment itself still commits.
    pub(crate) async fn apply_effects(
        &self,
        tx: &mut S::Tx,
        booking: &Booking,
        event: &Event,
        effects: &[BookingEffect],
    ) -> Result<Applied, BookingError> {
        let mut applied = Applied::default();
        for effect in effects {
            match effect {
                BookingEffect::AllocateSeats => match seats::allocate(tx, booking).await {
                    Ok(_) => {}
                    Err(SeatLedgerError::Store(e)) => return Err(e.into()),
                    Err(fault) => {
                        metrics::record_allocation_fault();
                        tracing::error!(
                            booking_id = %booking.id,
                            event_id = %event.id,
                            error = %fault,
                            "Paid booking could not be seated"
                        );
                        applied.allocation_fault = Some(fault);
                    }
                },
                BookingEffect::SettleTokens { spent, earned } => {
                    tokens::settle(tx, booking.account_id, booking.id, *spent, *earned).await?;
                }
                BookingEffect::EvaluatePopularity => {
                    applied.popular = notifications::evaluate_popularity(
                        tx,
                        event,
                        &self.env.policy,
                        self.env.clock.now(),
                    )
                    .await?;
                }
                BookingEffect::ReleaseSeats { count } => {
                    let held = u32::try_from(tx.seats_of(booking.id).await?.len()).unwrap_or(u32::MAX);
                    if held < *count {
                        tracing::warn!(booking_id = %booking.id, held, requested = count, "Releasing fewer seats than canceled");
                    }
                    applied.released = seats::release(tx, booking, (*count).min(held)).await?;
                }
                BookingEffect::RequestPaymentLink { amount } => applied.payment_link = Some(*amount),
                BookingEffect::RequestRefund { payment_id, amount } => {
                    applied.refund = Some((payment_id.clone(), *amount));
                }
                BookingEffect::IssueTicket => applied.issue_ticket = true,
            }
        }
        applied.seats = tx.seats_of(booking.id).await?;
        Ok(applied)
    }

    /// Deliver what a committed transition asked for: the popularity
    /// notification and the ticket. Delivery failures are logged only.
    pub(crate) async fn deliver(&self, booking: &Booking, event: &Event, applied: &mut Applied) {
        if let Some(notice) = applied.popular.take() {
            self.publish(notice).await;
        }
        if applied.issue_ticket && applied.allocation_fault.is_none() {
            let ticket = Ticket::for_booking(
                booking,
                event,
                applied.seats.clone(),
                &self.config.server.public_base_url,
            );
            if let Err(error) = self.notifier.ticket_issued(ticket).await {
                tracing::warn!(booking_id = %booking.id, %error, "Ticket not delivered");
            }
        }
    }

    /// Create a payment link for a pending booking and attach it.
    ///
    /// The provider is called with no transaction open; the link is attached
    /// in a new one.
    pub(crate) async fn attach_payment_link(
        &self,
        booking: &Booking,
        event: &Event,
        amount: Money,
    ) -> Result<Booking, BookingError> {
        let request = PaymentLinkRequest {
            amount,
            currency: self.config.gateway.currency.clone(),
            reference_id: booking.order_id.to_string(),
            description: format!("{} x {}", event.title, booking.tickets_booked),
            contact: booking.contact.clone(),
            callback_url: format!("{}/payments/callback", self.config.server.public_base_url),
        };
        let link = self
            .call(self.gateway.create_payment_link(request))
            .await
            .map_err(|source| {
                tracing::warn!(booking_id = %booking.id, error = %source, "Payment link creation failed");
                BookingError::PaymentLinkUnavailable {
                    booking_id: booking.id,
                    source,
                }
            })?;

        let mut tx = self.store.begin().await?;
        let mut current = tx
            .lock_booking(booking.id)
            .await?
            .ok_or_else(|| BookingError::BookingNotFound(booking.id.to_string()))?;
        self.reducer.reduce(
            &mut current,
            BookingAction::PaymentLinkCreated {
                link_id: link.id,
                short_url: link.short_url,
            },
            &self.env,
        )?;
        tx.update_booking(&current).await?;
        tx.commit().await?;
        Ok(current)
    }
}

/// What the in-transaction effects did and what is left for after commit.
#[derive(Debug, Default)]
pub(crate) struct Applied {
    /// Seats the booking holds after the transition
    pub seats: Vec<u32>,
    /// Seats freed by a cancellation
    pub released: Vec<u32>,
    /// Popularity notification recorded by this transition
    pub popular: Option<SiteNotification>,
    /// Seat allocation failure for a paid booking
    pub allocation_fault: Option<SeatLedgerError>,
    /// Payment link still to be requested
    pub payment_link: Option<Money>,
    /// Refund still to be requested: provider payment id and amount
    pub refund: Option<(String, Money)>,
    /// Ticket still to be delivered
    pub issue_ticket: bool,
}

impl Applied {
    /// Turn a recorded allocation fault into the operation's error.
    pub(crate) fn into_fault(self, booking: &Booking) -> Result<(), BookingError> {
        match self.allocation_fault {
            Some(source) => Err(BookingError::SeatAllocationFault {
                booking_id: booking.id,
                source,
            }),
            None => Ok(()),
        }
    }
}
