//! Booking reducer: every state transition of a [`Booking`].

use super::actions::{BookingAction, BookingEffect, PlaceBooking};
use super::normalize_phone;
use crate::cancellation::refund_for;
use crate::config::BookingPolicy;
use crate::error::BookingError;
use crate::tokens;
use crate::types::{Booking, BookingId, Event, Money, OrderId, PaymentStatus, RefundStatus};
use eventhub_core::{environment::Clock, reducer::Reducer, smallvec, SmallVec};
use std::sync::Arc;

/// Effects produced by one transition
pub type Effects = SmallVec<[BookingEffect; 4]>;

// ============================================================================
// Environment
// ============================================================================

/// Dependencies of the booking reducer
#[derive(Clone)]
pub struct BookingEnvironment {
    /// Timestamps and deadline checks
    pub clock: Arc<dyn Clock>,
    /// Pricing, reward, and cancellation rules
    pub policy: BookingPolicy,
}

impl BookingEnvironment {
    /// Creates a new `BookingEnvironment`
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, policy: BookingPolicy) -> Self {
        Self { clock, policy }
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Reducer for a single booking
#[derive(Clone, Copy, Debug, Default)]
pub struct BookingReducer;

impl BookingReducer {
    /// Creates a new `BookingReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Create a booking for `request`.
    ///
    /// `available` is the event's capacity minus seats owned by paid bookings;
    /// `balance` is the customer's token balance. Nothing is reserved here:
    /// a pending booking holds neither seats nor tokens.
    ///
    /// Bookings with nothing left to pay are paid immediately and come back
    /// with the full confirmation effect set; all others request a payment link.
    ///
    /// # Errors
    ///
    /// Validation failures, checked in this order: deadline, sold out, ticket
    /// count, availability, token balance, phone number.
    pub fn place(
        &self,
        request: PlaceBooking,
        event: &Event,
        available: u32,
        balance: u64,
        env: &BookingEnvironment,
    ) -> Result<(Booking, Effects), BookingError> {
        let now = env.clock.now();

        if let Some(deadline) = event.registration_deadline {
            if env.policy.local_date(now) > deadline {
                return Err(BookingError::RegistrationClosed);
            }
        }
        if available == 0 {
            return Err(BookingError::SoldOut);
        }
        if request.tickets == 0 {
            return Err(BookingError::InvalidTicketCount);
        }
        if request.tickets > available {
            return Err(BookingError::NotEnoughSeats { available });
        }
        tokens::reserve_for_discount(balance, request.tokens_to_use)?;
        let contact = normalize_phone(&request.contact)?;

        let total = event
            .price
            .checked_mul(u64::from(request.tickets))
            .ok_or(BookingError::InvalidEvent("total price overflows"))?;
        // Never redeem more tokens than the total can absorb.
        let tokens_used = request
            .tokens_to_use
            .min(total.paise().div_ceil(Money::MINOR_PER_MAJOR));
        let amount_to_pay = tokens::discounted(total, tokens_used);
        let tokens_earned = tokens::earned_for(amount_to_pay, &env.policy);

        let mut booking = Booking {
            id: BookingId::new(),
            order_id: OrderId::generate(),
            event_id: event.id,
            account_id: request.account_id,
            tickets_booked: request.tickets,
            canceled_tickets: 0,
            unit_price: event.price,
            total_price: total,
            tokens_used,
            tokens_earned,
            amount_to_pay,
            payment_status: PaymentStatus::Pending,
            refund_status: RefundStatus::NotApplicable,
            payment_link_id: None,
            payment_link_url: None,
            payment_id: None,
            payment_signature: None,
            payment_method: None,
            refund_id: None,
            refund_amount: Money::ZERO,
            refund_outstanding: Money::ZERO,
            tokens_settled: false,
            attended: false,
            contact,
            created_at: now,
            updated_at: now,
        };

        let effects = if amount_to_pay.is_zero() {
            booking.payment_status = PaymentStatus::Paid;
            booking.tokens_settled = true;
            smallvec![
                BookingEffect::AllocateSeats,
                BookingEffect::SettleTokens {
                    spent: tokens_used,
                    earned: tokens_earned,
                },
                BookingEffect::EvaluatePopularity,
                BookingEffect::IssueTicket,
            ]
        } else {
            smallvec![BookingEffect::RequestPaymentLink {
                amount: amount_to_pay
            }]
        };

        tracing::info!(
            booking_id = %booking.id,
            order_id = %booking.order_id,
            event_id = %event.id,
            tickets = booking.tickets_booked,
            tokens_used,
            amount = %amount_to_pay,
            status = %booking.payment_status,
            "Booking placed"
        );
        Ok((booking, effects))
    }

    fn capture(
        booking: &mut Booking,
        payment_id: String,
        method: Option<String>,
        signature: Option<String>,
    ) -> Result<Effects, BookingError> {
        match booking.payment_status {
            PaymentStatus::Pending => {
                booking.payment_status = PaymentStatus::Paid;
                booking.payment_id = Some(payment_id);
                if method.is_some() {
                    booking.payment_method = method;
                }
                if signature.is_some() {
                    booking.payment_signature = signature;
                }

                let mut effects: Effects = smallvec![BookingEffect::AllocateSeats];
                if !booking.tokens_settled {
                    booking.tokens_settled = true;
                    effects.push(BookingEffect::SettleTokens {
                        spent: booking.tokens_used,
                        earned: booking.tokens_earned,
                    });
                }
                effects.push(BookingEffect::EvaluatePopularity);
                effects.push(BookingEffect::IssueTicket);
                tracing::info!(booking_id = %booking.id, "Payment confirmed");
                Ok(effects)
            }
            PaymentStatus::Paid => {
                if booking.payment_id.as_deref() != Some(payment_id.as_str()) {
                    tracing::warn!(
                        booking_id = %booking.id,
                        recorded = ?booking.payment_id,
                        reported = %payment_id,
                        "Second payment reported for a paid booking"
                    );
                }
                // Seats are re-checked in case the first confirmation could not seat the booking.
                Ok(smallvec![BookingEffect::AllocateSeats])
            }
            PaymentStatus::Canceled => {
                tracing::debug!(booking_id = %booking.id, "Capture for canceled booking ignored");
                Ok(SmallVec::new())
            }
            PaymentStatus::Failed => Err(BookingError::InvalidTransition {
                status: PaymentStatus::Failed,
                action: "confirm payment",
            }),
        }
    }

    fn cancel(
        booking: &mut Booking,
        count: u32,
        policy: &BookingPolicy,
    ) -> Result<Effects, BookingError> {
        match booking.payment_status {
            PaymentStatus::Canceled => return Ok(SmallVec::new()),
            PaymentStatus::Pending | PaymentStatus::Failed => {
                return Err(BookingError::NotCancelable(booking.payment_status));
            }
            PaymentStatus::Paid => {}
        }

        let active = booking.active_tickets();
        if count == 0 || count > active {
            return Err(BookingError::InvalidCancelCount {
                requested: count,
                active,
            });
        }

        booking.canceled_tickets += count;
        if booking.active_tickets() == 0 {
            booking.payment_status = PaymentStatus::Canceled;
        }

        let mut effects: Effects = smallvec![BookingEffect::ReleaseSeats { count }];

        if let Some(payment_id) = booking.payment_id.clone() {
            let refundable = booking
                .amount_to_pay
                .saturating_sub(booking.refund_amount)
                .saturating_sub(booking.refund_outstanding);
            let refund = refund_for(
                booking.total_price,
                booking.tickets_booked,
                count,
                policy.cancellation_fee_percent,
            )
            .min(refundable);

            if !refund.is_zero() {
                booking.refund_amount = booking.refund_amount.saturating_add(refund);
                booking.refund_status = RefundStatus::Pending;
                effects.push(BookingEffect::RequestRefund {
                    payment_id,
                    amount: refund,
                });
            }
        }

        tracing::info!(
            booking_id = %booking.id,
            canceled = count,
            remaining = booking.active_tickets(),
            status = %booking.payment_status,
            "Tickets canceled"
        );
        Ok(effects)
    }
}

impl Reducer for BookingReducer {
    type State = Booking;
    type Action = BookingAction;
    type Environment = BookingEnvironment;
    type Effect = BookingEffect;
    type Error = BookingError;

    fn reduce(
        &self,
        booking: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> Result<Effects, BookingError> {
        let effects = match action {
            BookingAction::PaymentLinkCreated { link_id, short_url } => {
                if booking.payment_status != PaymentStatus::Pending {
                    return Err(BookingError::InvalidTransition {
                        status: booking.payment_status,
                        action: "attach payment link",
                    });
                }
                if booking.payment_link_id.is_some() {
                    tracing::warn!(
                        booking_id = %booking.id,
                        orphaned_link = %link_id,
                        "Booking already has a payment link; keeping the first"
                    );
                    return Ok(SmallVec::new());
                }
                booking.payment_link_id = Some(link_id);
                booking.payment_link_url = Some(short_url);
                SmallVec::new()
            }

            BookingAction::PaymentCaptured {
                payment_id,
                method,
                signature,
            } => Self::capture(booking, payment_id, method, signature)?,

            BookingAction::PaymentFailed { reason } => {
                if booking.payment_status != PaymentStatus::Pending {
                    tracing::debug!(
                        booking_id = %booking.id,
                        status = %booking.payment_status,
                        "Failure report ignored"
                    );
                    return Ok(SmallVec::new());
                }
                booking.payment_status = PaymentStatus::Failed;
                tracing::info!(booking_id = %booking.id, %reason, "Payment failed");
                SmallVec::new()
            }

            BookingAction::CancelTickets { count } => Self::cancel(booking, count, &env.policy)?,

            BookingAction::RefundSettled { refund_id } => {
                booking.refund_status = RefundStatus::Refunded;
                if refund_id.is_some() {
                    booking.refund_id = refund_id;
                }
                SmallVec::new()
            }

            BookingAction::RefundRejected { amount, reason } => {
                booking.refund_status = RefundStatus::Failed;
                booking.refund_amount = booking.refund_amount.saturating_sub(amount);
                booking.refund_outstanding = booking.refund_outstanding.saturating_add(amount);
                tracing::error!(
                    booking_id = %booking.id,
                    amount = %amount,
                    %reason,
                    "Refund rejected; manual follow-up required"
                );
                SmallVec::new()
            }

            BookingAction::MarkAttended => {
                if booking.payment_status != PaymentStatus::Paid {
                    return Err(BookingError::NotAdmissible(booking.payment_status));
                }
                if booking.attended {
                    return Ok(SmallVec::new());
                }
                booking.attended = true;
                SmallVec::new()
            }
        };

        booking.updated_at = env.clock.now();
        Ok(effects)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::error::TokenLedgerError;
    use crate::types::{AccountId, EventId};
    use chrono::{Duration, NaiveDate, TimeZone, Utc};
    use eventhub_testing::{assertions, test_clock, FixedClock, ReducerTest};

    fn env() -> BookingEnvironment {
        BookingEnvironment::new(Arc::new(test_clock()), BookingPolicy::default())
    }

    fn event(price_rupees: u64) -> Event {
        Event {
            id: EventId::new(),
            organizer: AccountId::new(),
            title: "Jazz Night".into(),
            capacity: 100,
            price: Money::from_rupees(price_rupees).unwrap(),
            registration_deadline: None,
            created_at: Utc.with_ymd_and_hms(2024, 12, 1, 0, 0, 0).unwrap(),
        }
    }

    fn request(event: &Event, tickets: u32, tokens_to_use: u64) -> PlaceBooking {
        PlaceBooking {
            account_id: AccountId::new(),
            event_id: event.id,
            tickets,
            tokens_to_use,
            contact: "9876543210".into(),
        }
    }

    fn placed(price: u64, tickets: u32, tokens: u64) -> Booking {
        let event = event(price);
        BookingReducer::new()
            .place(request(&event, tickets, tokens), &event, 100, tokens, &env())
            .unwrap()
            .0
    }

    fn paid(price: u64, tickets: u32) -> Booking {
        let mut booking = placed(price, tickets, 0);
        booking.payment_status = PaymentStatus::Paid;
        booking.payment_id = Some("pay_1".into());
        booking.tokens_settled = true;
        booking
    }

    // ---------------------------------------------------------------- place

    #[test]
    fn place_prices_and_requests_link() {
        let event = event(200);
        let (booking, effects) = BookingReducer::new()
            .place(request(&event, 5, 100), &event, 100, 150, &env())
            .unwrap();

        assert_eq!(booking.payment_status, PaymentStatus::Pending);
        assert_eq!(booking.total_price, Money::from_rupees(1000).unwrap());
        assert_eq!(booking.amount_to_pay, Money::from_rupees(900).unwrap());
        assert_eq!(booking.tokens_used, 100);
        assert_eq!(booking.tokens_earned, 18);
        assert!(!booking.tokens_settled);
        assert!(booking.order_id.as_str().starts_with("EVT-"));
        assert_eq!(
            effects.as_slice(),
            &[BookingEffect::RequestPaymentLink {
                amount: Money::from_rupees(900).unwrap()
            }]
        );
    }

    #[test]
    fn fully_discounted_booking_is_paid_at_once() {
        let event = event(100);
        let (booking, effects) = BookingReducer::new()
            .place(request(&event, 1, 500), &event, 10, 500, &env())
            .unwrap();

        assert_eq!(booking.payment_status, PaymentStatus::Paid);
        assert!(booking.amount_to_pay.is_zero());
        assert_eq!(booking.tokens_used, 100, "only what the total absorbs");
        assert_eq!(booking.tokens_earned, 0);
        assert!(booking.tokens_settled);
        assert_eq!(
            effects.as_slice(),
            &[
                BookingEffect::AllocateSeats,
                BookingEffect::SettleTokens { spent: 100, earned: 0 },
                BookingEffect::EvaluatePopularity,
                BookingEffect::IssueTicket,
            ]
        );
    }

    #[test]
    fn place_rejections() {
        let reducer = BookingReducer::new();
        let event = event(100);
        let env = env();

        assert!(matches!(
            reducer.place(request(&event, 1, 0), &event, 0, 0, &env),
            Err(BookingError::SoldOut)
        ));
        assert!(matches!(
            reducer.place(request(&event, 0, 0), &event, 5, 0, &env),
            Err(BookingError::InvalidTicketCount)
        ));
        assert!(matches!(
            reducer.place(request(&event, 6, 0), &event, 5, 0, &env),
            Err(BookingError::NotEnoughSeats { available: 5 })
        ));
        assert!(matches!(
            reducer.place(request(&event, 1, 11), &event, 5, 10, &env),
            Err(BookingError::Tokens(TokenLedgerError::InsufficientTokens {
                requested: 11,
                balance: 10
            }))
        ));

        let mut bad_phone = request(&event, 1, 0);
        bad_phone.contact = "1111111111".into();
        assert!(matches!(
            reducer.place(bad_phone, &event, 5, 0, &env),
            Err(BookingError::InvalidPhone(_))
        ));
    }

    #[test]
    fn deadline_is_inclusive_in_local_time() {
        let reducer = BookingReducer::new();
        let mut event = event(100);
        event.registration_deadline = NaiveDate::from_ymd_opt(2025, 1, 1);

        // 18:00 UTC is 23:30 local on the deadline day.
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2025, 1, 1, 18, 0, 0).unwrap(),
        ));
        let env = BookingEnvironment::new(clock.clone(), BookingPolicy::default());
        assert!(reducer.place(request(&event, 1, 0), &event, 5, 0, &env).is_ok());

        clock.advance(Duration::hours(1));
        assert!(matches!(
            reducer.place(request(&event, 1, 0), &event, 5, 0, &env),
            Err(BookingError::RegistrationClosed)
        ));
    }

    // ---------------------------------------------------------------- payment

    #[test]
    fn capture_confirms_pending_booking() {
        ReducerTest::new(BookingReducer::new())
            .with_env(env())
            .given_state(placed(200, 5, 100))
            .when_action(BookingAction::PaymentCaptured {
                payment_id: "pay_9".into(),
                method: Some("upi".into()),
                signature: None,
            })
            .then_state(|booking| {
                assert_eq!(booking.payment_status, PaymentStatus::Paid);
                assert_eq!(booking.payment_id.as_deref(), Some("pay_9"));
                assert_eq!(booking.payment_method.as_deref(), Some("upi"));
                assert!(booking.tokens_settled);
            })
            .then_effects(|effects| {
                assert_eq!(
                    effects,
                    &[
                        BookingEffect::AllocateSeats,
                        BookingEffect::SettleTokens { spent: 100, earned: 18 },
                        BookingEffect::EvaluatePopularity,
                        BookingEffect::IssueTicket,
                    ]
                );
            })
            .run();
    }

    #[test]
    fn second_capture_only_rechecks_seats() {
        ReducerTest::new(BookingReducer::new())
            .with_env(env())
            .given_state(paid(200, 2))
            .when_action(BookingAction::PaymentCaptured {
                payment_id: "pay_1".into(),
                method: None,
                signature: None,
            })
            .then_state(|booking| assert!(booking.tokens_settled))
            .then_effects(|effects| {
                assertions::assert_effects_eq(effects, &[BookingEffect::AllocateSeats]);
            })
            .run();
    }

    #[test]
    fn capture_of_failed_booking_is_rejected() {
        let mut failed = placed(200, 2, 0);
        failed.payment_status = PaymentStatus::Failed;

        ReducerTest::new(BookingReducer::new())
            .with_env(env())
            .given_state(failed)
            .when_action(BookingAction::PaymentCaptured {
                payment_id: "pay_2".into(),
                method: None,
                signature: None,
            })
            .then_error(|err| {
                assert!(matches!(
                    err,
                    BookingError::InvalidTransition {
                        status: PaymentStatus::Failed,
                        ..
                    }
                ));
            })
            .run();
    }

    #[test]
    fn failure_only_moves_pending() {
        ReducerTest::new(BookingReducer::new())
            .with_env(env())
            .given_state(placed(200, 2, 0))
            .when_action(BookingAction::PaymentFailed {
                reason: "declined".into(),
            })
            .then_state(|booking| assert_eq!(booking.payment_status, PaymentStatus::Failed))
            .then_effects(assertions::assert_no_effects)
            .run();

        ReducerTest::new(BookingReducer::new())
            .with_env(env())
            .given_state(paid(200, 2))
            .when_action(BookingAction::PaymentFailed {
                reason: "late".into(),
            })
            .then_state(|booking| assert_eq!(booking.payment_status, PaymentStatus::Paid))
            .run();
    }

    #[test]
    fn second_payment_link_is_not_attached() {
        let mut booking = placed(200, 1, 0);
        booking.payment_link_id = Some("plink_1".into());

        ReducerTest::new(BookingReducer::new())
            .with_env(env())
            .given_state(booking)
            .when_action(BookingAction::PaymentLinkCreated {
                link_id: "plink_2".into(),
                short_url: "https://rzp.io/2".into(),
            })
            .then_state(|booking| {
                assert_eq!(booking.payment_link_id.as_deref(), Some("plink_1"));
            })
            .run();
    }

    // ---------------------------------------------------------------- cancel

    #[test]
    fn partial_cancel_refunds_less_fee() {
        ReducerTest::new(BookingReducer::new())
            .with_env(env())
            .given_state(paid(200, 5))
            .when_action(BookingAction::CancelTickets { count: 2 })
            .then_state(|booking| {
                assert_eq!(booking.canceled_tickets, 2);
                assert_eq!(booking.active_tickets(), 3);
                assert_eq!(booking.payment_status, PaymentStatus::Paid);
                assert_eq!(booking.refund_status, RefundStatus::Pending);
                assert_eq!(booking.refund_amount, Money::from_rupees(360).unwrap());
            })
            .then_effects(|effects| {
                assert_eq!(
                    effects,
                    &[
                        BookingEffect::ReleaseSeats { count: 2 },
                        BookingEffect::RequestRefund {
                            payment_id: "pay_1".into(),
                            amount: Money::from_rupees(360).unwrap(),
                        },
                    ]
                );
            })
            .run();
    }

    #[test]
    fn canceling_everything_cancels_the_booking() {
        ReducerTest::new(BookingReducer::new())
            .with_env(env())
            .given_state(paid(200, 2))
            .when_action(BookingAction::CancelTickets { count: 2 })
            .then_state(|booking| {
                assert_eq!(booking.payment_status, PaymentStatus::Canceled);
                assert_eq!(booking.active_tickets(), 0);
            })
            .then_effects(|effects| assertions::assert_effects_count(effects, 2))
            .run();
    }

    #[test]
    fn refunds_never_exceed_what_was_paid() {
        // ₹1000 total, ₹900 paid after redeeming 100 tokens.
        let mut booking = placed(200, 5, 100);
        booking.payment_status = PaymentStatus::Paid;
        booking.payment_id = Some("pay_1".into());
        let env = env();
        let reducer = BookingReducer::new();

        for _ in 0..5 {
            reducer
                .reduce(&mut booking, BookingAction::CancelTickets { count: 1 }, &env)
                .unwrap();
        }
        assert_eq!(booking.payment_status, PaymentStatus::Canceled);
        assert!(booking.refund_amount <= booking.amount_to_pay);
        assert_eq!(booking.refund_amount, Money::from_rupees(900).unwrap());
    }

    #[test]
    fn token_only_booking_cancels_without_refund() {
        let event = event(100);
        let (booking, _) = BookingReducer::new()
            .place(request(&event, 2, 200), &event, 10, 200, &env())
            .unwrap();

        ReducerTest::new(BookingReducer::new())
            .with_env(env())
            .given_state(booking)
            .when_action(BookingAction::CancelTickets { count: 1 })
            .then_state(|booking| assert_eq!(booking.refund_status, RefundStatus::NotApplicable))
            .then_effects(|effects| {
                assertions::assert_effects_eq(effects, &[BookingEffect::ReleaseSeats { count: 1 }]);
            })
            .run();
    }

    #[test]
    fn cancel_rejections_leave_state_untouched() {
        for count in [0, 3] {
            ReducerTest::new(BookingReducer::new())
                .with_env(env())
                .given_state(paid(200, 2))
                .when_action(BookingAction::CancelTickets { count })
                .then_error(|err| {
                    assert!(matches!(err, BookingError::InvalidCancelCount { active: 2, .. }));
                })
                .run();
        }

        ReducerTest::new(BookingReducer::new())
            .with_env(env())
            .given_state(placed(200, 2, 0))
            .when_action(BookingAction::CancelTickets { count: 1 })
            .then_error(|err| {
                assert!(matches!(err, BookingError::NotCancelable(PaymentStatus::Pending)));
            })
            .run();
    }

    #[test]
    fn canceling_a_canceled_booking_is_a_no_op() {
        let mut booking = paid(200, 2);
        booking.canceled_tickets = 2;
        booking.payment_status = PaymentStatus::Canceled;

        ReducerTest::new(BookingReducer::new())
            .with_env(env())
            .given_state(booking)
            .when_action(BookingAction::CancelTickets { count: 1 })
            .then_state(|booking| assert_eq!(booking.canceled_tickets, 2))
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn rejected_refund_is_tracked_as_outstanding() {
        let mut booking = paid(200, 5);
        booking.refund_amount = Money::from_rupees(360).unwrap();
        booking.refund_status = RefundStatus::Pending;

        ReducerTest::new(BookingReducer::new())
            .with_env(env())
            .given_state(booking)
            .when_action(BookingAction::RefundRejected {
                amount: Money::from_rupees(360).unwrap(),
                reason: "insufficient balance".into(),
            })
            .then_state(|booking| {
                assert_eq!(booking.refund_status, RefundStatus::Failed);
                assert_eq!(booking.refund_amount, Money::ZERO);
                assert_eq!(booking.refund_outstanding, Money::from_rupees(360).unwrap());
            })
            .run();
    }

    // ---------------------------------------------------------------- check-in

    #[test]
    fn check_in_requires_payment() {
        ReducerTest::new(BookingReducer::new())
            .with_env(env())
            .given_state(placed(200, 1, 0))
            .when_action(BookingAction::MarkAttended)
            .then_error(|err| {
                assert!(matches!(err, BookingError::NotAdmissible(PaymentStatus::Pending)));
            })
            .run();

        ReducerTest::new(BookingReducer::new())
            .with_env(env())
            .given_state(paid(200, 1))
            .when_action(BookingAction::MarkAttended)
            .then_state(|booking| assert!(booking.attended))
            .then_effects(assertions::assert_no_effects)
            .run();
    }
}
