//! Inputs to and outputs of the booking state machine.

use crate::types::{AccountId, EventId, Money};

/// A validated-shape request to create a booking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceBooking {
    /// Customer
    pub account_id: AccountId,
    /// Event
    pub event_id: EventId,
    /// Tickets requested
    pub tickets: u32,
    /// Tokens the customer wants to redeem
    pub tokens_to_use: u64,
    /// Raw phone number; normalized during placement
    pub contact: String,
}

/// Something that happened to an existing booking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingAction {
    /// The provider created a hosted payment page
    PaymentLinkCreated {
        /// Provider link id
        link_id: String,
        /// Hosted page URL
        short_url: String,
    },
    /// A verified channel reported the payment captured
    PaymentCaptured {
        /// Provider payment id
        payment_id: String,
        /// Payment method, when known
        method: Option<String>,
        /// Redirect signature, when confirmed through the redirect
        signature: Option<String>,
    },
    /// A verified channel reported the payment failed
    PaymentFailed {
        /// Provider's description
        reason: String,
    },
    /// Customer cancels some or all remaining tickets
    CancelTickets {
        /// Tickets to cancel
        count: u32,
    },
    /// Provider accepted a refund (or test mode recorded it locally)
    RefundSettled {
        /// Provider refund id; `None` in test mode
        refund_id: Option<String>,
    },
    /// Provider rejected a refund
    RefundRejected {
        /// Amount that was not refunded
        amount: Money,
        /// Why
        reason: String,
    },
    /// Ticket scanned at the venue
    MarkAttended,
}

impl BookingAction {
    /// Short name for logs and errors
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::PaymentLinkCreated { .. } => "attach payment link",
            Self::PaymentCaptured { .. } => "confirm payment",
            Self::PaymentFailed { .. } => "fail payment",
            Self::CancelTickets { .. } => "cancel tickets",
            Self::RefundSettled { .. } => "settle refund",
            Self::RefundRejected { .. } => "reject refund",
            Self::MarkAttended => "check in",
        }
    }
}

/// Work requested by a transition.
///
/// Seat, token, and popularity effects run inside the transaction that
/// persists the transition. Provider and ticket effects run after commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingEffect {
    /// Ask the provider for a payment link for `amount`
    RequestPaymentLink {
        /// Amount to collect
        amount: Money,
    },
    /// Seat the (paid) booking
    AllocateSeats,
    /// Debit redeemed tokens and credit earned tokens
    SettleTokens {
        /// Tokens to debit
        spent: u64,
        /// Tokens to credit
        earned: u64,
    },
    /// Check whether the event just became popular
    EvaluatePopularity,
    /// Hand the ticket to the notifier
    IssueTicket,
    /// Free the booking's highest `count` seats
    ReleaseSeats {
        /// Seats to free
        count: u32,
    },
    /// Refund part of a captured payment
    RequestRefund {
        /// Provider payment id
        payment_id: String,
        /// Amount to refund
        amount: Money,
    },
}
