//! Error types for the booking pipeline.
//!
//! Each concern has its own enum; [`BookingError`] is what every public
//! operation returns. [`BookingError::kind`] sorts faults into the classes the
//! HTTP layer (and operators) care about.

use crate::types::{BookingId, EventId, PaymentStatus};
use thiserror::Error;

/// Storage backend failure.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database driver or connection failure
    #[error("database error: {0}")]
    Database(String),
    /// A row could not be mapped to a domain value
    #[error("corrupt row: {0}")]
    Corrupt(String),
    /// A write lost a race it should not have been able to lose
    #[error("conflict: {0}")]
    Conflict(String),
}

/// Payment provider failure.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Provider refused the request
    #[error("provider rejected request ({status}): {message}")]
    Rejected {
        /// HTTP status returned by the provider
        status: u16,
        /// Provider's description
        message: String,
    },
    /// No answer within the configured bound
    #[error("provider timed out")]
    Timeout,
    /// Network-level failure
    #[error("transport error: {0}")]
    Transport(String),
    /// Provider answered with something we could not read
    #[error("malformed provider response: {0}")]
    Malformed(String),
}

/// Authenticity check failure for a webhook or redirect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SignatureError {
    /// No signature supplied
    #[error("signature missing")]
    Missing,
    /// Signature is not hex
    #[error("signature malformed")]
    Malformed,
    /// Signature does not match the payload
    #[error("signature mismatch")]
    Mismatch,
}

/// Notifier or reminder queue refused a delivery.
#[derive(Debug, Clone, Error)]
#[error("notification delivery failed: {0}")]
pub struct NotificationError(pub String);

/// Seat ledger failure.
#[derive(Debug, Error)]
pub enum SeatLedgerError {
    /// Fewer free seats than the booking needs
    #[error("insufficient seats: need {required}, {free} free")]
    InsufficientSeats {
        /// Seats the booking needs
        required: u32,
        /// Seats currently free
        free: u32,
    },
    /// Asked to release more seats than the booking holds
    #[error("cannot release {requested} seats, booking holds {held}")]
    InvalidReleaseCount {
        /// Seats asked for
        requested: u32,
        /// Seats held
        held: u32,
    },
    /// Only paid bookings may own seats
    #[error("booking is {0}, only paid bookings hold seats")]
    NotPaid(PaymentStatus),
    /// Storage failure
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Token ledger failure.
#[derive(Debug, Error)]
pub enum TokenLedgerError {
    /// Discount asks for more tokens than the account holds
    #[error("insufficient tokens: requested {requested}, balance {balance}")]
    InsufficientTokens {
        /// Tokens requested
        requested: u64,
        /// Current balance
        balance: u64,
    },
    /// Account does not exist
    #[error("account not found")]
    AccountNotFound,
    /// Storage failure
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Classification of a [`BookingError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad request; nothing was mutated
    Validation,
    /// Signature check failed; nothing was mutated
    Authentication,
    /// Caller may not act on this resource
    Forbidden,
    /// Referenced entity does not exist
    NotFound,
    /// Internal inconsistency requiring operator attention
    Invariant,
    /// Payment provider unavailable or rejecting; retryable
    ExternalDependency,
    /// Storage failure
    Storage,
}

/// Error returned by every booking pipeline operation.
#[derive(Debug, Error)]
pub enum BookingError {
    /// Ticket count out of range
    #[error("ticket count must be at least 1")]
    InvalidTicketCount,
    /// Not enough available seats at request time
    #[error("only {available} seats available")]
    NotEnoughSeats {
        /// Seats still available
        available: u32,
    },
    /// Event has no seats left
    #[error("event is sold out")]
    SoldOut,
    /// Registration deadline has passed
    #[error("registration closed")]
    RegistrationClosed,
    /// Phone number failed validation
    #[error("invalid phone number: {0}")]
    InvalidPhone(&'static str),
    /// Event definition is invalid
    #[error("invalid event: {0}")]
    InvalidEvent(&'static str),
    /// Cancellation count is zero or exceeds active tickets
    #[error("cannot cancel {requested} tickets, {active} active")]
    InvalidCancelCount {
        /// Tickets asked for
        requested: u32,
        /// Tickets still active
        active: u32,
    },
    /// Booking is not in a state that allows cancellation
    #[error("booking is {0} and cannot be canceled")]
    NotCancelable(PaymentStatus),
    /// Action not valid in the booking's current state
    #[error("{action} not allowed while booking is {status}")]
    InvalidTransition {
        /// Current status
        status: PaymentStatus,
        /// Attempted action
        action: &'static str,
    },
    /// Webhook or redirect body lacks something it needs
    #[error("malformed payment notification: {0}")]
    MalformedNotification(&'static str),
    /// Ticket exists only for paid bookings
    #[error("booking is {0}, no ticket is available")]
    NoTicket(PaymentStatus),
    /// Ticket cannot be admitted at the door
    #[error("booking is {0}, only paid bookings are admitted")]
    NotAdmissible(PaymentStatus),
    /// Token ledger rejection or failure
    #[error(transparent)]
    Tokens(#[from] TokenLedgerError),
    /// Webhook or redirect failed authentication
    #[error("authentication failed: {0}")]
    Signature(#[from] SignatureError),
    /// Caller does not own the resource
    #[error("not permitted")]
    Forbidden,
    /// Event not found
    #[error("event {0} not found")]
    EventNotFound(EventId),
    /// Booking not found
    #[error("booking {0} not found")]
    BookingNotFound(String),
    /// Account not found
    #[error("account not found")]
    AccountNotFound,
    /// Seat ledger rejection or failure
    #[error(transparent)]
    Seats(#[from] SeatLedgerError),
    /// Seat allocation for a paid booking failed; booking stays paid without seats
    #[error("booking {booking_id} is paid but could not be seated: {source}")]
    SeatAllocationFault {
        /// Affected booking
        booking_id: BookingId,
        /// Ledger failure
        source: SeatLedgerError,
    },
    /// Payment-link creation failed; booking remains pending and can be retried
    #[error("payment link unavailable for booking {booking_id}: {source}")]
    PaymentLinkUnavailable {
        /// Pending booking awaiting a link
        booking_id: BookingId,
        /// Provider failure
        source: GatewayError,
    },
    /// Notifier or reminder queue failure
    #[error(transparent)]
    Notification(#[from] NotificationError),
    /// Other provider failure
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    /// Storage failure
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl BookingError {
    /// Which class of fault this is.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidTicketCount
            | Self::NotEnoughSeats { .. }
            | Self::SoldOut
            | Self::RegistrationClosed
            | Self::InvalidPhone(_)
            | Self::InvalidEvent(_)
            | Self::InvalidCancelCount { .. }
            | Self::NotCancelable(_)
            | Self::InvalidTransition { .. }
            | Self::MalformedNotification(_)
            | Self::NoTicket(_)
            | Self::NotAdmissible(_) => ErrorKind::Validation,
            Self::Tokens(e) => match e {
                TokenLedgerError::InsufficientTokens { .. } => ErrorKind::Validation,
                TokenLedgerError::AccountNotFound => ErrorKind::NotFound,
                TokenLedgerError::Store(_) => ErrorKind::Storage,
            },
            Self::Seats(e) => match e {
                SeatLedgerError::InvalidReleaseCount { .. } => ErrorKind::Validation,
                SeatLedgerError::InsufficientSeats { .. } | SeatLedgerError::NotPaid(_) => {
                    ErrorKind::Invariant
                }
                SeatLedgerError::Store(_) => ErrorKind::Storage,
            },
            Self::Signature(_) => ErrorKind::Authentication,
            Self::Forbidden => ErrorKind::Forbidden,
            Self::EventNotFound(_) | Self::BookingNotFound(_) | Self::AccountNotFound => {
                ErrorKind::NotFound
            }
            Self::SeatAllocationFault { .. } => ErrorKind::Invariant,
            Self::PaymentLinkUnavailable { .. } | Self::Gateway(_) | Self::Notification(_) => {
                ErrorKind::ExternalDependency
            }
            Self::Store(_) => ErrorKind::Storage,
        }
    }

    /// Whether repeating the same request may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::ExternalDependency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert_eq!(BookingError::SoldOut.kind(), ErrorKind::Validation);
        assert_eq!(
            BookingError::Signature(SignatureError::Mismatch).kind(),
            ErrorKind::Authentication
        );
        assert_eq!(
            BookingError::SeatAllocationFault {
                booking_id: BookingId::new(),
                source: SeatLedgerError::InsufficientSeats { required: 3, free: 1 },
            }
            .kind(),
            ErrorKind::Invariant
        );
        assert_eq!(
            BookingError::Tokens(TokenLedgerError::InsufficientTokens {
                requested: 50,
                balance: 10
            })
            .kind(),
            ErrorKind::Validation
        );
    }

    #[test]
    fn only_provider_faults_are_retryable() {
        assert!(BookingError::Gateway(GatewayError::Timeout).is_retryable());
        assert!(
            BookingError::PaymentLinkUnavailable {
                booking_id: BookingId::new(),
                source: GatewayError::Transport("reset".into()),
            }
            .is_retryable()
        );
        assert!(!BookingError::Store(StoreError::Database("down".into())).is_retryable());
        assert!(!BookingError::SoldOut.is_retryable());
    }
}
