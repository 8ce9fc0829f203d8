//! Domain types for EventHub.
//!
//! Value objects (identifiers, money), entities (events, seats, bookings,
//! accounts), and the records produced around the booking lifecycle.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            #[doc = concat!("Creates a new random `", stringify!($name), "`")]
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            #[doc = concat!("Create a `", stringify!($name), "` from a `Uuid`")]
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for an event
    EventId
);
uuid_id!(
    /// Unique identifier for a booking
    BookingId
);
uuid_id!(
    /// Unique identifier for a customer or organizer account
    AccountId
);
uuid_id!(
    /// Unique identifier for a site notification
    NotificationId
);

/// Opaque, customer-facing booking reference (`EVT-` + 10 upper-case hex digits).
///
/// Embedded in ticket verification URLs and sent to the payment provider as
/// the payment-link reference, so it never exposes the internal [`BookingId`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrderId(String);

impl OrderId {
    const PREFIX: &'static str = "EVT-";
    const DIGITS: usize = 10;

    /// Generate a fresh order id
    #[must_use]
    pub fn generate() -> Self {
        let hex = Uuid::new_v4().simple().to_string();
        Self(format!("{}{}", Self::PREFIX, hex[..Self::DIGITS].to_uppercase()))
    }

    /// The order id as text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for OrderId {
    type Err = InvalidOrderId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix(Self::PREFIX).ok_or(InvalidOrderId)?;
        let valid = digits.len() == Self::DIGITS
            && digits
                .chars()
                .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c));
        if valid {
            Ok(Self(s.to_string()))
        } else {
            Err(InvalidOrderId)
        }
    }
}

impl TryFrom<String> for OrderId {
    type Error = InvalidOrderId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OrderId> for String {
    fn from(value: OrderId) -> Self {
        value.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Text that is not a well-formed order id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("malformed order id")]
pub struct InvalidOrderId;

// ============================================================================
// Money
// ============================================================================

/// Amount of money in minor units (paise).
///
/// One loyalty token is worth one major unit (₹1 = 100 paise).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    /// Zero
    pub const ZERO: Self = Self(0);

    /// Minor units per major unit
    pub const MINOR_PER_MAJOR: u64 = 100;

    /// Creates a `Money` value from paise
    #[must_use]
    pub const fn from_paise(paise: u64) -> Self {
        Self(paise)
    }

    /// Creates a `Money` value from whole rupees, `None` on overflow
    #[must_use]
    pub const fn from_rupees(rupees: u64) -> Option<Self> {
        match rupees.checked_mul(Self::MINOR_PER_MAJOR) {
            Some(paise) => Some(Self(paise)),
            None => None,
        }
    }

    /// Amount in paise
    #[must_use]
    pub const fn paise(&self) -> u64 {
        self.0
    }

    /// Whole rupees, rounded down
    #[must_use]
    pub const fn rupees(&self) -> u64 {
        self.0 / Self::MINOR_PER_MAJOR
    }

    /// Checks if the amount is zero
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Adds two amounts with overflow checking
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(sum) => Some(Self(sum)),
            None => None,
        }
    }

    /// Multiplies by a count with overflow checking
    #[must_use]
    pub const fn checked_mul(self, count: u64) -> Option<Self> {
        match self.0.checked_mul(count) {
            Some(product) => Some(Self(product)),
            None => None,
        }
    }

    /// Subtracts, flooring at zero
    #[must_use]
    pub const fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Adds, capping at the largest representable amount
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "₹{}.{:02}", self.rupees(), self.0 % Self::MINOR_PER_MAJOR)
    }
}

// ============================================================================
// Events and seats
// ============================================================================

/// An organizer-owned event with a fixed pool of numbered seats.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Event identifier
    pub id: EventId,
    /// Owning organizer
    pub organizer: AccountId,
    /// Display title
    pub title: String,
    /// Number of seats; fixed once seats are provisioned
    pub capacity: u32,
    /// Price per ticket
    pub price: Money,
    /// Last day bookings are accepted, inclusive
    pub registration_deadline: Option<NaiveDate>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// A numbered seat and its owner, if any.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    /// Event the seat belongs to
    pub event_id: EventId,
    /// Seat number, dense in `1..=capacity`
    pub number: u32,
    /// Owning paid booking
    pub booking_id: Option<BookingId>,
}

// ============================================================================
// Bookings
// ============================================================================

/// Payment lifecycle of a booking.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Awaiting confirmation from the payment provider
    Pending,
    /// Confirmed through a verified channel
    Paid,
    /// Payment failed; terminal
    Failed,
    /// Every ticket has been canceled
    Canceled,
}

impl PaymentStatus {
    /// Storage representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "failed" => Ok(Self::Failed),
            "canceled" => Ok(Self::Canceled),
            other => Err(format!("unknown payment status '{other}'")),
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Refund outcome of the most recent cancellation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    /// Nothing has been refunded
    NotApplicable,
    /// Submitted to the payment provider
    Pending,
    /// Accepted by the payment provider
    Refunded,
    /// Rejected; needs manual follow-up
    Failed,
}

impl RefundStatus {
    /// Storage representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotApplicable => "not_applicable",
            Self::Pending => "pending",
            Self::Refunded => "refunded",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for RefundStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_applicable" => Ok(Self::NotApplicable),
            "pending" => Ok(Self::Pending),
            "refunded" => Ok(Self::Refunded),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown refund status '{other}'")),
        }
    }
}

/// One customer's ticket request for one event.
///
/// Never deleted; the row doubles as the audit trail of the purchase.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    /// Internal identifier
    pub id: BookingId,
    /// Customer-facing reference
    pub order_id: OrderId,
    /// Booked event
    pub event_id: EventId,
    /// Customer account
    pub account_id: AccountId,
    /// Tickets requested
    pub tickets_booked: u32,
    /// Tickets canceled so far, `<= tickets_booked`
    pub canceled_tickets: u32,
    /// Event price when the booking was made
    pub unit_price: Money,
    /// `tickets_booked × unit_price`
    pub total_price: Money,
    /// Tokens redeemed as a discount
    pub tokens_used: u64,
    /// Tokens awarded once the payment is confirmed
    pub tokens_earned: u64,
    /// `total_price` minus the token discount, floored at zero
    pub amount_to_pay: Money,
    /// Payment lifecycle
    pub payment_status: PaymentStatus,
    /// Refund lifecycle
    pub refund_status: RefundStatus,
    /// Provider payment-link id
    pub payment_link_id: Option<String>,
    /// Hosted payment page
    pub payment_link_url: Option<String>,
    /// Provider payment id, set on capture
    pub payment_id: Option<String>,
    /// Redirect signature that confirmed the payment
    pub payment_signature: Option<String>,
    /// Payment method reported by the provider
    pub payment_method: Option<String>,
    /// Latest provider refund id
    pub refund_id: Option<String>,
    /// Refunds issued or in flight
    pub refund_amount: Money,
    /// Refunds the provider rejected, awaiting manual follow-up
    pub refund_outstanding: Money,
    /// Token debit/credit has been applied
    pub tokens_settled: bool,
    /// Ticket has been scanned at the venue
    pub attended: bool,
    /// Customer phone, 10 digits
    pub contact: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last mutation
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Tickets still held: `tickets_booked - canceled_tickets`
    #[must_use]
    pub const fn active_tickets(&self) -> u32 {
        self.tickets_booked.saturating_sub(self.canceled_tickets)
    }

    /// Whether the booking has been confirmed and still holds tickets
    #[must_use]
    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }
}

// ============================================================================
// Accounts and tokens
// ============================================================================

/// A customer or organizer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Account identifier
    pub id: AccountId,
    /// Display name
    pub name: String,
    /// Phone from the profile, if the customer filled it in
    pub phone: Option<String>,
    /// Loyalty token balance
    pub tokens: u64,
}

/// Why a token balance changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenReason {
    /// Redeemed as a booking discount
    Spent,
    /// Earned back on a paid booking
    Earned,
    /// Manual adjustment
    Granted,
}

impl TokenReason {
    /// Storage representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Spent => "spent",
            Self::Earned => "earned",
            Self::Granted => "granted",
        }
    }
}

impl FromStr for TokenReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "spent" => Ok(Self::Spent),
            "earned" => Ok(Self::Earned),
            "granted" => Ok(Self::Granted),
            other => Err(format!("unknown token reason '{other}'")),
        }
    }
}

/// Audit row for one token balance change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenTransaction {
    /// Account whose balance changed
    pub account_id: AccountId,
    /// Positive for credits, negative for debits
    pub change: i64,
    /// Why
    pub reason: TokenReason,
    /// Booking that caused the change
    pub booking_id: Option<BookingId>,
    /// When
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Notifications
// ============================================================================

/// Kind of site-wide notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// An event was published
    NewEvent,
    /// Paid tickets crossed the popularity threshold
    PopularEvent,
}

impl NotificationKind {
    /// Storage representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NewEvent => "new_event",
            Self::PopularEvent => "popular_event",
        }
    }
}

impl FromStr for NotificationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new_event" => Ok(Self::NewEvent),
            "popular_event" => Ok(Self::PopularEvent),
            other => Err(format!("unknown notification kind '{other}'")),
        }
    }
}

/// Fire-and-forget site notification, at most one per event and kind.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteNotification {
    /// Notification identifier
    pub id: NotificationId,
    /// Event the notification is about
    pub event_id: EventId,
    /// Kind
    pub kind: NotificationKind,
    /// Display text
    pub message: String,
    /// When
    pub created_at: DateTime<Utc>,
}
