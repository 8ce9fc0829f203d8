//! Booking state machine.
//!
//! ```text
//!   place ──► pending ──captured──► paid ──cancel all──► canceled
//!                │                   ↺ cancel some
//!                └──failed──► failed
//! ```
//!
//! [`BookingReducer`] owns every transition and returns [`BookingEffect`]s
//! describing the seat, token, notification, and provider work that follows.
//! [`service`] runs those effects inside storage transactions.

pub mod actions;
pub mod reducer;
pub mod service;

pub use actions::{BookingAction, BookingEffect, PlaceBooking};
pub use reducer::{BookingEnvironment, BookingReducer};
pub use service::{AccountProfile, BookingReceipt, BookingRequest, NewEvent, TokenStatement};

use crate::error::BookingError;

/// Normalize a phone number to its digits.
///
/// Accepts separators and a `+91`/`0` prefix; the result must be exactly
/// 10 digits and not a single repeated digit.
///
/// ```
/// use eventhub::booking::normalize_phone;
///
/// assert_eq!(normalize_phone("+91 98765-43210").unwrap(), "9876543210");
/// assert!(normalize_phone("0000000000").is_err());
/// ```
///
/// # Errors
///
/// [`BookingError::InvalidPhone`] describing what is wrong.
pub fn normalize_phone(raw: &str) -> Result<String, BookingError> {
    let mut digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return Err(BookingError::InvalidPhone("phone number is required"));
    }
    if digits.len() == 12 && digits.starts_with("91") {
        digits.drain(..2);
    } else if digits.len() == 11 && digits.starts_with('0') {
        digits.remove(0);
    }
    if digits.len() != 10 {
        return Err(BookingError::InvalidPhone("phone number must have 10 digits"));
    }
    let first = digits.as_bytes()[0];
    if digits.bytes().all(|b| b == first) {
        return Err(BookingError::InvalidPhone("phone number cannot repeat one digit"));
    }
    Ok(digits)
}
