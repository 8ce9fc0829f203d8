//! Seat ledger: which numbered seats of an event are free and which belong to
//! a paid booking.
//!
//! Selection policy lives in the pure functions [`select_seats`] and
//! [`seats_to_release`]; the async operations apply it inside a store
//! transaction. Callers must hold the event lock ([`StoreTx::lock_event`])
//! before calling [`allocate`] or [`release`].

use crate::error::SeatLedgerError;
use crate::store::StoreTx;
use crate::types::{Booking, EventId, PaymentStatus};

/// Outcome of [`allocate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Allocation {
    /// Seats were assigned now
    Assigned(Vec<u32>),
    /// Booking already held seats; nothing changed
    AlreadySeated(Vec<u32>),
}

impl Allocation {
    /// Seats the booking holds after the call
    #[must_use]
    pub fn seats(&self) -> &[u32] {
        match self {
            Self::Assigned(seats) | Self::AlreadySeated(seats) => seats,
        }
    }
}

/// Choose `required` seats from `free` (ascending).
///
/// Prefers the first run of `required` consecutive numbers; otherwise takes the
/// first `required` free seats. `None` if there are not enough free seats.
///
/// ```
/// use eventhub::seats::select_seats;
///
/// let free: Vec<u32> = [9, 10].into_iter().chain(21..=30).collect();
/// assert_eq!(select_seats(&free, 10), Some((21..=30).collect()));
/// assert_eq!(select_seats(&[1, 3, 5], 2), Some(vec![1, 3]));
/// ```
#[must_use]
pub fn select_seats(free: &[u32], required: usize) -> Option<Vec<u32>> {
    if required == 0 {
        return Some(Vec::new());
    }
    if free.len() < required {
        return None;
    }

    let mut run_start = 0;
    for i in 0..free.len() {
        if i > 0 && free[i] != free[i - 1].saturating_add(1) {
            run_start = i;
        }
        if i + 1 - run_start == required {
            return Some(free[run_start..=i].to_vec());
        }
    }

    Some(free[..required].to_vec())
}

/// The highest `count` of the seats in `held` (ascending), ascending.
///
/// # Errors
///
/// [`SeatLedgerError::InvalidReleaseCount`] if `count` exceeds the seats held.
pub fn seats_to_release(held: &[u32], count: u32) -> Result<Vec<u32>, SeatLedgerError> {
    let wanted = count as usize;
    if wanted > held.len() {
        return Err(SeatLedgerError::InvalidReleaseCount {
            requested: count,
            held: u32::try_from(held.len()).unwrap_or(u32::MAX),
        });
    }
    Ok(held[held.len() - wanted..].to_vec())
}

/// Create seats `1..=capacity` for the event. No-op for seats that exist.
///
/// # Errors
///
/// Storage failures.
pub async fn provision<T: StoreTx>(
    tx: &mut T,
    event: EventId,
    capacity: u32,
) -> Result<u32, SeatLedgerError> {
    if tx.seat_count(event).await? >= capacity {
        return Ok(0);
    }
    let created = tx.insert_seats(event, capacity).await?;
    tracing::debug!(event_id = %event, capacity, created, "Seats provisioned");
    Ok(created)
}

/// Seat a paid booking.
///
/// Idempotent: a booking that already holds seats is left alone.
///
/// # Errors
///
/// - [`SeatLedgerError::NotPaid`] if the booking is not paid
/// - [`SeatLedgerError::InsufficientSeats`] if the event lacks free seats; this
///   means an upstream capacity check was wrong and nothing is assigned
pub async fn allocate<T: StoreTx>(
    tx: &mut T,
    booking: &Booking,
) -> Result<Allocation, SeatLedgerError> {
    if booking.payment_status != PaymentStatus::Paid {
        return Err(SeatLedgerError::NotPaid(booking.payment_status));
    }

    let held = tx.seats_of(booking.id).await?;
    if !held.is_empty() {
        return Ok(Allocation::AlreadySeated(held));
    }

    let required = booking.active_tickets();
    let free = tx.free_seats(booking.event_id).await?;
    let Some(chosen) = select_seats(&free, required as usize) else {
        return Err(SeatLedgerError::InsufficientSeats {
            required,
            free: u32::try_from(free.len()).unwrap_or(u32::MAX),
        });
    };

    tx.assign_seats(booking.event_id, booking.id, &chosen).await?;
    tracing::info!(
        booking_id = %booking.id,
        event_id = %booking.event_id,
        seats = ?chosen,
        "Seats allocated"
    );
    Ok(Allocation::Assigned(chosen))
}

/// Free the booking's `count` highest-numbered seats. Returns them ascending.
///
/// # Errors
///
/// - [`SeatLedgerError::InvalidReleaseCount`] if the booking holds fewer seats
/// - Storage failures
pub async fn release<T: StoreTx>(
    tx: &mut T,
    booking: &Booking,
    count: u32,
) -> Result<Vec<u32>, SeatLedgerError> {
    let held = tx.seats_of(booking.id).await?;
    let released = seats_to_release(&held, count)?;
    tx.release_seats(booking.event_id, booking.id, &released)
        .await?;
    tracing::info!(
        booking_id = %booking.id,
        event_id = %booking.event_id,
        seats = ?released,
        "Seats released"
    );
    Ok(released)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use proptest::prelude::*;

    #[test]
    fn prefers_first_contiguous_run() {
        let free: Vec<u32> = [9, 10].into_iter().chain(21..=30).collect();
        assert_eq!(select_seats(&free, 10).unwrap(), (21..=30).collect::<Vec<_>>());
        assert_eq!(select_seats(&free, 2).unwrap(), vec![9, 10]);
        assert_eq!(select_seats(&free, 3).unwrap(), vec![21, 22, 23]);
    }

    #[test]
    fn falls_back_to_scattered_seats() {
        assert_eq!(select_seats(&[2, 4, 6, 8], 3).unwrap(), vec![2, 4, 6]);
    }

    #[test]
    fn refuses_when_too_few_free() {
        assert_eq!(select_seats(&[1, 2], 3), None);
        assert_eq!(select_seats(&[], 1), None);
    }

    #[test]
    fn releases_highest_seats() {
        let held: Vec<u32> = (50..=54).collect();
        assert_eq!(seats_to_release(&held, 3).unwrap(), vec![52, 53, 54]);
        assert_eq!(seats_to_release(&held, 0).unwrap(), Vec::<u32>::new());
    }

    #[test]
    fn release_more_than_held_is_rejected() {
        let err = seats_to_release(&[1, 2], 3).unwrap_err();
        assert!(matches!(
            err,
            SeatLedgerError::InvalidReleaseCount { requested: 3, held: 2 }
        ));
    }

    fn free_sets() -> impl Strategy<Value = Vec<u32>> {
        proptest::collection::btree_set(1u32..200, 0..80)
            .prop_map(|set| set.into_iter().collect())
    }

    proptest! {
        #[test]
        fn selection_is_a_sorted_subset_of_free(free in free_sets(), required in 0usize..40) {
            match select_seats(&free, required) {
                Some(chosen) => {
                    prop_assert_eq!(chosen.len(), required);
                    prop_assert!(chosen.iter().all(|s| free.contains(s)));
                    prop_assert!(chosen.windows(2).all(|w| w[0] < w[1]));
                }
                None => prop_assert!(free.len() < required),
            }
        }

        #[test]
        fn contiguous_run_is_chosen_when_one_exists(free in free_sets(), required in 1usize..10) {
            let first_run = free
                .windows(required)
                .find(|w| w[required - 1] - w[0] == u32::try_from(required - 1).unwrap());
            if let Some(run) = first_run {
                prop_assert_eq!(select_seats(&free, required).unwrap(), run.to_vec());
            }
        }

        #[test]
        fn release_keeps_the_lowest_seats(start in 1u32..100, len in 1u32..20, cancel in 0u32..20) {
            let held: Vec<u32> = (start..start + len).collect();
            match seats_to_release(&held, cancel) {
                Ok(released) => {
                    prop_assert_eq!(released.len() as u32, cancel);
                    let kept = &held[..held.len() - released.len()];
                    prop_assert!(kept.iter().all(|k| released.iter().all(|r| k < r)));
                }
                Err(_) => prop_assert!(cancel > len),
            }
        }
    }
}
