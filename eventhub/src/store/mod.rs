//! Storage for events, seats, bookings, accounts, and notifications.
//!
//! Every pipeline operation runs inside one [`StoreTx`]. Row locks are taken
//! in a fixed order: the booking row first, then the event row that guards the
//! event's seat set. Dropping a transaction without [`StoreTx::commit`] discards
//! every write made through it.
//!
//! Backends:
//!
//! - [`PostgresStore`] - `SELECT … FOR UPDATE` row locks, atomic token updates
//! - [`InMemoryStore`] - single-writer, for tests and local runs

pub mod memory;
pub mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PostgresStore;

use crate::error::StoreError;
use crate::types::{
    Account, AccountId, Booking, BookingId, Event, EventId, OrderId, SiteNotification,
    TokenReason, TokenTransaction,
};
use std::future::Future;

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// A token balance adjustment, applied atomically and audited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenChange {
    /// Account to adjust
    pub account_id: AccountId,
    /// Positive to credit, negative to debit; debits floor the balance at zero
    pub change: i64,
    /// Audit reason
    pub reason: TokenReason,
    /// Booking responsible for the change
    pub booking_id: Option<BookingId>,
}

/// Factory for transactions.
pub trait BookingStore: Send + Sync + 'static {
    /// Transaction type
    type Tx: StoreTx;

    /// Open a transaction.
    ///
    /// # Errors
    ///
    /// Returns error if the backend is unavailable.
    fn begin(&self) -> impl Future<Output = StoreResult<Self::Tx>> + Send;
}

/// One unit of work.
///
/// `lock_*` methods hold the row until commit or drop; plain reads do not lock.
#[allow(clippy::missing_errors_doc)] // Every method fails only on backend errors
pub trait StoreTx: Send {
    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    /// Insert a new event.
    fn insert_event(&mut self, event: &Event) -> impl Future<Output = StoreResult<()>> + Send;

    /// Read an event without locking it.
    fn event(&mut self, id: EventId) -> impl Future<Output = StoreResult<Option<Event>>> + Send;

    /// Read and lock an event. The lock serializes every seat change for the event.
    fn lock_event(
        &mut self,
        id: EventId,
    ) -> impl Future<Output = StoreResult<Option<Event>>> + Send;

    // ------------------------------------------------------------------
    // Seats (caller holds the event lock)
    // ------------------------------------------------------------------

    /// Number of seats provisioned for the event.
    fn seat_count(&mut self, event: EventId) -> impl Future<Output = StoreResult<u32>> + Send;

    /// Create seats `1..=capacity`, skipping numbers that already exist.
    /// Returns how many were created.
    fn insert_seats(
        &mut self,
        event: EventId,
        capacity: u32,
    ) -> impl Future<Output = StoreResult<u32>> + Send;

    /// Unowned seat numbers, ascending.
    fn free_seats(&mut self, event: EventId) -> impl Future<Output = StoreResult<Vec<u32>>> + Send;

    /// Seat numbers owned by the booking, ascending.
    fn seats_of(&mut self, booking: BookingId)
    -> impl Future<Output = StoreResult<Vec<u32>>> + Send;

    /// Give free seats to the booking. Fails with [`StoreError::Conflict`] if
    /// any of them is not free.
    fn assign_seats(
        &mut self,
        event: EventId,
        booking: BookingId,
        seats: &[u32],
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// Take seats back from the booking. Fails with [`StoreError::Conflict`] if
    /// the booking does not own all of them.
    fn release_seats(
        &mut self,
        event: EventId,
        booking: BookingId,
        seats: &[u32],
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// Seats of the event currently owned by any booking.
    fn owned_seat_count(&mut self, event: EventId) -> impl Future<Output = StoreResult<u32>> + Send;

    // ------------------------------------------------------------------
    // Bookings
    // ------------------------------------------------------------------

    /// Insert a new booking.
    fn insert_booking(&mut self, booking: &Booking) -> impl Future<Output = StoreResult<()>> + Send;

    /// Read a booking without locking it.
    fn booking(
        &mut self,
        id: BookingId,
    ) -> impl Future<Output = StoreResult<Option<Booking>>> + Send;

    /// Read and lock a booking.
    fn lock_booking(
        &mut self,
        id: BookingId,
    ) -> impl Future<Output = StoreResult<Option<Booking>>> + Send;

    /// Read and lock the booking carrying this payment-link id.
    fn lock_booking_by_link(
        &mut self,
        link_id: &str,
    ) -> impl Future<Output = StoreResult<Option<Booking>>> + Send;

    /// Read and lock the booking with this order id.
    fn lock_booking_by_order(
        &mut self,
        order_id: &OrderId,
    ) -> impl Future<Output = StoreResult<Option<Booking>>> + Send;

    /// Most recently created booking of the account.
    fn latest_booking_for(
        &mut self,
        account: AccountId,
    ) -> impl Future<Output = StoreResult<Option<Booking>>> + Send;

    /// Overwrite a booking.
    fn update_booking(&mut self, booking: &Booking) -> impl Future<Output = StoreResult<()>> + Send;

    // ------------------------------------------------------------------
    // Accounts and tokens
    // ------------------------------------------------------------------

    /// Create or update an account's profile. Never touches the token balance
    /// of an existing account.
    fn upsert_account(&mut self, account: &Account) -> impl Future<Output = StoreResult<()>> + Send;

    /// Read an account.
    fn account(
        &mut self,
        id: AccountId,
    ) -> impl Future<Output = StoreResult<Option<Account>>> + Send;

    /// Apply a token change as one atomic update and append its audit row.
    /// Returns the new balance, or `None` if the account does not exist.
    fn adjust_tokens(
        &mut self,
        change: TokenChange,
    ) -> impl Future<Output = StoreResult<Option<u64>>> + Send;

    /// Token audit trail of the account, newest first.
    fn token_history(
        &mut self,
        account: AccountId,
    ) -> impl Future<Output = StoreResult<Vec<TokenTransaction>>> + Send;

    // ------------------------------------------------------------------
    // Notifications
    // ------------------------------------------------------------------

    /// Insert the notification unless one of the same kind exists for the
    /// event. Returns whether it was inserted.
    fn insert_notification_once(
        &mut self,
        notification: &SiteNotification,
    ) -> impl Future<Output = StoreResult<bool>> + Send;

    // ------------------------------------------------------------------

    /// Make every write visible and release all locks.
    fn commit(self) -> impl Future<Output = StoreResult<()>> + Send;
}
