//! In-memory storage backend.
//!
//! One transaction at a time: `begin` takes a process-wide lock and works on a
//! staged copy of the data, which `commit` publishes. Dropping the transaction
//! releases the lock and discards the copy. This gives the same isolation the
//! row locks give in `PostgreSQL`, at the cost of serializing everything.

use super::{BookingStore, StoreResult, StoreTx, TokenChange};
use crate::error::StoreError;
use crate::types::{
    Account, AccountId, Booking, BookingId, Event, EventId, OrderId, SiteNotification,
    TokenTransaction,
};
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, Default)]
struct Data {
    events: HashMap<EventId, Event>,
    seats: HashMap<EventId, BTreeMap<u32, Option<BookingId>>>,
    bookings: HashMap<BookingId, Booking>,
    accounts: HashMap<AccountId, Account>,
    token_log: Vec<TokenTransaction>,
    notifications: Vec<SiteNotification>,
}

/// In-memory [`BookingStore`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    data: Arc<Mutex<Data>>,
}

impl InMemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every site notification recorded so far, oldest first.
    pub async fn notifications(&self) -> Vec<SiteNotification> {
        self.data.lock().await.notifications.clone()
    }

    /// Every seat of the event with its owner, ascending by number.
    pub async fn seat_map(&self, event: EventId) -> Vec<(u32, Option<BookingId>)> {
        self.data
            .lock()
            .await
            .seats
            .get(&event)
            .map(|seats| seats.iter().map(|(n, b)| (*n, *b)).collect())
            .unwrap_or_default()
    }
}

impl BookingStore for InMemoryStore {
    type Tx = InMemoryTx;

    async fn begin(&self) -> StoreResult<InMemoryTx> {
        let guard = Arc::clone(&self.data).lock_owned().await;
        let staged = guard.clone();
        Ok(InMemoryTx { guard, staged })
    }
}

/// Transaction over an [`InMemoryStore`].
#[derive(Debug)]
pub struct InMemoryTx {
    guard: OwnedMutexGuard<Data>,
    staged: Data,
}

impl InMemoryTx {
    fn seats_mut(&mut self, event: EventId) -> StoreResult<&mut BTreeMap<u32, Option<BookingId>>> {
        self.staged
            .seats
            .get_mut(&event)
            .ok_or_else(|| StoreError::Conflict(format!("no seats for event {event}")))
    }
}

impl StoreTx for InMemoryTx {
    async fn insert_event(&mut self, event: &Event) -> StoreResult<()> {
        if self.staged.events.contains_key(&event.id) {
            return Err(StoreError::Conflict(format!("event {} exists", event.id)));
        }
        self.staged.events.insert(event.id, event.clone());
        Ok(())
    }

    async fn event(&mut self, id: EventId) -> StoreResult<Option<Event>> {
        Ok(self.staged.events.get(&id).cloned())
    }

    async fn lock_event(&mut self, id: EventId) -> StoreResult<Option<Event>> {
        Ok(self.staged.events.get(&id).cloned())
    }

    async fn seat_count(&mut self, event: EventId) -> StoreResult<u32> {
        let count = self.staged.seats.get(&event).map_or(0, BTreeMap::len);
        u32::try_from(count).map_err(|e| StoreError::Corrupt(e.to_string()))
    }

    async fn insert_seats(&mut self, event: EventId, capacity: u32) -> StoreResult<u32> {
        let seats = self.staged.seats.entry(event).or_default();
        let mut created = 0;
        for number in 1..=capacity {
            if !seats.contains_key(&number) {
                seats.insert(number, None);
                created += 1;
            }
        }
        Ok(created)
    }

    async fn free_seats(&mut self, event: EventId) -> StoreResult<Vec<u32>> {
        Ok(self
            .staged
            .seats
            .get(&event)
            .map(|seats| {
                seats
                    .iter()
                    .filter(|(_, owner)| owner.is_none())
                    .map(|(number, _)| *number)
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn seats_of(&mut self, booking: BookingId) -> StoreResult<Vec<u32>> {
        let Some(event) = self.staged.bookings.get(&booking).map(|b| b.event_id) else {
            return Ok(Vec::new());
        };
        Ok(self
            .staged
            .seats
            .get(&event)
            .map(|seats| {
                seats
                    .iter()
                    .filter(|(_, owner)| **owner == Some(booking))
                    .map(|(number, _)| *number)
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn assign_seats(
        &mut self,
        event: EventId,
        booking: BookingId,
        seats: &[u32],
    ) -> StoreResult<()> {
        let map = self.seats_mut(event)?;
        if let Some(taken) = seats
            .iter()
            .find(|n| !matches!(map.get(*n), Some(None)))
        {
            return Err(StoreError::Conflict(format!("seat {taken} is not free")));
        }
        for number in seats {
            map.insert(*number, Some(booking));
        }
        Ok(())
    }

    async fn release_seats(
        &mut self,
        event: EventId,
        booking: BookingId,
        seats: &[u32],
    ) -> StoreResult<()> {
        let map = self.seats_mut(event)?;
        if let Some(foreign) = seats
            .iter()
            .find(|n| map.get(*n).copied().flatten() != Some(booking))
        {
            return Err(StoreError::Conflict(format!(
                "seat {foreign} is not held by booking {booking}"
            )));
        }
        for number in seats {
            map.insert(*number, None);
        }
        Ok(())
    }

    async fn owned_seat_count(&mut self, event: EventId) -> StoreResult<u32> {
        let count = self
            .staged
            .seats
            .get(&event)
            .map_or(0, |seats| seats.values().filter(|owner| owner.is_some()).count());
        u32::try_from(count).map_err(|e| StoreError::Corrupt(e.to_string()))
    }

    async fn insert_booking(&mut self, booking: &Booking) -> StoreResult<()> {
        let duplicate = self.staged.bookings.values().any(|b| {
            b.order_id == booking.order_id
                || (b.payment_link_id.is_some() && b.payment_link_id == booking.payment_link_id)
        });
        if duplicate || self.staged.bookings.contains_key(&booking.id) {
            return Err(StoreError::Conflict(format!("booking {} exists", booking.id)));
        }
        self.staged.bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn booking(&mut self, id: BookingId) -> StoreResult<Option<Booking>> {
        Ok(self.staged.bookings.get(&id).cloned())
    }

    async fn lock_booking(&mut self, id: BookingId) -> StoreResult<Option<Booking>> {
        Ok(self.staged.bookings.get(&id).cloned())
    }

    async fn lock_booking_by_link(&mut self, link_id: &str) -> StoreResult<Option<Booking>> {
        Ok(self
            .staged
            .bookings
            .values()
            .find(|b| b.payment_link_id.as_deref() == Some(link_id))
            .cloned())
    }

    async fn lock_booking_by_order(&mut self, order_id: &OrderId) -> StoreResult<Option<Booking>> {
        Ok(self
            .staged
            .bookings
            .values()
            .find(|b| &b.order_id == order_id)
            .cloned())
    }

    async fn latest_booking_for(&mut self, account: AccountId) -> StoreResult<Option<Booking>> {
        Ok(self
            .staged
            .bookings
            .values()
            .filter(|b| b.account_id == account)
            .max_by_key(|b| b.created_at)
            .cloned())
    }

    async fn update_booking(&mut self, booking: &Booking) -> StoreResult<()> {
        match self.staged.bookings.get_mut(&booking.id) {
            Some(row) => {
                *row = booking.clone();
                Ok(())
            }
            None => Err(StoreError::Conflict(format!("booking {} missing", booking.id))),
        }
    }

    async fn upsert_account(&mut self, account: &Account) -> StoreResult<()> {
        self.staged
            .accounts
            .entry(account.id)
            .and_modify(|row| {
                row.name.clone_from(&account.name);
                row.phone.clone_from(&account.phone);
            })
            .or_insert_with(|| account.clone());
        Ok(())
    }

    async fn account(&mut self, id: AccountId) -> StoreResult<Option<Account>> {
        Ok(self.staged.accounts.get(&id).cloned())
    }

    async fn adjust_tokens(&mut self, change: TokenChange) -> StoreResult<Option<u64>> {
        let Some(account) = self.staged.accounts.get_mut(&change.account_id) else {
            return Ok(None);
        };
        let magnitude = change.change.unsigned_abs();
        account.tokens = if change.change >= 0 {
            account.tokens.saturating_add(magnitude)
        } else {
            account.tokens.saturating_sub(magnitude)
        };
        let balance = account.tokens;
        self.staged.token_log.push(TokenTransaction {
            account_id: change.account_id,
            change: change.change,
            reason: change.reason,
            booking_id: change.booking_id,
            created_at: Utc::now(),
        });
        Ok(Some(balance))
    }

    async fn token_history(&mut self, account: AccountId) -> StoreResult<Vec<TokenTransaction>> {
        Ok(self
            .staged
            .token_log
            .iter()
            .rev()
            .filter(|t| t.account_id == account)
            .cloned()
            .collect())
    }

    async fn insert_notification_once(
        &mut self,
        notification: &SiteNotification,
    ) -> StoreResult<bool> {
        let exists = self
            .staged
            .notifications
            .iter()
            .any(|n| n.event_id == notification.event_id && n.kind == notification.kind);
        if exists {
            return Ok(false);
        }
        self.staged.notifications.push(notification.clone());
        Ok(true)
    }

    async fn commit(mut self) -> StoreResult<()> {
        *self.guard = std::mem::take(&mut self.staged);
        Ok(())
    }
}
