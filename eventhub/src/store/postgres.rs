//! `PostgreSQL` storage backend.
//!
//! Row locks come from `SELECT … FOR UPDATE` inside the transaction; the event
//! row guards the event's seat set, and the free-seat scan additionally locks
//! the candidate seat rows. Token balances change through a single `UPDATE`
//! so concurrent confirmations for one account cannot lose updates.
//!
//! # Example
//!
//! ```ignore
//! let store = PostgresStore::connect(&config.postgres).await?;
//! store.migrate().await?;
//! let hub = EventHub::new(store, gateway, config);
//! ```

use super::{BookingStore, StoreResult, StoreTx, TokenChange};
use crate::config::PostgresConfig;
use crate::error::StoreError;
use crate::types::{
    Account, AccountId, Booking, BookingId, Event, EventId, Money, OrderId, SiteNotification,
    TokenTransaction,
};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, Postgres, Transaction};
use std::time::Duration;
use uuid::Uuid;

const BOOKING_COLUMNS: &str = "id, order_id, event_id, account_id, tickets_booked, canceled_tickets, \
     unit_price_paise, total_price_paise, tokens_used, tokens_earned, amount_to_pay_paise, \
     payment_status, refund_status, payment_link_id, payment_link_url, payment_id, \
     payment_signature, payment_method, refund_id, refund_paise, refund_outstanding_paise, \
     tokens_settled, attended, contact, created_at, updated_at";

const EVENT_COLUMNS: &str =
    "id, organizer_id, title, capacity, price_paise, registration_deadline, created_at";

/// `PostgreSQL`-backed [`BookingStore`].
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the database is unreachable.
    pub async fn connect(config: &PostgresConfig) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout))
            .connect(&config.url)
            .await
            .map_err(|e| StoreError::Database(format!("Failed to connect: {e}")))?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    ///
    /// # Errors
    ///
    /// Returns error if migrations fail.
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Migration failed: {e}")))?;
        Ok(())
    }
}

impl BookingStore for PostgresStore {
    type Tx = PostgresTx;

    async fn begin(&self) -> StoreResult<PostgresTx> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Database(format!("Failed to start transaction: {e}")))?;
        Ok(PostgresTx { tx })
    }
}

/// Transaction over a [`PostgresStore`]. Rolls back on drop.
pub struct PostgresTx {
    tx: Transaction<'static, Postgres>,
}

// ============================================================================
// Row mapping
// ============================================================================

fn db(context: &'static str) -> impl Fn(sqlx::Error) -> StoreError {
    move |e| StoreError::Database(format!("{context}: {e}"))
}

fn to_i32(value: u32) -> StoreResult<i32> {
    i32::try_from(value).map_err(|e| StoreError::Corrupt(format!("{value} out of range: {e}")))
}

fn to_i64(value: u64) -> StoreResult<i64> {
    i64::try_from(value).map_err(|e| StoreError::Corrupt(format!("{value} out of range: {e}")))
}

fn to_u32(value: i32) -> StoreResult<u32> {
    u32::try_from(value).map_err(|e| StoreError::Corrupt(format!("{value} out of range: {e}")))
}

fn to_u64(value: i64) -> StoreResult<u64> {
    u64::try_from(value).map_err(|e| StoreError::Corrupt(format!("{value} out of range: {e}")))
}

fn seat_numbers(seats: &[u32]) -> StoreResult<Vec<i32>> {
    seats.iter().copied().map(to_i32).collect()
}

#[derive(FromRow)]
struct EventRow {
    id: Uuid,
    organizer_id: Uuid,
    title: String,
    capacity: i32,
    price_paise: i64,
    registration_deadline: Option<NaiveDate>,
    created_at: DateTime<Utc>,
}

impl TryFrom<EventRow> for Event {
    type Error = StoreError;

    fn try_from(row: EventRow) -> StoreResult<Self> {
        Ok(Self {
            id: EventId::from_uuid(row.id),
            organizer: AccountId::from_uuid(row.organizer_id),
            title: row.title,
            capacity: to_u32(row.capacity)?,
            price: Money::from_paise(to_u64(row.price_paise)?),
            registration_deadline: row.registration_deadline,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct BookingRow {
    id: Uuid,
    order_id: String,
    event_id: Uuid,
    account_id: Uuid,
    tickets_booked: i32,
    canceled_tickets: i32,
    unit_price_paise: i64,
    total_price_paise: i64,
    tokens_used: i64,
    tokens_earned: i64,
    amount_to_pay_paise: i64,
    payment_status: String,
    refund_status: String,
    payment_link_id: Option<String>,
    payment_link_url: Option<String>,
    payment_id: Option<String>,
    payment_signature: Option<String>,
    payment_method: Option<String>,
    refund_id: Option<String>,
    refund_paise: i64,
    refund_outstanding_paise: i64,
    tokens_settled: bool,
    attended: bool,
    contact: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = StoreError;

    fn try_from(row: BookingRow) -> StoreResult<Self> {
        Ok(Self {
            id: BookingId::from_uuid(row.id),
            order_id: row
                .order_id
                .parse()
                .map_err(|_| StoreError::Corrupt(format!("order id '{}'", row.order_id)))?,
            event_id: EventId::from_uuid(row.event_id),
            account_id: AccountId::from_uuid(row.account_id),
            tickets_booked: to_u32(row.tickets_booked)?,
            canceled_tickets: to_u32(row.canceled_tickets)?,
            unit_price: Money::from_paise(to_u64(row.unit_price_paise)?),
            total_price: Money::from_paise(to_u64(row.total_price_paise)?),
            tokens_used: to_u64(row.tokens_used)?,
            tokens_earned: to_u64(row.tokens_earned)?,
            amount_to_pay: Money::from_paise(to_u64(row.amount_to_pay_paise)?),
            payment_status: row.payment_status.parse().map_err(StoreError::Corrupt)?,
            refund_status: row.refund_status.parse().map_err(StoreError::Corrupt)?,
            payment_link_id: row.payment_link_id,
            payment_link_url: row.payment_link_url,
            payment_id: row.payment_id,
            payment_signature: row.payment_signature,
            payment_method: row.payment_method,
            refund_id: row.refund_id,
            refund_amount: Money::from_paise(to_u64(row.refund_paise)?),
            refund_outstanding: Money::from_paise(to_u64(row.refund_outstanding_paise)?),
            tokens_settled: row.tokens_settled,
            attended: row.attended,
            contact: row.contact,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct AccountRow {
    id: Uuid,
    name: String,
    phone: Option<String>,
    tokens: i64,
}

#[derive(FromRow)]
struct TokenRow {
    account_id: Uuid,
    change: i64,
    reason: String,
    booking_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl PostgresTx {
    async fn fetch_booking(&mut self, filter: &str, bind: BookingKey<'_>) -> StoreResult<Option<Booking>> {
        let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE {filter}");
        let query = sqlx::query_as::<_, BookingRow>(&sql);
        let query = match bind {
            BookingKey::Id(id) => query.bind(id),
            BookingKey::Text(text) => query.bind(text),
        };
        query
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db("Failed to load booking"))?
            .map(Booking::try_from)
            .transpose()
    }

    async fn fetch_event(&mut self, id: EventId, lock: bool) -> StoreResult<Option<Event>> {
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE id = $1{}",
            if lock { " FOR UPDATE" } else { "" }
        );
        sqlx::query_as::<_, EventRow>(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db("Failed to load event"))?
            .map(Event::try_from)
            .transpose()
    }
}

enum BookingKey<'a> {
    Id(Uuid),
    Text(&'a str),
}

impl StoreTx for PostgresTx {
    async fn insert_event(&mut self, event: &Event) -> StoreResult<()> {
        sqlx::query(
            r"
            INSERT INTO events
                (id, organizer_id, title, capacity, price_paise, registration_deadline, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ",
        )
        .bind(event.id.as_uuid())
        .bind(event.organizer.as_uuid())
        .bind(&event.title)
        .bind(to_i32(event.capacity)?)
        .bind(to_i64(event.price.paise())?)
        .bind(event.registration_deadline)
        .bind(event.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db("Failed to insert event"))?;
        Ok(())
    }

    async fn event(&mut self, id: EventId) -> StoreResult<Option<Event>> {
        self.fetch_event(id, false).await
    }

    async fn lock_event(&mut self, id: EventId) -> StoreResult<Option<Event>> {
        self.fetch_event(id, true).await
    }

    async fn seat_count(&mut self, event: EventId) -> StoreResult<u32> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM seats WHERE event_id = $1")
            .bind(event.as_uuid())
            .fetch_one(&mut *self.tx)
            .await
            .map_err(db("Failed to count seats"))?;
        u32::try_from(count).map_err(|e| StoreError::Corrupt(e.to_string()))
    }

    async fn insert_seats(&mut self, event: EventId, capacity: u32) -> StoreResult<u32> {
        let result = sqlx::query(
            r"
            INSERT INTO seats (event_id, number)
            SELECT $1, generate_series(1, $2)
            ON CONFLICT (event_id, number) DO NOTHING
            ",
        )
        .bind(event.as_uuid())
        .bind(to_i32(capacity)?)
        .execute(&mut *self.tx)
        .await
        .map_err(db("Failed to provision seats"))?;
        u32::try_from(result.rows_affected()).map_err(|e| StoreError::Corrupt(e.to_string()))
    }

    async fn free_seats(&mut self, event: EventId) -> StoreResult<Vec<u32>> {
        let numbers: Vec<i32> = sqlx::query_scalar(
            r"
            SELECT number FROM seats
            WHERE event_id = $1 AND booking_id IS NULL
            ORDER BY number
            FOR UPDATE
            ",
        )
        .bind(event.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db("Failed to load free seats"))?;
        numbers.into_iter().map(to_u32).collect()
    }

    async fn seats_of(&mut self, booking: BookingId) -> StoreResult<Vec<u32>> {
        let numbers: Vec<i32> = sqlx::query_scalar(
            "SELECT number FROM seats WHERE booking_id = $1 ORDER BY number",
        )
        .bind(booking.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db("Failed to load booking seats"))?;
        numbers.into_iter().map(to_u32).collect()
    }

    async fn assign_seats(
        &mut self,
        event: EventId,
        booking: BookingId,
        seats: &[u32],
    ) -> StoreResult<()> {
        let result = sqlx::query(
            r"
            UPDATE seats SET booking_id = $3
            WHERE event_id = $1 AND number = ANY($2) AND booking_id IS NULL
            ",
        )
        .bind(event.as_uuid())
        .bind(seat_numbers(seats)?)
        .bind(booking.as_uuid())
        .execute(&mut *self.tx)
        .await
        .map_err(db("Failed to assign seats"))?;

        if result.rows_affected() != seats.len() as u64 {
            return Err(StoreError::Conflict(format!(
                "assigned {} of {} seats",
                result.rows_affected(),
                seats.len()
            )));
        }
        Ok(())
    }

    async fn release_seats(
        &mut self,
        event: EventId,
        booking: BookingId,
        seats: &[u32],
    ) -> StoreResult<()> {
        let result = sqlx::query(
            r"
            UPDATE seats SET booking_id = NULL
            WHERE event_id = $1 AND number = ANY($2) AND booking_id = $3
            ",
        )
        .bind(event.as_uuid())
        .bind(seat_numbers(seats)?)
        .bind(booking.as_uuid())
        .execute(&mut *self.tx)
        .await
        .map_err(db("Failed to release seats"))?;

        if result.rows_affected() != seats.len() as u64 {
            return Err(StoreError::Conflict(format!(
                "released {} of {} seats",
                result.rows_affected(),
                seats.len()
            )));
        }
        Ok(())
    }

    async fn owned_seat_count(&mut self, event: EventId) -> StoreResult<u32> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM seats WHERE event_id = $1 AND booking_id IS NOT NULL",
        )
        .bind(event.as_uuid())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(db("Failed to count owned seats"))?;
        u32::try_from(count).map_err(|e| StoreError::Corrupt(e.to_string()))
    }

    async fn insert_booking(&mut self, b: &Booking) -> StoreResult<()> {
        let sql = format!(
            "INSERT INTO bookings ({BOOKING_COLUMNS}) VALUES \
             ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, \
              $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26)"
        );
        sqlx::query(&sql)
            .bind(b.id.as_uuid())
            .bind(b.order_id.as_str())
            .bind(b.event_id.as_uuid())
            .bind(b.account_id.as_uuid())
            .bind(to_i32(b.tickets_booked)?)
            .bind(to_i32(b.canceled_tickets)?)
            .bind(to_i64(b.unit_price.paise())?)
            .bind(to_i64(b.total_price.paise())?)
            .bind(to_i64(b.tokens_used)?)
            .bind(to_i64(b.tokens_earned)?)
            .bind(to_i64(b.amount_to_pay.paise())?)
            .bind(b.payment_status.as_str())
            .bind(b.refund_status.as_str())
            .bind(b.payment_link_id.as_deref())
            .bind(b.payment_link_url.as_deref())
            .bind(b.payment_id.as_deref())
            .bind(b.payment_signature.as_deref())
            .bind(b.payment_method.as_deref())
            .bind(b.refund_id.as_deref())
            .bind(to_i64(b.refund_amount.paise())?)
            .bind(to_i64(b.refund_outstanding.paise())?)
            .bind(b.tokens_settled)
            .bind(b.attended)
            .bind(&b.contact)
            .bind(b.created_at)
            .bind(b.updated_at)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(db_err) = &e {
                    if db_err.is_unique_violation() {
                        return StoreError::Conflict(format!("booking {} exists", b.id));
                    }
                }
                StoreError::Database(format!("Failed to insert booking: {e}"))
            })?;
        Ok(())
    }

    async fn booking(&mut self, id: BookingId) -> StoreResult<Option<Booking>> {
        self.fetch_booking("id = $1", BookingKey::Id(*id.as_uuid())).await
    }

    async fn lock_booking(&mut self, id: BookingId) -> StoreResult<Option<Booking>> {
        self.fetch_booking("id = $1 FOR UPDATE", BookingKey::Id(*id.as_uuid()))
            .await
    }

    async fn lock_booking_by_link(&mut self, link_id: &str) -> StoreResult<Option<Booking>> {
        self.fetch_booking("payment_link_id = $1 FOR UPDATE", BookingKey::Text(link_id))
            .await
    }

    async fn lock_booking_by_order(&mut self, order_id: &OrderId) -> StoreResult<Option<Booking>> {
        self.fetch_booking("order_id = $1 FOR UPDATE", BookingKey::Text(order_id.as_str()))
            .await
    }

    async fn latest_booking_for(&mut self, account: AccountId) -> StoreResult<Option<Booking>> {
        self.fetch_booking(
            "account_id = $1 ORDER BY created_at DESC LIMIT 1",
            BookingKey::Id(*account.as_uuid()),
        )
        .await
    }

    async fn update_booking(&mut self, b: &Booking) -> StoreResult<()> {
        let result = sqlx::query(
            r"
            UPDATE bookings SET
                canceled_tickets = $2,
                tokens_used = $3,
                tokens_earned = $4,
                amount_to_pay_paise = $5,
                payment_status = $6,
                refund_status = $7,
                payment_link_id = $8,
                payment_link_url = $9,
                payment_id = $10,
                payment_signature = $11,
                payment_method = $12,
                refund_id = $13,
                refund_paise = $14,
                refund_outstanding_paise = $15,
                tokens_settled = $16,
                attended = $17,
                updated_at = $18
            WHERE id = $1
            ",
        )
        .bind(b.id.as_uuid())
        .bind(to_i32(b.canceled_tickets)?)
        .bind(to_i64(b.tokens_used)?)
        .bind(to_i64(b.tokens_earned)?)
        .bind(to_i64(b.amount_to_pay.paise())?)
        .bind(b.payment_status.as_str())
        .bind(b.refund_status.as_str())
        .bind(b.payment_link_id.as_deref())
        .bind(b.payment_link_url.as_deref())
        .bind(b.payment_id.as_deref())
        .bind(b.payment_signature.as_deref())
        .bind(b.payment_method.as_deref())
        .bind(b.refund_id.as_deref())
        .bind(to_i64(b.refund_amount.paise())?)
        .bind(to_i64(b.refund_outstanding.paise())?)
        .bind(b.tokens_settled)
        .bind(b.attended)
        .bind(b.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db("Failed to update booking"))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!("booking {} missing", b.id)));
        }
        Ok(())
    }

    async fn upsert_account(&mut self, account: &Account) -> StoreResult<()> {
        sqlx::query(
            r"
            INSERT INTO accounts (id, name, phone, tokens)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, phone = EXCLUDED.phone
            ",
        )
        .bind(account.id.as_uuid())
        .bind(&account.name)
        .bind(account.phone.as_deref())
        .bind(to_i64(account.tokens)?)
        .execute(&mut *self.tx)
        .await
        .map_err(db("Failed to save account"))?;
        Ok(())
    }

    async fn account(&mut self, id: AccountId) -> StoreResult<Option<Account>> {
        sqlx::query_as::<_, AccountRow>("SELECT id, name, phone, tokens FROM accounts WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db("Failed to load account"))?
            .map(|row| {
                Ok(Account {
                    id: AccountId::from_uuid(row.id),
                    name: row.name,
                    phone: row.phone,
                    tokens: to_u64(row.tokens)?,
                })
            })
            .transpose()
    }

    async fn adjust_tokens(&mut self, change: TokenChange) -> StoreResult<Option<u64>> {
        let balance: Option<i64> = sqlx::query_scalar(
            r"
            UPDATE accounts
            SET tokens = GREATEST(tokens + $2, 0)
            WHERE id = $1
            RETURNING tokens
            ",
        )
        .bind(change.account_id.as_uuid())
        .bind(change.change)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db("Failed to adjust tokens"))?;

        let Some(balance) = balance else {
            return Ok(None);
        };

        sqlx::query(
            r"
            INSERT INTO token_transactions (account_id, change, reason, booking_id)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(change.account_id.as_uuid())
        .bind(change.change)
        .bind(change.reason.as_str())
        .bind(change.booking_id.map(|b| *b.as_uuid()))
        .execute(&mut *self.tx)
        .await
        .map_err(db("Failed to record token transaction"))?;

        to_u64(balance).map(Some)
    }

    async fn token_history(&mut self, account: AccountId) -> StoreResult<Vec<TokenTransaction>> {
        let rows = sqlx::query_as::<_, TokenRow>(
            r"
            SELECT account_id, change, reason, booking_id, created_at
            FROM token_transactions
            WHERE account_id = $1
            ORDER BY id DESC
            ",
        )
        .bind(account.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db("Failed to load token history"))?;

        rows.into_iter()
            .map(|row| {
                Ok(TokenTransaction {
                    account_id: AccountId::from_uuid(row.account_id),
                    change: row.change,
                    reason: row.reason.parse().map_err(StoreError::Corrupt)?,
                    booking_id: row.booking_id.map(BookingId::from_uuid),
                    created_at: row.created_at,
                })
            })
            .collect()
    }

    async fn insert_notification_once(
        &mut self,
        notification: &SiteNotification,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            r"
            INSERT INTO site_notifications (id, event_id, kind, message, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (event_id, kind) DO NOTHING
            ",
        )
        .bind(notification.id.as_uuid())
        .bind(notification.event_id.as_uuid())
        .bind(notification.kind.as_str())
        .bind(&notification.message)
        .bind(notification.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db("Failed to insert notification"))?;
        Ok(result.rows_affected() == 1)
    }

    async fn commit(self) -> StoreResult<()> {
        self.tx
            .commit()
            .await
            .map_err(db("Failed to commit transaction"))
    }
}
