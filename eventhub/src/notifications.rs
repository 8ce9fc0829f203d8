//! Site notifications, ticket delivery, and registration-deadline reminders.
//!
//! Delivery itself (SMS, email, push) is behind [`Notifier`] and
//! [`ReminderQueue`]; this module decides *what* must be sent and *when*.

use crate::app::EventHub;
use crate::config::BookingPolicy;
use crate::error::{BookingError, NotificationError, StoreError};
use crate::store::{BookingStore, StoreTx};
use crate::tickets::Ticket;
use crate::types::{AccountId, Event, EventId, NotificationId, NotificationKind, SiteNotification};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use futures::future::BoxFuture;
use serde::Serialize;

/// Delivery result
pub type NotifyResult = Result<(), NotificationError>;

/// Sends tickets and site notifications.
pub trait Notifier: Send + Sync {
    /// Deliver a ticket to its holder
    fn ticket_issued(&self, ticket: Ticket) -> BoxFuture<'static, NotifyResult>;

    /// Publish a site-wide notification
    fn site_notification(&self, notification: SiteNotification) -> BoxFuture<'static, NotifyResult>;
}

/// Schedules reminders for later delivery.
pub trait ReminderQueue: Send + Sync {
    /// Queue one reminder
    fn enqueue(&self, reminder: ReminderIntent) -> BoxFuture<'static, NotifyResult>;
}

/// A reminder to register before an event's deadline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReminderIntent {
    /// Recipient
    pub account_id: AccountId,
    /// Event
    pub event_id: EventId,
    /// Event title, for the message
    pub event_title: String,
    /// Registration deadline (local date)
    pub deadline: NaiveDate,
    /// Days remaining when sent
    pub days_before: u32,
    /// When to send
    pub send_at: DateTime<Utc>,
}

/// Notifier and reminder queue that only logs. Used when no delivery
/// channel is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn ticket_issued(&self, ticket: Ticket) -> BoxFuture<'static, NotifyResult> {
        Box::pin(async move {
            tracing::info!(
                order_id = %ticket.order_id,
                contact = %ticket.contact,
                seats = ?ticket.seats,
                "Ticket issued"
            );
            Ok(())
        })
    }

    fn site_notification(&self, notification: SiteNotification) -> BoxFuture<'static, NotifyResult> {
        Box::pin(async move {
            tracing::info!(
                event_id = %notification.event_id,
                kind = ?notification.kind,
                message = %notification.message,
                "Site notification"
            );
            Ok(())
        })
    }
}

impl ReminderQueue for TracingNotifier {
    fn enqueue(&self, reminder: ReminderIntent) -> BoxFuture<'static, NotifyResult> {
        Box::pin(async move {
            tracing::info!(
                account_id = %reminder.account_id,
                event_id = %reminder.event_id,
                days_before = reminder.days_before,
                send_at = %reminder.send_at,
                "Reminder queued"
            );
            Ok(())
        })
    }
}

/// Whether `owned` paid seats out of `capacity` reach the popularity threshold.
///
/// ```
/// use eventhub::notifications::is_popular;
///
/// assert!(!is_popular(49, 100, 50));
/// assert!(is_popular(50, 100, 50));
/// assert!(!is_popular(0, 0, 50));
/// ```
#[must_use]
pub fn is_popular(owned: u32, capacity: u32, threshold_percent: u8) -> bool {
    capacity > 0 && u64::from(owned) * 100 >= u64::from(capacity) * u64::from(threshold_percent)
}

/// Send times for deadline reminders: `lead_days` before the deadline at the
/// configured local hour, dropping any not after `now`. Ascending.
#[must_use]
pub fn plan_reminders(
    deadline: NaiveDate,
    now: DateTime<Utc>,
    policy: &BookingPolicy,
) -> Vec<(u32, DateTime<Utc>)> {
    let offset = policy.local_offset();
    let mut plan: Vec<(u32, DateTime<Utc>)> = policy
        .reminder_lead_days
        .iter()
        .filter_map(|&days| {
            let date = deadline.checked_sub_signed(Duration::days(i64::from(days)))?;
            let local = date.and_hms_opt(policy.reminder_hour, 0, 0)?;
            let send_at = offset.from_local_datetime(&local).single()?.with_timezone(&Utc);
            (send_at > now).then_some((days, send_at))
        })
        .collect();
    plan.sort_by_key(|(_, at)| *at);
    plan.dedup_by_key(|(_, at)| *at);
    plan
}

pub(crate) fn new_event_notice(event: &Event, now: DateTime<Utc>) -> SiteNotification {
    SiteNotification {
        id: NotificationId::new(),
        event_id: event.id,
        kind: NotificationKind::NewEvent,
        message: format!("New event: {}", event.title),
        created_at: now,
    }
}

/// Record a popularity notification if the event just crossed the threshold.
///
/// Returns the notification when this call recorded it; `None` if the event
/// is below threshold or was already announced. Caller holds the event lock.
pub(crate) async fn evaluate_popularity<T: StoreTx>(
    tx: &mut T,
    event: &Event,
    policy: &BookingPolicy,
    now: DateTime<Utc>,
) -> Result<Option<SiteNotification>, StoreError> {
    let owned = tx.owned_seat_count(event.id).await?;
    if !is_popular(owned, event.capacity, policy.popularity_threshold_percent) {
        return Ok(None);
    }
    let notice = SiteNotification {
        id: NotificationId::new(),
        event_id: event.id,
        kind: NotificationKind::PopularEvent,
        message: format!("{} is filling up fast", event.title),
        created_at: now,
    };
    if tx.insert_notification_once(&notice).await? {
        tracing::info!(event_id = %event.id, owned, capacity = event.capacity, "Event is popular");
        Ok(Some(notice))
    } else {
        Ok(None)
    }
}

impl<S: BookingStore> EventHub<S> {
    /// Queue registration-deadline reminders for `account`.
    ///
    /// Events without a deadline get none; reminders whose send time has
    /// passed are skipped. Returns what was queued.
    ///
    /// # Errors
    ///
    /// - [`BookingError::EventNotFound`]
    /// - [`BookingError::Notification`] if the queue refuses a reminder
    pub async fn schedule_deadline_reminders(
        &self,
        event_id: EventId,
        account: AccountId,
    ) -> Result<Vec<ReminderIntent>, BookingError> {
        let event = {
            let mut tx = self.store.begin().await?;
            tx.event(event_id)
                .await?
                .ok_or(BookingError::EventNotFound(event_id))?
        };
        let Some(deadline) = event.registration_deadline else {
            return Ok(Vec::new());
        };

        let now = self.env.clock.now();
        let mut queued = Vec::new();
        for (days_before, send_at) in plan_reminders(deadline, now, &self.env.policy) {
            let reminder = ReminderIntent {
                account_id: account,
                event_id,
                event_title: event.title.clone(),
                deadline,
                days_before,
                send_at,
            };
            self.reminders.enqueue(reminder.clone()).await?;
            queued.push(reminder);
        }
        tracing::debug!(%event_id, account_id = %account, count = queued.len(), "Reminders scheduled");
        Ok(queued)
    }

    /// Deliver a site notification; failures are logged, never returned.
    pub(crate) async fn publish(&self, notification: SiteNotification) {
        let event_id = notification.event_id;
        if let Err(error) = self.notifier.site_notification(notification).await {
            tracing::warn!(%event_id, %error, "Site notification not delivered");
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn reminders_at_nine_local() {
        let policy = BookingPolicy::default();
        let deadline = NaiveDate::from_ymd_opt(2025, 3, 20).unwrap();
        let plan = plan_reminders(deadline, at(2025, 3, 1, 0, 0), &policy);

        // 09:00 IST is 03:30 UTC
        assert_eq!(
            plan,
            vec![
                (10, at(2025, 3, 10, 3, 30)),
                (5, at(2025, 3, 15, 3, 30)),
                (1, at(2025, 3, 19, 3, 30)),
            ]
        );
    }

    #[test]
    fn past_reminders_are_dropped() {
        let policy = BookingPolicy::default();
        let deadline = NaiveDate::from_ymd_opt(2025, 3, 20).unwrap();

        let plan = plan_reminders(deadline, at(2025, 3, 16, 0, 0), &policy);
        assert_eq!(plan, vec![(1, at(2025, 3, 19, 3, 30))]);

        assert!(plan_reminders(deadline, at(2025, 3, 19, 3, 30), &policy).is_empty());
    }

    #[test]
    fn popularity_threshold() {
        assert!(is_popular(3, 5, 50));
        assert!(!is_popular(2, 5, 50));
        assert!(is_popular(1, 1, 100));
    }
}
