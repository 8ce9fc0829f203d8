//! Shared fixtures for the integration tests.

#![allow(dead_code, clippy::unwrap_used)]

use chrono::Duration;
use eventhub::booking::{AccountProfile, BookingReceipt, BookingRequest, NewEvent};
use eventhub::mocks::{signed_redirect, signed_webhook, MockPaymentGateway, RecordingNotifier, RecordingReminderQueue};
use eventhub::store::{BookingStore, InMemoryStore};
use eventhub::{AccountId, Config, Event, EventHub, Money};
use eventhub_testing::{test_clock, FixedClock};
use std::sync::Arc;

pub const KEY_SECRET: &str = "key-secret";
pub const WEBHOOK_SECRET: &str = "webhook-secret";

/// Configuration with live-mode keys, so refunds go through the gateway.
pub fn live_config() -> Config {
    config_with_key("rzp_live_harness")
}

/// Configuration with test-mode keys; refunds never reach the gateway.
pub fn test_mode_config() -> Config {
    config_with_key("rzp_test_harness")
}

fn config_with_key(key_id: &'static str) -> Config {
    Config::from_lookup(|key| {
        let value = match key {
            "RAZORPAY_KEY_ID" => key_id,
            "RAZORPAY_KEY_SECRET" => KEY_SECRET,
            "RAZORPAY_WEBHOOK_SECRET" => WEBHOOK_SECRET,
            "PUBLIC_BASE_URL" => "https://tickets.example.com",
            "GATEWAY_TIMEOUT_SECS" => "1",
            _ => return None,
        };
        Some(value.to_string())
    })
}

pub struct Harness<S: BookingStore = InMemoryStore> {
    pub hub: Arc<EventHub<S>>,
    pub store: S,
    pub gateway: MockPaymentGateway,
    pub notifier: RecordingNotifier,
    pub reminders: RecordingReminderQueue,
    pub clock: Arc<FixedClock>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(live_config())
    }

    pub fn with_config(config: Config) -> Self {
        Self::with_store(InMemoryStore::new(), config)
    }
}

impl<S: BookingStore + Clone> Harness<S> {
    pub fn with_store(store: S, config: Config) -> Self {
        let gateway = MockPaymentGateway::new();
        let notifier = RecordingNotifier::new();
        let reminders = RecordingReminderQueue::new();
        let clock = Arc::new(test_clock());
        let hub = EventHub::new(store.clone(), gateway.shared(), config)
            .with_clock(clock.clone())
            .with_notifier(Arc::new(notifier.clone()))
            .with_reminders(Arc::new(reminders.clone()));
        Self {
            hub: Arc::new(hub),
            store,
            gateway,
            notifier,
            reminders,
            clock,
        }
    }

    /// An event at `price_rupees` per ticket, with a fresh organizer.
    pub async fn event(&self, capacity: u32, price_rupees: u64) -> Event {
        self.hub
            .create_event(
                AccountId::new(),
                NewEvent {
                    title: "Launch night".to_string(),
                    capacity,
                    price: Money::from_rupees(price_rupees).unwrap(),
                    registration_deadline: None,
                },
            )
            .await
            .unwrap()
    }

    /// A customer with a phone and `tokens` tokens.
    pub async fn customer(&self, tokens: u64) -> AccountId {
        let id = AccountId::new();
        self.hub
            .upsert_account(AccountProfile {
                id,
                name: "Asha".to_string(),
                phone: Some("+91 98765 43210".to_string()),
            })
            .await
            .unwrap();
        if tokens > 0 {
            self.hub.grant_tokens(id, tokens).await.unwrap();
        }
        id
    }

    pub async fn book(&self, account: AccountId, event: &Event, tickets: u32, tokens: u64) -> BookingReceipt {
        let receipt = self
            .hub
            .create_booking(BookingRequest {
                account_id: account,
                event_id: event.id,
                tickets,
                tokens_to_use: tokens,
                phone: None,
            })
            .await
            .unwrap();
        // Keeps `created_at` distinct between bookings.
        self.clock.advance(Duration::seconds(1));
        receipt
    }

    /// Deliver a signed `payment.captured` webhook for the booking's link.
    pub async fn capture(&self, receipt: &BookingReceipt, payment_id: &str) -> eventhub::WebhookOutcome {
        let link = receipt.booking.payment_link_id.as_deref().unwrap();
        let (body, sig) = signed_webhook(WEBHOOK_SECRET, "payment.captured", link, payment_id);
        self.hub.handle_webhook(&body, Some(&sig)).await.unwrap()
    }

    /// Signed `paid` redirect parameters for the booking's link.
    pub fn paid_redirect(&self, receipt: &BookingReceipt, payment_id: &str) -> eventhub::RedirectParams {
        let link = receipt.booking.payment_link_id.as_deref().unwrap();
        signed_redirect(
            KEY_SECRET,
            link,
            receipt.booking.order_id.as_str(),
            "paid",
            payment_id,
        )
    }
}
