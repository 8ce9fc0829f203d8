//! Concurrent bookings and duplicate payment notifications.

#![allow(clippy::unwrap_used)]

mod common;

use common::Harness;
use eventhub::booking::BookingRequest;
use eventhub::{BookingError, PaymentStatus, TokenReason, WebhookOutcome};
use futures::future::join_all;
use std::collections::HashSet;

#[tokio::test]
async fn concurrent_bookings_never_share_a_seat() {
    let h = Harness::new();
    let event = h.event(5, 100).await;
    let mut customers = Vec::new();
    for _ in 0..10 {
        customers.push(h.customer(100).await);
    }

    // Token-covered bookings are seated inside the booking transaction.
    let attempts = customers.iter().map(|&account_id| {
        h.hub.create_booking(BookingRequest {
            account_id,
            event_id: event.id,
            tickets: 1,
            tokens_to_use: 100,
            phone: None,
        })
    });
    let results = join_all(attempts).await;

    let seated: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(seated.len(), 5);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, BookingError::SoldOut)));

    let seats: HashSet<u32> = seated.iter().flat_map(|r| r.seats.iter().copied()).collect();
    assert_eq!(seats, (1..=5).collect());

    let owners: HashSet<_> = h
        .store
        .seat_map(event.id)
        .await
        .into_iter()
        .filter_map(|(_, owner)| owner)
        .collect();
    assert_eq!(owners.len(), 5);
}

#[tokio::test]
async fn overbooked_captures_fault_instead_of_double_seating() {
    let h = Harness::new();
    let event = h.event(3, 100).await;
    let first = h.customer(0).await;
    let second = h.customer(0).await;

    // Both fit at booking time; seats are only taken on payment.
    let a = h.book(first, &event, 2, 0).await;
    let b = h.book(second, &event, 2, 0).await;

    let (body_a, sig_a) = eventhub::mocks::signed_webhook(
        common::WEBHOOK_SECRET,
        "payment.captured",
        a.booking.payment_link_id.as_deref().unwrap(),
        "pay_a",
    );
    let (body_b, sig_b) = eventhub::mocks::signed_webhook(
        common::WEBHOOK_SECRET,
        "payment.captured",
        b.booking.payment_link_id.as_deref().unwrap(),
        "pay_b",
    );
    let (ra, rb) = tokio::join!(
        h.hub.handle_webhook(&body_a, Some(&sig_a)),
        h.hub.handle_webhook(&body_b, Some(&sig_b)),
    );
    let outcomes = [ra.unwrap(), rb.unwrap()];

    let confirmed = outcomes
        .iter()
        .filter(|o| matches!(o, WebhookOutcome::Confirmed { .. }))
        .count();
    let faulted = outcomes
        .iter()
        .filter(|o| matches!(o, WebhookOutcome::SeatingFailed { .. }))
        .count();
    assert_eq!((confirmed, faulted), (1, 1));

    let owned = h
        .store
        .seat_map(event.id)
        .await
        .into_iter()
        .filter(|(_, owner)| owner.is_some())
        .count();
    assert_eq!(owned, 2);
    // Only the seated booking gets a ticket.
    assert_eq!(h.notifier.tickets().len(), 1);
}

#[tokio::test]
async fn webhook_and_redirect_settle_once() {
    let h = Harness::new();
    let event = h.event(10, 1000).await;
    let customer = h.customer(0).await;
    let receipt = h.book(customer, &event, 1, 0).await;
    let params = h.paid_redirect(&receipt, "pay_1");

    let (webhook, redirect) = tokio::join!(
        h.capture(&receipt, "pay_1"),
        h.hub.handle_redirect(&params, Some(customer)),
    );
    let redirect = redirect.unwrap();

    let webhook_confirmed = matches!(webhook, WebhookOutcome::Confirmed { .. });
    assert!(webhook_confirmed ^ redirect.confirmed_now);
    assert_eq!(redirect.booking.payment_status, PaymentStatus::Paid);
    assert_eq!(redirect.seats, vec![1]);

    let statement = h.hub.token_history(customer).await.unwrap();
    let earned: Vec<_> = statement
        .history
        .iter()
        .filter(|t| t.reason == TokenReason::Earned)
        .collect();
    assert_eq!(earned.len(), 1);
    assert_eq!(statement.balance, 20);
    assert_eq!(h.notifier.tickets().len(), 1);
}

#[test]
fn duplicate_webhooks_on_a_blocking_runtime() {
    let h = Harness::new();
    tokio_test::block_on(async {
        let event = h.event(4, 100).await;
        let customer = h.customer(0).await;
        let receipt = h.book(customer, &event, 2, 0).await;

        let outcomes = join_all((0..4).map(|_| h.capture(&receipt, "pay_1"))).await;
        let confirmed = outcomes
            .iter()
            .filter(|o| matches!(o, WebhookOutcome::Confirmed { .. }))
            .count();
        assert_eq!(confirmed, 1);
        assert_eq!(h.notifier.tickets().len(), 1);
    });
}
