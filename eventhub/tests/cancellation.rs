//! Cancellations: seat release, proportional refunds, provider failures.

#![allow(clippy::unwrap_used)]

mod common;

use common::{test_mode_config, Harness};
use eventhub::booking::BookingReceipt;
use eventhub::error::GatewayError;
use eventhub::{AccountId, BookingError, Money, PaymentStatus, RefundOutcome, RefundStatus};

async fn paid_booking(h: &Harness, tickets: u32) -> (AccountId, BookingReceipt) {
    let event = h.event(10, 200).await;
    let customer = h.customer(0).await;
    let receipt = h.book(customer, &event, tickets, 0).await;
    h.capture(&receipt, "pay_1").await;
    (customer, receipt)
}

#[tokio::test]
async fn partial_then_full_cancellation() {
    let h = Harness::new();
    let (customer, receipt) = paid_booking(&h, 5).await;
    let id = receipt.booking.id;

    // ₹1000 for 5, cancel 2, 10% fee: 1000 × 2/5 × 0.9 = ₹360
    let first = h.hub.cancel_tickets(id, customer, 2).await.unwrap();
    assert_eq!(first.released_seats, vec![4, 5]);
    assert_eq!(
        first.refund,
        RefundOutcome::Refunded {
            amount: Money::from_rupees(360).unwrap(),
            refund_id: Some("rfnd_1".into()),
        }
    );
    assert_eq!(first.booking.payment_status, PaymentStatus::Paid);
    assert_eq!(first.booking.active_tickets(), 3);
    assert_eq!(first.booking.refund_status, RefundStatus::Refunded);

    let rest = h.hub.cancel_tickets(id, customer, 3).await.unwrap();
    assert_eq!(rest.released_seats, vec![1, 2, 3]);
    assert_eq!(rest.booking.payment_status, PaymentStatus::Canceled);
    assert_eq!(rest.booking.refund_amount, Money::from_rupees(900).unwrap());

    assert_eq!(
        h.gateway.refunds(),
        vec![
            ("pay_1".to_string(), Money::from_rupees(360).unwrap()),
            ("pay_1".to_string(), Money::from_rupees(540).unwrap()),
        ]
    );
    assert!(h
        .store
        .seat_map(receipt.booking.event_id)
        .await
        .iter()
        .all(|(_, owner)| owner.is_none()));

    // Canceling a canceled booking changes nothing.
    let again = h.hub.cancel_tickets(id, customer, 1).await.unwrap();
    assert_eq!(again.refund, RefundOutcome::NotApplicable);
    assert!(again.released_seats.is_empty());
    assert_eq!(h.gateway.refunds().len(), 2);
}

#[tokio::test]
async fn invalid_cancellations_are_rejected() {
    let h = Harness::new();
    let (customer, receipt) = paid_booking(&h, 2).await;
    let id = receipt.booking.id;

    assert!(matches!(
        h.hub.cancel_tickets(id, customer, 3).await,
        Err(BookingError::InvalidCancelCount { requested: 3, active: 2 })
    ));
    assert!(matches!(
        h.hub.cancel_tickets(id, customer, 0).await,
        Err(BookingError::InvalidCancelCount { .. })
    ));
    assert!(matches!(
        h.hub.cancel_tickets(id, AccountId::new(), 1).await,
        Err(BookingError::Forbidden)
    ));

    let event = h.event(5, 100).await;
    let pending = h.book(customer, &event, 1, 0).await;
    assert!(matches!(
        h.hub.cancel_tickets(pending.booking.id, customer, 1).await,
        Err(BookingError::NotCancelable(PaymentStatus::Pending))
    ));
    assert!(h.gateway.refunds().is_empty());
}

#[tokio::test]
async fn rejected_refund_is_kept_for_follow_up() {
    let h = Harness::new();
    let (customer, receipt) = paid_booking(&h, 5).await;
    h.gateway.fail_next_refund(GatewayError::Rejected {
        status: 400,
        message: "insufficient balance".into(),
    });

    let result = h.hub.cancel_tickets(receipt.booking.id, customer, 2).await.unwrap();
    assert!(matches!(result.refund, RefundOutcome::Failed { .. }));
    assert_eq!(result.booking.refund_status, RefundStatus::Failed);
    assert_eq!(result.booking.refund_amount, Money::ZERO);
    assert_eq!(result.booking.refund_outstanding, Money::from_rupees(360).unwrap());
    // Seats are freed regardless of the refund.
    assert_eq!(result.released_seats, vec![4, 5]);
}

#[tokio::test]
async fn token_only_booking_cancels_without_refund() {
    let h = Harness::new();
    let event = h.event(10, 100).await;
    let customer = h.customer(300).await;
    let receipt = h.book(customer, &event, 2, 200).await;
    assert_eq!(receipt.booking.payment_status, PaymentStatus::Paid);

    let result = h.hub.cancel_tickets(receipt.booking.id, customer, 2).await.unwrap();
    assert_eq!(result.refund, RefundOutcome::NotApplicable);
    assert_eq!(result.released_seats, vec![1, 2]);
    assert!(h.gateway.refunds().is_empty());
}

#[tokio::test]
async fn test_mode_refunds_skip_the_provider() {
    let h = Harness::with_config(test_mode_config());
    let (customer, receipt) = paid_booking(&h, 5).await;

    let result = h.hub.cancel_tickets(receipt.booking.id, customer, 5).await.unwrap();
    assert_eq!(
        result.refund,
        RefundOutcome::Refunded {
            amount: Money::from_rupees(900).unwrap(),
            refund_id: None,
        }
    );
    assert!(h.gateway.refunds().is_empty());
}
