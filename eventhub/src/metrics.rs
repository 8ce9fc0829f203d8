//! Business metrics for the booking pipeline.
//!
//! # Exported Metrics
//!
//! - `eventhub_bookings_total{status}` - Booking transitions (created, paid, failed, canceled)
//! - `eventhub_tickets_canceled_total` - Tickets canceled
//! - `eventhub_refunds_total{outcome}` - Refunds by outcome (refunded, failed, test_mode)
//! - `eventhub_signature_rejections_total{channel}` - Failed webhook/redirect authentications
//! - `eventhub_seat_allocation_faults_total` - Paid bookings left without seats
//! - `eventhub_tokens_total{direction}` - Tokens spent and earned

use metrics::describe_counter;

/// Register metric descriptions. Call once at start-up, before recording.
pub fn register_business_metrics() {
    describe_counter!(
        "eventhub_bookings_total",
        "Booking transitions by resulting status"
    );
    describe_counter!("eventhub_tickets_canceled_total", "Tickets canceled");
    describe_counter!("eventhub_refunds_total", "Refund requests by outcome");
    describe_counter!(
        "eventhub_signature_rejections_total",
        "Payment notifications rejected for a bad signature, by channel"
    );
    describe_counter!(
        "eventhub_seat_allocation_faults_total",
        "Paid bookings that could not be seated"
    );
    describe_counter!(
        "eventhub_tokens_total",
        "Loyalty tokens moved, by direction (spent, earned)"
    );

    tracing::info!("Business metrics registered");
}

/// Record a booking reaching `status`.
pub fn record_booking(status: &'static str) {
    metrics::counter!("eventhub_bookings_total", "status" => status).increment(1);
}

/// Record canceled tickets.
pub fn record_tickets_canceled(count: u32) {
    metrics::counter!("eventhub_tickets_canceled_total").increment(u64::from(count));
}

/// Record a refund outcome.
pub fn record_refund(outcome: &'static str) {
    metrics::counter!("eventhub_refunds_total", "outcome" => outcome).increment(1);
}

/// Record a rejected signature on `channel` (`webhook` or `redirect`).
pub fn record_signature_rejection(channel: &'static str) {
    metrics::counter!("eventhub_signature_rejections_total", "channel" => channel).increment(1);
}

/// Record a paid booking that could not be seated.
pub fn record_allocation_fault() {
    metrics::counter!("eventhub_seat_allocation_faults_total").increment(1);
}

/// Record tokens moving in `direction` (`spent` or `earned`).
pub fn record_tokens(direction: &'static str, amount: u64) {
    if amount > 0 {
        metrics::counter!("eventhub_tokens_total", "direction" => direction).increment(amount);
    }
}
