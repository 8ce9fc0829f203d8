//! Booking, cancellation and ticket endpoints.

use super::ApiState;
use crate::booking::{BookingReceipt, BookingRequest};
use crate::cancellation::CancellationReceipt;
use crate::store::BookingStore;
use crate::tickets::{CheckIn, Ticket};
use crate::types::{AccountId, BookingId, EventId, OrderId};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use eventhub_web::{AccountHeader, AppError, CorrelationId, WebResult};
use serde::Deserialize;
use uuid::Uuid;

/// Request to book tickets
#[derive(Debug, Deserialize)]
pub struct CreateBookingBody {
    /// Tickets wanted
    pub tickets: u32,
    /// Tokens to spend on the total
    #[serde(default)]
    pub tokens_to_use: u64,
    /// Contact phone; the account's phone if omitted
    #[serde(default)]
    pub phone: Option<String>,
}

/// Request to cancel tickets
#[derive(Debug, Deserialize)]
pub struct CancelBody {
    /// Tickets to cancel
    pub count: u32,
}

/// Book tickets.
///
/// # Endpoint
///
/// ```text
/// POST /api/events/:id/bookings
/// X-Account-Id: <customer>
/// {"tickets": 2, "tokens_to_use": 50}
/// ```
///
/// 201 with the booking and either a payment URL or, for fully discounted
/// bookings, the allocated seats.
pub async fn create_booking<S: BookingStore>(
    State(hub): State<ApiState<S>>,
    AccountHeader(account): AccountHeader,
    correlation_id: CorrelationId,
    Path(event_id): Path<Uuid>,
    Json(body): Json<CreateBookingBody>,
) -> WebResult<(StatusCode, Json<BookingReceipt>)> {
    tracing::debug!(correlation_id = %correlation_id.0, %event_id, tickets = body.tickets, "Booking requested");
    let receipt = hub
        .create_booking(BookingRequest {
            account_id: AccountId::from_uuid(account),
            event_id: EventId::from_uuid(event_id),
            tickets: body.tickets,
            tokens_to_use: body.tokens_to_use,
            phone: body.phone,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// Get (or re-request) the payment link of a pending booking.
pub async fn retry_payment_link<S: BookingStore>(
    State(hub): State<ApiState<S>>,
    AccountHeader(account): AccountHeader,
    Path(booking_id): Path<Uuid>,
) -> WebResult<Json<BookingReceipt>> {
    let receipt = hub
        .retry_payment_link(BookingId::from_uuid(booking_id), AccountId::from_uuid(account))
        .await?;
    Ok(Json(receipt))
}

/// Cancel some or all tickets of a booking.
pub async fn cancel<S: BookingStore>(
    State(hub): State<ApiState<S>>,
    AccountHeader(account): AccountHeader,
    Path(booking_id): Path<Uuid>,
    Json(body): Json<CancelBody>,
) -> WebResult<Json<CancellationReceipt>> {
    let receipt = hub
        .cancel_tickets(BookingId::from_uuid(booking_id), AccountId::from_uuid(account), body.count)
        .await?;
    Ok(Json(receipt))
}

/// Ticket of a paid booking.
pub async fn ticket<S: BookingStore>(
    State(hub): State<ApiState<S>>,
    AccountHeader(account): AccountHeader,
    Path(booking_id): Path<Uuid>,
) -> WebResult<Json<Ticket>> {
    let ticket = hub
        .ticket(BookingId::from_uuid(booking_id), AccountId::from_uuid(account))
        .await?;
    Ok(Json(ticket))
}

/// Check a ticket in at the door. Only the event's organizer may do this.
pub async fn verify<S: BookingStore>(
    State(hub): State<ApiState<S>>,
    AccountHeader(organizer): AccountHeader,
    Path(order_id): Path<String>,
) -> WebResult<Json<CheckIn>> {
    let order_id: OrderId = order_id
        .parse()
        .map_err(|_| AppError::not_found("Ticket", &order_id))?;
    let check_in = hub.check_in(&order_id, AccountId::from_uuid(organizer)).await?;
    Ok(Json(check_in))
}
