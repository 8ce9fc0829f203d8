//! Event endpoints.

use super::ApiState;
use crate::booking::NewEvent;
use crate::notifications::ReminderIntent;
use crate::store::BookingStore;
use crate::types::{AccountId, Event, EventId, Money};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use eventhub_web::{AccountHeader, WebResult};
use serde::Deserialize;
use uuid::Uuid;

/// Request to create an event
#[derive(Debug, Deserialize)]
pub struct CreateEventBody {
    /// Event title
    pub title: String,
    /// Number of seats
    pub capacity: u32,
    /// Ticket price in paise
    pub price: Money,
    /// Last local date bookings are accepted
    #[serde(default)]
    pub registration_deadline: Option<NaiveDate>,
}

/// Create an event owned by the caller.
///
/// # Endpoint
///
/// ```text
/// POST /api/events
/// X-Account-Id: <organizer>
/// {"title": "Launch night", "capacity": 100, "price": 20000}
/// ```
pub async fn create_event<S: BookingStore>(
    State(hub): State<ApiState<S>>,
    AccountHeader(organizer): AccountHeader,
    Json(body): Json<CreateEventBody>,
) -> WebResult<(StatusCode, Json<Event>)> {
    let event = hub
        .create_event(
            AccountId::from_uuid(organizer),
            NewEvent {
                title: body.title,
                capacity: body.capacity,
                price: body.price,
                registration_deadline: body.registration_deadline,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(event)))
}

/// Queue deadline reminders for the caller.
pub async fn schedule_reminders<S: BookingStore>(
    State(hub): State<ApiState<S>>,
    AccountHeader(account): AccountHeader,
    Path(event_id): Path<Uuid>,
) -> WebResult<Json<Vec<ReminderIntent>>> {
    let queued = hub
        .schedule_deadline_reminders(EventId::from_uuid(event_id), AccountId::from_uuid(account))
        .await?;
    Ok(Json(queued))
}
