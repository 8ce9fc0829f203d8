//! HTTP API.
//!
//! A thin shell over [`EventHub`]: handlers extract, call one operation, and
//! map [`BookingError`](crate::error::BookingError) to
//! [`AppError`](eventhub_web::AppError). The caller is identified by the
//! `X-Account-Id` header.
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | GET  | `/health` | liveness |
//! | POST | `/api/events` | [`EventHub::create_event`] |
//! | POST | `/api/events/:id/bookings` | [`EventHub::create_booking`] |
//! | POST | `/api/events/:id/reminders` | [`EventHub::schedule_deadline_reminders`] |
//! | POST | `/api/bookings/:id/payment-link` | [`EventHub::retry_payment_link`] |
//! | POST | `/api/bookings/:id/cancel` | [`EventHub::cancel_tickets`] |
//! | GET  | `/api/bookings/:id/ticket` | [`EventHub::ticket`] |
//! | PUT  | `/api/accounts/:id` | [`EventHub::upsert_account`] |
//! | GET  | `/api/accounts/:id/tokens` | [`EventHub::token_history`] |
//! | POST | `/payments/webhook` | [`EventHub::handle_webhook`] |
//! | GET  | `/payments/callback` | [`EventHub::handle_redirect`] |
//! | POST | `/tickets/:order_id/verify` | [`EventHub::check_in`] |

mod accounts;
mod bookings;
mod error;
mod events;
mod payments;

use crate::app::EventHub;
use crate::store::BookingStore;
use axum::{
    routing::{get, post, put},
    Router,
};
use eventhub_web::handlers::health_check;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared handler state
pub type ApiState<S> = Arc<EventHub<S>>;

/// Build the router.
pub fn router<S: BookingStore>(hub: ApiState<S>) -> Router {
    let api_routes = Router::new()
        .route("/events", post(events::create_event::<S>))
        .route("/events/:id/bookings", post(bookings::create_booking::<S>))
        .route("/events/:id/reminders", post(events::schedule_reminders::<S>))
        .route("/bookings/:id/payment-link", post(bookings::retry_payment_link::<S>))
        .route("/bookings/:id/cancel", post(bookings::cancel::<S>))
        .route("/bookings/:id/ticket", get(bookings::ticket::<S>))
        .route("/accounts/:id", put(accounts::upsert::<S>))
        .route("/accounts/:id/tokens", get(accounts::tokens::<S>));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes)
        .route("/payments/webhook", post(payments::webhook::<S>))
        .route("/payments/callback", get(payments::callback::<S>))
        .route("/tickets/:order_id/verify", post(bookings::verify::<S>))
        .layer(TraceLayer::new_for_http())
        .with_state(hub)
}
