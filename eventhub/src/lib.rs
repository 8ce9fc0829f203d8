//! EventHub: event ticketing with seat allocation, payment reconciliation,
//! cancellations with partial refunds, and loyalty tokens.
//!
//! # Architecture
//!
//! ```text
//!   HTTP (axum)          webhook ─┐   redirect ─┐
//!        │                        ▼             ▼
//!        ▼                  ┌──────────────────────┐
//!  ┌───────────┐            │   reconciliation     │  signature check,
//!  │ EventHub  │◀───────────│  (confirm / fail)    │  idempotent capture
//!  └───────────┘            └──────────────────────┘
//!        │
//!        ▼
//!  ┌──────────────────┐   effects   ┌──────────────────────────────┐
//!  │  BookingReducer  │────────────▶│ seats · tokens · popularity  │  same transaction
//!  │  (pure policy)   │             └──────────────────────────────┘
//!  └──────────────────┘                          │ commit
//!                                                ▼
//!                                 gateway · notifier · reminders   after commit
//! ```
//!
//! # Key guarantees
//!
//! ## 1. No double booking
//!
//! Seats are assigned while the event row is locked, so concurrent bookings
//! of one event serialize and a seat belongs to at most one booking.
//!
//! ## 2. Exactly-once settlement
//!
//! The webhook and the customer redirect may both report the same payment.
//! Whichever locks the booking first moves it to paid and settles tokens;
//! the other finds it paid and only tops up missing seats.
//!
//! ## 3. Nothing half-done
//!
//! A failed operation leaves no trace: provider calls happen only after the
//! local transaction has committed.
//!
//! # Usage
//!
//! Build an [`EventHub`] over a [`store::BookingStore`] and a
//! [`gateway::PaymentGateway`], then serve [`api::router`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod app;
pub mod booking;
pub mod cancellation;
pub mod config;
pub mod error;
pub mod gateway;
pub mod metrics;
#[cfg(feature = "test-utils")]
pub mod mocks;
pub mod notifications;
pub mod reconciliation;
pub mod seats;
pub mod store;
pub mod tickets;
pub mod tokens;
pub mod types;

pub use app::EventHub;
pub use booking::{BookingReceipt, BookingRequest, NewEvent};
pub use cancellation::{CancellationReceipt, RefundOutcome};
pub use config::Config;
pub use error::{BookingError, ErrorKind};
pub use reconciliation::{RedirectOutcome, RedirectParams, WebhookOutcome};
pub use types::*;
