//! Axum integration for EventHub.
//!
//! The booking pipeline is a functional core (reducers) wrapped in an
//! imperative shell (storage, payment provider, HTTP). This crate holds the
//! HTTP pieces that do not depend on the pipeline itself.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         Imperative Shell (Axum)         │  ← extractors, AppError
//! ├─────────────────────────────────────────┤
//! │         Application service             │  ← transactions, gateway calls
//! ├─────────────────────────────────────────┤
//! │         Functional Core                 │  ← reducers, pure policy
//! └─────────────────────────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;

pub use error::AppError;
pub use extractors::{AccountHeader, CorrelationId, MaybeAccount, ACCOUNT_HEADER};

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
