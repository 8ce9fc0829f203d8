//! HTTP handlers shared by every EventHub service.

pub mod health;

pub use health::health_check;
