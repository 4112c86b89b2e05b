//! Marketplace ordering backend.
//!
//! ## Features
//! - Per-user shopping carts with captured unit prices
//! - Cash and online (payment intent) checkout
//! - Payment confirmation by client call or signed gateway webhook,
//!   settling each order exactly once
//! - Order history, admin status overrides and cancellation
//! - Order lifecycle events on NATS

pub mod bus;
pub mod config;
pub mod domain;
pub mod http;
pub mod payments;
pub mod persistence;
pub mod services;

pub use config::{Config, Environment};
pub use http::{router, AppState};
