//! Application services: the workflows behind the HTTP handlers.

use thiserror::Error;

use crate::domain::aggregates::{CartError, OrderError};
use crate::payments::GatewayError;
use crate::persistence::StoreError;

pub mod cart;
pub mod checkout;
pub mod orders;

pub use cart::{CartService, NewCartItem};
pub use checkout::{CheckoutService, OnlineCheckout, WebhookOutcome};
pub use orders::OrderService;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error("You don't have permission to perform this action")]
    Forbidden,

    #[error("Payment not completed")]
    PaymentNotCompleted,

    #[error("Payment setup failed: {0}")]
    PaymentSetup(#[source] GatewayError),

    #[error("Payment confirmation failed: {0}")]
    PaymentConfirmation(#[source] GatewayError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
