//! Shared handler state.

use std::sync::Arc;

use crate::bus::EventBus;
use crate::config::Environment;
use crate::http::auth::JwtKeys;
use crate::payments::{PaymentGateway, WebhookVerifier};
use crate::persistence::{CartRepository, OrderRepository, ProductRepository, UserRepository};
use crate::services::{CartService, CheckoutService, OrderService};

#[derive(Clone)]
pub struct AppState {
    pub carts: CartService,
    pub checkout: CheckoutService,
    pub orders: OrderService,
    pub users: Arc<dyn UserRepository>,
    pub keys: JwtKeys,
    pub webhooks: WebhookVerifier,
    pub environment: Environment,
}

impl AppState {
    /// Wires every service onto one store.
    pub fn new<S>(
        store: S,
        gateway: Arc<dyn PaymentGateway>,
        events: EventBus,
        keys: JwtKeys,
        webhooks: WebhookVerifier,
        environment: Environment,
        currency: &str,
    ) -> Self
    where
        S: UserRepository + ProductRepository + CartRepository + OrderRepository + 'static,
    {
        let store = Arc::new(store);
        Self {
            carts: CartService::new(store.clone(), store.clone()),
            checkout: CheckoutService::new(store.clone(), store.clone(), store.clone(), gateway, events.clone(), currency),
            orders: OrderService::new(store.clone(), events),
            users: store,
            keys,
            webhooks,
            environment,
        }
    }
}
