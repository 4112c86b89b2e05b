//! Checkout and payment settlement.
//!
//! An order is settled at most once: whichever of the confirmation call or
//! the gateway webhook wins the conditional `mark_paid` write performs the
//! fulfilment (cart clearing, sold counters). Every other path observes the
//! order as already paid and does nothing.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, instrument, warn};

use super::ServiceError;
use crate::bus::EventBus;
use crate::domain::aggregates::{Order, OrderError, OrderItem, PaymentMethod, ShippingAddress};
use crate::domain::events::OrderEvent;
use crate::domain::value_objects::{OrderId, UserId};
use crate::payments::{GatewayError, GatewayEvent, NewPaymentIntent, PaymentGateway};
use crate::persistence::{CartRepository, OrderRepository, ProductRepository};

#[derive(Clone, Debug)]
pub struct OnlineCheckout {
    pub order: Order,
    pub client_secret: String,
    pub payment_intent_id: String,
}

/// What a gateway event did to the order it refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WebhookOutcome {
    Settled,
    AlreadySettled,
    MarkedFailed,
    UnknownOrder,
    Ignored,
}

#[derive(Clone)]
pub struct CheckoutService {
    carts: Arc<dyn CartRepository>,
    products: Arc<dyn ProductRepository>,
    orders: Arc<dyn OrderRepository>,
    gateway: Arc<dyn PaymentGateway>,
    events: EventBus,
    currency: String,
}

impl CheckoutService {
    pub fn new(
        carts: Arc<dyn CartRepository>,
        products: Arc<dyn ProductRepository>,
        orders: Arc<dyn OrderRepository>,
        gateway: Arc<dyn PaymentGateway>,
        events: EventBus,
        currency: impl Into<String>,
    ) -> Self {
        Self { carts, products, orders, gateway, events, currency: currency.into() }
    }

    /// Places an order from the user's cart. Cash orders are fulfilled and
    /// shipped immediately; online orders wait for payment.
    #[instrument(skip(self, shipping))]
    pub async fn place_order(&self, user: UserId, shipping: ShippingAddress, method: Option<PaymentMethod>) -> Result<Order, ServiceError> {
        let method = method.unwrap_or_default();
        let mut order = self.open_order(user, shipping, method).await?;
        if method == PaymentMethod::Cash {
            self.fulfil(&order).await?;
            order.ship();
            self.orders.save(&order).await?;
        }
        Ok(order)
    }

    /// Places an online order and opens a payment intent for its total.
    ///
    /// A gateway failure leaves the order in place, pending and without an
    /// intent; the cart is untouched.
    #[instrument(skip(self, shipping))]
    pub async fn place_online_order(&self, user: UserId, shipping: ShippingAddress) -> Result<OnlineCheckout, ServiceError> {
        let mut order = self.open_order(user, shipping, PaymentMethod::Online).await?;

        let amount = order
            .total_amount()
            .to_minor_units()
            .ok_or_else(|| ServiceError::PaymentSetup(GatewayError::Api(format!("amount {} out of range", order.total_amount()))))?;
        let metadata = BTreeMap::from([
            ("orderId".to_string(), order.id().to_string()),
            ("userId".to_string(), user.to_string()),
            ("orderNumber".to_string(), order.order_number().to_string()),
        ]);
        let request = NewPaymentIntent { amount, currency: self.currency.clone(), metadata };

        let intent = self.gateway.create_intent(request).await.map_err(|err| {
            error!(order = %order.id(), error = %err, "payment intent creation failed");
            ServiceError::PaymentSetup(err)
        })?;
        let Some(client_secret) = intent.client_secret else {
            return Err(ServiceError::PaymentSetup(GatewayError::MissingClientSecret(intent.id)));
        };

        order.attach_payment_intent(intent.id.clone());
        self.orders.save(&order).await?;
        info!(order = %order.id(), intent = %intent.id, "payment intent attached");

        Ok(OnlineCheckout { order, client_secret, payment_intent_id: intent.id })
    }

    /// Client-driven settlement after the payment form completes.
    /// Confirming an order that is already paid returns it unchanged.
    #[instrument(skip(self))]
    pub async fn confirm_payment(&self, user: UserId, intent_id: &str) -> Result<Order, ServiceError> {
        let intent = self.gateway.retrieve_intent(intent_id).await.map_err(|err| {
            error!(intent = intent_id, error = %err, "payment intent lookup failed");
            ServiceError::PaymentConfirmation(err)
        })?;
        if !intent.status.settles_order() {
            return Err(ServiceError::PaymentNotCompleted);
        }

        let order = self
            .orders
            .find_by_payment_intent(intent_id)
            .await?
            .filter(|order| order.is_owned_by(user))
            .ok_or(ServiceError::NotFound("Order"))?;
        if order.is_paid() {
            return Ok(order);
        }

        match self.settle(order.id()).await? {
            Some(paid) => Ok(paid),
            None => Ok(self.orders.find(order.id()).await?.unwrap_or(order)),
        }
    }

    /// Applies a verified gateway event. Events for unknown intents are
    /// acknowledged without effect so the gateway stops retrying them.
    #[instrument(skip(self))]
    pub async fn handle_gateway_event(&self, event: GatewayEvent) -> Result<WebhookOutcome, ServiceError> {
        match event {
            GatewayEvent::PaymentSucceeded { intent_id } => {
                let Some(order) = self.orders.find_by_payment_intent(&intent_id).await? else {
                    warn!(intent = %intent_id, "payment succeeded for unknown intent");
                    return Ok(WebhookOutcome::UnknownOrder);
                };
                if order.is_paid() {
                    return Ok(WebhookOutcome::AlreadySettled);
                }
                Ok(match self.settle(order.id()).await? {
                    Some(_) => WebhookOutcome::Settled,
                    None => WebhookOutcome::AlreadySettled,
                })
            }
            GatewayEvent::PaymentFailed { intent_id } => {
                let Some(order) = self.orders.find_by_payment_intent(&intent_id).await? else {
                    warn!(intent = %intent_id, "payment failed for unknown intent");
                    return Ok(WebhookOutcome::UnknownOrder);
                };
                // paid is terminal; the store refuses the write if a settlement got in first
                let Some(failed) = self.orders.mark_payment_failed(order.id()).await? else {
                    warn!(order = %order.id(), "ignoring failure event for a paid order");
                    return Ok(WebhookOutcome::AlreadySettled);
                };
                info!(order = %failed.id(), "payment failed");
                self.events.publish(OrderEvent::payment_failed(&failed)).await;
                Ok(WebhookOutcome::MarkedFailed)
            }
            GatewayEvent::Ignored { kind } => {
                debug!(%kind, "unhandled gateway event");
                Ok(WebhookOutcome::Ignored)
            }
        }
    }

    /// Snapshots the cart into a new order and stores it. The cart itself is
    /// left alone.
    async fn open_order(&self, user: UserId, shipping: ShippingAddress, method: PaymentMethod) -> Result<Order, ServiceError> {
        let cart = self
            .carts
            .find_by_user(user)
            .await?
            .filter(|cart| !cart.is_empty())
            .ok_or(OrderError::EmptyCart)?;

        let mut items = Vec::with_capacity(cart.items().len());
        for line in cart.items() {
            let product = self.products.find(line.product_id).await?.ok_or(ServiceError::NotFound("Product"))?;
            items.push(OrderItem::from_cart_line(line, product.seller_id));
        }

        let order = Order::place(user, items, cart.total_price(), method, shipping)?;
        self.orders.insert(&order).await?;
        info!(order = %order.id(), number = %order.order_number(), %method, total = %order.total_amount(), "order placed");
        self.events.publish(OrderEvent::placed(&order)).await;
        Ok(order)
    }

    /// Performs the paid transition. `None` when another caller already did.
    async fn settle(&self, id: OrderId) -> Result<Option<Order>, ServiceError> {
        let Some(paid) = self.orders.mark_paid(id, Utc::now()).await? else {
            debug!(order = %id, "order already settled");
            return Ok(None);
        };
        info!(order = %id, "order paid");
        self.fulfil(&paid).await?;
        self.events.publish(OrderEvent::paid(&paid)).await;
        Ok(Some(paid))
    }

    /// Empties the buyer's cart and credits every ordered line to its
    /// product's sold counter.
    async fn fulfil(&self, order: &Order) -> Result<(), ServiceError> {
        if let Some(mut cart) = self.carts.find_by_user(order.user_id()).await? {
            cart.clear();
            self.carts.save(&cart).await?;
        }
        for item in order.items() {
            self.products.increment_sold(item.product_id, item.quantity).await?;
        }
        Ok(())
    }
}
