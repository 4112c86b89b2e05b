//! Order history and administration.

use std::sync::Arc;

use tracing::info;

use super::ServiceError;
use crate::bus::EventBus;
use crate::domain::aggregates::{Order, StatusUpdate, User};
use crate::domain::events::OrderEvent;
use crate::domain::value_objects::{OrderId, UserId};
use crate::persistence::{OrderRepository, Page, PageRequest};

#[derive(Clone)]
pub struct OrderService {
    orders: Arc<dyn OrderRepository>,
    events: EventBus,
}

impl OrderService {
    pub fn new(orders: Arc<dyn OrderRepository>, events: EventBus) -> Self {
        Self { orders, events }
    }

    pub async fn list(&self, user: UserId, page: PageRequest) -> Result<Page<Order>, ServiceError> {
        Ok(self.orders.list_for_user(user, page).await?)
    }

    pub async fn get(&self, caller: &User, id: OrderId) -> Result<Order, ServiceError> {
        let order = self.orders.find(id).await?.ok_or(ServiceError::NotFound("Order"))?;
        order.ensure_visible_to(caller)?;
        Ok(order)
    }

    /// Admin override of the status fields. Fields the update leaves out are
    /// not written, so a concurrent settlement keeps its paid state.
    pub async fn update_status(&self, caller: &User, id: OrderId, update: StatusUpdate) -> Result<Order, ServiceError> {
        if !caller.is_admin() {
            return Err(ServiceError::Forbidden);
        }
        let order = self.orders.update_status(id, update).await?.ok_or(ServiceError::NotFound("Order"))?;
        info!(order = %id, status = %order.order_status(), payment = %order.payment_status(), admin = %caller.id, "order status updated");
        self.events.publish(OrderEvent::status_updated(&order)).await;
        Ok(order)
    }

    pub async fn delete(&self, caller: &User, id: OrderId) -> Result<(), ServiceError> {
        let order = self.orders.find(id).await?.ok_or(ServiceError::NotFound("Order"))?;
        order.ensure_deletable_by(caller)?;
        if !self.orders.delete(id).await? {
            return Err(ServiceError::NotFound("Order"));
        }
        info!(order = %id, by = %caller.id, "order deleted");
        self.events.publish(OrderEvent::deleted(&order)).await;
        Ok(())
    }
}
