//! In-memory store for tests and local development.
//!
//! One lock guards all tables, which gives each call the same
//! single-document atomicity the PostgreSQL store provides per row.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{CartRepository, OrderRepository, Page, PageRequest, ProductRepository, StoreError, UserRepository};
use crate::domain::aggregates::{Cart, Order, Product, StatusUpdate, User};
use crate::domain::value_objects::{OrderId, ProductId, Quantity, UserId};

#[derive(Default)]
struct Tables {
    users: HashMap<UserId, User>,
    products: HashMap<ProductId, Product>,
    carts: HashMap<UserId, Cart>,
    orders: HashMap<OrderId, Order>,
}

#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self { Self::default() }

    pub async fn insert_user(&self, user: User) {
        self.tables.write().await.users.insert(user.id, user);
    }

    pub async fn insert_product(&self, product: Product) {
        self.tables.write().await.products.insert(product.id, product);
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn find(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }
}

#[async_trait]
impl ProductRepository for InMemoryStore {
    async fn find(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        Ok(self.tables.read().await.products.get(&id).cloned())
    }

    async fn increment_sold(&self, id: ProductId, quantity: Quantity) -> Result<(), StoreError> {
        if let Some(product) = self.tables.write().await.products.get_mut(&id) {
            product.sold += u64::from(quantity.value());
            product.updated_at = Utc::now();
        }
        Ok(())
    }
}

#[async_trait]
impl CartRepository for InMemoryStore {
    async fn find_by_user(&self, user: UserId) -> Result<Option<Cart>, StoreError> {
        Ok(self.tables.read().await.carts.get(&user).cloned())
    }

    async fn create_if_absent(&self, cart: Cart) -> Result<Cart, StoreError> {
        let mut tables = self.tables.write().await;
        Ok(tables.carts.entry(cart.user_id()).or_insert(cart).clone())
    }

    async fn save(&self, cart: &Cart) -> Result<(), StoreError> {
        self.tables.write().await.carts.insert(cart.user_id(), cart.clone());
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn insert(&self, order: &Order) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.orders.contains_key(&order.id) {
            return Err(StoreError::Duplicate("order id"));
        }
        if tables.orders.values().any(|o| o.order_number == order.order_number) {
            return Err(StoreError::Duplicate("order number"));
        }
        tables.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn find(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        Ok(self.tables.read().await.orders.get(&id).cloned())
    }

    async fn find_by_payment_intent(&self, intent_id: &str) -> Result<Option<Order>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.orders.values().find(|o| o.payment_intent_id() == Some(intent_id)).cloned())
    }

    async fn list_for_user(&self, user: UserId, page: PageRequest) -> Result<Page<Order>, StoreError> {
        let tables = self.tables.read().await;
        let mut owned: Vec<&Order> = tables.orders.values().filter(|o| o.is_owned_by(user)).collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        let total = owned.len() as u64;
        let skip = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        let items = owned.into_iter().skip(skip).take(page.limit as usize).cloned().collect();
        Ok(Page { items, total })
    }

    async fn save(&self, order: &Order) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if let Some(intent) = order.payment_intent_id() {
            if tables.orders.values().any(|o| o.id != order.id && o.payment_intent_id() == Some(intent)) {
                return Err(StoreError::Duplicate("payment intent"));
            }
        }
        if let Some(stored) = tables.orders.get_mut(&order.id) {
            stored.payment_status = order.payment_status;
            stored.order_status = order.order_status;
            stored.payment_intent_id = order.payment_intent_id.clone();
            stored.paid_at = order.paid_at;
            stored.updated_at = order.updated_at;
        }
        Ok(())
    }

    async fn mark_paid(&self, id: OrderId, at: DateTime<Utc>) -> Result<Option<Order>, StoreError> {
        let mut tables = self.tables.write().await;
        Ok(tables.orders.get_mut(&id).and_then(|order| order.mark_paid(at).then(|| order.clone())))
    }

    async fn mark_payment_failed(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(order) = tables.orders.get_mut(&id).filter(|order| !order.is_paid()) else {
            return Ok(None);
        };
        order.mark_payment_failed();
        Ok(Some(order.clone()))
    }

    async fn update_status(&self, id: OrderId, update: StatusUpdate) -> Result<Option<Order>, StoreError> {
        let mut tables = self.tables.write().await;
        Ok(tables.orders.get_mut(&id).map(|order| {
            order.apply(update);
            order.clone()
        }))
    }

    async fn delete(&self, id: OrderId) -> Result<bool, StoreError> {
        Ok(self.tables.write().await.orders.remove(&id).is_some())
    }
}
