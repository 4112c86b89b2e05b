//! Persistence seams.
//!
//! Each aggregate gets a repository trait with single-document semantics:
//! reads and writes are atomic per document, never across documents. The
//! checkout workflow builds its multi-step behavior on top of these and
//! accepts that an error between two writes leaves the earlier one standing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use thiserror::Error;

use crate::domain::aggregates::{Cart, Order, Product, StatusUpdate, User};
use crate::domain::value_objects::{OrderId, ProductId, Quantity, UserId};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage error")]
    Sql(#[source] sqlx::Error),

    #[error("duplicate {0}")]
    Duplicate(&'static str),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        match &error {
            sqlx::Error::Database(db) if db.is_unique_violation() => Self::Duplicate("key"),
            _ => Self::Sql(error),
        }
    }
}

/// One-based page of a listing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub const DEFAULT_LIMIT: u32 = 10;
    pub const MAX_LIMIT: u32 = 100;

    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.filter(|l| *l > 0).unwrap_or(Self::DEFAULT_LIMIT).min(Self::MAX_LIMIT),
        }
    }

    pub fn offset(&self) -> u64 { u64::from(self.page - 1) * u64::from(self.limit) }
}

impl Default for PageRequest {
    fn default() -> Self { Self::new(None, None) }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

#[automock]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find(&self, id: UserId) -> Result<Option<User>, StoreError>;
}

#[automock]
#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn find(&self, id: ProductId) -> Result<Option<Product>, StoreError>;

    /// Adds `quantity` to the product's sold counter. Unknown ids are ignored.
    async fn increment_sold(&self, id: ProductId, quantity: Quantity) -> Result<(), StoreError>;
}

#[automock]
#[async_trait]
pub trait CartRepository: Send + Sync {
    async fn find_by_user(&self, user: UserId) -> Result<Option<Cart>, StoreError>;

    /// Stores `cart` unless the user already owns one; returns whichever won.
    async fn create_if_absent(&self, cart: Cart) -> Result<Cart, StoreError>;

    /// Replaces the user's cart with `cart`.
    async fn save(&self, cart: &Cart) -> Result<(), StoreError>;
}

#[automock]
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn insert(&self, order: &Order) -> Result<(), StoreError>;

    async fn find(&self, id: OrderId) -> Result<Option<Order>, StoreError>;

    async fn find_by_payment_intent(&self, intent_id: &str) -> Result<Option<Order>, StoreError>;

    /// Newest first.
    async fn list_for_user(&self, user: UserId, page: PageRequest) -> Result<Page<Order>, StoreError>;

    /// Persists status fields, intent id and paid timestamp. Line items are
    /// written once by `insert` and never again.
    async fn save(&self, order: &Order) -> Result<(), StoreError>;

    /// Moves the order to paid/shipped unless it is already paid. `None`
    /// means no transition happened, either because the order is gone or
    /// because another delivery got there first.
    async fn mark_paid(&self, id: OrderId, at: DateTime<Utc>) -> Result<Option<Order>, StoreError>;

    /// Moves the payment to failed unless the order is already paid. `None`
    /// when the order is gone or paid.
    async fn mark_payment_failed(&self, id: OrderId) -> Result<Option<Order>, StoreError>;

    /// Writes only the status fields present in `update`.
    async fn update_status(&self, id: OrderId, update: StatusUpdate) -> Result<Option<Order>, StoreError>;

    async fn delete(&self, id: OrderId) -> Result<bool, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_defaults() {
        let page = PageRequest::new(None, None);
        assert_eq!(page, PageRequest { page: 1, limit: 10 });
        assert_eq!(page.offset(), 0);
    }

    #[test]
    fn test_page_clamps() {
        let page = PageRequest::new(Some(0), Some(1000));
        assert_eq!(page, PageRequest { page: 1, limit: 100 });
        assert_eq!(PageRequest::new(Some(3), Some(20)).offset(), 40);
    }
}
