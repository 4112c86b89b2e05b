//! PostgreSQL store.
//!
//! Line items live in JSONB columns so that carts and orders stay single-row
//! documents and every write below touches exactly one row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{CartRepository, OrderRepository, Page, PageRequest, ProductRepository, StoreError, UserRepository};
use crate::domain::aggregates::user::UnknownRole;
use crate::domain::aggregates::{Cart, CartItem, Order, OrderError, OrderItem, Product, ShippingAddress, StatusUpdate, User};
use crate::domain::value_objects::{CartId, Money, OrderId, OrderNumber, ProductId, Quantity, UserId};

const ORDER_COLUMNS: &str = "id, order_number, user_id, items, total_amount, payment_method, payment_status, order_status, payment_intent_id, paid_at, shipping_address, created_at, updated_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }
}

#[derive(FromRow)]
struct UserRow { id: Uuid, name: String, email: String, role: String, is_active: bool, created_at: DateTime<Utc> }

impl TryFrom<UserRow> for User {
    type Error = StoreError;
    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.id.into(), name: row.name, email: row.email,
            role: row.role.parse().map_err(|e: UnknownRole| StoreError::Corrupt(e.to_string()))?,
            is_active: row.is_active, created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct ProductRow {
    id: Uuid, seller_id: Uuid, title: String, price: Decimal, discount: Decimal, sold: i64,
    created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = StoreError;
    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        Ok(Product {
            id: row.id.into(), seller_id: row.seller_id.into(), title: row.title, price: Money::new(row.price),
            discount: row.discount,
            sold: u64::try_from(row.sold).map_err(|_| StoreError::Corrupt(format!("negative sold count on product {}", row.id)))?,
            created_at: row.created_at, updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct CartRow { id: Uuid, user_id: Uuid, items: Json<Vec<CartItem>>, created_at: DateTime<Utc>, updated_at: DateTime<Utc> }

impl From<CartRow> for Cart {
    fn from(row: CartRow) -> Self {
        Cart::restore(CartId::from_uuid(row.id), row.user_id.into(), row.items.0, row.created_at, row.updated_at)
    }
}

#[derive(FromRow)]
struct OrderRow {
    id: Uuid, order_number: String, user_id: Uuid, items: Json<Vec<OrderItem>>, total_amount: Decimal,
    payment_method: String, payment_status: String, order_status: String, payment_intent_id: Option<String>,
    paid_at: Option<DateTime<Utc>>, shipping_address: Json<ShippingAddress>, created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = StoreError;
    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let corrupt = |e: OrderError| StoreError::Corrupt(e.to_string());
        Ok(Order {
            id: row.id.into(), order_number: OrderNumber::from_stored(row.order_number), user_id: row.user_id.into(),
            items: row.items.0, total_amount: Money::new(row.total_amount),
            payment_method: row.payment_method.parse().map_err(corrupt)?,
            payment_status: row.payment_status.parse().map_err(corrupt)?,
            order_status: row.order_status.parse().map_err(corrupt)?,
            payment_intent_id: row.payment_intent_id, paid_at: row.paid_at, shipping_address: row.shipping_address.0,
            created_at: row.created_at, updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl UserRepository for PgStore {
    async fn find(&self, id: UserId) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, UserRow>("SELECT id, name, email, role, is_active, created_at FROM users WHERE id = $1")
            .bind(id.as_uuid()).fetch_optional(&self.pool).await?.map(User::try_from).transpose()
    }
}

#[async_trait]
impl ProductRepository for PgStore {
    async fn find(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        sqlx::query_as::<_, ProductRow>("SELECT id, seller_id, title, price, discount, sold, created_at, updated_at FROM products WHERE id = $1")
            .bind(id.as_uuid()).fetch_optional(&self.pool).await?.map(Product::try_from).transpose()
    }

    async fn increment_sold(&self, id: ProductId, quantity: Quantity) -> Result<(), StoreError> {
        sqlx::query("UPDATE products SET sold = sold + $2, updated_at = NOW() WHERE id = $1")
            .bind(id.as_uuid()).bind(i64::from(quantity.value())).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl CartRepository for PgStore {
    async fn find_by_user(&self, user: UserId) -> Result<Option<Cart>, StoreError> {
        let row = sqlx::query_as::<_, CartRow>("SELECT id, user_id, items, created_at, updated_at FROM carts WHERE user_id = $1")
            .bind(user.as_uuid()).fetch_optional(&self.pool).await?;
        Ok(row.map(Cart::from))
    }

    async fn create_if_absent(&self, cart: Cart) -> Result<Cart, StoreError> {
        sqlx::query("INSERT INTO carts (id, user_id, items, total_items, total_price, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7) ON CONFLICT (user_id) DO NOTHING")
            .bind(cart.id().as_uuid()).bind(cart.user_id().as_uuid()).bind(Json(cart.items())).bind(i64::try_from(cart.total_items()).unwrap_or(i64::MAX))
            .bind(cart.total_price().amount()).bind(cart.created_at()).bind(cart.updated_at())
            .execute(&self.pool).await?;
        self.find_by_user(cart.user_id()).await?.ok_or_else(|| StoreError::Corrupt(format!("cart for user {} vanished after insert", cart.user_id())))
    }

    async fn save(&self, cart: &Cart) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO carts (id, user_id, items, total_items, total_price, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7) ON CONFLICT (user_id) DO UPDATE SET items = EXCLUDED.items, total_items = EXCLUDED.total_items, total_price = EXCLUDED.total_price, updated_at = EXCLUDED.updated_at")
            .bind(cart.id().as_uuid()).bind(cart.user_id().as_uuid()).bind(Json(cart.items())).bind(i64::try_from(cart.total_items()).unwrap_or(i64::MAX))
            .bind(cart.total_price().amount()).bind(cart.created_at()).bind(cart.updated_at())
            .execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for PgStore {
    async fn insert(&self, order: &Order) -> Result<(), StoreError> {
        sqlx::query(&format!("INSERT INTO orders ({ORDER_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)"))
            .bind(order.id().as_uuid()).bind(order.order_number().as_str()).bind(order.user_id().as_uuid()).bind(Json(order.items()))
            .bind(order.total_amount().amount()).bind(order.payment_method().as_str()).bind(order.payment_status().as_str())
            .bind(order.order_status().as_str()).bind(order.payment_intent_id()).bind(order.paid_at()).bind(Json(order.shipping_address()))
            .bind(order.created_at()).bind(order.updated_at())
            .execute(&self.pool).await?;
        Ok(())
    }

    async fn find(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.as_uuid()).fetch_optional(&self.pool).await?.map(Order::try_from).transpose()
    }

    async fn find_by_payment_intent(&self, intent_id: &str) -> Result<Option<Order>, StoreError> {
        sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE payment_intent_id = $1"))
            .bind(intent_id).fetch_optional(&self.pool).await?.map(Order::try_from).transpose()
    }

    async fn list_for_user(&self, user: UserId, page: PageRequest) -> Result<Page<Order>, StoreError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"))
            .bind(user.as_uuid()).bind(i64::from(page.limit)).bind(i64::try_from(page.offset()).unwrap_or(i64::MAX))
            .fetch_all(&self.pool).await?;
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders WHERE user_id = $1").bind(user.as_uuid()).fetch_one(&self.pool).await?;
        let items = rows.into_iter().map(Order::try_from).collect::<Result<Vec<_>, _>>()?;
        Ok(Page { items, total: u64::try_from(total.0).unwrap_or_default() })
    }

    async fn save(&self, order: &Order) -> Result<(), StoreError> {
        sqlx::query("UPDATE orders SET payment_status = $2, order_status = $3, payment_intent_id = $4, paid_at = $5, updated_at = $6 WHERE id = $1")
            .bind(order.id().as_uuid()).bind(order.payment_status().as_str()).bind(order.order_status().as_str())
            .bind(order.payment_intent_id()).bind(order.paid_at()).bind(order.updated_at())
            .execute(&self.pool).await?;
        Ok(())
    }

    async fn mark_paid(&self, id: OrderId, at: DateTime<Utc>) -> Result<Option<Order>, StoreError> {
        sqlx::query_as::<_, OrderRow>(&format!("UPDATE orders SET payment_status = 'paid', order_status = 'shipped', paid_at = $2, updated_at = NOW() WHERE id = $1 AND payment_status <> 'paid' RETURNING {ORDER_COLUMNS}"))
            .bind(id.as_uuid()).bind(at).fetch_optional(&self.pool).await?.map(Order::try_from).transpose()
    }

    async fn mark_payment_failed(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        sqlx::query_as::<_, OrderRow>(&format!("UPDATE orders SET payment_status = 'failed', updated_at = NOW() WHERE id = $1 AND payment_status <> 'paid' RETURNING {ORDER_COLUMNS}"))
            .bind(id.as_uuid()).fetch_optional(&self.pool).await?.map(Order::try_from).transpose()
    }

    async fn update_status(&self, id: OrderId, update: StatusUpdate) -> Result<Option<Order>, StoreError> {
        sqlx::query_as::<_, OrderRow>(&format!("UPDATE orders SET order_status = COALESCE($2, order_status), payment_status = COALESCE($3, payment_status), updated_at = NOW() WHERE id = $1 RETURNING {ORDER_COLUMNS}"))
            .bind(id.as_uuid()).bind(update.order_status.map(|s| s.as_str())).bind(update.payment_status.map(|s| s.as_str()))
            .fetch_optional(&self.pool).await?.map(Order::try_from).transpose()
    }

    async fn delete(&self, id: OrderId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1").bind(id.as_uuid()).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }
}
