//! Order Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;
use crate::domain::aggregates::{CartItem, User};
use crate::domain::value_objects::{Money, OrderId, OrderNumber, ProductId, Quantity, SellerId, UserId};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub(crate) id: OrderId,
    pub(crate) order_number: OrderNumber,
    pub(crate) user_id: UserId,
    pub(crate) items: Vec<OrderItem>,
    pub(crate) total_amount: Money,
    pub(crate) payment_method: PaymentMethod,
    pub(crate) payment_status: PaymentStatus,
    pub(crate) order_status: OrderStatus,
    pub(crate) payment_intent_id: Option<String>,
    pub(crate) paid_at: Option<DateTime<Utc>>,
    pub(crate) shipping_address: ShippingAddress,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
}

/// Historical copy of a cart line. Later catalog price changes do not reach it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: ProductId,
    pub seller_id: SellerId,
    pub quantity: Quantity,
    pub color: String,
    pub size: String,
    pub price: Money,
    pub total_price: Money,
}

impl OrderItem {
    pub fn from_cart_line(line: &CartItem, seller_id: SellerId) -> Self {
        Self {
            product_id: line.product_id, seller_id, quantity: line.quantity, color: line.color.clone(),
            size: line.size.clone(), price: line.price, total_price: line.line_total(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub street: Option<String>,
    #[validate(length(min = 1, message = "Shipping city is required"))]
    pub city: String,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    #[validate(length(min = 1, message = "Shipping country is required"))]
    pub country: String,
}

macro_rules! string_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self { $(Self::$variant => $text),+ }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
        }

        impl FromStr for $name {
            type Err = OrderError;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(OrderError::UnknownValue(other.to_string())),
                }
            }
        }
    };
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod { #[default] Cash, Online }

/// `Cash` marks an order settled on delivery; it never goes through the gateway.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus { #[default] Pending, Cash, Paid, Failed }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus { #[default] Pending, Shipped, Delivered, Cancelled }

string_enum!(PaymentMethod { Cash => "cash", Online => "online" });
string_enum!(PaymentStatus { Pending => "pending", Cash => "cash", Paid => "paid", Failed => "failed" });
string_enum!(OrderStatus { Pending => "pending", Shipped => "shipped", Delivered => "delivered", Cancelled => "cancelled" });

/// Administrative override of the status fields. Absent fields stay as they are.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub order_status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
}

impl Order {
    /// Creates a pending order. `items` must not be empty.
    pub fn place(user_id: UserId, items: Vec<OrderItem>, total_amount: Money, payment_method: PaymentMethod, shipping_address: ShippingAddress) -> Result<Self, OrderError> {
        if items.is_empty() { return Err(OrderError::EmptyCart); }
        let now = Utc::now();
        let payment_status = match payment_method {
            PaymentMethod::Online => PaymentStatus::Pending,
            PaymentMethod::Cash => PaymentStatus::Cash,
        };
        Ok(Self {
            id: OrderId::new(), order_number: OrderNumber::generate(), user_id, items, total_amount, payment_method,
            payment_status, order_status: OrderStatus::Pending, payment_intent_id: None, paid_at: None,
            shipping_address, created_at: now, updated_at: now,
        })
    }

    pub fn id(&self) -> OrderId { self.id }
    pub fn order_number(&self) -> &OrderNumber { &self.order_number }
    pub fn user_id(&self) -> UserId { self.user_id }
    pub fn items(&self) -> &[OrderItem] { &self.items }
    pub fn total_amount(&self) -> Money { self.total_amount }
    pub fn payment_method(&self) -> PaymentMethod { self.payment_method }
    pub fn payment_status(&self) -> PaymentStatus { self.payment_status }
    pub fn order_status(&self) -> OrderStatus { self.order_status }
    pub fn payment_intent_id(&self) -> Option<&str> { self.payment_intent_id.as_deref() }
    pub fn paid_at(&self) -> Option<DateTime<Utc>> { self.paid_at }
    pub fn shipping_address(&self) -> &ShippingAddress { &self.shipping_address }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }
    pub fn is_paid(&self) -> bool { self.payment_status == PaymentStatus::Paid }

    pub fn attach_payment_intent(&mut self, intent_id: impl Into<String>) {
        self.payment_intent_id = Some(intent_id.into());
        self.touch();
    }

    /// Cash orders ship as soon as they are placed.
    pub fn ship(&mut self) { self.order_status = OrderStatus::Shipped; self.touch(); }

    /// Returns `false` when the order was already paid; nothing changes then.
    pub fn mark_paid(&mut self, at: DateTime<Utc>) -> bool {
        if self.is_paid() { return false; }
        self.payment_status = PaymentStatus::Paid;
        self.order_status = OrderStatus::Shipped;
        self.paid_at = Some(at);
        self.touch();
        true
    }

    pub fn mark_payment_failed(&mut self) { self.payment_status = PaymentStatus::Failed; self.touch(); }

    pub fn apply(&mut self, update: StatusUpdate) {
        if let Some(status) = update.order_status { self.order_status = status; }
        if let Some(status) = update.payment_status { self.payment_status = status; }
        self.touch();
    }

    pub fn is_owned_by(&self, user: UserId) -> bool { self.user_id == user }

    pub fn ensure_visible_to(&self, caller: &User) -> Result<(), OrderError> {
        if caller.is_admin() || self.is_owned_by(caller.id) { Ok(()) } else { Err(OrderError::NotOwner) }
    }

    /// Admins delete at any stage; owners only while the order is pending.
    pub fn ensure_deletable_by(&self, caller: &User) -> Result<(), OrderError> {
        if caller.is_admin() { return Ok(()); }
        if !self.is_owned_by(caller.id) { return Err(OrderError::NotOwner); }
        if self.order_status != OrderStatus::Pending { return Err(OrderError::NotCancellable); }
        Ok(())
    }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderError {
    #[error("Cart is empty")]
    EmptyCart,
    #[error("Not authorized to access this order")]
    NotOwner,
    #[error("You can only cancel pending orders")]
    NotCancellable,
    #[error("unknown status value `{0}`")]
    UnknownValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::Role;
    use crate::domain::value_objects::CartItemId;
    use rust_decimal::Decimal;

    fn line() -> OrderItem {
        let cart_line = CartItem {
            id: CartItemId::new(), product_id: ProductId::new(), quantity: Quantity::new(2).unwrap(),
            color: "navy".into(), size: "M".into(), price: Money::new(Decimal::new(1000, 2)),
        };
        OrderItem::from_cart_line(&cart_line, SellerId::new())
    }

    fn address() -> ShippingAddress {
        ShippingAddress { city: "Cairo".into(), country: "Egypt".into(), ..Default::default() }
    }

    fn order_for(user: &User, method: PaymentMethod) -> Order {
        Order::place(user.id, vec![line()], Money::new(Decimal::new(2000, 2)), method, address()).unwrap()
    }

    #[test]
    fn test_line_snapshot_totals() {
        let item = line();
        assert_eq!(item.total_price.amount(), Decimal::new(2000, 2));
    }

    #[test]
    fn test_empty_order_rejected() {
        let result = Order::place(UserId::new(), vec![], Money::ZERO, PaymentMethod::Cash, address());
        assert_eq!(result.unwrap_err(), OrderError::EmptyCart);
    }

    #[test]
    fn test_initial_statuses() {
        let user = User::new("Mona", "mona@example.com", Role::User);
        let online = order_for(&user, PaymentMethod::Online);
        assert_eq!(online.payment_status(), PaymentStatus::Pending);
        assert_eq!(online.order_status(), OrderStatus::Pending);
        let cash = order_for(&user, PaymentMethod::Cash);
        assert_eq!(cash.payment_status(), PaymentStatus::Cash);
        assert!(cash.order_number().as_str().starts_with("ORD-"));
        assert_ne!(online.order_number(), cash.order_number());
    }

    #[test]
    fn test_mark_paid_once() {
        let user = User::new("Mona", "mona@example.com", Role::User);
        let mut order = order_for(&user, PaymentMethod::Online);
        let at = Utc::now();
        assert!(order.mark_paid(at));
        assert_eq!(order.order_status(), OrderStatus::Shipped);
        assert_eq!(order.paid_at(), Some(at));
        assert!(!order.mark_paid(Utc::now()));
        assert_eq!(order.paid_at(), Some(at));
    }

    #[test]
    fn test_failed_payment_keeps_order_status() {
        let user = User::new("Mona", "mona@example.com", Role::User);
        let mut order = order_for(&user, PaymentMethod::Online);
        order.mark_payment_failed();
        assert_eq!(order.payment_status(), PaymentStatus::Failed);
        assert_eq!(order.order_status(), OrderStatus::Pending);
    }

    #[test]
    fn test_visibility() {
        let owner = User::new("Mona", "mona@example.com", Role::User);
        let stranger = User::new("Omar", "omar@example.com", Role::Seller);
        let admin = User::new("Root", "root@example.com", Role::Admin);
        let order = order_for(&owner, PaymentMethod::Cash);
        assert!(order.ensure_visible_to(&owner).is_ok());
        assert!(order.ensure_visible_to(&admin).is_ok());
        assert_eq!(order.ensure_visible_to(&stranger), Err(OrderError::NotOwner));
    }

    #[test]
    fn test_deletion_policy() {
        let owner = User::new("Mona", "mona@example.com", Role::User);
        let stranger = User::new("Omar", "omar@example.com", Role::User);
        let admin = User::new("Root", "root@example.com", Role::Admin);
        let mut order = order_for(&owner, PaymentMethod::Online);
        assert!(order.ensure_deletable_by(&owner).is_ok());
        assert_eq!(order.ensure_deletable_by(&stranger), Err(OrderError::NotOwner));
        order.ship();
        assert_eq!(order.ensure_deletable_by(&owner), Err(OrderError::NotCancellable));
        assert!(order.ensure_deletable_by(&admin).is_ok());
    }

    #[test]
    fn test_status_update_partial() {
        let user = User::new("Mona", "mona@example.com", Role::User);
        let mut order = order_for(&user, PaymentMethod::Online);
        order.apply(StatusUpdate { order_status: Some(OrderStatus::Delivered), payment_status: None });
        assert_eq!(order.order_status(), OrderStatus::Delivered);
        assert_eq!(order.payment_status(), PaymentStatus::Pending);
    }

    #[test]
    fn test_status_strings() {
        assert_eq!("shipped".parse::<OrderStatus>().unwrap(), OrderStatus::Shipped);
        assert_eq!(PaymentStatus::Failed.as_str(), "failed");
        assert!("lost".parse::<OrderStatus>().is_err());
    }
}
