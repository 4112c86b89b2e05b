//! Cart Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::domain::value_objects::{CartId, CartItemId, Money, ProductId, Quantity, UserId};

/// One per user. Totals are private and recomputed by every mutator, so a
/// cart handed to storage always agrees with its items.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    id: CartId,
    user_id: UserId,
    items: Vec<CartItem>,
    total_items: u64,
    total_price: Money,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: CartItemId,
    pub product_id: ProductId,
    pub quantity: Quantity,
    pub color: String,
    pub size: String,
    /// Unit price captured when the line was added.
    pub price: Money,
}

impl CartItem {
    pub fn line_total(&self) -> Money { self.price.multiply(self.quantity) }

    fn matches(&self, product_id: ProductId, color: &str, size: &str) -> bool {
        self.product_id == product_id && self.color == color && self.size == size
    }
}

impl Cart {
    pub fn new(user_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            id: CartId::new(), user_id, items: vec![], total_items: 0, total_price: Money::ZERO,
            created_at: now, updated_at: now,
        }
    }

    /// Rebuilds a stored cart. Totals are derived from `items`, never loaded.
    pub fn restore(id: CartId, user_id: UserId, items: Vec<CartItem>, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) -> Self {
        let mut cart = Self { id, user_id, items, total_items: 0, total_price: Money::ZERO, created_at, updated_at };
        cart.recalculate();
        cart.updated_at = updated_at;
        cart
    }

    pub fn id(&self) -> CartId { self.id }
    pub fn user_id(&self) -> UserId { self.user_id }
    pub fn items(&self) -> &[CartItem] { &self.items }
    pub fn total_items(&self) -> u64 { self.total_items }
    pub fn total_price(&self) -> Money { self.total_price }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    /// Adds `quantity` of a product variant. A line with the same product,
    /// color and size absorbs the quantity and keeps its original price.
    pub fn add_item(&mut self, product_id: ProductId, quantity: Quantity, color: &str, size: &str, unit_price: Money) -> CartItemId {
        let id = if let Some(existing) = self.items.iter_mut().find(|i| i.matches(product_id, color, size)) {
            existing.quantity = existing.quantity.add(quantity);
            existing.id
        } else {
            let item = CartItem {
                id: CartItemId::new(), product_id, quantity, color: color.to_string(), size: size.to_string(), price: unit_price,
            };
            let id = item.id;
            self.items.push(item);
            id
        };
        self.recalculate();
        id
    }

    pub fn update_quantity(&mut self, item_id: CartItemId, quantity: Quantity) -> Result<(), CartError> {
        let item = self.items.iter_mut().find(|i| i.id == item_id).ok_or(CartError::ItemNotFound)?;
        item.quantity = quantity;
        self.recalculate();
        Ok(())
    }

    /// Removing an id that is not in the cart leaves it untouched.
    pub fn remove_item(&mut self, item_id: CartItemId) -> bool {
        let before = self.items.len();
        self.items.retain(|i| i.id != item_id);
        let removed = self.items.len() != before;
        self.recalculate();
        removed
    }

    pub fn clear(&mut self) { self.items.clear(); self.recalculate(); }

    fn recalculate(&mut self) {
        self.total_items = self.items.iter().map(|i| u64::from(i.quantity.value())).sum();
        self.total_price = self.items.iter().fold(Money::ZERO, |acc, i| acc.add(&i.line_total())).round_cents();
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CartError {
    #[error("Item not found in cart")]
    ItemNotFound,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn qty(n: u32) -> Quantity { Quantity::new(n).unwrap() }
    fn usd(cents: i64) -> Money { Money::new(Decimal::new(cents, 2)) }

    fn assert_totals_consistent(cart: &Cart) {
        let items: u64 = cart.items().iter().map(|i| u64::from(i.quantity.value())).sum();
        let price = cart.items().iter().fold(Money::ZERO, |acc, i| acc.add(&i.line_total())).round_cents();
        assert_eq!(cart.total_items(), items);
        assert_eq!(cart.total_price(), price);
    }

    #[test]
    fn test_totals_for_two_lines() {
        let mut cart = Cart::new(UserId::new());
        cart.add_item(ProductId::new(), qty(2), "black", "M", usd(1000));
        cart.add_item(ProductId::new(), qty(1), "white", "L", usd(500));
        assert_eq!(cart.total_items(), 3);
        assert_eq!(cart.total_price().amount(), Decimal::new(2500, 2));
    }

    #[test]
    fn test_same_variant_merges() {
        let mut cart = Cart::new(UserId::new());
        let product = ProductId::new();
        let first = cart.add_item(product, qty(2), "black", "M", usd(1000));
        let second = cart.add_item(product, qty(1), "black", "M", usd(900));
        assert_eq!(first, second);
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.items()[0].quantity.value(), 3);
        assert_eq!(cart.total_price().amount(), Decimal::new(3000, 2));
    }

    #[test]
    fn test_other_size_is_separate_line() {
        let mut cart = Cart::new(UserId::new());
        let product = ProductId::new();
        cart.add_item(product, qty(1), "black", "M", usd(1000));
        cart.add_item(product, qty(1), "black", "L", usd(1000));
        assert_eq!(cart.items().len(), 2);
        assert_totals_consistent(&cart);
    }

    #[test]
    fn test_every_mutation_keeps_totals_consistent() {
        let mut cart = Cart::new(UserId::new());
        let a = cart.add_item(ProductId::new(), qty(2), "red", "S", usd(333));
        assert_totals_consistent(&cart);
        let b = cart.add_item(ProductId::new(), qty(5), "red", "S", usd(1999));
        assert_totals_consistent(&cart);
        cart.update_quantity(a, qty(7)).unwrap();
        assert_totals_consistent(&cart);
        assert!(cart.remove_item(b));
        assert_totals_consistent(&cart);
        assert!(!cart.remove_item(CartItemId::new()));
        assert_totals_consistent(&cart);
        cart.clear();
        assert_eq!(cart.total_items(), 0);
        assert_eq!(cart.total_price(), Money::ZERO);
    }

    #[test]
    fn test_large_quantities_do_not_overflow_totals() {
        let mut cart = Cart::new(UserId::new());
        let product = ProductId::new();
        cart.add_item(product, qty(3_000_000_000), "black", "M", usd(100));
        cart.add_item(product, qty(3_000_000_000), "white", "M", usd(100));
        assert_eq!(cart.total_items(), 6_000_000_000);
        assert_totals_consistent(&cart);
    }

    #[test]
    fn test_update_missing_item() {
        let mut cart = Cart::new(UserId::new());
        assert_eq!(cart.update_quantity(CartItemId::new(), qty(1)), Err(CartError::ItemNotFound));
    }

    #[test]
    fn test_restore_recomputes_totals() {
        let items = vec![CartItem {
            id: CartItemId::new(), product_id: ProductId::new(), quantity: qty(4),
            color: "green".into(), size: "XL".into(), price: usd(250),
        }];
        let cart = Cart::restore(CartId::new(), UserId::new(), items, Utc::now(), Utc::now());
        assert_eq!(cart.total_items(), 4);
        assert_eq!(cart.total_price().amount(), Decimal::new(1000, 2));
    }
}
