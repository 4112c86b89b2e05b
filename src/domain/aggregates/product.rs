//! Product Aggregate
//!
//! Checkout only needs the commercial side of a catalog entry: who sells it,
//! what it costs and how many units have gone out.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use crate::domain::value_objects::{Money, ProductId, SellerId};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub seller_id: SellerId,
    pub title: String,
    pub price: Money,
    /// Fraction of the price taken off, `0.1` for ten percent.
    pub discount: Decimal,
    pub sold: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn new(seller_id: SellerId, title: impl Into<String>, price: Money) -> Self {
        let now = Utc::now();
        Self {
            id: ProductId::new(), seller_id, title: title.into(), price, discount: Decimal::ZERO,
            sold: 0, created_at: now, updated_at: now,
        }
    }

    pub fn with_discount(mut self, discount: Decimal) -> Self {
        self.discount = discount;
        self
    }

    /// Price captured into a cart line: `price - price * discount`, falling
    /// back to the list price when the discounted value comes out as zero.
    pub fn effective_unit_price(&self) -> Money {
        let amount = self.price.amount();
        let discounted = Money::new(amount - amount * self.discount);
        if discounted.is_zero() { self.price } else { discounted }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(price: i64, scale: u32) -> Product {
        Product::new(SellerId::new(), "Linen shirt", Money::new(Decimal::new(price, scale)))
    }

    #[test]
    fn test_effective_price_applies_discount() {
        let p = product(40, 0).with_discount(Decimal::new(25, 2));
        assert_eq!(p.effective_unit_price().amount(), Decimal::new(30, 0));
    }

    #[test]
    fn test_effective_price_without_discount() {
        let p = product(1999, 2);
        assert_eq!(p.effective_unit_price(), p.price);
    }

    #[test]
    fn test_full_discount_falls_back_to_list_price() {
        let p = product(15, 0).with_discount(Decimal::ONE);
        assert_eq!(p.effective_unit_price().amount(), Decimal::new(15, 0));
    }
}
