//! Cart service.

use std::sync::Arc;

use tracing::info;

use super::ServiceError;
use crate::domain::aggregates::Cart;
use crate::domain::value_objects::{CartItemId, ProductId, Quantity, UserId};
use crate::persistence::{CartRepository, ProductRepository};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewCartItem {
    pub product_id: ProductId,
    pub quantity: Quantity,
    pub color: String,
    pub size: String,
}

#[derive(Clone)]
pub struct CartService {
    carts: Arc<dyn CartRepository>,
    products: Arc<dyn ProductRepository>,
}

impl CartService {
    pub fn new(carts: Arc<dyn CartRepository>, products: Arc<dyn ProductRepository>) -> Self {
        Self { carts, products }
    }

    pub async fn get_or_create(&self, user: UserId) -> Result<Cart, ServiceError> {
        if let Some(cart) = self.carts.find_by_user(user).await? {
            return Ok(cart);
        }
        Ok(self.carts.create_if_absent(Cart::new(user)).await?)
    }

    pub async fn add_item(&self, user: UserId, item: NewCartItem) -> Result<Cart, ServiceError> {
        let product = self.products.find(item.product_id).await?.ok_or(ServiceError::NotFound("Product"))?;
        let mut cart = self.get_or_create(user).await?;
        let line = cart.add_item(product.id, item.quantity, &item.color, &item.size, product.effective_unit_price());
        self.carts.save(&cart).await?;
        info!(%user, product = %product.id, %line, quantity = %item.quantity, "item added to cart");
        Ok(cart)
    }

    pub async fn update_item(&self, user: UserId, item_id: CartItemId, quantity: Quantity) -> Result<Cart, ServiceError> {
        let mut cart = self.carts.find_by_user(user).await?.ok_or(ServiceError::NotFound("Cart"))?;
        cart.update_quantity(item_id, quantity)?;
        self.carts.save(&cart).await?;
        Ok(cart)
    }

    pub async fn remove_item(&self, user: UserId, item_id: CartItemId) -> Result<Cart, ServiceError> {
        let mut cart = self.carts.find_by_user(user).await?.ok_or(ServiceError::NotFound("Cart"))?;
        cart.remove_item(item_id);
        self.carts.save(&cart).await?;
        Ok(cart)
    }

    /// Empties the cart. Users without a cart get `None`.
    pub async fn clear(&self, user: UserId) -> Result<Option<Cart>, ServiceError> {
        let Some(mut cart) = self.carts.find_by_user(user).await? else {
            return Ok(None);
        };
        cart.clear();
        self.carts.save(&cart).await?;
        Ok(Some(cart))
    }
}
