//! Cart handlers.

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use super::auth::{require_role, AuthUser};
use super::extract::ValidatedJson;
use super::{success, ApiError, AppState};
use crate::domain::aggregates::Role;
use crate::domain::value_objects::{CartItemId, ProductId, Quantity, QuantityError};
use crate::services::NewCartItem;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddCartItemRequest {
    pub product_id: ProductId,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: u32,
    #[validate(length(min = 1, message = "Color is required"))]
    pub color: String,
    #[validate(length(min = 1, message = "Size is required"))]
    pub size: String,
}

impl TryFrom<AddCartItemRequest> for NewCartItem {
    type Error = QuantityError;

    fn try_from(request: AddCartItemRequest) -> Result<Self, Self::Error> {
        Ok(NewCartItem {
            product_id: request.product_id,
            quantity: Quantity::new(request.quantity)?,
            color: request.color,
            size: request.size,
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCartItemRequest {
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: u32,
}

pub async fn show(State(state): State<AppState>, AuthUser(user): AuthUser) -> Result<Json<Value>, ApiError> {
    require_role(&user, &[Role::User, Role::Admin])?;
    let cart = state.carts.get_or_create(user.id).await?;
    Ok(success(None, json!({ "cart": cart })))
}

pub async fn add_item(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidatedJson(request): ValidatedJson<AddCartItemRequest>,
) -> Result<Json<Value>, ApiError> {
    let item = NewCartItem::try_from(request).map_err(|err| ApiError::bad_request(err.to_string()))?;
    let cart = state.carts.add_item(user.id, item).await?;
    Ok(success(Some("Item added to cart"), json!({ "cart": cart })))
}

pub async fn update_item(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(item_id): Path<CartItemId>,
    ValidatedJson(request): ValidatedJson<UpdateCartItemRequest>,
) -> Result<Json<Value>, ApiError> {
    require_role(&user, &[Role::User])?;
    let quantity = Quantity::new(request.quantity).map_err(|err| ApiError::bad_request(err.to_string()))?;
    let cart = state.carts.update_item(user.id, item_id, quantity).await?;
    Ok(success(Some("Cart updated successfully"), json!({ "cart": cart })))
}

pub async fn remove_item(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(item_id): Path<CartItemId>,
) -> Result<Json<Value>, ApiError> {
    require_role(&user, &[Role::User, Role::Admin])?;
    let cart = state.carts.remove_item(user.id, item_id).await?;
    Ok(success(Some("Item removed from cart"), json!({ "cart": cart })))
}

pub async fn clear(State(state): State<AppState>, AuthUser(user): AuthUser) -> Result<Json<Value>, ApiError> {
    let cart = state.carts.clear(user.id).await?;
    Ok(success(Some("Cart cleared successfully"), json!({ "cart": cart })))
}
