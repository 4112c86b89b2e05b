//! Checkout handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use super::auth::AuthUser;
use super::extract::ValidatedJson;
use super::{success, ApiError, AppState};
use crate::domain::aggregates::{PaymentMethod, ShippingAddress};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    #[validate]
    pub shipping_address: ShippingAddress,
    pub payment_method: Option<PaymentMethod>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OnlineCheckoutRequest {
    #[validate]
    pub shipping_address: ShippingAddress,
}

pub async fn place_order(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidatedJson(request): ValidatedJson<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let order = state.checkout.place_order(user.id, request.shipping_address, request.payment_method).await?;
    Ok((StatusCode::CREATED, success(Some("Order created successfully"), json!({ "order": order }))))
}

pub async fn place_online_order(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidatedJson(request): ValidatedJson<OnlineCheckoutRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let checkout = state.checkout.place_online_order(user.id, request.shipping_address).await?;
    let data = json!({
        "order": checkout.order,
        "clientSecret": checkout.client_secret,
        "paymentIntentId": checkout.payment_intent_id,
    });
    Ok((StatusCode::CREATED, success(Some("Order created and payment intent generated"), data)))
}
