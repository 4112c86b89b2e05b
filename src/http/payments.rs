//! Payment confirmation and gateway webhook handlers.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use validator::{Validate, ValidationError};

use super::auth::AuthUser;
use super::extract::ValidatedJson;
use super::{success, ApiError, AppState};
use crate::payments::is_intent_id;
use crate::payments::webhook::SIGNATURE_HEADER;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPaymentRequest {
    #[validate(
        length(min = 1, message = "Payment intent id is required"),
        custom(function = "intent_id_shape", message = "Invalid payment intent id")
    )]
    pub payment_intent_id: String,
}

// empty ids are reported by the length rule alone
fn intent_id_shape(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() || is_intent_id(id) { Ok(()) } else { Err(ValidationError::new("intent_id")) }
}

pub async fn confirm(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidatedJson(request): ValidatedJson<ConfirmPaymentRequest>,
) -> Result<Json<Value>, ApiError> {
    let order = state.checkout.confirm_payment(user.id, &request.payment_intent_id).await?;
    Ok(success(Some("Payment confirmed successfully"), json!({ "order": order })))
}

/// Unauthenticated; trust comes from the signature over the raw body.
pub async fn webhook(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Result<Json<Value>, ApiError> {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|value| value.to_str().ok());
    let event = state.webhooks.verify(&body, signature)?;
    let outcome = state.checkout.handle_gateway_event(event).await?;
    info!(?outcome, "gateway event processed");
    Ok(Json(json!({ "received": true })))
}
