//! Order handlers.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::auth::{require_role, AuthUser};
use super::extract::ValidatedJson;
use super::{success, ApiError, AppState};
use crate::domain::aggregates::{Role, StatusUpdate};
use crate::domain::value_objects::OrderId;
use crate::persistence::PageRequest;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

pub async fn index(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(params): Query<ListParams>,
) -> Result<Json<Value>, ApiError> {
    let request = PageRequest::new(params.page, params.limit);
    let page = state.orders.list(user.id, request).await?;
    let total_pages = page.total.div_ceil(u64::from(request.limit));
    Ok(Json(json!({
        "page": request.page,
        "totalPages": total_pages,
        "totalResults": page.total,
        "limit": request.limit,
        "result": page.items.len(),
        "data": page.items,
    })))
}

pub async fn show(State(state): State<AppState>, AuthUser(user): AuthUser, Path(id): Path<OrderId>) -> Result<Json<Value>, ApiError> {
    let order = state.orders.get(&user, id).await?;
    Ok(success(None, json!({ "order": order })))
}

pub async fn update_status(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<OrderId>,
    ValidatedJson(update): ValidatedJson<StatusUpdate>,
) -> Result<Json<Value>, ApiError> {
    require_role(&user, &[Role::Admin])?;
    let order = state.orders.update_status(&user, id, update).await?;
    Ok(success(Some("Order updated successfully"), json!({ "order": order })))
}

pub async fn destroy(State(state): State<AppState>, AuthUser(user): AuthUser, Path(id): Path<OrderId>) -> Result<Json<Value>, ApiError> {
    state.orders.delete(&user, id).await?;
    Ok(Json(json!({ "status": "success", "message": "Order deleted successfully" })))
}
