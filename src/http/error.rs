//! Error responses.
//!
//! Every failure leaves the API as `{"status": "fail"|"error", "message"}`.
//! Internal detail rides along in a response extension and is only written
//! into the body by [`expose_detail`] when running in development mode.

use axum::extract::{OriginalUri, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;
use validator::{ValidationErrors, ValidationErrorsKind};

use super::AppState;
use crate::domain::aggregates::OrderError;
use crate::payments::WebhookError;
use crate::persistence::StoreError;
use crate::services::ServiceError;

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    detail: Option<String>,
}

#[derive(Clone, Debug)]
struct ErrorReport {
    message: String,
    detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into(), detail: None }
    }

    pub fn bad_request(message: impl Into<String>) -> Self { Self::new(StatusCode::BAD_REQUEST, message) }
    pub fn unauthorized(message: impl Into<String>) -> Self { Self::new(StatusCode::UNAUTHORIZED, message) }
    pub fn forbidden(message: impl Into<String>) -> Self { Self::new(StatusCode::FORBIDDEN, message) }
    pub fn not_found(message: impl Into<String>) -> Self { Self::new(StatusCode::NOT_FOUND, message) }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong").with_detail(detail)
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn status(&self) -> StatusCode { self.status }
    pub fn message(&self) -> &str { &self.message }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = if self.status.is_server_error() { "error" } else { "fail" };
        let mut response = (self.status, Json(json!({ "status": kind, "message": self.message }))).into_response();
        if let Some(detail) = self.detail {
            response.extensions_mut().insert(ErrorReport { message: self.message, detail });
        }
        response
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(_) | ServiceError::Cart(_) => Self::not_found(err.to_string()),
            ServiceError::Order(OrderError::NotOwner) | ServiceError::Forbidden => Self::forbidden(err.to_string()),
            ServiceError::Order(_) | ServiceError::PaymentNotCompleted => Self::bad_request(err.to_string()),
            ServiceError::PaymentSetup(ref source) | ServiceError::PaymentConfirmation(ref source) => {
                error!(error = %source, "payment gateway call failed");
                let detail = format!("{source:?}");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).with_detail(detail)
            }
            ServiceError::Store(source) => source.into(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        error!(error = ?err, "storage failure");
        Self::internal(format!("{err:?}"))
    }
}

impl From<WebhookError> for ApiError {
    fn from(err: WebhookError) -> Self {
        match err {
            WebhookError::InvalidPayload(_) => Self::bad_request("Invalid webhook payload").with_detail(err.to_string()),
            _ => Self::bad_request("Webhook signature verification failed").with_detail(err.to_string()),
        }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        let mut messages = Vec::new();
        collect_messages(&errors, &mut messages);
        messages.sort();
        Self::bad_request(messages.join(", "))
    }
}

fn collect_messages(errors: &ValidationErrors, out: &mut Vec<String>) {
    for (field, kind) in errors.errors() {
        match kind {
            ValidationErrorsKind::Field(list) => out.extend(list.iter().map(|e| match &e.message {
                Some(message) => message.to_string(),
                None => format!("{field} is invalid"),
            })),
            ValidationErrorsKind::Struct(inner) => collect_messages(inner, out),
            ValidationErrorsKind::List(items) => items.values().for_each(|inner| collect_messages(inner, out)),
        }
    }
}

/// Adds the internal error detail to error bodies in development mode.
pub async fn expose_detail(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    if !state.environment.is_development() {
        return response;
    }
    let Some(report) = response.extensions().get::<ErrorReport>().cloned() else {
        return response;
    };
    let status = response.status();
    let kind = if status.is_server_error() { "error" } else { "fail" };
    (status, Json(json!({ "status": kind, "message": report.message, "detail": report.detail }))).into_response()
}

pub async fn route_not_found(OriginalUri(uri): OriginalUri) -> ApiError {
    ApiError::not_found(format!("Route {} not found", uri.path()))
}
