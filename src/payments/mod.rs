//! Payment gateway seam.

use std::collections::BTreeMap;

use async_trait::async_trait;
use mockall::automock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod stripe;
pub mod webhook;

pub use stripe::StripeGateway;
pub use webhook::{GatewayEvent, WebhookError, WebhookVerifier};

/// Gateway-side lifecycle of a payment intent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    RequiresCapture,
    Canceled,
    Succeeded,
    #[serde(untagged)]
    Other(String),
}

impl IntentStatus {
    /// Whether the confirmation path may settle an order on this status.
    ///
    /// `RequiresPaymentMethod` is accepted alongside `Succeeded` so that test
    /// card flows which never attach a method can still complete an order.
    pub fn settles_order(&self) -> bool {
        matches!(self, Self::Succeeded | Self::RequiresPaymentMethod)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewPaymentIntent {
    /// Amount in minor currency units.
    pub amount: i64,
    pub currency: String,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub status: IntentStatus,
    pub client_secret: Option<String>,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{0}")]
    Api(String),

    #[error("gateway unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("gateway returned no client secret for intent {0}")]
    MissingClientSecret(String),

    #[error("malformed payment intent id {0:?}")]
    MalformedIntentId(String),
}

/// Whether `id` looks like a payment intent id: `pi_` and a non-empty
/// `[A-Za-z0-9_]` tail. Ids end up in request paths, so nothing else passes.
pub fn is_intent_id(id: &str) -> bool {
    id.strip_prefix("pi_")
        .is_some_and(|tail| !tail.is_empty() && tail.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_'))
}

#[automock]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_intent(&self, request: NewPaymentIntent) -> Result<PaymentIntent, GatewayError>;

    async fn retrieve_intent(&self, id: &str) -> Result<PaymentIntent, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_decoding() {
        let status: IntentStatus = serde_json::from_str("\"requires_payment_method\"").unwrap();
        assert_eq!(status, IntentStatus::RequiresPaymentMethod);
        let status: IntentStatus = serde_json::from_str("\"succeeded\"").unwrap();
        assert_eq!(status, IntentStatus::Succeeded);
        let status: IntentStatus = serde_json::from_str("\"brand_new_state\"").unwrap();
        assert_eq!(status, IntentStatus::Other("brand_new_state".into()));
    }

    #[test]
    fn test_intent_id_shape() {
        assert!(is_intent_id("pi_3MtwBwLkdIwHu7ix28a3tqPa"));
        assert!(is_intent_id("pi_http_2"));
        assert!(!is_intent_id("pi_"));
        assert!(!is_intent_id("ch_3MtwBw"));
        assert!(!is_intent_id("../charges/ch_x"));
        assert!(!is_intent_id("pi_1/../../customers"));
        assert!(!is_intent_id("pi_1?expand=customer"));
    }

    #[test]
    fn test_settling_statuses() {
        assert!(IntentStatus::Succeeded.settles_order());
        assert!(IntentStatus::RequiresPaymentMethod.settles_order());
        assert!(!IntentStatus::Processing.settles_order());
        assert!(!IntentStatus::Canceled.settles_order());
    }
}
