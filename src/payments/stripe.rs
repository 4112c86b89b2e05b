//! Stripe REST client.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use tracing::error;

use super::{is_intent_id, GatewayError, NewPaymentIntent, PaymentGateway, PaymentIntent};

pub const DEFAULT_API_BASE: &str = "https://api.stripe.com";

/// Shared, process-wide client. Holds no per-request state.
#[derive(Clone)]
pub struct StripeGateway {
    http: Client,
    api_base: String,
    secret_key: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl StripeGateway {
    pub fn new(secret_key: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self { http: Client::new(), api_base: api_base.into().trim_end_matches('/').to_string(), secret_key: secret_key.into() }
    }

    fn intents_url(&self) -> String { format!("{}/v1/payment_intents", self.api_base) }

    async fn send(&self, request: RequestBuilder) -> Result<PaymentIntent, GatewayError> {
        let response = request.bearer_auth(&self.secret_key).send().await?;
        Self::decode(response).await
    }

    async fn decode(response: Response) -> Result<PaymentIntent, GatewayError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<PaymentIntent>().await?);
        }
        let message = response
            .json::<ErrorEnvelope>()
            .await
            .ok()
            .and_then(|envelope| envelope.error.message)
            .unwrap_or_else(|| format!("gateway responded with {status}"));
        error!(%status, %message, "payment gateway request rejected");
        Err(GatewayError::Api(message))
    }
}

/// Flattens an intent request into Stripe's bracketed form encoding.
fn form_fields(request: &NewPaymentIntent) -> Vec<(String, String)> {
    let mut fields = vec![
        ("amount".to_string(), request.amount.to_string()),
        ("currency".to_string(), request.currency.clone()),
        ("automatic_payment_methods[enabled]".to_string(), "true".to_string()),
    ];
    fields.extend(request.metadata.iter().map(|(key, value)| (format!("metadata[{key}]"), value.clone())));
    fields
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_intent(&self, request: NewPaymentIntent) -> Result<PaymentIntent, GatewayError> {
        let intent = self.send(self.http.post(self.intents_url()).form(&form_fields(&request))).await?;
        if intent.client_secret.is_none() {
            return Err(GatewayError::MissingClientSecret(intent.id));
        }
        Ok(intent)
    }

    async fn retrieve_intent(&self, id: &str) -> Result<PaymentIntent, GatewayError> {
        if !is_intent_id(id) {
            return Err(GatewayError::MalformedIntentId(id.to_string()));
        }
        self.send(self.http.get(format!("{}/{id}", self.intents_url()))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::IntentStatus;
    use std::collections::BTreeMap;

    #[test]
    fn test_form_fields() {
        let request = NewPaymentIntent {
            amount: 2500,
            currency: "usd".into(),
            metadata: BTreeMap::from([("orderId".to_string(), "o-1".to_string()), ("userId".to_string(), "u-1".to_string())]),
        };
        let fields = form_fields(&request);
        assert!(fields.contains(&("amount".into(), "2500".into())));
        assert!(fields.contains(&("automatic_payment_methods[enabled]".into(), "true".into())));
        assert!(fields.contains(&("metadata[orderId]".into(), "o-1".into())));
        assert!(fields.contains(&("metadata[userId]".into(), "u-1".into())));
    }

    #[test]
    fn test_intent_payload_decoding() {
        let json = r#"{"id":"pi_123","object":"payment_intent","amount":2500,"status":"requires_payment_method","client_secret":"pi_123_secret_abc"}"#;
        let intent: PaymentIntent = serde_json::from_str(json).unwrap();
        assert_eq!(intent.id, "pi_123");
        assert_eq!(intent.status, IntentStatus::RequiresPaymentMethod);
        assert_eq!(intent.client_secret.as_deref(), Some("pi_123_secret_abc"));
    }

    #[tokio::test]
    async fn test_malformed_id_never_leaves_the_process() {
        // nothing listens on this port; a request would surface as a transport error
        let gateway = StripeGateway::new("sk_test", "http://127.0.0.1:9");
        let result = gateway.retrieve_intent("../charges/ch_x").await;
        assert!(matches!(result, Err(GatewayError::MalformedIntentId(id)) if id == "../charges/ch_x"));
    }

    #[test]
    fn test_api_base_is_normalised() {
        let gateway = StripeGateway::new("sk_test", "http://localhost:12111/");
        assert_eq!(gateway.intents_url(), "http://localhost:12111/v1/payment_intents");
    }
}
