//! Inbound gateway events.
//!
//! Events are only trusted after their `Stripe-Signature` header checks out
//! against the shared signing secret. Development mode skips the check and
//! decodes the raw body as-is.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;

use crate::config::Environment;

pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Maximum age of a signed event, in seconds.
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WebhookError {
    #[error("missing signature header")]
    MissingSignature,
    #[error("malformed signature header")]
    MalformedHeader,
    #[error("no signature matches the payload")]
    SignatureMismatch,
    #[error("timestamp outside the tolerance zone")]
    Expired,
    #[error("invalid event payload: {0}")]
    InvalidPayload(String),
}

/// The subset of gateway events checkout reacts to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GatewayEvent {
    PaymentSucceeded { intent_id: String },
    PaymentFailed { intent_id: String },
    Ignored { kind: String },
}

#[derive(Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    kind: String,
    data: Option<RawEventData>,
}

#[derive(Deserialize)]
struct RawEventData {
    object: RawObject,
}

#[derive(Deserialize)]
struct RawObject {
    id: Option<String>,
}

impl GatewayEvent {
    pub fn from_json(payload: &[u8]) -> Result<Self, WebhookError> {
        let raw: RawEvent = serde_json::from_slice(payload).map_err(|e| WebhookError::InvalidPayload(e.to_string()))?;
        let intent_id = || {
            raw.data
                .as_ref()
                .and_then(|data| data.object.id.clone())
                .ok_or_else(|| WebhookError::InvalidPayload(format!("{} event without an object id", raw.kind)))
        };
        match raw.kind.as_str() {
            "payment_intent.succeeded" => Ok(Self::PaymentSucceeded { intent_id: intent_id()? }),
            "payment_intent.payment_failed" => Ok(Self::PaymentFailed { intent_id: intent_id()? }),
            _ => Ok(Self::Ignored { kind: raw.kind.clone() }),
        }
    }
}

#[derive(Clone)]
pub struct WebhookVerifier {
    secret: String,
    environment: Environment,
    tolerance_secs: i64,
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>, environment: Environment) -> Self {
        Self { secret: secret.into(), environment, tolerance_secs: DEFAULT_TOLERANCE_SECS }
    }

    pub fn verify(&self, payload: &[u8], header: Option<&str>) -> Result<GatewayEvent, WebhookError> {
        self.verify_at(payload, header, chrono::Utc::now().timestamp())
    }

    pub fn verify_at(&self, payload: &[u8], header: Option<&str>, now: i64) -> Result<GatewayEvent, WebhookError> {
        if !self.environment.is_development() {
            self.check_signature(payload, header.ok_or(WebhookError::MissingSignature)?, now)?;
        }
        GatewayEvent::from_json(payload)
    }

    fn check_signature(&self, payload: &[u8], header: &str, now: i64) -> Result<(), WebhookError> {
        let mut timestamp = None;
        let mut signatures = Vec::new();
        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = Some(value.parse::<i64>().map_err(|_| WebhookError::MalformedHeader)?),
                Some(("v1", value)) => signatures.push(value),
                _ => {}
            }
        }
        let timestamp = timestamp.ok_or(WebhookError::MalformedHeader)?;
        if signatures.is_empty() {
            return Err(WebhookError::MalformedHeader);
        }

        let matched = signatures.iter().filter_map(|sig| hex::decode(sig).ok()).any(|expected| {
            let Ok(mut mac) = HmacSha256::new_from_slice(self.secret.as_bytes()) else { return false };
            mac.update(timestamp.to_string().as_bytes());
            mac.update(b".");
            mac.update(payload);
            mac.verify_slice(&expected).is_ok()
        });
        if !matched {
            return Err(WebhookError::SignatureMismatch);
        }
        if (now - timestamp).abs() > self.tolerance_secs {
            return Err(WebhookError::Expired);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";
    const NOW: i64 = 1_700_000_000;
    const SUCCEEDED: &str = r#"{"id":"evt_1","type":"payment_intent.succeeded","data":{"object":{"id":"pi_1","status":"succeeded"}}}"#;

    fn sign(payload: &str, timestamp: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(format!("{timestamp}.{payload}").as_bytes());
        format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
    }

    fn verifier() -> WebhookVerifier { WebhookVerifier::new(SECRET, Environment::Production) }

    #[test]
    fn test_valid_signature() {
        let header = sign(SUCCEEDED, NOW);
        let event = verifier().verify_at(SUCCEEDED.as_bytes(), Some(&header), NOW + 10).unwrap();
        assert_eq!(event, GatewayEvent::PaymentSucceeded { intent_id: "pi_1".into() });
    }

    #[test]
    fn test_any_matching_v1_is_enough() {
        let header = format!("{},v1=deadbeef", sign(SUCCEEDED, NOW));
        assert!(verifier().verify_at(SUCCEEDED.as_bytes(), Some(&header), NOW).is_ok());
    }

    #[test]
    fn test_tampered_payload() {
        let header = sign(SUCCEEDED, NOW);
        let tampered = SUCCEEDED.replace("pi_1", "pi_2");
        assert_eq!(verifier().verify_at(tampered.as_bytes(), Some(&header), NOW), Err(WebhookError::SignatureMismatch));
    }

    #[test]
    fn test_wrong_secret() {
        let header = sign(SUCCEEDED, NOW);
        let other = WebhookVerifier::new("whsec_other", Environment::Production);
        assert_eq!(other.verify_at(SUCCEEDED.as_bytes(), Some(&header), NOW), Err(WebhookError::SignatureMismatch));
    }

    #[test]
    fn test_stale_event() {
        let header = sign(SUCCEEDED, NOW);
        let result = verifier().verify_at(SUCCEEDED.as_bytes(), Some(&header), NOW + DEFAULT_TOLERANCE_SECS + 1);
        assert_eq!(result, Err(WebhookError::Expired));
    }

    #[test]
    fn test_header_problems() {
        let v = verifier();
        assert_eq!(v.verify_at(SUCCEEDED.as_bytes(), None, NOW), Err(WebhookError::MissingSignature));
        assert_eq!(v.verify_at(SUCCEEDED.as_bytes(), Some("v1=abc"), NOW), Err(WebhookError::MalformedHeader));
        assert_eq!(v.verify_at(SUCCEEDED.as_bytes(), Some("t=abc,v1=abc"), NOW), Err(WebhookError::MalformedHeader));
        assert_eq!(v.verify_at(SUCCEEDED.as_bytes(), Some(&format!("t={NOW}")), NOW), Err(WebhookError::MalformedHeader));
    }

    #[test]
    fn test_development_trusts_raw_payload() {
        let dev = WebhookVerifier::new("", Environment::Development);
        let event = dev.verify_at(SUCCEEDED.as_bytes(), None, NOW).unwrap();
        assert_eq!(event, GatewayEvent::PaymentSucceeded { intent_id: "pi_1".into() });
    }

    #[test]
    fn test_event_classification() {
        let failed = br#"{"type":"payment_intent.payment_failed","data":{"object":{"id":"pi_9"}}}"#;
        assert_eq!(GatewayEvent::from_json(failed).unwrap(), GatewayEvent::PaymentFailed { intent_id: "pi_9".into() });
        let other = br#"{"type":"charge.refunded","data":{"object":{"id":"ch_1"}}}"#;
        assert_eq!(GatewayEvent::from_json(other).unwrap(), GatewayEvent::Ignored { kind: "charge.refunded".into() });
        assert!(matches!(GatewayEvent::from_json(b"not json"), Err(WebhookError::InvalidPayload(_))));
        let no_object = br#"{"type":"payment_intent.succeeded"}"#;
        assert!(matches!(GatewayEvent::from_json(no_object), Err(WebhookError::InvalidPayload(_))));
    }
}
