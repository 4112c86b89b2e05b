//! Publishes order events to NATS.
//!
//! Publishing happens after the corresponding write has committed and never
//! fails the caller: a lost event is logged, the state change stands.

use tracing::{debug, warn};

use crate::domain::events::OrderEvent;

pub const SUBJECT_PREFIX: &str = "marketplace.orders";

#[derive(Clone, Default)]
pub struct EventBus {
    nats: Option<async_nats::Client>,
}

impl EventBus {
    pub fn new(nats: Option<async_nats::Client>) -> Self { Self { nats } }

    /// A bus that drops every event. Used when no broker is configured.
    pub fn disabled() -> Self { Self::default() }

    pub fn subject(event: &OrderEvent) -> String { format!("{SUBJECT_PREFIX}.{}", event.kind()) }

    pub async fn publish(&self, event: OrderEvent) {
        let Some(client) = &self.nats else {
            debug!(kind = event.kind(), "event bus disabled, dropping event");
            return;
        };
        let payload = match serde_json::to_vec(&event) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %err, kind = event.kind(), "failed to encode order event");
                return;
            }
        };
        if let Err(err) = client.publish(Self::subject(&event), payload.into()).await {
            warn!(error = %err, kind = event.kind(), "failed to publish order event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::OrderId;

    #[test]
    fn test_subjects() {
        let event = OrderEvent::Deleted { order_id: OrderId::new() };
        assert_eq!(EventBus::subject(&event), "marketplace.orders.deleted");
    }

    #[tokio::test]
    async fn test_disabled_bus_is_silent() {
        EventBus::disabled().publish(OrderEvent::Deleted { order_id: OrderId::new() }).await;
    }
}
