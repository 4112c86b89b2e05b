//! Domain events
use chrono::{DateTime, Utc};
use serde::Serialize;
use crate::domain::aggregates::{Order, OrderStatus, PaymentMethod, PaymentStatus};
use crate::domain::value_objects::{Money, OrderId, OrderNumber, UserId};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Placed { order_id: OrderId, order_number: OrderNumber, user_id: UserId, payment_method: PaymentMethod, total: Money },
    Paid { order_id: OrderId, payment_intent_id: Option<String>, paid_at: Option<DateTime<Utc>> },
    PaymentFailed { order_id: OrderId, payment_intent_id: Option<String> },
    StatusUpdated { order_id: OrderId, order_status: OrderStatus, payment_status: PaymentStatus },
    Deleted { order_id: OrderId },
}

impl OrderEvent {
    pub fn placed(order: &Order) -> Self {
        Self::Placed {
            order_id: order.id(), order_number: order.order_number().clone(), user_id: order.user_id(),
            payment_method: order.payment_method(), total: order.total_amount(),
        }
    }

    pub fn paid(order: &Order) -> Self {
        Self::Paid { order_id: order.id(), payment_intent_id: order.payment_intent_id().map(str::to_owned), paid_at: order.paid_at() }
    }

    pub fn payment_failed(order: &Order) -> Self {
        Self::PaymentFailed { order_id: order.id(), payment_intent_id: order.payment_intent_id().map(str::to_owned) }
    }

    pub fn status_updated(order: &Order) -> Self {
        Self::StatusUpdated { order_id: order.id(), order_status: order.order_status(), payment_status: order.payment_status() }
    }

    pub fn deleted(order: &Order) -> Self { Self::Deleted { order_id: order.id() } }

    /// Suffix of the subject the event is published under.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Placed { .. } => "placed",
            Self::Paid { .. } => "paid",
            Self::PaymentFailed { .. } => "payment_failed",
            Self::StatusUpdated { .. } => "status_updated",
            Self::Deleted { .. } => "deleted",
        }
    }
}
