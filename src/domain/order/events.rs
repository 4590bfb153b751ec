use serde::{Deserialize, Serialize};

use super::value_objects::OrderStatus;

// ============================================================================
// Order Events - Decisions taken by the Order aggregate
// ============================================================================
//
// `Order::handle_command` validates a command and returns events; the
// command handler carries out their side effects (wallet refunds, restock)
// in the same transaction and applies them to the aggregate.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    StatusChanged(OrderStatusChanged),
    PaymentConfirmed,
    PaymentCancelled,
    RefundIssued(RefundIssued),
}

impl OrderEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::StatusChanged(_) => "OrderStatusChanged",
            OrderEvent::PaymentConfirmed => "OrderPaymentConfirmed",
            OrderEvent::PaymentCancelled => "OrderPaymentCancelled",
            OrderEvent::RefundIssued(_) => "OrderRefundIssued",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStatusChanged {
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub note: Option<String>,
}

/// Wallet refund of a paid order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefundIssued {
    pub user_id: i64,
    pub amount: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_matches_serialized_tag() {
        let event = OrderEvent::RefundIssued(RefundIssued { user_id: 7, amount: 90_000 });
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(event.event_type(), "OrderRefundIssued");
        assert_eq!(json["type"], "RefundIssued");
        assert_eq!(json["data"]["amount"], 90_000);
        assert_eq!(OrderEvent::PaymentConfirmed.event_type(), "OrderPaymentConfirmed");
    }
}
