use serde::{Deserialize, Serialize};

use crate::domain::text_enum;

// ============================================================================
// Order Value Objects
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Received,
    BeingDelivered,
    Delivered,
    ReadyForPickup,
    Rejected,
    Cancelled,
    CancellationRequested,
    DeliveryFailed,
}

text_enum!(OrderStatus, "order status", {
    Pending => "PENDING",
    Received => "RECEIVED",
    BeingDelivered => "BEING_DELIVERED",
    Delivered => "DELIVERED",
    ReadyForPickup => "READY_FOR_PICKUP",
    Rejected => "REJECTED",
    Cancelled => "CANCELLED",
    CancellationRequested => "CANCELLATION_REQUESTED",
    DeliveryFailed => "DELIVERY_FAILED",
});

impl OrderStatus {
    /// No transition leaves a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Delivered | OrderStatus::Cancelled | OrderStatus::Rejected
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActorRole {
    Customer,
    Admin,
}

text_enum!(ActorRole, "actor role", {
    Customer => "CUSTOMER",
    Admin => "ADMIN",
});

/// Who is asking for a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: i64,
    pub role: ActorRole,
}

impl Actor {
    pub fn customer(user_id: i64) -> Self {
        Self { user_id, role: ActorRole::Customer }
    }

    pub fn admin(user_id: i64) -> Self {
        Self { user_id, role: ActorRole::Admin }
    }
}

/// Customer details copied onto the order at creation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerSnapshot {
    pub user_id: i64,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

/// A product as it was when the order was placed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: i64,
    pub product_name: String,
    pub category_name: String,
    pub price: i64,
    pub quantity: i32,
}

impl OrderLine {
    pub fn subtotal(&self) -> i64 {
        self.price * i64::from(self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliverySetting {
    pub id: i64,
    pub name: String,
    pub cost: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_terminal_statuses() {
        let terminal: Vec<_> = OrderStatus::ALL.iter().filter(|s| s.is_terminal()).collect();
        assert_eq!(
            terminal,
            vec![&OrderStatus::Delivered, &OrderStatus::Rejected, &OrderStatus::Cancelled]
        );
    }

    #[test]
    fn test_order_status_text_matches_serde() {
        for status in OrderStatus::ALL {
            let json = serde_json::to_string(status).unwrap();
            assert_eq!(json, format!("\"{}\"", status));
            assert_eq!(OrderStatus::from_str(status.as_str()).unwrap(), *status);
        }
    }

    #[test]
    fn test_line_subtotal() {
        let line = OrderLine {
            product_id: 1,
            product_name: "Arabica 250g".to_string(),
            category_name: "Coffee".to_string(),
            price: 45_000,
            quantity: 3,
        };
        assert_eq!(line.subtotal(), 135_000);
    }
}
