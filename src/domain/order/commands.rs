use serde::{Deserialize, Serialize};

use crate::domain::payment::{parse_selection, ExternalChargeStatus, PaymentSelection};
use super::errors::OrderError;
use super::value_objects::{Actor, CustomerSnapshot, OrderStatus};

// ============================================================================
// Order Commands - Represent user intent
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItemRequest {
    pub product_id: i64,
    pub quantity: i32,
}

/// Everything needed to place an order. The customer snapshot comes from
/// the authenticated session, the rest from the checkout form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub customer: CustomerSnapshot,
    pub items: Vec<OrderItemRequest>,
    pub is_delivery: bool,
    pub delivery_setting_id: Option<i64>,
    pub address: Option<String>,
    pub note: Option<String>,
    pub discount_id: Option<i64>,
    pub payment_gateway: String,
    pub payment_method: String,
    pub channel_code: String,
}

impl CreateOrderRequest {
    /// Shape checks that need no store access. Returns the parsed payment
    /// selection so a bad combination is rejected before any stock moves.
    pub fn validate(&self) -> Result<PaymentSelection, OrderError> {
        if self.customer.name.trim().is_empty() {
            return Err(OrderError::Validation("customer name is required".to_string()));
        }
        if self.customer.email.trim().is_empty() {
            return Err(OrderError::Validation("customer email is required".to_string()));
        }
        if self.items.is_empty() {
            return Err(OrderError::Validation("order must contain at least one item".to_string()));
        }
        for item in &self.items {
            if item.quantity <= 0 {
                return Err(OrderError::Validation(format!(
                    "quantity for product {} must be positive, got {}",
                    item.product_id, item.quantity
                )));
            }
        }
        if self.is_delivery {
            if self.delivery_setting_id.is_none() {
                return Err(OrderError::Validation(
                    "delivery setting is required for delivery orders".to_string(),
                ));
            }
            if self.address.as_deref().map_or(true, |a| a.trim().is_empty()) {
                return Err(OrderError::Validation(
                    "address is required for delivery orders".to_string(),
                ));
            }
        }

        Ok(parse_selection(
            &self.payment_gateway,
            &self.payment_method,
            &self.channel_code,
        )?)
    }
}

#[derive(Debug, Clone)]
pub enum OrderCommand {
    ChangeStatus {
        target: OrderStatus,
        actor: Actor,
        note: Option<String>,
    },
    SettlePayment {
        status: ExternalChargeStatus,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorKind;

    fn request() -> CreateOrderRequest {
        CreateOrderRequest {
            customer: CustomerSnapshot {
                user_id: 7,
                name: "Sari".to_string(),
                email: "sari@example.com".to_string(),
                phone: None,
            },
            items: vec![OrderItemRequest { product_id: 1, quantity: 2 }],
            is_delivery: false,
            delivery_setting_id: None,
            address: None,
            note: None,
            discount_id: None,
            payment_gateway: "SYSTEM".to_string(),
            payment_method: "WALLET".to_string(),
            channel_code: "WALLET".to_string(),
        }
    }

    #[test]
    fn test_valid_request() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn test_non_positive_quantity() {
        let mut req = request();
        req.items.push(OrderItemRequest { product_id: 2, quantity: -1 });

        let err = req.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("product 2"));
    }

    #[test]
    fn test_empty_items() {
        let mut req = request();
        req.items.clear();
        assert_eq!(req.validate().unwrap_err().kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_delivery_needs_setting_and_address() {
        let mut req = request();
        req.is_delivery = true;
        assert_eq!(req.validate().unwrap_err().kind(), ErrorKind::Validation);

        req.delivery_setting_id = Some(1);
        assert_eq!(req.validate().unwrap_err().kind(), ErrorKind::Validation);

        req.address = Some("Jl. Merdeka 1, Bandung".to_string());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_bad_payment_combination() {
        let mut req = request();
        req.channel_code = "QR_DANA".to_string();

        let err = req.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPaymentConfiguration);
    }
}
