use crate::domain::discount::DiscountError;
use crate::domain::payment::{PaymentError, PaymentStatus};
use crate::domain::stock::StockError;
use crate::domain::wallet::WalletError;
use crate::domain::ErrorKind;
use crate::persistence::StoreError;
use super::value_objects::{ActorRole, OrderStatus};

// ============================================================================
// Order Errors
// ============================================================================
//
// Every error aborts the surrounding transaction. Messages carry enough
// context (states, quantities, amounts) to be shown to the client as-is.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("order {0} not found")]
    OrderNotFound(i64),

    #[error("delivery setting {0} not found")]
    DeliverySettingNotFound(i64),

    #[error("cannot change order status from {from} to {to}: {reason}")]
    InvalidTransition {
        from: OrderStatus,
        to: OrderStatus,
        reason: String,
    },

    #[error("{role} is not allowed to {action}")]
    Unauthorized { role: ActorRole, action: String },

    #[error(transparent)]
    Stock(#[from] StockError),

    #[error(transparent)]
    Discount(#[from] DiscountError),

    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error(transparent)]
    Persistence(#[from] StoreError),
}

impl OrderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OrderError::Validation(_) => ErrorKind::Validation,
            OrderError::OrderNotFound(_) | OrderError::DeliverySettingNotFound(_) => ErrorKind::NotFound,
            OrderError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            OrderError::Unauthorized { .. } => ErrorKind::Unauthorized,
            OrderError::Stock(e) => e.kind(),
            OrderError::Discount(e) => e.kind(),
            OrderError::Wallet(e) => e.kind(),
            OrderError::Payment(e) => e.kind(),
            OrderError::Persistence(_) => ErrorKind::Persistence,
        }
    }

    pub(crate) fn transition(from: OrderStatus, to: OrderStatus, reason: impl Into<String>) -> Self {
        OrderError::InvalidTransition {
            from,
            to,
            reason: reason.into(),
        }
    }

    pub(crate) fn unpaid(from: OrderStatus, to: OrderStatus, payment: PaymentStatus) -> Self {
        Self::transition(from, to, format!("payment status is {}", payment))
    }
}
