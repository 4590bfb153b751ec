use crate::domain::wallet::WalletError;
use crate::domain::ErrorKind;

// ============================================================================
// Payment Routing Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("invalid {field}: {value}")]
    InvalidSelection { field: &'static str, value: String },

    #[error("{field} {value} is not supported by gateway {gateway}")]
    UnsupportedCombination {
        field: &'static str,
        value: String,
        gateway: String,
    },

    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error("payment gateway error: {0}")]
    Gateway(String),

    #[error("payment gateway rejected the request: {0}")]
    GatewayRejected(String),

    #[error("payment gateway unavailable: circuit breaker open")]
    GatewayUnavailable,
}

impl PaymentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PaymentError::InvalidSelection { .. } | PaymentError::UnsupportedCombination { .. } => {
                ErrorKind::InvalidPaymentConfiguration
            }
            PaymentError::Wallet(e) => e.kind(),
            PaymentError::Gateway(_)
            | PaymentError::GatewayRejected(_)
            | PaymentError::GatewayUnavailable => ErrorKind::ExternalGateway,
        }
    }
}

impl crate::utils::IsTransient for PaymentError {
    fn is_transient(&self) -> bool {
        matches!(self, PaymentError::Gateway(_))
    }
}
