use chrono::{DateTime, Utc};

use crate::domain::ErrorKind;
use crate::persistence::StoreError;

// ============================================================================
// Discount Eligibility Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum DiscountError {
    #[error("discount has disabled or doesn't exist")]
    NotFound(i64),

    #[error("discount has expired")]
    Expired { ended_at: DateTime<Utc> },

    #[error("discount is not yet valid, active starting {starts_at}")]
    NotYetValid { starts_at: DateTime<Utc> },

    #[error("does not meet minimum purchase requirement: minimum {minimum}, order {subtotal}")]
    MinimumNotMet { minimum: i64, subtotal: i64 },

    #[error("usage limit exceeded: coupon allows {limit} uses per user")]
    UsageLimitExceeded { limit: i32 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl DiscountError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DiscountError::NotFound(_) => ErrorKind::NotFound,
            DiscountError::Store(_) => ErrorKind::Persistence,
            _ => ErrorKind::DiscountIneligible,
        }
    }
}
