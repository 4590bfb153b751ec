// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// Each sub-module owns one piece of the order pipeline:
// - order/    - Order aggregate, status state machine, orchestration
// - stock     - Stock ledger (reservation by decrement)
// - discount/ - Coupon validation, usage quota, discount amount
// - wallet    - Internal wallet debit/credit
// - payment/  - Gateway/method/channel routing
//
// Persistence is reached only through the traits in crate::persistence.
//
// ============================================================================

/// Raised when a stored or requested string is not a known enum variant.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Caller-facing error classification shared by every domain error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    OutOfStock,
    QuantityExceeded,
    InsufficientFunds,
    InvalidPaymentConfiguration,
    DiscountIneligible,
    InvalidTransition,
    Unauthorized,
    ExternalGateway,
    Persistence,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::OutOfStock => "out_of_stock",
            ErrorKind::QuantityExceeded => "quantity_exceeded",
            ErrorKind::InsufficientFunds => "insufficient_funds",
            ErrorKind::InvalidPaymentConfiguration => "invalid_payment_configuration",
            ErrorKind::DiscountIneligible => "discount_ineligible",
            ErrorKind::InvalidTransition => "invalid_transition",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::ExternalGateway => "external_gateway",
            ErrorKind::Persistence => "persistence",
        }
    }
}

/// Maps a fieldless enum onto its canonical SCREAMING_SNAKE_CASE text form.
macro_rules! text_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::domain::UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err($crate::domain::UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

pub(crate) use text_enum;

pub mod discount;
pub mod order;
pub mod payment;
pub mod stock;
pub mod wallet;
