use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::text_enum;

// ============================================================================
// Payment Value Objects
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentGateway {
    System,
    Xendit,
}

text_enum!(PaymentGateway, "payment gateway", {
    System => "SYSTEM",
    Xendit => "XENDIT",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Wallet,
    QrCode,
}

text_enum!(PaymentMethod, "payment method", {
    Wallet => "WALLET",
    QrCode => "QR_CODE",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChannelCode {
    Wallet,
    QrDana,
    QrLinkaja,
}

text_enum!(ChannelCode, "channel code", {
    Wallet => "WALLET",
    QrDana => "QR_DANA",
    QrLinkaja => "QR_LINKAJA",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    PendingPayment,
    Paid,
    Cancelled,
    Refunded,
}

text_enum!(PaymentStatus, "payment status", {
    PendingPayment => "PENDING_PAYMENT",
    Paid => "PAID",
    Cancelled => "CANCELLED",
    Refunded => "REFUNDED",
});

/// Status reported by an external payment provider for one charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExternalChargeStatus {
    Pending,
    Completed,
    Failed,
}

text_enum!(ExternalChargeStatus, "external charge status", {
    Pending => "PENDING",
    Completed => "COMPLETED",
    Failed => "FAILED",
});

/// Three-part routing key for a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSelection {
    pub gateway: PaymentGateway,
    pub method: PaymentMethod,
    pub channel: ChannelCode,
}

/// What an external provider needs to open a charge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChargeRequest {
    pub reference_id: Uuid,
    pub channel: ChannelCode,
    pub amount: i64,
}

/// A charge opened at an external provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalCharge {
    /// Provider-side identifier, used for status checks.
    pub external_id: String,
    pub qr_string: Option<String>,
    pub status: ExternalChargeStatus,
}

/// External transaction attached to an order paid outside the wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalPayment {
    pub reference_id: Uuid,
    pub external_id: String,
    pub channel: ChannelCode,
    pub amount: i64,
    pub qr_string: Option<String>,
    pub status: ExternalChargeStatus,
    pub created_at: DateTime<Utc>,
}

/// Result of routing a payment.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentOutcome {
    pub status: PaymentStatus,
    pub external: Option<ExternalPayment>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_channel_code_text_matches_serde() {
        for channel in ChannelCode::ALL {
            let json = serde_json::to_string(channel).unwrap();
            assert_eq!(json, format!("\"{}\"", channel.as_str()));
        }
    }

    #[test]
    fn test_unknown_gateway_is_rejected() {
        let err = PaymentGateway::from_str("MIDTRANS").unwrap_err();
        assert_eq!(err.kind, "payment gateway");
        assert_eq!(err.value, "MIDTRANS");
    }

    #[test]
    fn test_payment_status_parses_stored_text() {
        assert_eq!(
            PaymentStatus::from_str("PENDING_PAYMENT").unwrap(),
            PaymentStatus::PendingPayment
        );
    }
}
