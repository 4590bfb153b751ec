use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use uuid::Uuid;

use crate::domain::wallet;
use crate::metrics::Metrics;
use crate::persistence::WalletStore;
use super::errors::PaymentError;
use super::gateway::ExternalPaymentGateway;
use super::value_objects::*;

// ============================================================================
// Payment Gateway Router
// ============================================================================
//
// Routing matrix:
//   SYSTEM  / WALLET  / WALLET
//   XENDIT  / QR_CODE / QR_DANA | QR_LINKAJA
//
// SYSTEM settles synchronously against the wallet ledger. XENDIT opens a QR
// charge and leaves the order PENDING_PAYMENT until the provider confirms.
//
// ============================================================================

fn allowed_methods(gateway: PaymentGateway) -> &'static [PaymentMethod] {
    match gateway {
        PaymentGateway::System => &[PaymentMethod::Wallet],
        PaymentGateway::Xendit => &[PaymentMethod::QrCode],
    }
}

fn allowed_channels(gateway: PaymentGateway) -> &'static [ChannelCode] {
    match gateway {
        PaymentGateway::System => &[ChannelCode::Wallet],
        PaymentGateway::Xendit => &[ChannelCode::QrDana, ChannelCode::QrLinkaja],
    }
}

/// Parse the three routing fields against their allow-lists and check the
/// combination against the matrix.
pub fn parse_selection(gateway: &str, method: &str, channel: &str) -> Result<PaymentSelection, PaymentError> {
    let invalid = |field: &'static str, value: &str| PaymentError::InvalidSelection {
        field,
        value: value.to_string(),
    };

    let selection = PaymentSelection {
        gateway: PaymentGateway::from_str(gateway).map_err(|_| invalid("payment gateway", gateway))?,
        method: PaymentMethod::from_str(method).map_err(|_| invalid("payment method", method))?,
        channel: ChannelCode::from_str(channel).map_err(|_| invalid("channel code", channel))?,
    };

    validate_selection(&selection)?;
    Ok(selection)
}

pub fn validate_selection(selection: &PaymentSelection) -> Result<(), PaymentError> {
    if !allowed_methods(selection.gateway).contains(&selection.method) {
        return Err(PaymentError::UnsupportedCombination {
            field: "payment method",
            value: selection.method.to_string(),
            gateway: selection.gateway.to_string(),
        });
    }
    if !allowed_channels(selection.gateway).contains(&selection.channel) {
        return Err(PaymentError::UnsupportedCombination {
            field: "channel code",
            value: selection.channel.to_string(),
            gateway: selection.gateway.to_string(),
        });
    }
    Ok(())
}

pub struct PaymentRouter {
    gateway: Arc<dyn ExternalPaymentGateway>,
    metrics: Arc<Metrics>,
}

impl PaymentRouter {
    pub fn new(gateway: Arc<dyn ExternalPaymentGateway>, metrics: Arc<Metrics>) -> Self {
        Self { gateway, metrics }
    }

    /// Settle `amount` for `user_id` through the selected gateway.
    pub async fn route<S>(
        &self,
        store: &mut S,
        selection: &PaymentSelection,
        user_id: i64,
        amount: i64,
    ) -> Result<PaymentOutcome, PaymentError>
    where
        S: WalletStore + Send + ?Sized,
    {
        validate_selection(selection)?;

        match selection.gateway {
            PaymentGateway::System => {
                wallet::debit(store, user_id, amount).await?;
                Ok(PaymentOutcome {
                    status: PaymentStatus::Paid,
                    external: None,
                })
            }
            PaymentGateway::Xendit if amount == 0 => {
                // Providers refuse zero-amount QR codes; nothing is owed.
                tracing::info!(
                    gateway = self.gateway.name(),
                    user_id = user_id,
                    "Nothing to charge, order settled without external payment"
                );
                Ok(PaymentOutcome {
                    status: PaymentStatus::Paid,
                    external: None,
                })
            }
            PaymentGateway::Xendit => {
                let request = ChargeRequest {
                    reference_id: Uuid::new_v4(),
                    channel: selection.channel,
                    amount,
                };

                let started = Instant::now();
                let result = self.gateway.create_charge(&request).await;
                self.metrics.record_gateway_call(
                    self.gateway.name(),
                    "create_charge",
                    started.elapsed().as_secs_f64(),
                    result.is_ok(),
                );
                let charge = result?;

                tracing::info!(
                    gateway = self.gateway.name(),
                    reference_id = %request.reference_id,
                    external_id = %charge.external_id,
                    amount = amount,
                    "Opened external charge"
                );

                Ok(PaymentOutcome {
                    status: PaymentStatus::PendingPayment,
                    external: Some(ExternalPayment {
                        reference_id: request.reference_id,
                        external_id: charge.external_id,
                        channel: selection.channel,
                        amount,
                        qr_string: charge.qr_string,
                        status: charge.status,
                        created_at: Utc::now(),
                    }),
                })
            }
        }
    }

    pub async fn check_status(&self, external_id: &str) -> Result<ExternalChargeStatus, PaymentError> {
        let started = Instant::now();
        let result = self.gateway.check_status(external_id).await;
        self.metrics.record_gateway_call(
            self.gateway.name(),
            "check_status",
            started.elapsed().as_secs_f64(),
            result.is_ok(),
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::wallet::Wallet;
    use crate::domain::ErrorKind;
    use crate::gateways::SandboxGateway;
    use crate::persistence::{Database, MemoryDatabase};

    fn router(gateway: Arc<SandboxGateway>) -> PaymentRouter {
        PaymentRouter::new(gateway, Arc::new(Metrics::new().unwrap()))
    }

    #[test]
    fn test_parse_valid_selections() {
        let wallet = parse_selection("SYSTEM", "WALLET", "WALLET").unwrap();
        assert_eq!(wallet.gateway, PaymentGateway::System);

        let dana = parse_selection("XENDIT", "QR_CODE", "QR_DANA").unwrap();
        assert_eq!(dana.channel, ChannelCode::QrDana);
        assert!(parse_selection("XENDIT", "QR_CODE", "QR_LINKAJA").is_ok());
    }

    #[test]
    fn test_unknown_values_name_the_field() {
        let err = parse_selection("PAYPAL", "WALLET", "WALLET").unwrap_err();
        assert!(matches!(err, PaymentError::InvalidSelection { field: "payment gateway", .. }));

        let err = parse_selection("SYSTEM", "CARD", "WALLET").unwrap_err();
        assert!(matches!(err, PaymentError::InvalidSelection { field: "payment method", .. }));

        let err = parse_selection("SYSTEM", "WALLET", "QR_OVO").unwrap_err();
        assert!(matches!(err, PaymentError::InvalidSelection { field: "channel code", .. }));
        assert_eq!(err.kind(), ErrorKind::InvalidPaymentConfiguration);
    }

    #[test]
    fn test_mismatched_combinations_are_rejected() {
        let err = parse_selection("SYSTEM", "QR_CODE", "WALLET").unwrap_err();
        assert!(matches!(err, PaymentError::UnsupportedCombination { field: "payment method", .. }));

        let err = parse_selection("XENDIT", "QR_CODE", "WALLET").unwrap_err();
        assert!(matches!(err, PaymentError::UnsupportedCombination { field: "channel code", .. }));

        let err = parse_selection("SYSTEM", "WALLET", "QR_DANA").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPaymentConfiguration);
    }

    #[tokio::test]
    async fn test_wallet_route_is_paid_immediately() {
        let db = MemoryDatabase::new();
        db.insert_wallet(Wallet { id: 1, user_id: 7, balance: 100_000 }).await;
        let gateway = Arc::new(SandboxGateway::new());
        let selection = parse_selection("SYSTEM", "WALLET", "WALLET").unwrap();

        let mut tx = db.begin().await.unwrap();
        let outcome = router(gateway.clone()).route(&mut *tx, &selection, 7, 90_000).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(outcome.status, PaymentStatus::Paid);
        assert!(outcome.external.is_none());
        assert_eq!(db.wallet(7).await.unwrap().balance, 10_000);
        assert_eq!(gateway.charge_count().await, 0);
    }

    #[tokio::test]
    async fn test_wallet_route_insufficient_funds() {
        let db = MemoryDatabase::new();
        db.insert_wallet(Wallet { id: 1, user_id: 7, balance: 50_000 }).await;
        let selection = parse_selection("SYSTEM", "WALLET", "WALLET").unwrap();

        let mut tx = db.begin().await.unwrap();
        let err = router(Arc::new(SandboxGateway::new()))
            .route(&mut *tx, &selection, 7, 90_000)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
    }

    #[tokio::test]
    async fn test_qr_route_opens_pending_charge() {
        let db = MemoryDatabase::new();
        let gateway = Arc::new(SandboxGateway::new());
        let selection = parse_selection("XENDIT", "QR_CODE", "QR_LINKAJA").unwrap();

        let mut tx = db.begin().await.unwrap();
        let outcome = router(gateway.clone()).route(&mut *tx, &selection, 7, 45_000).await.unwrap();

        assert_eq!(outcome.status, PaymentStatus::PendingPayment);
        let external = outcome.external.unwrap();
        assert_eq!(external.channel, ChannelCode::QrLinkaja);
        assert_eq!(external.amount, 45_000);
        assert_eq!(external.status, ExternalChargeStatus::Pending);
        assert!(external.qr_string.is_some());
        assert_eq!(gateway.charge_count().await, 1);
    }

    #[tokio::test]
    async fn test_qr_route_with_nothing_owed_skips_provider() {
        let db = MemoryDatabase::new();
        let gateway = Arc::new(SandboxGateway::new());
        let selection = parse_selection("XENDIT", "QR_CODE", "QR_DANA").unwrap();

        let mut tx = db.begin().await.unwrap();
        let outcome = router(gateway.clone()).route(&mut *tx, &selection, 7, 0).await.unwrap();

        assert_eq!(outcome.status, PaymentStatus::Paid);
        assert!(outcome.external.is_none());
        assert_eq!(gateway.charge_count().await, 0);
    }
}
