use async_trait::async_trait;

use super::errors::PaymentError;
use super::value_objects::{ChargeRequest, ExternalCharge, ExternalChargeStatus};

/// Narrow interface onto an external payment provider.
#[async_trait]
pub trait ExternalPaymentGateway: Send + Sync {
    /// Provider name for logs and metrics.
    fn name(&self) -> &'static str;

    async fn create_charge(&self, request: &ChargeRequest) -> Result<ExternalCharge, PaymentError>;

    async fn check_status(&self, external_id: &str) -> Result<ExternalChargeStatus, PaymentError>;
}
