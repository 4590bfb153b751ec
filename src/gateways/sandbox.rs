use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::payment::{
    ChargeRequest, ExternalCharge, ExternalChargeStatus, ExternalPaymentGateway, PaymentError,
};

/// In-process stand-in for an external QR provider. Charges stay PENDING
/// until `complete` or `expire` is called for them.
#[derive(Default)]
pub struct SandboxGateway {
    charges: Mutex<HashMap<String, ExternalChargeStatus>>,
}

impl SandboxGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn charge_count(&self) -> usize {
        self.charges.lock().await.len()
    }

    /// Simulate the customer paying the QR code.
    pub async fn complete(&self, external_id: &str) -> bool {
        self.settle(external_id, ExternalChargeStatus::Completed).await
    }

    /// Simulate the QR code expiring unpaid.
    pub async fn expire(&self, external_id: &str) -> bool {
        self.settle(external_id, ExternalChargeStatus::Failed).await
    }

    async fn settle(&self, external_id: &str, status: ExternalChargeStatus) -> bool {
        match self.charges.lock().await.get_mut(external_id) {
            Some(current) => {
                *current = status;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl ExternalPaymentGateway for SandboxGateway {
    fn name(&self) -> &'static str {
        "sandbox"
    }

    async fn create_charge(&self, request: &ChargeRequest) -> Result<ExternalCharge, PaymentError> {
        if request.amount <= 0 {
            return Err(PaymentError::Gateway(format!(
                "amount must be positive, got {}",
                request.amount
            )));
        }

        let external_id = format!("qr_{}", Uuid::new_v4().simple());
        self.charges
            .lock()
            .await
            .insert(external_id.clone(), ExternalChargeStatus::Pending);

        tracing::debug!(
            external_id = %external_id,
            reference_id = %request.reference_id,
            channel = %request.channel,
            "Sandbox charge opened"
        );

        Ok(ExternalCharge {
            qr_string: Some(format!("00020101021226{}", request.reference_id.simple())),
            external_id,
            status: ExternalChargeStatus::Pending,
        })
    }

    async fn check_status(&self, external_id: &str) -> Result<ExternalChargeStatus, PaymentError> {
        self.charges
            .lock()
            .await
            .get(external_id)
            .copied()
            .ok_or_else(|| PaymentError::Gateway(format!("unknown charge {}", external_id)))
    }
}
