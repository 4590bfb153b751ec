use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::payment::{
    ChannelCode, ChargeRequest, ExternalCharge, ExternalChargeStatus, ExternalPaymentGateway,
    PaymentError,
};
use crate::metrics::Metrics;
use crate::utils::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitState};

// ============================================================================
// Xendit QR Codes Client
// ============================================================================
//
// POST /qr_codes                 open a dynamic QR charge
// GET  /qr_codes/{id}/payments   payments made against a QR code
// GET  /qr_codes/{id}            QR code itself (ACTIVE / INACTIVE)
//
// Auth is HTTP basic with the secret key as user name. Every call goes
// through a circuit breaker; only transport errors and 5xx answers count
// against it.
//
// ============================================================================

const API_VERSION: &str = "2022-07-31";

#[derive(Debug, Clone)]
pub struct XenditConfig {
    pub secret_key: String,
    pub base_url: String,
    pub timeout: Duration,
}

pub struct XenditClient {
    http: reqwest::Client,
    config: XenditConfig,
    circuit_breaker: CircuitBreaker,
    metrics: Arc<Metrics>,
}

#[derive(Debug, Serialize)]
struct CreateQrCode<'a> {
    reference_id: String,
    #[serde(rename = "type")]
    kind: &'a str,
    currency: &'a str,
    amount: i64,
    channel_code: &'a str,
}

#[derive(Debug, Deserialize)]
struct QrCode {
    id: String,
    qr_string: Option<String>,
    status: String,
}

#[derive(Debug, Deserialize)]
struct QrPayment {
    status: String,
}

#[derive(Debug, Deserialize)]
struct QrPaymentList {
    data: Vec<QrPayment>,
}

fn channel_code(channel: ChannelCode) -> Result<&'static str, PaymentError> {
    match channel {
        ChannelCode::QrDana => Ok("ID_DANA"),
        ChannelCode::QrLinkaja => Ok("ID_LINKAJA"),
        ChannelCode::Wallet => Err(PaymentError::UnsupportedCombination {
            field: "channel code",
            value: channel.to_string(),
            gateway: "XENDIT".to_string(),
        }),
    }
}

/// Completed as soon as one payment succeeded; failed once the QR code is
/// no longer active without having been paid.
fn charge_status(payments: &[QrPayment], qr_status: Option<&str>) -> ExternalChargeStatus {
    if payments.iter().any(|p| p.status == "SUCCEEDED") {
        ExternalChargeStatus::Completed
    } else if qr_status == Some("INACTIVE") {
        ExternalChargeStatus::Failed
    } else {
        ExternalChargeStatus::Pending
    }
}

/// Whether an error says something about the provider's health. A 4xx
/// rejection means the provider answered, so it does not trip the breaker.
fn provider_fault(error: &PaymentError) -> bool {
    !matches!(error, PaymentError::GatewayRejected(_))
}

impl XenditClient {
    pub fn new(config: XenditConfig, metrics: Arc<Metrics>) -> Result<Self, PaymentError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PaymentError::Gateway(format!("failed to build HTTP client: {}", e)))?;

        let cb_config = CircuitBreakerConfig {
            failure_threshold: 5,
            open_timeout: Duration::from_secs(30),
            success_threshold: 2,
        };

        Ok(Self {
            http,
            config,
            circuit_breaker: CircuitBreaker::new("xendit", cb_config),
            metrics,
        })
    }

    pub async fn circuit_state(&self) -> CircuitState {
        self.circuit_breaker.state().await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn send<T>(&self, request: reqwest::RequestBuilder) -> Result<T, PaymentError>
    where
        T: serde::de::DeserializeOwned,
    {
        let call = async {
            let response = request
                .basic_auth(&self.config.secret_key, None::<&str>)
                .header("api-version", API_VERSION)
                .send()
                .await
                .map_err(|e| PaymentError::Gateway(e.to_string()))?;

            let status = response.status();
            if status.is_client_error() {
                let body = response.text().await.unwrap_or_default();
                return Err(PaymentError::GatewayRejected(format!("{}: {}", status, body)));
            }
            if !status.is_success() {
                return Err(PaymentError::Gateway(format!("unexpected status {}", status)));
            }

            response
                .json::<T>()
                .await
                .map_err(|e| PaymentError::Gateway(format!("malformed response: {}", e)))
        };

        let result = self.circuit_breaker.call_with(call, provider_fault).await;
        self.metrics.set_circuit_state(self.circuit_breaker.state().await);

        match result {
            Ok(value) => Ok(value),
            Err(CircuitBreakerError::CircuitOpen) => {
                tracing::error!("Circuit breaker open - Xendit unavailable");
                Err(PaymentError::GatewayUnavailable)
            }
            Err(CircuitBreakerError::OperationFailed(e)) => {
                tracing::error!(error = %e, "Xendit call failed");
                Err(e)
            }
        }
    }
}

#[async_trait]
impl ExternalPaymentGateway for XenditClient {
    fn name(&self) -> &'static str {
        "xendit"
    }

    async fn create_charge(&self, request: &ChargeRequest) -> Result<ExternalCharge, PaymentError> {
        let body = CreateQrCode {
            reference_id: request.reference_id.to_string(),
            kind: "DYNAMIC",
            currency: "IDR",
            amount: request.amount,
            channel_code: channel_code(request.channel)?,
        };

        let qr: QrCode = self
            .send(self.http.post(self.url("/qr_codes")).json(&body))
            .await?;

        tracing::info!(
            external_id = %qr.id,
            reference_id = %request.reference_id,
            status = %qr.status,
            "Xendit QR code created"
        );

        Ok(ExternalCharge {
            external_id: qr.id,
            qr_string: qr.qr_string,
            status: ExternalChargeStatus::Pending,
        })
    }

    async fn check_status(&self, external_id: &str) -> Result<ExternalChargeStatus, PaymentError> {
        let payments: QrPaymentList = self
            .send(self.http.get(self.url(&format!("/qr_codes/{}/payments", external_id))))
            .await?;

        let status = match charge_status(&payments.data, None) {
            ExternalChargeStatus::Completed => ExternalChargeStatus::Completed,
            _ => {
                let qr: QrCode = self
                    .send(self.http.get(self.url(&format!("/qr_codes/{}", external_id))))
                    .await?;
                charge_status(&payments.data, Some(&qr.status))
            }
        };

        tracing::debug!(external_id = %external_id, status = %status, "Xendit charge status");
        Ok(status)
    }
}
