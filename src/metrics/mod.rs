// Private module declaration
mod server;

use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry};

pub use server::start_metrics_server;

// ============================================================================
// Metrics Module - Prometheus metrics for the order pipeline
// ============================================================================
//
// - Orders created / failed (by gateway, by error kind)
// - Status transitions (from -> to)
// - Refunds back to wallets (count and amount)
// - External payment provider latency, failures and circuit state
//
// Scraped via GET /metrics on the metrics server.
// ============================================================================

pub struct Metrics {
    registry: Registry,

    // Order Metrics
    pub orders_created: IntCounterVec,
    pub orders_failed: IntCounterVec,
    pub status_transitions: IntCounterVec,

    // Refund Metrics
    pub refunds_total: IntCounter,
    pub refunded_amount_total: IntCounter,

    // Payment Gateway Metrics
    pub gateway_duration: HistogramVec,
    pub gateway_failures: IntCounterVec,
    pub gateway_circuit_state: IntGauge,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let orders_created = IntCounterVec::new(
            Opts::new("orders_created_total", "Orders created successfully"),
            &["gateway"],
        )?;
        registry.register(Box::new(orders_created.clone()))?;

        let orders_failed = IntCounterVec::new(
            Opts::new("orders_failed_total", "Order creations that were rolled back"),
            &["kind"],
        )?;
        registry.register(Box::new(orders_failed.clone()))?;

        let status_transitions = IntCounterVec::new(
            Opts::new("order_status_transitions_total", "Applied order status transitions"),
            &["from", "to"],
        )?;
        registry.register(Box::new(status_transitions.clone()))?;

        let refunds_total = IntCounter::new("refunds_total", "Refunds credited to wallets")?;
        registry.register(Box::new(refunds_total.clone()))?;

        let refunded_amount_total = IntCounter::new(
            "refunded_amount_total",
            "Sum of refunded amounts in currency units",
        )?;
        registry.register(Box::new(refunded_amount_total.clone()))?;

        let gateway_duration = HistogramVec::new(
            HistogramOpts::new(
                "payment_gateway_duration_seconds",
                "External payment provider call duration",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
            &["gateway", "operation"],
        )?;
        registry.register(Box::new(gateway_duration.clone()))?;

        let gateway_failures = IntCounterVec::new(
            Opts::new("payment_gateway_failures_total", "Failed external payment provider calls"),
            &["gateway", "operation"],
        )?;
        registry.register(Box::new(gateway_failures.clone()))?;

        let gateway_circuit_state = IntGauge::new(
            "payment_gateway_circuit_state",
            "Provider circuit breaker state (0=Closed, 1=HalfOpen, 2=Open)",
        )?;
        registry.register(Box::new(gateway_circuit_state.clone()))?;

        Ok(Self {
            registry,
            orders_created,
            orders_failed,
            status_transitions,
            refunds_total,
            refunded_amount_total,
            gateway_duration,
            gateway_failures,
            gateway_circuit_state,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_order_created(&self, gateway: &str) {
        self.orders_created.with_label_values(&[gateway]).inc();
    }

    pub fn record_order_failed(&self, kind: &str) {
        self.orders_failed.with_label_values(&[kind]).inc();
    }

    pub fn record_status_transition(&self, from: &str, to: &str) {
        self.status_transitions.with_label_values(&[from, to]).inc();
    }

    pub fn record_refund(&self, amount: i64) {
        self.refunds_total.inc();
        self.refunded_amount_total.inc_by(amount.max(0) as u64);
    }

    pub fn record_gateway_call(&self, gateway: &str, operation: &str, duration_secs: f64, success: bool) {
        self.gateway_duration
            .with_label_values(&[gateway, operation])
            .observe(duration_secs);
        if !success {
            self.gateway_failures.with_label_values(&[gateway, operation]).inc();
        }
    }

    pub fn set_circuit_state(&self, state: crate::utils::CircuitState) {
        self.gateway_circuit_state.set(state.as_gauge());
    }
}
