// ============================================================================
// commerce_orders - order creation and lifecycle core
// ============================================================================
//
// - domain/      - stock, discount, wallet, payment routing, order aggregate
// - persistence/ - transactional store traits, Postgres and in-memory stores
// - gateways/    - external payment providers (Xendit, sandbox)
// - actors/      - OrderActor, the message surface for callers
// - metrics/     - Prometheus registry and /metrics server
// - utils/       - circuit breaker, retry with backoff
//
// ============================================================================

pub mod actors;
pub mod config;
pub mod domain;
pub mod gateways;
pub mod metrics;
pub mod persistence;
pub mod utils;
