// ============================================================================
// External Payment Gateways
// ============================================================================
//
// Implementations of domain::payment::ExternalPaymentGateway:
// - xendit  - Xendit QR Codes API over HTTPS, behind a circuit breaker
// - sandbox - in-process provider for local runs and tests
//
// ============================================================================

pub mod sandbox;
pub mod xendit;

pub use sandbox::SandboxGateway;
pub use xendit::{XenditClient, XenditConfig};
