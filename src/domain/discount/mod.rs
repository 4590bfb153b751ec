// ============================================================================
// Discount Domain - Coupons, Usage Quotas, Discount Amounts
// ============================================================================

pub mod engine;
pub mod errors;
pub mod value_objects;

pub use engine::*;
pub use errors::*;
pub use value_objects::*;
