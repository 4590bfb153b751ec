// ============================================================================
// Payment Domain - Gateway Routing
// ============================================================================

pub mod errors;
pub mod gateway;
pub mod router;
pub mod value_objects;

pub use errors::*;
pub use gateway::*;
pub use router::*;
pub use value_objects::*;
