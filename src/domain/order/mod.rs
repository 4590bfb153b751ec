// ============================================================================
// Order Domain - Creation Orchestration & Status Lifecycle
// ============================================================================
//
// - Value objects (OrderStatus, Actor, OrderLine, CustomerSnapshot, ...)
// - Commands (CreateOrderRequest, OrderCommand)
// - Events (OrderEvent - decisions taken by the aggregate)
// - Errors (OrderError, classified through ErrorKind)
// - Aggregate (Order + status state machine)
// - Command Handler (OrderCommandHandler - the transactional orchestrator)
//
// ============================================================================

pub mod aggregate;
pub mod command_handler;
pub mod commands;
pub mod errors;
pub mod events;
pub mod value_objects;

pub use aggregate::*;
pub use command_handler::*;
pub use commands::*;
pub use errors::*;
pub use events::*;
pub use value_objects::*;
