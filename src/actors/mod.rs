// ============================================================================
// Actors Module
// ============================================================================
//
// The OrderActor is the entry point callers talk to. It owns no state of
// its own; domain logic stays in OrderCommandHandler.
//
// ============================================================================

mod order_actor;

pub use order_actor::{ChangeOrderStatus, CreateOrder, OrderActor, RefreshPayment};
