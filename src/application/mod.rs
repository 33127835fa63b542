//! Application layer: turn orchestration over the domain engines.

pub mod turn_coordinator;

pub use turn_coordinator::{TurnCoordinator, TurnResponse};
