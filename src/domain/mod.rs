//! Domain layer for the constraint advisor
//!
//! Conversation state, decisions, component rules and the ports the
//! coordinator talks to. Nothing in here performs I/O.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
