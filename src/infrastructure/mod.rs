//! Infrastructure layer module
//!
//! Configuration loading and logging setup. Persistence lives under
//! `adapters`; this layer only wires process-level concerns.

pub mod config;
pub mod logging;
