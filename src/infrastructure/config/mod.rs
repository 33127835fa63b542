//! Configuration management infrastructure
//!
//! Hierarchical configuration using figment:
//! - YAML file loading
//! - Environment variable overrides
//! - Configuration validation
//! - Rule and overlay file loading

pub mod loader;
pub mod registries;

pub use loader::{ConfigError, ConfigLoader};
pub use registries::{load_component_registry, load_overlay_registry};
