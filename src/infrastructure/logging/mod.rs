//! Logging infrastructure
//!
//! Structured logging using tracing and tracing-subscriber:
//! - JSON or pretty console output on stderr
//! - Optional rolling JSON log files
//! - Contact-detail scrubbing for logged user text

pub mod config;
pub mod logger;
pub mod scrubbing;

pub use config::{LogConfig, LogFormat, RotationPolicy};
pub use logger::LoggerImpl;
pub use scrubbing::PiiScrubber;
