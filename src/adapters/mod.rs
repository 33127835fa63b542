//! Adapters for the domain ports.

pub mod analysis;
pub mod generation;
pub mod memory;
pub mod sqlite;

pub use analysis::ScriptedAnalyzer;
pub use generation::OverlayEchoGenerator;
pub use memory::InMemoryConversationRepository;
pub use sqlite::SqliteConversationRepository;
