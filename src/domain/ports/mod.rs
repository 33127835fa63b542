//! Port trait definitions (Hexagonal Architecture)
//!
//! Contracts for the collaborators surrounding the engines:
//! - ConversationRepository: read/commit of per-session state
//! - MessageAnalyzer: natural-language analysis of a user message
//! - ResponseGenerator: prose generation from composed instructions

pub mod conversation_repository;
pub mod message_analyzer;
pub mod response_generator;

pub use conversation_repository::ConversationRepository;
pub use message_analyzer::MessageAnalyzer;
pub use response_generator::{GenerationRequest, ResponseGenerator};
