//! Core conversation types and identifiers.

pub mod config;
pub mod errors;
pub mod evaluation;
pub mod ids;
pub mod turn;

pub use config::{
    AgentConfig, GenerationParams, LlmProvider, ModelConfig, ScoutConfig, ServerConfig,
    SessionConfig, StorageConfig,
};
pub use errors::{
    ConversationError, ConversationResult, PersistenceError, PersistenceResult, UpstreamError,
    UpstreamResult,
};
pub use evaluation::Evaluation;
pub use ids::SessionId;
pub use turn::{Turn, TurnRole};
