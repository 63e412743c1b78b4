//! Interview conversations: session lifecycle, prompts, and storage.

pub mod core;
pub mod prompts;
pub mod registry;
pub mod session;
pub mod storage;
#[cfg(test)]
pub mod testing;
pub mod transcript;

pub use self::core::{ConversationError, ConversationResult, ScoutConfig, SessionId, Turn, TurnRole};
pub use prompts::{AgentMode, InstructionSet};
pub use registry::{SessionHandle, SessionRegistry};
pub use session::{ConversationSession, EndResult, SessionBackends, SessionSnapshot, SessionStatus};
pub use storage::{ConversationRecord, ConversationStore};
