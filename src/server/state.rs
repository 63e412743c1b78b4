//! Application state shared across all request handlers.

use std::sync::Arc;

use crate::conversation::core::config::{AgentConfig, ScoutConfig};
use crate::conversation::core::errors::ConversationResult;
use crate::conversation::prompts::InstructionSet;
use crate::conversation::registry::SessionRegistry;
use crate::conversation::session::SessionBackends;
use crate::conversation::storage::{self, ConversationStore};
use crate::llm::{self, LanguageModelClient};

/// Shared application state.
pub struct AppState {
    /// Live sessions.
    pub registry: SessionRegistry,
    /// Store for saved conversations.
    pub store: Arc<dyn ConversationStore>,
    /// Persona shown to clients.
    pub agent: AgentConfig,
}

impl AppState {
    /// Build the model client and store from configuration.
    ///
    /// # Errors
    /// Returns an error if a backend cannot be initialized.
    pub async fn new(config: &ScoutConfig) -> ConversationResult<Arc<Self>> {
        let llm = llm::from_config(&config.model)?;
        let store = storage::from_config(&config.storage).await?;
        Ok(Self::from_parts(config, llm, store))
    }

    /// Assemble state from ready backends.
    #[must_use]
    pub fn from_parts(
        config: &ScoutConfig,
        llm: Arc<dyn LanguageModelClient>,
        store: Arc<dyn ConversationStore>,
    ) -> Arc<Self> {
        let backends = SessionBackends {
            llm,
            store: Arc::clone(&store),
            instructions: Arc::new(InstructionSet::for_mode(config.agent.mode)),
        };
        Arc::new(Self {
            registry: SessionRegistry::with_settings(backends, config.sessions.clone()),
            store,
            agent: config.agent.clone(),
        })
    }
}
