//! Language model client abstraction.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::conversation::core::config::{GenerationParams, LlmProvider, ModelConfig};
use crate::conversation::core::errors::{ConversationError, ConversationResult, UpstreamResult};
use crate::conversation::core::turn::{Turn, TurnRole};
use crate::conversation::prompts::{Delivery, Instruction, Purpose};
use crate::conversation::transcript::{format_transcript, render_template};
use crate::llm::ollama::OllamaChatClient;
use crate::llm::openai::OpenAiChatClient;

/// Boxed future type for model calls.
pub type GenerateFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Stateless request/response access to a language model.
pub trait LanguageModelClient: Send + Sync {
    /// Generate text from an ordered turn history and an instruction.
    ///
    /// # Errors
    /// Returns an error if the request fails or the reply is unusable.
    fn generate<'a>(
        &'a self,
        turns: &'a [Turn],
        instruction: &'a Instruction,
    ) -> GenerateFuture<'a, UpstreamResult<String>>;
}

/// Build the configured client.
///
/// # Errors
/// Returns an error if the client cannot be constructed.
pub fn from_config(config: &ModelConfig) -> ConversationResult<Arc<dyn LanguageModelClient>> {
    match config.provider {
        LlmProvider::OpenAi => {
            let api_key = config.api_key.clone().ok_or_else(|| {
                ConversationError::InvalidConfig("missing OPENAI_API_KEY".to_string())
            })?;
            Ok(Arc::new(OpenAiChatClient::new(config, api_key)?))
        }
        LlmProvider::Ollama => Ok(Arc::new(OllamaChatClient::new(config)?)),
    }
}

/// Chat message role on the wire.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// System instruction.
    System,
    /// Human turn.
    User,
    /// Model turn.
    Assistant,
}

/// One chat-completion message.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role.
    pub role: ChatRole,
    /// Text content.
    pub content: String,
}

impl ChatMessage {
    fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

impl From<&Turn> for ChatMessage {
    fn from(turn: &Turn) -> Self {
        let role = match turn.role {
            TurnRole::User => ChatRole::User,
            TurnRole::Agent => ChatRole::Assistant,
        };
        Self::new(role, turn.text.clone())
    }
}

/// Lay out an instruction and a turn history as chat messages.
#[must_use]
pub fn build_messages(turns: &[Turn], instruction: &Instruction) -> Vec<ChatMessage> {
    match instruction.delivery() {
        Delivery::System => {
            let mut messages = Vec::with_capacity(turns.len() + 1);
            messages.push(ChatMessage::new(ChatRole::System, instruction.text()));
            messages.extend(turns.iter().map(ChatMessage::from));
            messages
        }
        Delivery::Transcript => {
            let transcript = format_transcript(turns);
            vec![ChatMessage::new(
                ChatRole::User,
                render_template(instruction.text(), &transcript),
            )]
        }
    }
}

/// Sampling parameters for a purpose.
#[must_use]
pub const fn params_for(config: &ModelConfig, purpose: Purpose) -> &GenerationParams {
    match purpose {
        Purpose::Chat => &config.chat,
        Purpose::Summary => &config.summary,
        Purpose::Evaluation => &config.evaluation,
    }
}
