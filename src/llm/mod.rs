//! Language model backends.

pub mod client;
pub mod ollama;
pub mod openai;

pub use client::{ChatMessage, ChatRole, GenerateFuture, LanguageModelClient, from_config};
pub use ollama::OllamaChatClient;
pub use openai::OpenAiChatClient;
