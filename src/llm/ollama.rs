//! Local model backend through Rig's Ollama provider.

use reqwest::Client as ReqwestClient;
use rig::client::CompletionClient;
use rig::completion::CompletionModel;
use rig::message::{AssistantContent, Message};
use rig::providers::ollama;
use tracing::debug;

use crate::conversation::core::config::ModelConfig;
use crate::conversation::core::errors::{ConversationResult, UpstreamError, UpstreamResult};
use crate::conversation::core::turn::{Turn, TurnRole};
use crate::conversation::prompts::{Delivery, Instruction, Purpose};
use crate::conversation::transcript::{format_transcript, render_template};
use crate::llm::client::{params_for, GenerateFuture, LanguageModelClient};

/// Ollama-backed client. One Rig completion model per purpose.
pub struct OllamaChatClient {
    chat: ollama::CompletionModel,
    summary: ollama::CompletionModel,
    evaluation: ollama::CompletionModel,
    config: ModelConfig,
}

impl OllamaChatClient {
    /// Create a client from model settings.
    ///
    /// # Errors
    /// Returns an error if the Ollama client cannot be built.
    pub fn new(config: &ModelConfig) -> ConversationResult<Self> {
        let builder = ollama::Client::<ReqwestClient>::builder().api_key(rig::client::Nothing);
        let builder = if let Some(base_url) = &config.base_url {
            builder.base_url(base_url)
        } else {
            builder
        };
        let client = builder.build().map_err(UpstreamError::from)?;

        Ok(Self {
            chat: client.completion_model(config.chat.model.clone()),
            summary: client.completion_model(config.summary.model.clone()),
            evaluation: client.completion_model(config.evaluation.model.clone()),
            config: config.clone(),
        })
    }

    const fn model_for(&self, purpose: Purpose) -> &ollama::CompletionModel {
        match purpose {
            Purpose::Chat => &self.chat,
            Purpose::Summary => &self.summary,
            Purpose::Evaluation => &self.evaluation,
        }
    }

    async fn complete(&self, turns: &[Turn], instruction: &Instruction) -> UpstreamResult<String> {
        let params = params_for(&self.config, instruction.purpose());
        let model = self.model_for(instruction.purpose());
        let layout = layout_prompt(turns, instruction)?;

        debug!(
            "Requesting {:?} completion from ollama model {} ({} history messages)",
            instruction.purpose(),
            params.model,
            layout.history.len()
        );

        let builder = model
            .completion_request(layout.prompt)
            .messages(layout.history)
            .temperature(params.temperature)
            .max_tokens_opt(Some(params.max_tokens));
        let request = match layout.preamble {
            Some(preamble) => builder.preamble(preamble).build(),
            None => builder.build(),
        };

        let response = model.completion(request).await?;
        let text = extract_text(&response.choice);
        let text = text.trim();
        if text.is_empty() {
            return Err(UpstreamError::MalformedOutput(
                "completion has no content".to_string(),
            ));
        }
        Ok(text.to_string())
    }
}

impl LanguageModelClient for OllamaChatClient {
    fn generate<'a>(
        &'a self,
        turns: &'a [Turn],
        instruction: &'a Instruction,
    ) -> GenerateFuture<'a, UpstreamResult<String>> {
        Box::pin(self.complete(turns, instruction))
    }
}

/// Preamble, prior messages and final prompt of one Rig completion request.
#[derive(Debug)]
struct PromptLayout {
    preamble: Option<String>,
    history: Vec<Message>,
    prompt: Message,
}

/// Map an instruction and the turn history onto a Rig request.
///
/// Chat instructions become the preamble, earlier turns the chat history and
/// the newest turn the prompt. Summary and evaluation templates receive the
/// whole transcript as a single user message.
fn layout_prompt(turns: &[Turn], instruction: &Instruction) -> UpstreamResult<PromptLayout> {
    match instruction.delivery() {
        Delivery::System => {
            let (latest, earlier) = turns.split_last().ok_or_else(|| {
                UpstreamError::InvalidRequest("chat request needs at least one turn".to_string())
            })?;
            Ok(PromptLayout {
                preamble: Some(instruction.text().to_string()),
                history: earlier.iter().map(to_message).collect(),
                prompt: to_message(latest),
            })
        }
        Delivery::Transcript => Ok(PromptLayout {
            preamble: None,
            history: Vec::new(),
            prompt: Message::user(render_template(
                instruction.text(),
                &format_transcript(turns),
            )),
        }),
    }
}

fn to_message(turn: &Turn) -> Message {
    match turn.role {
        TurnRole::User => Message::user(turn.text.clone()),
        TurnRole::Agent => Message::assistant(turn.text.clone()),
    }
}

/// Extract text from assistant response.
fn extract_text(choice: &rig::OneOrMany<AssistantContent>) -> String {
    let mut out = String::new();
    for content in choice.iter() {
        if let AssistantContent::Text(text) = content {
            out.push_str(&text.text);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::prompts::{AgentMode, InstructionSet};

    #[test]
    fn test_layout_chat_prompt() {
        let set = InstructionSet::for_mode(AgentMode::Abbreviated);
        let turns = vec![
            Turn::user("Hi, I'm Alex"),
            Turn::agent("Welcome, Alex"),
            Turn::user("I work in logistics"),
        ];

        let layout = layout_prompt(&turns, &set.chat).unwrap();
        assert_eq!(layout.preamble.as_deref(), Some(set.chat.text()));
        assert_eq!(
            layout.history,
            vec![Message::user("Hi, I'm Alex"), Message::assistant("Welcome, Alex")]
        );
        assert_eq!(layout.prompt, Message::user("I work in logistics"));
    }

    #[test]
    fn test_layout_chat_keeps_latest_turn_of_long_history() {
        let set = InstructionSet::for_mode(AgentMode::Standard);
        let long_answer = "x".repeat(5_000);
        let mut turns = Vec::new();
        for _ in 0..5 {
            turns.push(Turn::user(long_answer.clone()));
            turns.push(Turn::agent("Go on."));
        }
        turns.push(Turn::user("LATEST_ANSWER"));

        let layout = layout_prompt(&turns, &set.chat).unwrap();
        assert_eq!(layout.prompt, Message::user("LATEST_ANSWER"));
        assert_eq!(layout.history.len(), 10);
        assert_eq!(layout.history[0], Message::user(long_answer));
    }

    #[test]
    fn test_layout_chat_without_turns_is_rejected() {
        let set = InstructionSet::for_mode(AgentMode::Standard);
        assert!(matches!(
            layout_prompt(&[], &set.chat),
            Err(UpstreamError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_layout_summary_prompt() {
        let set = InstructionSet::for_mode(AgentMode::Standard);
        let turns = vec![Turn::user("Hi, I'm Alex"), Turn::agent("Welcome")];

        let layout = layout_prompt(&turns, &set.summary).unwrap();
        assert!(layout.preamble.is_none());
        assert!(layout.history.is_empty());
        let Message::User { content } = layout.prompt else {
            panic!("summary prompt must be a user message");
        };
        let rig::message::UserContent::Text(text) = content.first() else {
            panic!("summary prompt must be text");
        };
        assert!(text.text.contains("User: Hi, I'm Alex\nAssistant: Welcome"));
        assert!(text.text.ends_with("Summary:"));
    }
}
