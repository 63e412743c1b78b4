//! OpenAI-compatible chat completions client.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::conversation::core::config::{GenerationParams, ModelConfig};
use crate::conversation::core::errors::{ConversationResult, UpstreamError, UpstreamResult};
use crate::conversation::core::turn::Turn;
use crate::conversation::prompts::Instruction;
use crate::llm::client::{
    build_messages, params_for, ChatMessage, GenerateFuture, LanguageModelClient,
};

/// Default API root.
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Connection establishment timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Whole-request timeout; long interview replies can take a while.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f64,
    max_tokens: u64,
    top_p: f64,
    presence_penalty: f64,
    frequency_penalty: f64,
    stream: bool,
}

impl<'a> ChatCompletionRequest<'a> {
    fn new(params: &'a GenerationParams, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: params.model.as_str(),
            messages,
            temperature: params.temperature,
            max_tokens: params.max_tokens,
            top_p: params.top_p,
            presence_penalty: params.presence_penalty,
            frequency_penalty: params.frequency_penalty,
            stream: false,
        }
    }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Client for `POST {base_url}/chat/completions`.
pub struct OpenAiChatClient {
    client: Client,
    api_key: String,
    base_url: String,
    config: ModelConfig,
}

impl OpenAiChatClient {
    /// Create a client from model settings.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &ModelConfig, api_key: String) -> ConversationResult<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(UpstreamError::from)?;
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            config: config.clone(),
        })
    }

    async fn complete(&self, turns: &[Turn], instruction: &Instruction) -> UpstreamResult<String> {
        let params = params_for(&self.config, instruction.purpose());
        let messages = build_messages(turns, instruction);
        let request = ChatCompletionRequest::new(params, messages);
        let url = format!("{}/chat/completions", self.base_url);

        debug!(
            "Requesting {:?} completion from {} ({} turns)",
            instruction.purpose(),
            params.model,
            turns.len()
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Model API error: {} - {}", status, body);
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatCompletionResponse = response.json().await?;
        extract_content(parsed)
    }
}

impl LanguageModelClient for OpenAiChatClient {
    fn generate<'a>(
        &'a self,
        turns: &'a [Turn],
        instruction: &'a Instruction,
    ) -> GenerateFuture<'a, UpstreamResult<String>> {
        Box::pin(self.complete(turns, instruction))
    }
}

fn extract_content(response: ChatCompletionResponse) -> UpstreamResult<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
        .ok_or_else(|| UpstreamError::MalformedOutput("completion has no content".to_string()))
}
