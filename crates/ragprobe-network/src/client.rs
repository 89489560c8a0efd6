//! OpenAI-compatible chat client.
//!
//! Works with the OpenAI API and any compatible endpoint (including Ollama's /v1 endpoint).

use std::time::{Duration, Instant};

use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs, CreateChatCompletionResponse,
    },
    Client,
};
use async_trait::async_trait;
use ragprobe_core::{EvalError, Generator};
use tracing::info;

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant. Answer concisely.";

/// Token usage and timing metrics from an LLM call.
#[derive(Debug, Clone, Default)]
pub struct LlmMetrics {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub elapsed_ms: u64,
}

/// Complete response from an LLM call.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub metrics: LlmMetrics,
}

fn llm_err(e: impl ToString) -> EvalError {
    EvalError::Backend(e.to_string())
}

/// Builds the message list for a simple system + user request.
fn build_messages(system_prompt: &str, user_input: &str) -> Result<Vec<ChatCompletionRequestMessage>, EvalError> {
    Ok(vec![
        ChatCompletionRequestMessage::System(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system_prompt)
                .build()
                .map_err(llm_err)?,
        ),
        ChatCompletionRequestMessage::User(
            ChatCompletionRequestUserMessageArgs::default()
                .content(user_input)
                .build()
                .map_err(llm_err)?,
        ),
    ])
}

/// Extracts content and metrics from a completion response.
fn extract_response(response: CreateChatCompletionResponse, elapsed_ms: u64) -> Result<LlmResponse, EvalError> {
    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| EvalError::MissingField("choices[0].message.content".into()))?;

    let (input_tokens, output_tokens) = response
        .usage
        .map(|u| (u.prompt_tokens, u.completion_tokens))
        .unwrap_or((0, 0));

    info!("LLM: {}ms, tokens: {}/{} (in/out)", elapsed_ms, input_tokens, output_tokens);

    Ok(LlmResponse {
        content,
        metrics: LlmMetrics { input_tokens, output_tokens, elapsed_ms },
    })
}

/// Client for OpenAI-compatible chat completion APIs.
pub struct LlmClient {
    client: Client<OpenAIConfig>,
    model: String,
    system_prompt: String,
    timeout: Duration,
}

impl LlmClient {
    /// Creates a client. Without an explicit key, a custom `api_base` gets a
    /// placeholder key and the default base falls back to `OPENAI_API_KEY`.
    pub fn new(model: &str, api_base: Option<&str>, api_key: Option<String>, timeout: Duration) -> Self {
        let config = match (api_base, api_key) {
            (Some(base), Some(key)) => OpenAIConfig::new().with_api_base(base).with_api_key(key),
            (Some(base), None) => OpenAIConfig::new().with_api_base(base).with_api_key("ollama"),
            (None, Some(key)) => OpenAIConfig::new().with_api_key(key),
            (None, None) => OpenAIConfig::default(),
        };

        Self {
            client: Client::with_config(config),
            model: model.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            timeout,
        }
    }

    /// Replaces the default system prompt when one is given.
    pub fn with_system_prompt(mut self, prompt: Option<String>) -> Self {
        if let Some(prompt) = prompt {
            self.system_prompt = prompt;
        }
        self
    }

    /// Sends a chat request and returns the complete response.
    pub async fn chat(&self, system_prompt: &str, user_input: &str) -> Result<LlmResponse, EvalError> {
        let start = Instant::now();
        let messages = build_messages(system_prompt, user_input)?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .build()
            .map_err(llm_err)?;

        let response = tokio::time::timeout(self.timeout, self.client.chat().create(request))
            .await
            .map_err(|_| EvalError::Timeout(self.timeout.as_secs()))?
            .map_err(llm_err)?;

        extract_response(response, start.elapsed().as_millis() as u64)
    }
}

#[async_trait]
impl Generator for LlmClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, EvalError> {
        self.chat(&self.system_prompt, prompt).await.map(|r| r.content)
    }
}
