//! Native Ollama API client for model discovery and non-streaming chat.
//!
//! Uses Ollama's native /api/chat endpoint (not OpenAI-compatible) so each
//! evaluated answer can be logged with tokens/sec, eval time, and load time.

use std::time::Duration;

use async_trait::async_trait;
use ragprobe_core::{slugify, EvalError, Generator, ModelConfig};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::http::transport_err;

/// Response from Ollama's /api/tags endpoint.
#[derive(Debug, Deserialize)]
pub struct OllamaTagsResponse {
    pub models: Vec<OllamaModelInfo>,
}

/// Information about a single Ollama model.
#[derive(Debug, Deserialize)]
pub struct OllamaModelInfo {
    pub name: String,
}

/// Discovers available models from an Ollama instance.
pub async fn discover_models(ollama_host: &str) -> Result<Vec<ModelConfig>, EvalError> {
    let timeout = Duration::from_secs(5);
    let host = ollama_host.trim_end_matches('/');
    let url = format!("{host}/api/tags");

    let response = Client::new()
        .get(&url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| transport_err(e, timeout))?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(EvalError::Http { status, body });
    }

    let tags: OllamaTagsResponse = response
        .json()
        .await
        .map_err(|e| EvalError::ParseError(format!("Ollama tags: {e}")))?;

    let models: Vec<ModelConfig> = tags
        .models
        .into_iter()
        .map(|m| ModelConfig {
            id: format!("ollama-{}", slugify(&m.name)),
            name: format_display_name(&m.name),
            model: m.name,
            api_base: Some(host.to_string()),
        })
        .collect();

    info!("Discovered {} Ollama models", models.len());
    Ok(models)
}

/// Formats a model name for display (e.g., "llama3:8b" -> "Llama3:8b (Local)").
fn format_display_name(model_name: &str) -> String {
    let last_segment = model_name.rsplit('/').next().unwrap_or(model_name);
    let (base, tag) = last_segment.split_once(':').unwrap_or((last_segment, ""));

    let mut chars = base.chars();
    let display_base: String = match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    };

    let tag_suffix = if tag.is_empty() { String::new() } else { format!(":{tag}") };
    format!("{display_base}{tag_suffix} (Local)")
}

/// Performance metrics from Ollama's native API.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OllamaMetrics {
    #[serde(default)]
    pub total_duration: u64,
    #[serde(default)]
    pub prompt_eval_count: u32,
    #[serde(default)]
    pub prompt_eval_duration: u64,
    #[serde(default)]
    pub eval_count: u32,
    #[serde(default)]
    pub eval_duration: u64,
}

impl OllamaMetrics {
    /// Calculates tokens generated per second.
    pub fn tokens_per_sec(&self) -> f64 {
        if self.eval_duration == 0 {
            return 0.0;
        }
        (self.eval_count as f64) / (self.eval_duration as f64 / 1_000_000_000.0)
    }

    /// Total request duration in milliseconds.
    pub fn total_duration_ms(&self) -> u64 {
        self.total_duration / 1_000_000
    }
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct OllamaMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: Option<OllamaResponseMessage>,
    #[serde(flatten)]
    metrics: OllamaMetrics,
}

#[derive(Debug, Deserialize)]
struct OllamaResponseMessage {
    content: String,
}

/// Client for Ollama's native chat API.
pub struct OllamaClient {
    client: Client,
    api_base: String,
    model: String,
    system_prompt: Option<String>,
    timeout: Duration,
}

impl OllamaClient {
    /// Creates a new client for the given model and Ollama API base URL.
    pub fn new(model: &str, api_base: &str, timeout: Duration) -> Self {
        let base = api_base.trim_end_matches('/').trim_end_matches("/v1").to_string();

        Self {
            client: Client::new(),
            api_base: base,
            model: model.to_string(),
            system_prompt: None,
            timeout,
        }
    }

    /// Sends `prompt` as a system message ahead of every request.
    pub fn with_system_prompt(mut self, prompt: Option<String>) -> Self {
        self.system_prompt = prompt;
        self
    }

    /// Sends a single-turn chat request, returns content and metrics.
    pub async fn chat_with_metrics(&self, user_input: &str) -> Result<(String, OllamaMetrics), EvalError> {
        let url = format!("{}/api/chat", self.api_base);

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = self.system_prompt.as_deref() {
            messages.push(OllamaMessage { role: "system", content: system });
        }
        messages.push(OllamaMessage { role: "user", content: user_input });

        let request = OllamaChatRequest { model: &self.model, messages, stream: false };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| transport_err(e, self.timeout))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(EvalError::Http { status, body });
        }

        let resp: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| EvalError::ParseError(e.to_string()))?;

        let content = resp
            .message
            .map(|m| m.content)
            .ok_or_else(|| EvalError::MissingField("message".into()))?;

        info!(
            "Ollama: {}ms total, {:.1} tok/s, {} eval tokens",
            resp.metrics.total_duration_ms(),
            resp.metrics.tokens_per_sec(),
            resp.metrics.eval_count
        );

        Ok((content, resp.metrics))
    }
}

#[async_trait]
impl Generator for OllamaClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, EvalError> {
        self.chat_with_metrics(prompt).await.map(|(content, _)| content)
    }
}
