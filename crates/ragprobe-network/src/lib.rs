//! Model backends: subprocess, HTTP, discovered local listeners, Ollama and
//! OpenAI-compatible APIs, plus the retriever and judge endpoints.

mod cli;
mod client;
mod discovery;
mod http;
mod judge;
mod ollama;

use std::time::Duration;

use ragprobe_config::{read_api_key, BackendConfig, Settings};
use ragprobe_core::{EvalError, Generator};
use tracing::info;

pub use cli::CliBackend;
pub use client::{LlmClient, LlmMetrics, LlmResponse};
pub use discovery::{discover_listener, listener_url, PROBE_TIMEOUT};
pub use http::{extract_answer, extract_contexts, HttpBackend};
pub use judge::{verdict_score, JudgeClient, RetrieverClient};
pub use ollama::{discover_models, OllamaClient, OllamaMetrics};
pub use ragprobe_core::{answer_or_sentinel, generate_or_sentinel};

/// Creates the generator described by `config`. Discovered backends probe their ports first.
pub async fn build_generator(config: &BackendConfig, settings: &Settings) -> Result<Box<dyn Generator>, EvalError> {
    let timeout = Duration::from_secs(settings.timeout_secs);

    let generator: Box<dyn Generator> = match config {
        BackendConfig::Cli { executable, model } => {
            let backend = CliBackend::new(executable, model, timeout);
            backend.check_available().await;
            Box::new(backend)
        }
        BackendConfig::Http { url, model, prompt_key, answer_keys, api_key_env } => {
            let api_key = api_key_env.as_deref().and_then(read_api_key);
            Box::new(
                HttpBackend::new(url, timeout)
                    .with_label(model.as_deref().unwrap_or(url.as_str()))
                    .with_prompt_key(prompt_key)
                    .with_answer_keys(answer_keys.clone())
                    .with_api_key(api_key),
            )
        }
        BackendConfig::Discovered { host, ports, path, model, prompt_key, answer_keys } => {
            let addr = discover_listener(host, ports, PROBE_TIMEOUT).await?;
            let url = listener_url(addr, path);
            Box::new(
                HttpBackend::new(&url, timeout)
                    .with_label(model.as_deref().unwrap_or(url.as_str()))
                    .with_prompt_key(prompt_key)
                    .with_answer_keys(answer_keys.clone()),
            )
        }
        BackendConfig::Ollama { model, host, system_prompt } => {
            let host = host.as_deref().unwrap_or(settings.ollama_host.as_str());
            Box::new(OllamaClient::new(model, host, timeout).with_system_prompt(system_prompt.clone()))
        }
        BackendConfig::Openai { model, api_base, api_key_env, system_prompt } => {
            let var = api_key_env.as_deref().unwrap_or(settings.api_key_env.as_str());
            Box::new(
                LlmClient::new(model, api_base.as_deref(), read_api_key(var), timeout)
                    .with_system_prompt(system_prompt.clone()),
            )
        }
    };

    info!("Backend ready: {} ({})", generator.name(), config.model_label());
    Ok(generator)
}
