//! JSON-over-HTTP backend for RAG front ends and generic completion endpoints.

use std::time::Duration;

use async_trait::async_trait;
use ragprobe_core::{AgentAnswer, EvalError, Generator};
use reqwest::Client;
use serde_json::{Map, Value};
use tracing::{debug, info};

const CONTEXT_KEYS: [&str; 4] = ["contexts", "context", "documents", "sources"];

/// Converts a reqwest failure into an [`EvalError`], keeping timeouts distinct.
pub(crate) fn transport_err(e: reqwest::Error, timeout: Duration) -> EvalError {
    if e.is_timeout() {
        EvalError::Timeout(timeout.as_secs())
    } else {
        EvalError::Backend(e.to_string())
    }
}

/// Sends a JSON POST and returns the parsed body, failing on non-2xx.
pub(crate) async fn post_json(
    client: &Client,
    url: &str,
    body: &Value,
    bearer: Option<&str>,
    timeout: Duration,
) -> Result<Value, EvalError> {
    let mut request = client.post(url).json(body).timeout(timeout);
    if let Some(key) = bearer {
        request = request.bearer_auth(key);
    }

    let response = request.send().await.map_err(|e| transport_err(e, timeout))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(EvalError::Http { status: status.as_u16(), body });
    }

    response.json::<Value>().await.map_err(|e| {
        if e.is_timeout() {
            EvalError::Timeout(timeout.as_secs())
        } else {
            EvalError::ParseError(e.to_string())
        }
    })
}

/// Returns the first string found under any of `keys`, or the body itself if it is a string.
pub fn extract_answer(body: &Value, keys: &[String]) -> Option<String> {
    if let Value::String(s) = body {
        return Some(s.clone());
    }
    keys.iter()
        .find_map(|k| body.get(k).and_then(Value::as_str))
        .map(str::to_string)
}

/// Returns the first list of strings found under a context key.
pub fn extract_contexts(body: &Value) -> Vec<String> {
    CONTEXT_KEYS
        .iter()
        .find_map(|k| body.get(*k).and_then(Value::as_array))
        .map(|items| items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

/// Backend that POSTs `{<prompt_key>: prompt}` to a fixed URL.
pub struct HttpBackend {
    client: Client,
    url: String,
    label: String,
    prompt_key: String,
    answer_keys: Vec<String>,
    api_key: Option<String>,
    timeout: Duration,
}

impl HttpBackend {
    /// Creates a backend with the default `query` key and answer fallbacks.
    pub fn new(url: &str, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            url: url.to_string(),
            label: url.to_string(),
            prompt_key: "query".to_string(),
            answer_keys: ["answer", "response", "result", "output"].iter().map(|s| s.to_string()).collect(),
            api_key: None,
            timeout,
        }
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }

    pub fn with_prompt_key(mut self, key: &str) -> Self {
        self.prompt_key = key.to_string();
        self
    }

    pub fn with_answer_keys(mut self, keys: Vec<String>) -> Self {
        if !keys.is_empty() {
            self.answer_keys = keys;
        }
        self
    }

    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key;
        self
    }

    async fn request(&self, prompt: &str) -> Result<Value, EvalError> {
        let mut payload = Map::new();
        payload.insert(self.prompt_key.clone(), Value::String(prompt.to_string()));

        debug!("POST {} ({} chars)", self.url, prompt.len());
        post_json(&self.client, &self.url, &Value::Object(payload), self.api_key.as_deref(), self.timeout).await
    }

    /// Sends the prompt and returns the answer along with any returned context passages.
    pub async fn generate_with_context(&self, prompt: &str) -> Result<AgentAnswer, EvalError> {
        let body = self.request(prompt).await?;

        let message = extract_answer(&body, &self.answer_keys)
            .ok_or_else(|| EvalError::MissingField(self.answer_keys.join("|")))?;
        let documents = extract_contexts(&body);

        info!("{}: answer with {} context passages", self.label, documents.len());
        Ok(AgentAnswer { message, documents })
    }
}

#[async_trait]
impl Generator for HttpBackend {
    fn name(&self) -> &str {
        &self.label
    }

    async fn generate(&self, prompt: &str) -> Result<String, EvalError> {
        self.generate_with_context(prompt).await.map(|a| a.message)
    }

    async fn answer(&self, prompt: &str) -> Result<AgentAnswer, EvalError> {
        self.generate_with_context(prompt).await
    }
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;
    use pretty_assertions::assert_eq;
    use ragprobe_core::{generate_or_sentinel, GENERATION_ERROR};
    use serde_json::json;
    use tokio::net::TcpListener;

    use super::*;

    fn keys(k: &[&str]) -> Vec<String> {
        k.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn answer_extraction_uses_fallback_keys() {
        let k = keys(&["answer", "response"]);
        assert_eq!(extract_answer(&json!({"response": "hi"}), &k), Some("hi".into()));
        assert_eq!(extract_answer(&json!({"answer": "a", "response": "b"}), &k), Some("a".into()));
        assert_eq!(extract_answer(&json!("plain"), &k), Some("plain".into()));
        assert_eq!(extract_answer(&json!({"answer": 3}), &k), None);
    }

    #[test]
    fn context_extraction_skips_non_strings() {
        let body = json!({"answer": "x", "documents": ["one", 2, "three"]});
        assert_eq!(extract_contexts(&body), vec!["one".to_string(), "three".to_string()]);
        assert!(extract_contexts(&json!({"answer": "x"})).is_empty());
    }

    #[tokio::test]
    async fn posts_prompt_and_reads_answer() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/query")
            .match_body(Matcher::Json(json!({"prompt": "What is Giskard?"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"response": "A testing framework.", "contexts": ["Giskard docs"]}"#)
            .create_async()
            .await;

        let backend = HttpBackend::new(&format!("{}/api/query", server.url()), Duration::from_secs(5))
            .with_prompt_key("prompt");
        let answer = backend.generate_with_context("What is Giskard?").await.unwrap();

        mock.assert_async().await;
        assert_eq!(
            answer,
            AgentAnswer {
                message: "A testing framework.".into(),
                documents: vec!["Giskard docs".into()],
            }
        );
    }

    #[tokio::test]
    async fn sends_bearer_token_when_configured() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_header("authorization", "Bearer secret")
            .with_status(200)
            .with_body(r#"{"answer": "ok"}"#)
            .create_async()
            .await;

        let backend = HttpBackend::new(&server.url(), Duration::from_secs(5)).with_api_key(Some("secret".into()));
        assert_eq!(backend.generate("ping").await.unwrap(), "ok");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(503)
            .with_body("overloaded")
            .create_async()
            .await;

        let backend = HttpBackend::new(&server.url(), Duration::from_secs(5));
        let err = backend.generate("hi").await.unwrap_err();
        assert!(matches!(err, EvalError::Http { status: 503, ref body } if body == "overloaded"));
    }

    #[tokio::test]
    async fn missing_answer_key_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(200)
            .with_body(r#"{"text": "wrong key"}"#)
            .create_async()
            .await;

        let backend = HttpBackend::new(&server.url(), Duration::from_secs(5));
        let err = backend.generate("hi").await.unwrap_err();
        assert!(matches!(err, EvalError::MissingField(_)));
    }

    #[tokio::test]
    async fn answer_keeps_returned_contexts() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(200)
            .with_body(r#"{"answer": "A framework.", "documents": ["retrieved passage"]}"#)
            .create_async()
            .await;

        let backend = HttpBackend::new(&server.url(), Duration::from_secs(5));
        let answer = backend.answer("What is Giskard?").await.unwrap();
        assert_eq!(answer.documents, vec!["retrieved passage".to_string()]);
    }

    #[tokio::test]
    async fn silent_endpoint_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _server = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let backend = HttpBackend::new(&format!("http://{addr}/"), Duration::from_millis(300));
        let started = std::time::Instant::now();
        let err = backend.generate("hi").await.unwrap_err();

        assert!(matches!(err, EvalError::Timeout(_)), "got {err:?}");
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn unreachable_backend_yields_sentinel() {
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };

        let backend = HttpBackend::new(&format!("http://{addr}/"), Duration::from_secs(2));
        assert_eq!(generate_or_sentinel(&backend, "What is Giskard?").await, GENERATION_ERROR);
    }
}
