//! Retriever and judge endpoints used by retrieval and judged evaluations.
//!
//! Both clients swallow failures: a broken retriever yields `["No document"]`
//! and a broken judge scores 0, so an evaluation run always completes.

use std::time::Duration;

use ragprobe_core::NO_DOCUMENT;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error};

use crate::http::post_json;

#[derive(Debug, Serialize)]
struct JudgeRequest<'a> {
    query: &'a str,
    retrieved_document: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    expected: Option<&'a str>,
}

/// Reads a `judge` verdict: 1 for "yes" (any case), 0 otherwise.
pub fn verdict_score(body: &Value) -> u8 {
    let verdict = match body.get("judge") {
        Some(Value::String(s)) => s.to_lowercase(),
        Some(other) => other.to_string().to_lowercase(),
        None => "no".to_string(),
    };
    u8::from(verdict == "yes")
}

/// Client for a judge endpoint answering `{"judge": "yes" | "no"}`.
pub struct JudgeClient {
    client: Client,
    url: String,
    timeout: Duration,
}

impl JudgeClient {
    pub fn new(url: &str, timeout: Duration) -> Self {
        Self { client: Client::new(), url: url.to_string(), timeout }
    }

    async fn ask(&self, request: &JudgeRequest<'_>) -> u8 {
        let body = match serde_json::to_value(request) {
            Ok(v) => v,
            Err(e) => {
                error!("Error encoding judge request: {}", e);
                return 0;
            }
        };

        match post_json(&self.client, &self.url, &body, None, self.timeout).await {
            Ok(resp) => {
                let score = verdict_score(&resp);
                debug!("Judge verdict for '{}': {}", request.query, score);
                score
            }
            Err(e) => {
                error!("Error calling judge API: {}", e);
                0
            }
        }
    }

    /// Judges whether `document` is a correct retrieval for `query`.
    pub async fn judge(&self, query: &str, document: &str) -> u8 {
        self.ask(&JudgeRequest { query, retrieved_document: document, expected: None }).await
    }

    /// Judges whether `answer` satisfies the reference answer for `question`.
    pub async fn judge_answer(&self, question: &str, expected: &str, answer: &str) -> u8 {
        self.ask(&JudgeRequest { query: question, retrieved_document: answer, expected: Some(expected) })
            .await
    }
}

/// Client for a retrieval endpoint answering `{"documents": [...]}`.
pub struct RetrieverClient {
    client: Client,
    url: String,
    timeout: Duration,
}

impl RetrieverClient {
    pub fn new(url: &str, timeout: Duration) -> Self {
        Self { client: Client::new(), url: url.to_string(), timeout }
    }

    /// Retrieves documents for `query`, falling back to `["No document"]`.
    pub async fn retrieve(&self, query: &str) -> Vec<String> {
        let body = serde_json::json!({ "query": query });

        match post_json(&self.client, &self.url, &body, None, self.timeout).await {
            Ok(resp) => match resp.get("documents").and_then(Value::as_array) {
                Some(docs) => docs.iter().filter_map(|d| d.as_str().map(str::to_string)).collect(),
                None => vec![NO_DOCUMENT.to_string()],
            },
            Err(e) => {
                error!("Error retrieving documents: {}", e);
                vec![NO_DOCUMENT.to_string()]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn verdicts() {
        assert_eq!(verdict_score(&json!({"judge": "Yes"})), 1);
        assert_eq!(verdict_score(&json!({"judge": " yes "})), 0);
        assert_eq!(verdict_score(&json!({"judge": "No"})), 0);
        assert_eq!(verdict_score(&json!({"judge": true})), 0);
        assert_eq!(verdict_score(&json!({})), 0);
    }

    #[tokio::test]
    async fn judge_posts_query_and_document() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_body(Matcher::Json(json!({
                "query": "Where is the ADR template?",
                "retrieved_document": "Architecture Decision Record Template"
            })))
            .with_status(200)
            .with_body(r#"{"judge": "yes"}"#)
            .create_async()
            .await;

        let judge = JudgeClient::new(&server.url(), Duration::from_secs(5));
        assert_eq!(judge.judge("Where is the ADR template?", "Architecture Decision Record Template").await, 1);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn judge_failure_scores_zero() {
        let mut server = mockito::Server::new_async().await;
        server.mock("POST", "/").with_status(500).create_async().await;

        let judge = JudgeClient::new(&server.url(), Duration::from_secs(5));
        assert_eq!(judge.judge_answer("q", "expected", "answer").await, 0);
    }

    #[tokio::test]
    async fn retriever_returns_documents() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/retrieve")
            .match_body(Matcher::Json(json!({"query": "adr"})))
            .with_status(200)
            .with_body(r#"{"documents": ["ADR Template", "Other"]}"#)
            .create_async()
            .await;

        let retriever = RetrieverClient::new(&format!("{}/retrieve", server.url()), Duration::from_secs(5));
        assert_eq!(retriever.retrieve("adr").await, vec!["ADR Template".to_string(), "Other".to_string()]);
    }

    #[tokio::test]
    async fn retriever_falls_back_on_error_or_missing_field() {
        let mut server = mockito::Server::new_async().await;
        server.mock("POST", "/down").with_status(502).create_async().await;
        server
            .mock("POST", "/odd")
            .with_status(200)
            .with_body(r#"{"results": []}"#)
            .create_async()
            .await;

        for path in ["/down", "/odd"] {
            let retriever = RetrieverClient::new(&format!("{}{}", server.url(), path), Duration::from_secs(5));
            assert_eq!(retriever.retrieve("adr").await, vec![NO_DOCUMENT.to_string()]);
        }
    }
}
