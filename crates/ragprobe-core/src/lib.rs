//! Core domain types, error definitions, and the generator trait.
//!
//! This crate defines the fundamental types shared across the harness:
//! knowledge bases, question/answer pairs, evaluation records, errors,
//! and the `Generator` abstraction every model backend implements.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};

/// Answer recorded when a backend call fails.
pub const GENERATION_ERROR: &str = "Error: Could not generate response";

/// Document recorded when retrieval returns nothing usable.
pub const NO_DOCUMENT: &str = "No document";

/// Errors that can occur while talking to backends or preparing an evaluation.
#[derive(Error, Debug)]
pub enum EvalError {
    #[error("Backend failed: {0}")]
    Backend(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Response is missing field: {0}")]
    MissingField(String),

    #[error("No local listener found: {0}")]
    NoListener(String),

    #[error("Knowledge base has no documents")]
    EmptyKnowledgeBase,

    #[error("Test set has no questions")]
    EmptyTestSet,

    #[error("Failed to parse: {0}")]
    ParseError(String),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for EvalError {
    fn from(err: serde_json::Error) -> Self {
        EvalError::ParseError(err.to_string())
    }
}

impl From<csv::Error> for EvalError {
    fn from(err: csv::Error) -> Self {
        EvalError::Csv(err.to_string())
    }
}

/// A single passage of reference text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub text: String,
}

/// A non-empty collection of reference passages used as evaluation context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KnowledgeBase {
    documents: Vec<Document>,
}

impl KnowledgeBase {
    /// Builds a knowledge base from raw texts, skipping blank entries.
    pub fn from_texts<I, S>(texts: I) -> Result<Self, EvalError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let documents: Vec<Document> = texts
            .into_iter()
            .map(Into::<String>::into)
            .filter(|t| !t.trim().is_empty())
            .map(|text| Document { text })
            .collect();

        if documents.is_empty() {
            return Err(EvalError::EmptyKnowledgeBase);
        }
        Ok(Self { documents })
    }

    /// Loads documents from one column of a CSV file with a header row.
    pub fn from_csv(path: &Path, column: &str) -> Result<Self, EvalError> {
        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;

        let index = reader
            .headers()?
            .iter()
            .position(|h| h.trim() == column)
            .ok_or_else(|| EvalError::MissingField(format!("column '{column}' in {}", path.display())))?;

        let mut texts = Vec::new();
        for record in reader.records() {
            let record = record?;
            if let Some(text) = record.get(index) {
                texts.push(text.to_string());
            }
        }

        let kb = Self::from_texts(texts)?;
        info!("Loaded {} documents from {}", kb.len(), path.display());
        Ok(kb)
    }

    /// Returns the document texts in order.
    pub fn texts(&self) -> Vec<String> {
        self.documents.iter().map(|d| d.text.clone()).collect()
    }

    /// Joins all documents into a single newline-separated context block.
    pub fn context(&self) -> String {
        self.documents
            .iter()
            .map(|d| d.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// A question paired with the phrase or reference answer it should produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaPair {
    pub question: String,
    #[serde(alias = "reference_answer", alias = "expected_answer")]
    pub expected: String,
}

impl QaPair {
    pub fn new(question: impl Into<String>, expected: impl Into<String>) -> Self {
        Self { question: question.into(), expected: expected.into() }
    }
}

/// Output of a prediction function: generated text plus the sources it used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentAnswer {
    pub message: String,
    #[serde(default)]
    pub documents: Vec<String>,
}

/// Outcome of checking one question against a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalRecord {
    pub question: String,
    pub answer: String,
    pub expected: String,
    pub passed: bool,
}

/// A retrieval query and the document title it should surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalQuery {
    pub query: String,
    pub expected_document: String,
}

/// Outcome of judging the top retrieved document for one query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalRecord {
    pub query: String,
    pub expected_document: String,
    pub retrieved_doc: String,
    pub judge_score: u8,
}

/// Configuration for an LLM model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub id: String,
    pub name: String,
    pub model: String,
    pub api_base: Option<String>,
}

/// Converts a model name to a file- and URL-safe slug.
pub fn slugify(name: &str) -> String {
    let mut slug = name.to_lowercase().replace(['/', ':', '.', ' '], "-");
    while slug.contains("--") {
        slug = slug.replace("--", "-");
    }
    slug.trim_matches('-').to_string()
}

/// Anything that turns a prompt into generated text.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Returns a short label used in logs and report names.
    fn name(&self) -> &str;

    /// Generates a completion for the prompt.
    async fn generate(&self, prompt: &str) -> Result<String, EvalError>;

    /// Generates a completion along with any documents the backend reports
    /// using. Backends that return no sources leave `documents` empty.
    async fn answer(&self, prompt: &str) -> Result<AgentAnswer, EvalError> {
        let message = self.generate(prompt).await?;
        Ok(AgentAnswer { message, documents: Vec::new() })
    }
}

/// Calls the generator, logging any failure and substituting [`GENERATION_ERROR`].
pub async fn generate_or_sentinel(generator: &dyn Generator, prompt: &str) -> String {
    match generator.generate(prompt).await {
        Ok(answer) => answer,
        Err(e) => {
            error!("{} generate failed: {}", generator.name(), e);
            GENERATION_ERROR.to_string()
        }
    }
}

/// Like [`generate_or_sentinel`], keeping the backend's documents on success.
pub async fn answer_or_sentinel(generator: &dyn Generator, prompt: &str) -> AgentAnswer {
    match generator.answer(prompt).await {
        Ok(answer) => answer,
        Err(e) => {
            error!("{} generate failed: {}", generator.name(), e);
            AgentAnswer { message: GENERATION_ERROR.to_string(), documents: Vec::new() }
        }
    }
}
