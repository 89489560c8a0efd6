//! Evaluation suite schema, backend selection, and environment settings.
//!
//! A suite bundles a knowledge source, questions, retrieval queries and the
//! backend to evaluate. Suites are JSON files; a directory of them is loaded
//! into a [`SuiteRegistry`] keyed by suite id.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use ragprobe_core::{EvalError, KnowledgeBase, QaPair, RetrievalQuery};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const DEFAULT_MODEL: &str = "llama3.1:8b-instruct";

/// Configuration parsing and loading errors.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Suite not found: {0}")]
    SuiteNotFound(String),

    #[error("Invalid suite '{id}': {reason}")]
    Invalid { id: String, reason: String },
}

/// Runtime settings read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub ollama_host: String,
    pub timeout_secs: u64,
    pub api_key_env: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ollama_host: DEFAULT_OLLAMA_HOST.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
        }
    }
}

impl Settings {
    /// Reads settings from process environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let timeout_secs = match lookup("RAGPROBE_TIMEOUT_SECS") {
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                warn!("Ignoring invalid RAGPROBE_TIMEOUT_SECS={}", raw);
                defaults.timeout_secs
            }),
            None => defaults.timeout_secs,
        };

        Self {
            ollama_host: lookup("OLLAMA_HOST").unwrap_or(defaults.ollama_host),
            timeout_secs,
            api_key_env: lookup("RAGPROBE_API_KEY_ENV").unwrap_or(defaults.api_key_env),
        }
    }
}

/// Reads an API key from the named environment variable, ignoring blank values.
pub fn read_api_key(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.trim().is_empty())
}

fn default_executable() -> String {
    "ollama".to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_prompt_key() -> String {
    "query".to_string()
}

fn default_answer_keys() -> Vec<String> {
    ["answer", "response", "result", "output"].iter().map(|s| s.to_string()).collect()
}

fn default_probe_host() -> String {
    "127.0.0.1".to_string()
}

fn default_probe_path() -> String {
    "/".to_string()
}

fn default_column() -> String {
    "text".to_string()
}

/// How prompts reach a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendConfig {
    /// Runs `<executable> generate <model> <prompt>`.
    Cli {
        #[serde(default = "default_executable")]
        executable: String,
        #[serde(default = "default_model")]
        model: String,
    },
    /// POSTs to a fixed URL.
    Http {
        url: String,
        #[serde(default)]
        model: Option<String>,
        #[serde(default = "default_prompt_key")]
        prompt_key: String,
        #[serde(default = "default_answer_keys")]
        answer_keys: Vec<String>,
        #[serde(default)]
        api_key_env: Option<String>,
    },
    /// Probes local ports for a listener, then POSTs to it.
    Discovered {
        #[serde(default = "default_probe_host")]
        host: String,
        ports: Vec<u16>,
        #[serde(default = "default_probe_path")]
        path: String,
        #[serde(default)]
        model: Option<String>,
        #[serde(default = "default_prompt_key")]
        prompt_key: String,
        #[serde(default = "default_answer_keys")]
        answer_keys: Vec<String>,
    },
    /// Ollama's native chat API.
    Ollama {
        #[serde(default = "default_model")]
        model: String,
        #[serde(default)]
        host: Option<String>,
        #[serde(default)]
        system_prompt: Option<String>,
    },
    /// Any OpenAI-compatible chat completion API.
    Openai {
        model: String,
        #[serde(default)]
        api_base: Option<String>,
        #[serde(default)]
        api_key_env: Option<String>,
        #[serde(default)]
        system_prompt: Option<String>,
    },
}

impl BackendConfig {
    /// Label used in logs and report file names.
    pub fn model_label(&self) -> String {
        match self {
            BackendConfig::Cli { model, .. }
            | BackendConfig::Ollama { model, .. }
            | BackendConfig::Openai { model, .. } => model.clone(),
            BackendConfig::Http { model, url, .. } => model.clone().unwrap_or_else(|| url.clone()),
            BackendConfig::Discovered { model, host, .. } => model.clone().unwrap_or_else(|| host.clone()),
        }
    }

    /// Returns a copy targeting a different model, where the backend has one.
    pub fn with_model(&self, name: &str) -> Self {
        let mut next = self.clone();
        match &mut next {
            BackendConfig::Cli { model, .. }
            | BackendConfig::Ollama { model, .. }
            | BackendConfig::Openai { model, .. } => *model = name.to_string(),
            BackendConfig::Http { model, .. } | BackendConfig::Discovered { model, .. } => {
                *model = Some(name.to_string())
            }
        }
        next
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Cli { executable: default_executable(), model: default_model() }
    }
}

/// Where the knowledge base comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KnowledgeSource {
    Documents {
        documents: Vec<String>,
    },
    Csv {
        csv: PathBuf,
        #[serde(default = "default_column")]
        column: String,
    },
}

impl KnowledgeSource {
    /// Loads the knowledge base, resolving relative CSV paths against `base_dir`.
    pub fn load(&self, base_dir: &Path) -> Result<KnowledgeBase, EvalError> {
        match self {
            KnowledgeSource::Documents { documents } => KnowledgeBase::from_texts(documents.iter().cloned()),
            KnowledgeSource::Csv { csv, column } => {
                let path = if csv.is_absolute() { csv.clone() } else { base_dir.join(csv) };
                KnowledgeBase::from_csv(&path, column)
            }
        }
    }
}

/// Complete evaluation suite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub agent_description: String,
    pub knowledge_base: KnowledgeSource,
    #[serde(default)]
    pub questions: Vec<QaPair>,
    #[serde(default)]
    pub retrieval: Vec<RetrievalQuery>,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl SuiteConfig {
    /// Reads and validates a single suite file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let mut suite: SuiteConfig = serde_json::from_str(&content)?;
        suite.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        suite.validate()?;
        Ok(suite)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::Invalid { id: self.id.clone(), reason: reason.to_string() };

        if self.id.trim().is_empty() {
            return Err(invalid("id must not be empty"));
        }
        if let KnowledgeSource::Documents { documents } = &self.knowledge_base {
            if documents.iter().all(|d| d.trim().is_empty()) {
                return Err(invalid("knowledge base has no documents"));
            }
        }
        if let BackendConfig::Discovered { ports, .. } = &self.backend {
            if ports.is_empty() {
                return Err(invalid("discovered backend needs at least one port"));
            }
        }
        Ok(())
    }

    /// Loads the suite's knowledge base.
    pub fn knowledge_base(&self) -> Result<KnowledgeBase, EvalError> {
        self.knowledge_base.load(&self.base_dir)
    }

    /// Built-in suite used when no suite file is given.
    pub fn demo() -> Self {
        Self {
            id: "demo".into(),
            name: "Local assistant demo".into(),
            description: "Toy knowledge base about Python, Giskard and Llama 3".into(),
            agent_description: "Local assistant using Llama 3 via Ollama".into(),
            knowledge_base: KnowledgeSource::Documents {
                documents: vec![
                    "Python is a programming language used for data science.".into(),
                    "Giskard is a framework that helps test and evaluate AI and RAG systems.".into(),
                    "Llama 3 is a large language model developed by Meta.".into(),
                ],
            },
            questions: vec![
                QaPair::new("What is Giskard?", "framework"),
                QaPair::new("Who developed Llama 3?", "Meta"),
                QaPair::new("What is Python used for?", "data science"),
            ],
            retrieval: vec![
                RetrievalQuery {
                    query: "Where is the Architecture Decision Record Template?".into(),
                    expected_document: "Architecture Decision Record Template".into(),
                },
                RetrievalQuery {
                    query: "Where is the Reference Architecture Template?".into(),
                    expected_document: "Reference Architecture Template".into(),
                },
                RetrievalQuery {
                    query: "Show me the recent Analysis of Alternatives?".into(),
                    expected_document: "Recent Analysis of Alternatives Document".into(),
                },
            ],
            backend: BackendConfig::default(),
            base_dir: PathBuf::new(),
        }
    }
}

/// Registry of suites loaded from disk.
#[derive(Debug, Default)]
pub struct SuiteRegistry {
    suites: HashMap<String, SuiteConfig>,
}

impl SuiteRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads all JSON suite files from a directory. Invalid files are skipped with a warning.
    pub fn load_from_dir(dir: &Path) -> Result<Self, ConfigError> {
        let mut registry = Self::new();

        for entry in fs::read_dir(dir)?.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                match SuiteConfig::load(&path) {
                    Ok(suite) => {
                        registry.suites.insert(suite.id.clone(), suite);
                    }
                    Err(e) => warn!("Skipping {}: {}", path.display(), e),
                }
            }
        }

        info!("Loaded {} suites from {}", registry.suites.len(), dir.display());
        Ok(registry)
    }

    /// Gets a suite by ID.
    pub fn get(&self, id: &str) -> Result<&SuiteConfig, ConfigError> {
        self.suites.get(id).ok_or_else(|| ConfigError::SuiteNotFound(id.to_string()))
    }

    /// Returns all loaded suites sorted by id.
    pub fn list(&self) -> Vec<&SuiteConfig> {
        let mut suites: Vec<&SuiteConfig> = self.suites.values().collect();
        suites.sort_by(|a, b| a.id.cmp(&b.id));
        suites
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use pretty_assertions::assert_eq;

    use super::*;

    fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn settings_use_defaults_and_overrides() {
        let env: HashMap<&str, &str> =
            HashMap::from([("OLLAMA_HOST", "http://gpu-box:11434"), ("RAGPROBE_TIMEOUT_SECS", "30")]);
        let settings = Settings::from_lookup(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(
            settings,
            Settings {
                ollama_host: "http://gpu-box:11434".into(),
                timeout_secs: 30,
                api_key_env: DEFAULT_API_KEY_ENV.into(),
            }
        );
    }

    #[test]
    fn settings_ignore_bad_timeout() {
        let settings = Settings::from_lookup(|k| (k == "RAGPROBE_TIMEOUT_SECS").then(|| "soon".to_string()));
        assert_eq!(settings.timeout_secs, DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn backend_defaults_fill_in() {
        let backend: BackendConfig =
            serde_json::from_str(r#"{"type": "http", "url": "http://localhost:8000/retrieve"}"#).unwrap();
        assert_eq!(
            backend,
            BackendConfig::Http {
                url: "http://localhost:8000/retrieve".into(),
                model: None,
                prompt_key: "query".into(),
                answer_keys: default_answer_keys(),
                api_key_env: None,
            }
        );
        assert_eq!(backend.model_label(), "http://localhost:8000/retrieve");
        assert_eq!(backend.with_model("rag-v2").model_label(), "rag-v2");
    }

    #[test]
    fn chat_backends_accept_system_prompt() {
        let backend: BackendConfig =
            serde_json::from_str(r#"{"type": "ollama", "model": "llama3", "system_prompt": "Answer in one line."}"#)
                .unwrap();
        assert!(matches!(
            backend,
            BackendConfig::Ollama { system_prompt: Some(ref p), .. } if p == "Answer in one line."
        ));

        let backend: BackendConfig = serde_json::from_str(r#"{"type": "openai", "model": "gpt-4o-mini"}"#).unwrap();
        assert!(matches!(backend, BackendConfig::Openai { system_prompt: None, .. }));
    }

    #[test]
    fn suite_loads_csv_relative_to_file() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "kb.csv", "text\nGiskard is a framework for testing AI.\n");
        let path = write(
            dir.path(),
            "csv.json",
            r#"{
                "id": "csv",
                "name": "CSV suite",
                "knowledge_base": {"csv": "kb.csv"},
                "questions": [{"question": "What is Giskard?", "expected": "framework"}],
                "backend": {"type": "cli", "model": "llama3"}
            }"#,
        );

        let suite = SuiteConfig::load(&path).unwrap();
        let kb = suite.knowledge_base().unwrap();
        assert_eq!(kb.texts(), vec!["Giskard is a framework for testing AI.".to_string()]);
        assert_eq!(suite.backend.model_label(), "llama3");
    }

    #[test]
    fn suite_rejects_discovered_backend_without_ports() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "bad.json",
            r#"{
                "id": "bad",
                "name": "Bad",
                "knowledge_base": {"documents": ["doc"]},
                "backend": {"type": "discovered", "ports": []}
            }"#,
        );

        let err = SuiteConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn registry_skips_invalid_files() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "good.json",
            r#"{"id": "good", "name": "Good", "knowledge_base": {"documents": ["doc"]}}"#,
        );
        write(dir.path(), "broken.json", "{ not json");
        write(dir.path(), "notes.txt", "ignored");

        let registry = SuiteRegistry::load_from_dir(dir.path()).unwrap();
        assert_eq!(registry.list().len(), 1);
        assert!(registry.get("good").is_ok());
        assert!(matches!(registry.get("broken"), Err(ConfigError::SuiteNotFound(_))));
    }

    #[test]
    fn bundled_suites_load() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../suites");
        let registry = SuiteRegistry::load_from_dir(&dir).unwrap();

        let ids: Vec<&str> = registry.list().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["demo", "internal-rag", "local-listener"]);

        let internal = registry.get("internal-rag").unwrap();
        assert_eq!(internal.knowledge_base().unwrap().len(), 3);
        assert_eq!(internal.retrieval.len(), 3);
    }

    #[test]
    fn demo_suite_is_valid() {
        let suite = SuiteConfig::demo();
        assert!(suite.validate().is_ok());
        assert_eq!(suite.knowledge_base().unwrap().len(), 3);
    }
}
