//! Command-line arguments.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use ragprobe_config::{BackendConfig, SuiteConfig, SuiteRegistry};
use ragprobe_report::ReportFormat;

#[derive(Parser, Debug)]
#[command(name = "ragprobe", version, about = "Evaluate local and remote LLM / RAG backends")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Ask each question directly and check for the expected phrase
    Check(CheckArgs),
    /// Answer questions from the knowledge base and score the answers
    Rag(RagArgs),
    /// Judge the top retrieved document for each retrieval query
    Retrieval(RetrievalArgs),
    /// List models available on an Ollama host
    Models(ModelsArgs),
    /// List suites in a directory
    Suites(SuitesArgs),
}

#[derive(Args, Debug)]
pub struct SuiteArgs {
    /// Suite file (JSON) or the id of a suite in --suite-dir; the built-in
    /// demo suite is used when omitted
    #[arg(long, env = "RAGPROBE_SUITE")]
    pub suite: Option<String>,

    /// Directory searched when --suite is an id
    #[arg(long, env = "RAGPROBE_SUITE_DIR", default_value = "suites")]
    pub suite_dir: PathBuf,
}

impl SuiteArgs {
    pub fn load(&self) -> Result<SuiteConfig> {
        let Some(suite) = &self.suite else {
            return Ok(SuiteConfig::demo());
        };

        let path = Path::new(suite);
        if path.is_file() {
            return Ok(SuiteConfig::load(path)?);
        }
        let registry = SuiteRegistry::load_from_dir(&self.suite_dir)?;
        Ok(registry.get(suite)?.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    Cli,
    Http,
    Discovered,
    Ollama,
    Openai,
}

#[derive(Args, Debug)]
pub struct BackendArgs {
    /// Override the suite's backend
    #[arg(long, value_enum, env = "RAGPROBE_BACKEND")]
    pub backend: Option<BackendKind>,

    /// Model to evaluate; repeat to evaluate several models
    #[arg(long = "model", env = "RAGPROBE_MODEL", value_delimiter = ',')]
    pub models: Vec<String>,

    /// Executable for the cli backend
    #[arg(long, default_value = "ollama")]
    pub executable: String,

    /// Endpoint for the http backend, or API base for openai
    #[arg(long, env = "RAGPROBE_URL")]
    pub url: Option<String>,

    /// Ports to probe for the discovered backend
    #[arg(long, value_delimiter = ',', default_value = "8080,8000,5000")]
    pub ports: Vec<u16>,

    /// Request path on a discovered listener
    #[arg(long, default_value = "/")]
    pub path: String,

    /// JSON key carrying the prompt for http backends
    #[arg(long, default_value = "query")]
    pub prompt_key: String,

    /// System prompt for the ollama and openai backends
    #[arg(long, env = "RAGPROBE_SYSTEM_PROMPT")]
    pub system_prompt: Option<String>,
}

impl BackendArgs {
    /// Applies CLI overrides on top of the suite's backend.
    pub fn resolve(&self, suite_backend: &BackendConfig) -> Result<BackendConfig> {
        let model = self.models.first().cloned().unwrap_or_else(|| suite_backend.model_label());

        let backend = match self.backend {
            None => match self.models.first() {
                Some(m) => suite_backend.with_model(m),
                None => suite_backend.clone(),
            },
            Some(BackendKind::Cli) => BackendConfig::Cli { executable: self.executable.clone(), model },
            Some(BackendKind::Http) => {
                let Some(url) = self.url.clone() else {
                    bail!("--url is required for the http backend");
                };
                BackendConfig::Http {
                    url,
                    model: self.models.first().cloned(),
                    prompt_key: self.prompt_key.clone(),
                    answer_keys: vec![],
                    api_key_env: None,
                }
            }
            Some(BackendKind::Discovered) => {
                if self.ports.is_empty() {
                    bail!("--ports must list at least one port");
                }
                BackendConfig::Discovered {
                    host: "127.0.0.1".into(),
                    ports: self.ports.clone(),
                    path: self.path.clone(),
                    model: self.models.first().cloned(),
                    prompt_key: self.prompt_key.clone(),
                    answer_keys: vec![],
                }
            }
            Some(BackendKind::Ollama) => {
                BackendConfig::Ollama { model, host: None, system_prompt: self.system_prompt.clone() }
            }
            Some(BackendKind::Openai) => BackendConfig::Openai {
                model,
                api_base: self.url.clone(),
                api_key_env: None,
                system_prompt: self.system_prompt.clone(),
            },
        };
        Ok(backend)
    }

    /// One backend per requested model, or the resolved backend alone.
    /// Endpoint backends serve a single model, so they take at most one.
    pub fn per_model(&self, suite_backend: &BackendConfig) -> Result<Vec<BackendConfig>> {
        let base = self.resolve(suite_backend)?;
        if self.models.len() <= 1 {
            return Ok(vec![base]);
        }
        let endpoint = match base {
            BackendConfig::Http { .. } => Some("http"),
            BackendConfig::Discovered { .. } => Some("discovered"),
            _ => None,
        };
        if let Some(kind) = endpoint {
            bail!("the {kind} backend serves one model per endpoint; got {} models", self.models.len());
        }
        Ok(self.models.iter().map(|m| base.with_model(m)).collect())
    }
}

#[derive(Args, Debug)]
pub struct OutputArgs {
    /// Report format; inferred from --output when omitted
    #[arg(long, value_enum)]
    pub format: Option<ReportFormat>,

    /// Report file for a single-model run
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Directory for model-suffixed reports
    #[arg(long, default_value = ".")]
    pub out_dir: PathBuf,
}

impl OutputArgs {
    pub fn format_or(&self, default: ReportFormat) -> ReportFormat {
        self.format
            .or_else(|| self.output.as_deref().and_then(ReportFormat::from_path))
            .unwrap_or(default)
    }
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub suite: SuiteArgs,
    #[command(flatten)]
    pub backend: BackendArgs,
    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScorerKind {
    Substring,
    Judge,
}

#[derive(Args, Debug)]
pub struct RagArgs {
    #[command(flatten)]
    pub suite: SuiteArgs,
    #[command(flatten)]
    pub backend: BackendArgs,
    #[command(flatten)]
    pub output: OutputArgs,

    /// Load the knowledge base from a CSV file instead of the suite
    #[arg(long)]
    pub kb_csv: Option<PathBuf>,

    /// CSV column holding document text
    #[arg(long, default_value = "text")]
    pub kb_column: String,

    /// Load questions from a JSONL test set instead of the suite
    #[arg(long)]
    pub testset: Option<PathBuf>,

    /// Save the questions used as a JSONL test set
    #[arg(long)]
    pub save_testset: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "substring")]
    pub scorer: ScorerKind,

    /// Judge endpoint for --scorer judge
    #[arg(long, env = "RAGPROBE_JUDGE_URL", default_value = "http://localhost:11434")]
    pub judge_url: String,
}

#[derive(Args, Debug)]
pub struct RetrievalArgs {
    #[command(flatten)]
    pub suite: SuiteArgs,

    /// Retrieval endpoint answering {"documents": [...]}
    #[arg(long, env = "RAGPROBE_RETRIEVER_URL", default_value = "http://localhost:8000/retrieve")]
    pub retriever_url: String,

    /// Judge endpoint answering {"judge": "yes" | "no"}
    #[arg(long, env = "RAGPROBE_JUDGE_URL", default_value = "http://localhost:11434")]
    pub judge_url: String,

    #[arg(long, value_enum)]
    pub format: Option<ReportFormat>,

    #[arg(long, short, default_value = "internal_rag_eval_results.csv")]
    pub output: PathBuf,
}

#[derive(Args, Debug)]
pub struct ModelsArgs {
    /// Ollama host; defaults to OLLAMA_HOST
    #[arg(long)]
    pub host: Option<String>,
}

#[derive(Args, Debug)]
pub struct SuitesArgs {
    #[arg(long, default_value = "suites")]
    pub dir: PathBuf,
}
