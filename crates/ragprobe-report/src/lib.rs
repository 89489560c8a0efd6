//! Evaluation reports and their HTML, JSON and CSV renderings.
//!
//! JSON output is the plain list of per-question records; CSV has one row per
//! record with a header; HTML is a standalone page with a summary and table.

mod html;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ragprobe_core::{slugify, EvalRecord, RetrievalRecord};
use serde::Serialize;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::html::{render_page, Row};

/// Report rendering and writing errors.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to write report: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to encode CSV: {0}")]
    Csv(String),

    #[error("Unknown report format: {0}")]
    UnknownFormat(String),
}

impl From<csv::Error> for ReportError {
    fn from(err: csv::Error) -> Self {
        ReportError::Csv(err.to_string())
    }
}

/// Output file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ReportFormat {
    Html,
    Json,
    Csv,
}

impl ReportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Html => "html",
            ReportFormat::Json => "json",
            ReportFormat::Csv => "csv",
        }
    }

    /// Infers the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(|e| e.parse().ok())
    }
}

impl FromStr for ReportFormat {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "html" | "htm" => Ok(Self::Html),
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            other => Err(ReportError::UnknownFormat(other.to_string())),
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Pass/fail counts for a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub pass_rate: f64,
}

impl Summary {
    pub fn from_outcomes(outcomes: impl IntoIterator<Item = bool>) -> Self {
        let (mut total, mut passed) = (0, 0);
        for ok in outcomes {
            total += 1;
            passed += usize::from(ok);
        }
        let pass_rate = if total == 0 { 0.0 } else { passed as f64 / total as f64 };
        Self { total, passed, failed: total - passed, pass_rate }
    }
}

/// Something that can be rendered into every report format.
pub trait Report {
    fn to_json(&self) -> Result<String, ReportError>;
    fn to_csv(&self) -> Result<String, ReportError>;
    fn to_html(&self) -> String;

    fn render(&self, format: ReportFormat) -> Result<String, ReportError> {
        match format {
            ReportFormat::Html => Ok(self.to_html()),
            ReportFormat::Json => self.to_json(),
            ReportFormat::Csv => self.to_csv(),
        }
    }
}

fn records_to_csv<T: Serialize>(records: &[T], headers: &[&str]) -> Result<String, ReportError> {
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(Vec::new());
    writer.write_record(headers)?;
    for record in records {
        writer.serialize(record)?;
    }
    let bytes = writer.into_inner().map_err(|e| ReportError::Csv(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| ReportError::Csv(e.to_string()))
}

/// Results of a question/answer evaluation of one model.
#[derive(Debug, Clone, Serialize)]
pub struct EvalReport {
    pub run_id: Uuid,
    pub suite: String,
    pub model: String,
    pub records: Vec<EvalRecord>,
    pub summary: Summary,
}

impl EvalReport {
    pub fn new(suite: &str, model: &str, records: Vec<EvalRecord>) -> Self {
        let summary = Summary::from_outcomes(records.iter().map(|r| r.passed));
        Self {
            run_id: Uuid::new_v4(),
            suite: suite.to_string(),
            model: model.to_string(),
            records,
            summary,
        }
    }
}

impl Report for EvalReport {
    fn to_json(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string_pretty(&self.records)?)
    }

    fn to_csv(&self) -> Result<String, ReportError> {
        records_to_csv(&self.records, &["question", "answer", "expected", "passed"])
    }

    fn to_html(&self) -> String {
        let rows: Vec<Row> = self
            .records
            .iter()
            .map(|r| Row {
                cells: vec![
                    r.question.clone(),
                    r.answer.clone(),
                    r.expected.clone(),
                    if r.passed { "PASS" } else { "FAIL" }.to_string(),
                ],
                passed: r.passed,
            })
            .collect();

        render_page(
            &format!("Evaluation report: {}", self.suite),
            &[("Model", self.model.clone()), ("Run", self.run_id.to_string())],
            &self.summary,
            &["Question", "Answer", "Expected", "Result"],
            &rows,
        )
    }
}

/// Results of a judged retrieval evaluation.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalReport {
    pub run_id: Uuid,
    pub suite: String,
    pub records: Vec<RetrievalRecord>,
    pub summary: Summary,
}

impl RetrievalReport {
    pub fn new(suite: &str, records: Vec<RetrievalRecord>) -> Self {
        let summary = Summary::from_outcomes(records.iter().map(|r| r.judge_score == 1));
        Self { run_id: Uuid::new_v4(), suite: suite.to_string(), records, summary }
    }
}

impl Report for RetrievalReport {
    fn to_json(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string_pretty(&self.records)?)
    }

    fn to_csv(&self) -> Result<String, ReportError> {
        records_to_csv(&self.records, &["query", "expected_document", "retrieved_doc", "judge_score"])
    }

    fn to_html(&self) -> String {
        let rows: Vec<Row> = self
            .records
            .iter()
            .map(|r| Row {
                cells: vec![
                    r.query.clone(),
                    r.expected_document.clone(),
                    r.retrieved_doc.clone(),
                    r.judge_score.to_string(),
                ],
                passed: r.judge_score == 1,
            })
            .collect();

        render_page(
            &format!("Retrieval report: {}", self.suite),
            &[("Run", self.run_id.to_string())],
            &self.summary,
            &["Query", "Expected document", "Retrieved document", "Judge score"],
            &rows,
        )
    }
}

/// Builds `<dir>/<stem>_<model-slug>.<ext>`, or `<dir>/<stem>.<ext>` without a model.
pub fn report_path(dir: &Path, stem: &str, model: Option<&str>, format: ReportFormat) -> PathBuf {
    let name = match model.map(slugify).filter(|s| !s.is_empty()) {
        Some(slug) => format!("{stem}_{slug}.{}", format.extension()),
        None => format!("{stem}.{}", format.extension()),
    };
    dir.join(name)
}

/// Renders the report and writes it, creating parent directories as needed.
pub fn write_report(report: &dyn Report, format: ReportFormat, path: &Path) -> Result<(), ReportError> {
    let content = report.render(format)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;

    info!("Report saved -> {}", path.display());
    Ok(())
}
