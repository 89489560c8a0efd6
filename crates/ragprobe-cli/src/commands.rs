//! Subcommand handlers.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use ragprobe_config::{Settings, SuiteRegistry};
use ragprobe_core::KnowledgeBase;
use ragprobe_engine::{
    JudgeScorer, RagEvaluator, RagPredictor, RetrievalEvaluator, Scorer, SubstringChecker, SubstringScorer, TestSet,
};
use ragprobe_network::{build_generator, discover_models, JudgeClient, RetrieverClient};
use ragprobe_report::{report_path, write_report, ReportFormat, Summary};
use tracing::{info, warn};

use crate::args::{CheckArgs, ModelsArgs, OutputArgs, RagArgs, RetrievalArgs, ScorerKind, SuitesArgs};

/// Picks the report path: an explicit `--output` for single runs, else a name under `--out-dir`.
fn output_path(output: &OutputArgs, stem: &str, model: &str, suffix_model: bool, format: ReportFormat) -> PathBuf {
    match &output.output {
        Some(path) if !suffix_model => path.clone(),
        _ => report_path(&output.out_dir, stem, suffix_model.then_some(model), format),
    }
}

/// The `--output` path a multi-model run cannot honour.
fn ignored_output(output: &OutputArgs, model_count: usize) -> Option<&Path> {
    output.output.as_deref().filter(|_| model_count > 1)
}

fn warn_ignored_output(output: &OutputArgs, model_count: usize) {
    if let Some(path) = ignored_output(output, model_count) {
        warn!(
            "--output {} ignored for {} models; writing per-model reports under {}",
            path.display(),
            model_count,
            output.out_dir.display()
        );
    }
}

fn log_summary(label: &str, summary: &Summary) {
    info!(
        "{}: {}/{} passed ({:.0}%)",
        label,
        summary.passed,
        summary.total,
        summary.pass_rate * 100.0
    );
}

pub async fn check(args: CheckArgs, settings: &Settings) -> Result<()> {
    let suite = args.suite.load()?;
    let testset = TestSet::new(suite.questions.clone());
    let backends = args.backend.per_model(&suite.backend)?;
    let suffix_model = backends.len() > 1 || args.output.output.is_none();
    let format = args.output.format_or(ReportFormat::Json);
    warn_ignored_output(&args.output, backends.len());

    info!("Suite '{}': {} questions, {} model(s)", suite.id, testset.len(), backends.len());

    for backend in &backends {
        let generator = build_generator(backend, settings)
            .await
            .with_context(|| format!("backend {} unavailable", backend.model_label()))?;

        let report = SubstringChecker::new(generator.as_ref()).run(&suite.id, &testset).await?;
        let path = output_path(&args.output, "results", &backend.model_label(), suffix_model, format);
        write_report(&report, format, &path)?;
        log_summary(&report.model, &report.summary);
    }

    Ok(())
}

pub async fn rag(args: RagArgs, settings: &Settings) -> Result<()> {
    let suite = args.suite.load()?;

    let kb = match &args.kb_csv {
        Some(path) => KnowledgeBase::from_csv(path, &args.kb_column)?,
        None => suite.knowledge_base()?,
    };
    info!("Knowledge base created with {} documents", kb.len());

    let testset = match &args.testset {
        Some(path) => TestSet::load_jsonl(path)?,
        None => TestSet::new(suite.questions.clone()),
    };
    if let Some(path) = &args.save_testset {
        testset.save_jsonl(path)?;
    }

    let timeout = Duration::from_secs(settings.timeout_secs);
    let scorer: Box<dyn Scorer> = match args.scorer {
        ScorerKind::Substring => Box::new(SubstringScorer),
        ScorerKind::Judge => Box::new(JudgeScorer::new(JudgeClient::new(&args.judge_url, timeout))),
    };

    let backends = args.backend.per_model(&suite.backend)?;
    let suffix_model = backends.len() > 1;
    let format = args.output.format_or(ReportFormat::Html);
    warn_ignored_output(&args.output, backends.len());

    for backend in &backends {
        let generator = build_generator(backend, settings)
            .await
            .with_context(|| format!("backend {} unavailable", backend.model_label()))?;

        let evaluator = RagEvaluator::new(RagPredictor::new(&kb, generator.as_ref()), scorer.as_ref());
        let report = evaluator.evaluate(&suite.id, &testset).await?;

        let path = output_path(&args.output, "rag_report", &backend.model_label(), suffix_model, format);
        write_report(&report, format, &path)?;
        log_summary(&report.model, &report.summary);
    }

    Ok(())
}

pub async fn retrieval(args: RetrievalArgs, settings: &Settings) -> Result<()> {
    let suite = args.suite.load()?;
    if suite.retrieval.is_empty() {
        bail!("suite '{}' has no retrieval queries", suite.id);
    }

    let timeout = Duration::from_secs(settings.timeout_secs);
    let retriever = RetrieverClient::new(&args.retriever_url, timeout);
    let judge = JudgeClient::new(&args.judge_url, timeout);

    let report = RetrievalEvaluator::new(&retriever, &judge).run(&suite.id, &suite.retrieval).await?;

    let format = args
        .format
        .or_else(|| ReportFormat::from_path(&args.output))
        .unwrap_or(ReportFormat::Csv);
    write_report(&report, format, &args.output)?;
    log_summary("retrieval", &report.summary);
    Ok(())
}

pub async fn models(args: ModelsArgs, settings: &Settings) -> Result<()> {
    let host = args.host.as_deref().unwrap_or(settings.ollama_host.as_str());
    let models = discover_models(host)
        .await
        .with_context(|| format!("Ollama discovery failed at {host} (is Ollama running?)"))?;

    if models.is_empty() {
        warn!("No models installed on {}", host);
    }
    for m in &models {
        println!("{}\t{}", m.model, m.name);
    }
    Ok(())
}

pub fn suites(args: SuitesArgs) -> Result<()> {
    let registry = SuiteRegistry::load_from_dir(&args.dir)
        .with_context(|| format!("failed to read suites from {}", args.dir.display()))?;

    for suite in registry.list() {
        println!(
            "{}\t{}\t{} questions\t{} retrieval queries",
            suite.id,
            suite.name,
            suite.questions.len(),
            suite.retrieval.len()
        );
    }
    Ok(())
}
