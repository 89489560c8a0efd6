//! Sequential evaluation drivers.
//!
//! Every question is sent and scored before the next one starts. Backend
//! failures are recorded as the sentinel answer and never abort a run.

use ragprobe_core::{generate_or_sentinel, EvalError, EvalRecord, Generator, RetrievalQuery, RetrievalRecord, NO_DOCUMENT};
use ragprobe_network::{JudgeClient, RetrieverClient};
use ragprobe_report::{EvalReport, RetrievalReport};
use tracing::info;

use crate::predictor::RagPredictor;
use crate::scorer::{substring_passed, Scorer};
use crate::testset::TestSet;

fn status(passed: bool) -> &'static str {
    if passed {
        "PASS"
    } else {
        "FAIL"
    }
}

/// Sends each question to the generator as-is and checks the expected phrase.
pub struct SubstringChecker<'a> {
    generator: &'a dyn Generator,
}

impl<'a> SubstringChecker<'a> {
    pub fn new(generator: &'a dyn Generator) -> Self {
        Self { generator }
    }

    pub async fn run(&self, suite: &str, testset: &TestSet) -> Result<EvalReport, EvalError> {
        if testset.is_empty() {
            return Err(EvalError::EmptyTestSet);
        }

        let mut records = Vec::with_capacity(testset.len());
        for pair in testset.pairs() {
            let answer = generate_or_sentinel(self.generator, &pair.question).await;
            let passed = substring_passed(&answer, &pair.expected);
            info!("CHECK: {} -> {}", pair.question, status(passed));

            records.push(EvalRecord {
                question: pair.question.clone(),
                answer,
                expected: pair.expected.clone(),
                passed,
            });
        }

        let report = EvalReport::new(suite, self.generator.name(), records);
        info!(
            "CHECK: {} passed {}/{}",
            report.model, report.summary.passed, report.summary.total
        );
        Ok(report)
    }
}

/// Runs a RAG predictor over a test set and scores every answer.
pub struct RagEvaluator<'a> {
    predictor: RagPredictor<'a>,
    scorer: &'a dyn Scorer,
}

impl<'a> RagEvaluator<'a> {
    pub fn new(predictor: RagPredictor<'a>, scorer: &'a dyn Scorer) -> Self {
        Self { predictor, scorer }
    }

    pub async fn evaluate(&self, suite: &str, testset: &TestSet) -> Result<EvalReport, EvalError> {
        if testset.is_empty() {
            return Err(EvalError::EmptyTestSet);
        }

        let model = self.predictor.generator().name().to_string();
        info!("EVALUATOR: {} questions, model {}, scorer {}", testset.len(), model, self.scorer.name());

        let mut records = Vec::with_capacity(testset.len());
        for pair in testset.pairs() {
            let answer = self.predictor.predict(&pair.question).await;
            let passed = self.scorer.score(pair, &answer).await;
            info!("EVALUATOR: {} -> {}", pair.question, status(passed));

            records.push(EvalRecord {
                question: pair.question.clone(),
                answer: answer.message,
                expected: pair.expected.clone(),
                passed,
            });
        }

        let report = EvalReport::new(suite, &model, records);
        info!(
            "EVALUATOR: {} passed {}/{} ({:.0}%)",
            model,
            report.summary.passed,
            report.summary.total,
            report.summary.pass_rate * 100.0
        );
        Ok(report)
    }
}

/// Retrieves documents for each query and asks a judge about the top one.
pub struct RetrievalEvaluator<'a> {
    retriever: &'a RetrieverClient,
    judge: &'a JudgeClient,
}

impl<'a> RetrievalEvaluator<'a> {
    pub fn new(retriever: &'a RetrieverClient, judge: &'a JudgeClient) -> Self {
        Self { retriever, judge }
    }

    pub async fn run(&self, suite: &str, queries: &[RetrievalQuery]) -> Result<RetrievalReport, EvalError> {
        if queries.is_empty() {
            return Err(EvalError::EmptyTestSet);
        }

        let mut records = Vec::with_capacity(queries.len());
        for q in queries {
            let documents = self.retriever.retrieve(&q.query).await;
            let retrieved_doc = documents.into_iter().next().unwrap_or_else(|| NO_DOCUMENT.to_string());
            let judge_score = self.judge.judge(&q.query, &retrieved_doc).await;
            info!("RETRIEVAL: {} -> {} (score {})", q.query, retrieved_doc, judge_score);

            records.push(RetrievalRecord {
                query: q.query.clone(),
                expected_document: q.expected_document.clone(),
                retrieved_doc,
                judge_score,
            });
        }

        let report = RetrievalReport::new(suite, records);
        info!("RETRIEVAL: judge passed {}/{}", report.summary.passed, report.summary.total);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use mockito::Matcher;
    use pretty_assertions::assert_eq;
    use ragprobe_core::{KnowledgeBase, QaPair, GENERATION_ERROR};
    use serde_json::json;

    use super::*;
    use crate::scorer::SubstringScorer;

    struct Fixed(&'static str);

    #[async_trait]
    impl Generator for Fixed {
        fn name(&self) -> &str {
            "stub"
        }

        async fn generate(&self, _prompt: &str) -> Result<String, EvalError> {
            Ok(self.0.to_string())
        }
    }

    struct Unreachable;

    #[async_trait]
    impl Generator for Unreachable {
        fn name(&self) -> &str {
            "unreachable"
        }

        async fn generate(&self, _prompt: &str) -> Result<String, EvalError> {
            Err(EvalError::Backend("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn checker_marks_substring_hits() {
        let generator = Fixed("Giskard is a framework for testing AI.");
        let testset = TestSet::new(vec![QaPair::new("What is Giskard?", "framework")]);

        let report = SubstringChecker::new(&generator).run("demo", &testset).await.unwrap();

        assert_eq!(
            report.records,
            vec![EvalRecord {
                question: "What is Giskard?".into(),
                answer: "Giskard is a framework for testing AI.".into(),
                expected: "framework".into(),
                passed: true,
            }]
        );
        assert_eq!(report.model, "stub");
    }

    #[tokio::test]
    async fn checker_records_sentinel_for_unreachable_backend() {
        let testset = TestSet::new(vec![QaPair::new("q1", "x"), QaPair::new("q2", "y")]);
        let report = SubstringChecker::new(&Unreachable).run("demo", &testset).await.unwrap();

        assert_eq!(report.records.len(), 2);
        assert!(report.records.iter().all(|r| r.answer == GENERATION_ERROR && !r.passed));
    }

    #[tokio::test]
    async fn empty_testset_is_rejected() {
        let err = SubstringChecker::new(&Unreachable).run("demo", &TestSet::default()).await.unwrap_err();
        assert!(matches!(err, EvalError::EmptyTestSet));
    }

    #[tokio::test]
    async fn rag_evaluation_scores_each_question() {
        let kb = KnowledgeBase::from_texts(["Giskard is a framework for testing AI."]).unwrap();
        let generator = Fixed("Giskard is a framework for testing AI.");
        let scorer = SubstringScorer;
        let testset = TestSet::new(vec![
            QaPair::new("What is Giskard?", "framework"),
            QaPair::new("Who made Llama 3?", "Meta"),
        ]);

        let evaluator = RagEvaluator::new(RagPredictor::new(&kb, &generator), &scorer);
        let report = evaluator.evaluate("demo", &testset).await.unwrap();

        assert_eq!(report.summary.total, 2);
        assert_eq!(report.summary.passed, 1);
        assert_eq!(report.records.iter().map(|r| r.passed).collect::<Vec<_>>(), vec![true, false]);
    }

    #[tokio::test]
    async fn retrieval_judges_first_document() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/retrieve")
            .with_status(200)
            .with_body(r#"{"documents": ["Architecture Decision Record Template", "Other"]}"#)
            .create_async()
            .await;
        let judge_mock = server
            .mock("POST", "/judge")
            .match_body(Matcher::PartialJson(json!({
                "retrieved_document": "Architecture Decision Record Template"
            })))
            .with_status(200)
            .with_body(r#"{"judge": "Yes"}"#)
            .create_async()
            .await;

        let retriever = RetrieverClient::new(&format!("{}/retrieve", server.url()), Duration::from_secs(5));
        let judge = JudgeClient::new(&format!("{}/judge", server.url()), Duration::from_secs(5));
        let queries = vec![RetrievalQuery {
            query: "Where is the Architecture Decision Record Template?".into(),
            expected_document: "Architecture Decision Record Template".into(),
        }];

        let report = RetrievalEvaluator::new(&retriever, &judge).run("internal", &queries).await.unwrap();

        judge_mock.assert_async().await;
        assert_eq!(report.records[0].retrieved_doc, "Architecture Decision Record Template");
        assert_eq!(report.records[0].judge_score, 1);
    }

    #[tokio::test]
    async fn retrieval_uses_no_document_for_empty_results() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/retrieve")
            .with_status(200)
            .with_body(r#"{"documents": []}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/judge")
            .with_status(200)
            .with_body(r#"{"judge": "no"}"#)
            .create_async()
            .await;

        let retriever = RetrieverClient::new(&format!("{}/retrieve", server.url()), Duration::from_secs(5));
        let judge = JudgeClient::new(&format!("{}/judge", server.url()), Duration::from_secs(5));
        let queries = vec![RetrievalQuery { query: "q".into(), expected_document: "d".into() }];

        let report = RetrievalEvaluator::new(&retriever, &judge).run("internal", &queries).await.unwrap();
        assert_eq!(report.records[0].retrieved_doc, NO_DOCUMENT);
        assert_eq!(report.records[0].judge_score, 0);
    }
}
