//! Evaluation drivers: RAG prediction, scoring, and the sequential runners
//! that turn a test set into a report.

mod evaluator;
mod predictor;
mod scorer;
mod testset;

pub use evaluator::{RagEvaluator, RetrievalEvaluator, SubstringChecker};
pub use predictor::{rag_prompt, RagPredictor};
pub use scorer::{substring_passed, JudgeScorer, Scorer, SubstringScorer};
pub use testset::TestSet;
