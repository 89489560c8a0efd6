//! Answer scoring: case-insensitive substring containment or an external judge.

use async_trait::async_trait;
use ragprobe_core::{AgentAnswer, QaPair};
use ragprobe_network::JudgeClient;

/// True iff `expected` occurs in `answer`, ignoring case. An empty phrase always passes.
pub fn substring_passed(answer: &str, expected: &str) -> bool {
    answer.to_lowercase().contains(&expected.to_lowercase())
}

/// Decides whether an answer is acceptable for a question.
#[async_trait]
pub trait Scorer: Send + Sync {
    fn name(&self) -> &str;

    async fn score(&self, pair: &QaPair, answer: &AgentAnswer) -> bool;
}

/// Passes when the expected phrase appears in the answer.
pub struct SubstringScorer;

#[async_trait]
impl Scorer for SubstringScorer {
    fn name(&self) -> &str {
        "substring"
    }

    async fn score(&self, pair: &QaPair, answer: &AgentAnswer) -> bool {
        substring_passed(&answer.message, &pair.expected)
    }
}

/// Passes when the judge endpoint answers "yes".
pub struct JudgeScorer {
    judge: JudgeClient,
}

impl JudgeScorer {
    pub fn new(judge: JudgeClient) -> Self {
        Self { judge }
    }
}

#[async_trait]
impl Scorer for JudgeScorer {
    fn name(&self) -> &str {
        "judge"
    }

    async fn score(&self, pair: &QaPair, answer: &AgentAnswer) -> bool {
        self.judge.judge_answer(&pair.question, &pair.expected, &answer.message).await == 1
    }
}
