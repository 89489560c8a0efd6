//! RAG prediction: knowledge-base context plus a question, answered by a generator.

use ragprobe_core::{answer_or_sentinel, AgentAnswer, Generator, KnowledgeBase};
use tracing::debug;

/// Renders the context-stuffed prompt sent to the model.
pub fn rag_prompt(context: &str, question: &str) -> String {
    format!("Answer the question using the following context:\n\n{context}\n\nQ: {question}\nA:")
}

/// Answers questions from a fixed knowledge base.
pub struct RagPredictor<'a> {
    knowledge_base: &'a KnowledgeBase,
    generator: &'a dyn Generator,
}

impl<'a> RagPredictor<'a> {
    pub fn new(knowledge_base: &'a KnowledgeBase, generator: &'a dyn Generator) -> Self {
        Self { knowledge_base, generator }
    }

    pub fn generator(&self) -> &dyn Generator {
        self.generator
    }

    /// Answers the question; backend failures become the sentinel answer.
    /// Documents reported by the backend are kept, else the knowledge base texts.
    pub async fn predict(&self, question: &str) -> AgentAnswer {
        let prompt = rag_prompt(&self.knowledge_base.context(), question);
        debug!("RAG prompt: {} chars", prompt.len());

        let mut answer = answer_or_sentinel(self.generator, &prompt).await;
        if answer.documents.is_empty() {
            answer.documents = self.knowledge_base.texts();
        }
        answer
    }
}
