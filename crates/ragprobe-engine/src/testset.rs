//! Question/answer test sets persisted as JSON Lines.

use std::fs;
use std::io::Write;
use std::path::Path;

use ragprobe_core::{EvalError, QaPair};
use tracing::info;

/// An ordered list of question/answer pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestSet {
    pairs: Vec<QaPair>,
}

impl TestSet {
    pub fn new(pairs: Vec<QaPair>) -> Self {
        Self { pairs }
    }

    /// Reads one JSON object per line, skipping blank lines.
    pub fn load_jsonl(path: &Path) -> Result<Self, EvalError> {
        let content = fs::read_to_string(path)?;

        let pairs = content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(n, line)| {
                serde_json::from_str::<QaPair>(line)
                    .map_err(|e| EvalError::ParseError(format!("{} line {}: {}", path.display(), n + 1, e)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        info!("Loaded {} questions from {}", pairs.len(), path.display());
        Ok(Self { pairs })
    }

    /// Writes one JSON object per line.
    pub fn save_jsonl(&self, path: &Path) -> Result<(), EvalError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut file = fs::File::create(path)?;
        for pair in &self.pairs {
            writeln!(file, "{}", serde_json::to_string(pair)?)?;
        }

        info!("Test set saved -> {} ({} questions)", path.display(), self.pairs.len());
        Ok(())
    }

    pub fn pairs(&self) -> &[QaPair] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}
