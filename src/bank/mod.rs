//! Question bank: the store of generated exercises the game can replay.

pub mod json_file;

pub use json_file::JsonFileQuestionBank;

use crate::analysis::{DifficultyLevel, SentenceAnalysis};
use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

/// Result of a save; duplicates (same `originalSentence`) are not inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SaveOutcome {
    pub inserted: bool,
    /// Total number of entries after the save
    pub count: usize,
}

#[async_trait]
pub trait QuestionBank: Send + Sync {
    async fn save(&self, analysis: &SentenceAnalysis) -> Result<SaveOutcome>;

    /// Random entry of `level` (all levels when `None`), never `exclude_sentence`.
    async fn get_random(
        &self,
        level: Option<DifficultyLevel>,
        exclude_sentence: Option<&str>,
    ) -> Result<Option<SentenceAnalysis>>;

    async fn size(&self, level: Option<DifficultyLevel>) -> Result<usize>;
}
