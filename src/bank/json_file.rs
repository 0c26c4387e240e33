use super::{QuestionBank, SaveOutcome};
use crate::analysis::{DifficultyLevel, SentenceAnalysis};
use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::Rng;
use std::path::{Path, PathBuf};
use tokio::fs as async_fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Question bank stored as one JSON array on disk.
///
/// Every operation holds the lock for its whole read-modify-write cycle, and
/// writes go to a sibling temp file that is renamed over the bank.
pub struct JsonFileQuestionBank {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileQuestionBank {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Vec<SentenceAnalysis>> {
        let exists = async_fs::try_exists(&self.path)
            .await
            .with_context(|| format!("Failed to check question bank: {}", self.path.display()))?;
        if !exists {
            debug!("Question bank {} does not exist yet", self.path.display());
            return Ok(Vec::new());
        }

        let content = async_fs::read(&self.path)
            .await
            .with_context(|| format!("Failed to read question bank: {}", self.path.display()))?;
        if content.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        serde_json::from_slice(&content)
            .with_context(|| format!("Failed to parse question bank: {}", self.path.display()))
    }

    async fn store(&self, entries: &[SentenceAnalysis]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            async_fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let serialized =
            serde_json::to_vec_pretty(entries).context("Failed to serialize question bank")?;

        let temp_path = self.path.with_extension("json.tmp");
        let mut file = async_fs::File::create(&temp_path)
            .await
            .context("Failed to create temporary bank file")?;
        file.write_all(&serialized)
            .await
            .context("Failed to write question bank")?;
        file.sync_all()
            .await
            .context("Failed to sync question bank")?;
        drop(file);

        async_fs::rename(&temp_path, &self.path)
            .await
            .context("Failed to commit question bank file")?;
        Ok(())
    }
}

fn matches_level(entry: &SentenceAnalysis, level: Option<DifficultyLevel>) -> bool {
    level.is_none_or(|level| entry.effective_level() == level)
}

#[async_trait]
impl QuestionBank for JsonFileQuestionBank {
    async fn save(&self, analysis: &SentenceAnalysis) -> Result<SaveOutcome> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;

        if entries
            .iter()
            .any(|e| e.original_sentence == analysis.original_sentence)
        {
            debug!("Sentence already in bank: {}", analysis.original_sentence);
            return Ok(SaveOutcome {
                inserted: false,
                count: entries.len(),
            });
        }

        entries.push(analysis.clone());
        self.store(&entries).await?;
        info!(
            "Saved sentence to question bank ({} entries): {}",
            entries.len(),
            analysis.original_sentence
        );

        Ok(SaveOutcome {
            inserted: true,
            count: entries.len(),
        })
    }

    async fn get_random(
        &self,
        level: Option<DifficultyLevel>,
        exclude_sentence: Option<&str>,
    ) -> Result<Option<SentenceAnalysis>> {
        let _guard = self.lock.lock().await;
        let entries = self.load().await?;

        let mut candidates: Vec<&SentenceAnalysis> =
            entries.iter().filter(|e| matches_level(e, level)).collect();
        if let Some(exclude) = exclude_sentence {
            candidates.retain(|e| e.original_sentence != exclude);
        }
        if candidates.is_empty() {
            return Ok(None);
        }

        let index = rand::rng().random_range(0..candidates.len());
        Ok(Some(candidates[index].clone()))
    }

    async fn size(&self, level: Option<DifficultyLevel>) -> Result<usize> {
        let _guard = self.lock.lock().await;
        let entries = self.load().await?;
        Ok(entries.iter().filter(|e| matches_level(e, level)).count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::sample_analysis;
    use tempfile::TempDir;

    fn entry(sentence: &str, level: Option<DifficultyLevel>) -> SentenceAnalysis {
        SentenceAnalysis {
            original_sentence: sentence.to_string(),
            level,
            ..sample_analysis(DifficultyLevel::Basic)
        }
    }

    #[tokio::test]
    async fn save_deduplicates_by_sentence() {
        let dir = TempDir::new().unwrap();
        let bank = JsonFileQuestionBank::new(dir.path().join("nested").join("bank.json"));

        let first = bank.save(&entry("A.", Some(DifficultyLevel::Basic))).await.unwrap();
        assert_eq!(first, SaveOutcome { inserted: true, count: 1 });

        let again = bank.save(&entry("A.", Some(DifficultyLevel::Advanced))).await.unwrap();
        assert_eq!(again, SaveOutcome { inserted: false, count: 1 });

        bank.save(&entry("B.", None)).await.unwrap();
        assert_eq!(bank.size(None).await.unwrap(), 2);
        assert!(!bank.path().with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn missing_level_counts_as_advanced() {
        let dir = TempDir::new().unwrap();
        let bank = JsonFileQuestionBank::new(dir.path().join("bank.json"));
        bank.save(&entry("Old entry.", None)).await.unwrap();
        bank.save(&entry("Easy one.", Some(DifficultyLevel::Basic))).await.unwrap();

        assert_eq!(bank.size(Some(DifficultyLevel::Advanced)).await.unwrap(), 1);
        assert_eq!(bank.size(Some(DifficultyLevel::Intermediate)).await.unwrap(), 0);

        let picked = bank
            .get_random(Some(DifficultyLevel::Advanced), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(picked.original_sentence, "Old entry.");
    }

    #[tokio::test]
    async fn exclusion_can_leave_nothing() {
        let dir = TempDir::new().unwrap();
        let bank = JsonFileQuestionBank::new(dir.path().join("bank.json"));
        assert!(bank.get_random(None, None).await.unwrap().is_none());

        bank.save(&entry("Only.", Some(DifficultyLevel::Basic))).await.unwrap();
        bank.save(&entry("Other.", Some(DifficultyLevel::Basic))).await.unwrap();

        for _ in 0..10 {
            let picked = bank
                .get_random(Some(DifficultyLevel::Basic), Some("Only."))
                .await
                .unwrap()
                .unwrap();
            assert_eq!(picked.original_sentence, "Other.");
        }
        assert!(
            bank.get_random(Some(DifficultyLevel::Intermediate), Some("Only."))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bank.json");
        std::fs::write(&path, "{ not json").unwrap();
        let bank = JsonFileQuestionBank::new(&path);

        let err = bank.size(None).await.unwrap_err();
        assert!(err.to_string().contains("Failed to parse question bank"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn unreadable_bank_path_is_an_error() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let bank = JsonFileQuestionBank::new(blocker.join("bank.json"));

        let err = bank.size(None).await.unwrap_err();
        assert!(err.to_string().contains("Failed to check question bank"));
        assert!(bank.get_random(None, None).await.is_err());
    }
}
