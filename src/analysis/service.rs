use crate::analysis::fallback_data::sample_analysis;
use crate::analysis::parser::{ParsedResponse, parse_ai_response};
use crate::analysis::postprocess::{post_process_roles, validate_prepositional_phrases};
use crate::analysis::prompts::PromptBuilder;
use crate::analysis::types::{DifficultyLevel, SentenceAnalysis};
use crate::bank::QuestionBank;
use crate::llm::{
    AIError, AIErrorKind, AllProvidersFailedError, GenerateOptions, GenerateResult,
    GenerationError, ProviderManager, ResponseFormat, ServiceOptions,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Sampling and timeout policy applied to every analysis request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Overrides each provider's configured temperature when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Overrides each provider's configured max tokens when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    pub timeout_ms: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: None,
            max_tokens: None,
            timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Generation(GenerationError),
    /// Every provider failed and there is no safe substitute
    #[error("AI service unavailable: {0}")]
    ServiceUnavailable(AllProvidersFailedError),
    #[error("Sentence to analyze must not be empty")]
    EmptySentence,
}

impl From<GenerationError> for AnalysisError {
    fn from(error: GenerationError) -> Self {
        match error {
            GenerationError::AllProvidersFailed(failure) => AnalysisError::ServiceUnavailable(failure),
            other => AnalysisError::Generation(other),
        }
    }
}

/// Per-request options for level-based generation.
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub routing: ServiceOptions,
    /// Sentence of the previous exercise, to steer away from repeats
    pub previous_sentence: Option<String>,
    /// Do not store the result in the question bank
    pub skip_bank: bool,
}

/// Turns a level or a user sentence into a validated [`SentenceAnalysis`].
pub struct SentenceAnalysisService {
    manager: Arc<ProviderManager>,
    prompts: Arc<dyn PromptBuilder>,
    bank: Option<Arc<dyn QuestionBank>>,
    config: GenerationConfig,
}

impl SentenceAnalysisService {
    pub fn new(
        manager: Arc<ProviderManager>,
        prompts: Arc<dyn PromptBuilder>,
        config: GenerationConfig,
    ) -> Self {
        Self {
            manager,
            prompts,
            bank: None,
            config,
        }
    }

    /// Store freshly generated level artifacts in `bank`.
    pub fn with_bank(mut self, bank: Arc<dyn QuestionBank>) -> Self {
        self.bank = Some(bank);
        self
    }

    pub fn manager(&self) -> &Arc<ProviderManager> {
        &self.manager
    }

    fn generate_options(&self) -> GenerateOptions {
        GenerateOptions {
            model: None,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            response_format: ResponseFormat::Json,
            schema: Some(self.prompts.schema()),
            system_prompt: Some(self.prompts.system_prompt()),
            timeout: Duration::from_millis(self.config.timeout_ms),
        }
    }

    /// Generate a fresh exercise for `level`.
    ///
    /// When every provider fails the canned sample artifact is returned
    /// instead; other failures propagate.
    pub async fn generate_sentence_analysis(
        &self,
        level: DifficultyLevel,
        request: &GenerationRequest,
    ) -> Result<SentenceAnalysis, AnalysisError> {
        let request_id = Uuid::new_v4();
        info!("[{}] Generating {} sentence analysis", request_id, level);

        let prompt = self
            .prompts
            .build_prompt(level, request.previous_sentence.as_deref());
        let parsed = match self.request(&prompt, &request.routing).await {
            Ok(parsed) => parsed,
            Err(GenerationError::AllProvidersFailed(failure)) => {
                warn!(
                    "[{}] {}; serving fallback sentence",
                    request_id, failure
                );
                return Ok(sample_analysis(level));
            }
            Err(e) => {
                error!("[{}] Generation failed: {}", request_id, e);
                return Err(e.into());
            }
        };

        let analysis = self.finish(request_id, parsed, level);

        if !request.skip_bank
            && let Some(bank) = &self.bank
        {
            match bank.save(&analysis).await {
                Ok(outcome) if outcome.inserted => {
                    info!("[{}] Stored in question bank ({} entries)", request_id, outcome.count)
                }
                Ok(_) => debug!("[{}] Sentence already in question bank", request_id),
                Err(e) => warn!("[{}] Failed to store sentence in question bank: {:#}", request_id, e),
            }
        }

        Ok(analysis)
    }

    /// Analyze a sentence the user typed. Never substitutes canned data.
    pub async fn analyze_custom_sentence(
        &self,
        sentence: &str,
        level: DifficultyLevel,
        routing: &ServiceOptions,
    ) -> Result<SentenceAnalysis, AnalysisError> {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            return Err(AnalysisError::EmptySentence);
        }

        let request_id = Uuid::new_v4();
        info!("[{}] Analyzing custom sentence: {}", request_id, sentence);

        let prompt = self.prompts.build_analysis_prompt(sentence, level);
        let parsed = self.request(&prompt, routing).await.map_err(|e| {
            error!("[{}] Analysis failed: {}", request_id, e);
            AnalysisError::from(e)
        })?;

        Ok(self.finish(request_id, parsed, level))
    }

    async fn request(
        &self,
        prompt: &str,
        routing: &ServiceOptions,
    ) -> Result<ParsedResponse, GenerationError> {
        let options = self.generate_options();
        let (parsed, provider) = self
            .manager
            .generate_accepted(prompt, &options, routing, accept_analysis)
            .await?;
        debug!("Parsed analysis from {}", provider);
        Ok(parsed)
    }

    /// Normalize, repair and validate a parsed artifact.
    fn finish(&self, request_id: Uuid, parsed: ParsedResponse, level: DifficultyLevel) -> SentenceAnalysis {
        let ParsedResponse {
            mut analysis,
            structure_coerced_from,
            dropped_roles,
            dropped_skeleton,
        } = parsed;
        analysis.level = Some(level);

        if let Some(raw) = structure_coerced_from {
            warn!(
                "[{}] Invalid structure type: {}, using default {}",
                request_id, raw, analysis.structure_type
            );
        }
        if dropped_roles > 0 {
            warn!("[{}] Dropped {} out-of-range role entries", request_id, dropped_roles);
        }
        if !dropped_skeleton.is_empty() {
            warn!(
                "[{}] Dropped skeleton indices without a skeleton role: {:?}",
                request_id, dropped_skeleton
            );
        }

        let changes = post_process_roles(&mut analysis);
        if !changes.is_empty() {
            info!("[{}] Post-processing changed {} role(s)", request_id, changes.len());
            for change in &changes {
                debug!(
                    "[{}]   {} '{}': {} -> {}",
                    request_id, change.index, change.word, change.before, change.after
                );
            }
        }

        let report = validate_prepositional_phrases(&analysis);
        for issue in &report.issues {
            warn!("[{}] Validation issue: {}", request_id, issue.message);
        }

        analysis
    }
}

/// Reject provider output that does not decode, so the next attempt gets a chance.
fn accept_analysis(result: GenerateResult) -> Result<(ParsedResponse, String), AIError> {
    match parse_ai_response(&result.content) {
        Ok(parsed) => Ok((parsed, result.provider)),
        Err(e) => {
            warn!("Unusable response from {}: {}", result.provider, e);
            Err(AIError::new(AIErrorKind::InvalidResponse, result.provider, e.to_string()))
        }
    }
}
