//! End-to-end service tests over scripted in-process providers.

use futures::future::BoxFuture;
use sentence_skeleton::analysis::{TemplatePromptBuilder, sample_analysis};
use sentence_skeleton::llm::{
    AIError, AIErrorKind, AIProvider, GenerateOptions, GenerateResult, ProviderStatus, TokenUsage,
};
use sentence_skeleton::{
    AnalysisError, AppConfig, DifficultyLevel, FallbackConfig, GenerationConfig,
    GenerationRequest, GrammarRole, ProviderManager, QuestionBank, SentenceAnalysisService,
    ServiceOptions, SkeletonSystem,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

/// Provider that always answers with the same content or the same error.
struct CannedProvider {
    name: String,
    reply: Result<String, AIErrorKind>,
    calls: AtomicUsize,
}

impl CannedProvider {
    fn replying(name: &str, content: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            reply: Ok(content.into()),
            calls: AtomicUsize::new(0),
        })
    }

    fn failing(name: &str, kind: AIErrorKind) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            reply: Err(kind),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl AIProvider for CannedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        true
    }

    fn generate(
        &self,
        _prompt: String,
        _options: GenerateOptions,
    ) -> BoxFuture<'_, Result<GenerateResult, AIError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.reply {
                Ok(content) => Ok(GenerateResult {
                    content: content.clone(),
                    model: "canned".to_string(),
                    provider: self.name.clone(),
                    usage: TokenUsage::default(),
                    metadata: HashMap::new(),
                }),
                Err(kind) => Err(AIError::new(
                    *kind,
                    &self.name,
                    format!("{} failure", kind),
                )),
            }
        })
    }

    fn get_status(&self) -> BoxFuture<'_, ProviderStatus> {
        Box::pin(async move {
            ProviderStatus {
                name: self.name.clone(),
                available: true,
                last_error: None,
                last_error_time: None,
                model: None,
                fallback_model: None,
            }
        })
    }
}

fn fast_fallback() -> FallbackConfig {
    FallbackConfig {
        enabled: true,
        retry_count: 1,
        retry_delay_ms: 0,
    }
}

fn service_with(providers: &[Arc<CannedProvider>]) -> SentenceAnalysisService {
    let priorities = providers
        .iter()
        .enumerate()
        .map(|(i, p)| (p.name.clone(), i as u32 + 1))
        .collect();
    let manager = Arc::new(ProviderManager::new(priorities, fast_fallback()));
    for provider in providers {
        manager.register_provider(provider.clone() as Arc<dyn AIProvider>);
    }
    SentenceAnalysisService::new(
        manager,
        Arc::new(TemplatePromptBuilder::new()),
        GenerationConfig::default(),
    )
}

/// "on the table" arrives with mixed roles and must be repaired to 状语.
fn keys_response() -> String {
    json!({
        "originalSentence": "She put the keys on the table.",
        "words": ["She", "put", "the", "keys", "on", "the", "table", "."],
        "wordRoles": ["主语", "谓语", "定语", "宾语", "状语", "定语", "状语", "连接词/其他"],
        "structureType": "主谓宾 (SVO)",
        "skeletonIndices": [0, 1, 3],
        "explanation": "主干是 She put keys。",
        "options": ["主语", "谓语", "宾语", "状语"]
    })
    .to_string()
}

#[tokio::test]
async fn generated_analysis_is_post_processed() {
    let provider = CannedProvider::replying("qwen", format!("```json\n{}\n```", keys_response()));
    let service = service_with(&[provider.clone()]);

    let analysis = service
        .generate_sentence_analysis(DifficultyLevel::Intermediate, &GenerationRequest::default())
        .await
        .unwrap();

    assert_eq!(analysis.original_sentence, "She put the keys on the table.");
    assert_eq!(analysis.level, Some(DifficultyLevel::Intermediate));
    for index in 4..=6 {
        assert_eq!(analysis.word_roles[&index], GrammarRole::Adverbial, "token {}", index);
    }
    assert_eq!(analysis.word_roles[&2], GrammarRole::Attribute);
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn unparseable_output_moves_to_next_provider() {
    let broken = CannedProvider::replying("qwen", "I'm sorry, I can't produce JSON today.");
    let good = CannedProvider::replying("gemini", keys_response());
    let service = service_with(&[broken.clone(), good.clone()]);

    let analysis = service
        .analyze_custom_sentence(
            "She put the keys on the table.",
            DifficultyLevel::Basic,
            &ServiceOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(analysis.words.len(), 8);
    // retry_count = 1 gives two attempts on the broken provider
    assert_eq!(broken.calls(), 2);
    assert_eq!(good.calls(), 1);
}

#[tokio::test]
async fn level_generation_serves_sample_when_everything_fails() {
    let a = CannedProvider::failing("qwen", AIErrorKind::RateLimit);
    let b = CannedProvider::failing("deepseek", AIErrorKind::NetworkError);
    let service = service_with(&[a.clone(), b.clone()]);

    let analysis = service
        .generate_sentence_analysis(DifficultyLevel::Basic, &GenerationRequest::default())
        .await
        .unwrap();

    assert_eq!(analysis, sample_analysis(DifficultyLevel::Basic));
    assert_eq!(a.calls(), 2);
    assert_eq!(b.calls(), 2);
}

#[tokio::test]
async fn custom_sentence_reports_service_unavailable() {
    let a = CannedProvider::failing("qwen", AIErrorKind::QuotaExceeded);
    let service = service_with(&[a]);

    let error = service
        .analyze_custom_sentence("Birds sing.", DifficultyLevel::Basic, &ServiceOptions::default())
        .await
        .unwrap_err();

    match error {
        AnalysisError::ServiceUnavailable(failure) => {
            assert_eq!(failure.providers, vec!["qwen".to_string()]);
            assert_eq!(failure.errors[0].error.kind, AIErrorKind::QuotaExceeded);
        }
        other => panic!("Expected ServiceUnavailable, got {:?}", other),
    }
}

#[tokio::test]
async fn auth_failure_is_not_masked_by_sample() {
    let a = CannedProvider::failing("qwen", AIErrorKind::AuthError);
    let b = CannedProvider::replying("gemini", keys_response());
    let service = service_with(&[a.clone(), b.clone()]);

    let error = service
        .generate_sentence_analysis(DifficultyLevel::Advanced, &GenerationRequest::default())
        .await
        .unwrap_err();

    assert!(matches!(error, AnalysisError::Generation(_)));
    assert_eq!(a.calls(), 1);
    assert_eq!(b.calls(), 0);
}

#[tokio::test]
async fn empty_custom_sentence_is_rejected_without_calls() {
    let provider = CannedProvider::replying("qwen", keys_response());
    let service = service_with(&[provider.clone()]);

    let error = service
        .analyze_custom_sentence("   ", DifficultyLevel::Basic, &ServiceOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(error, AnalysisError::EmptySentence));
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn system_saves_generated_sentences_to_bank() {
    let dir = TempDir::new().unwrap();
    let mut config = AppConfig::default();
    config.fallback = fast_fallback();
    config.bank.path = dir.path().join("bank").join("question-bank.json");

    let provider = CannedProvider::replying("qwen", keys_response());
    let system = SkeletonSystem::with_providers(config, vec![provider as Arc<dyn AIProvider>])
        .unwrap();

    let request = GenerationRequest::default();
    system
        .service()
        .generate_sentence_analysis(DifficultyLevel::Basic, &request)
        .await
        .unwrap();
    // same sentence again is deduplicated
    system
        .service()
        .generate_sentence_analysis(DifficultyLevel::Basic, &request)
        .await
        .unwrap();

    let bank = system.bank();
    assert_eq!(bank.size(None).await.unwrap(), 1);
    assert_eq!(bank.size(Some(DifficultyLevel::Basic)).await.unwrap(), 1);

    let skipped = GenerationRequest {
        skip_bank: true,
        ..Default::default()
    };
    std::fs::remove_file(bank.path()).unwrap();
    system
        .service()
        .generate_sentence_analysis(DifficultyLevel::Basic, &skipped)
        .await
        .unwrap();
    assert!(!bank.path().exists());

    let status = system.status().await;
    assert!(status.is_healthy);
    assert_eq!(status.available_providers, 1);
    assert_eq!(status.bank_size, Some(0));
}

#[tokio::test]
async fn custom_sentences_are_not_saved() {
    let dir = TempDir::new().unwrap();
    let mut config = AppConfig::default();
    config.bank.path = dir.path().join("question-bank.json");

    let provider = CannedProvider::replying("qwen", keys_response());
    let system = SkeletonSystem::with_providers(config, vec![provider as Arc<dyn AIProvider>])
        .unwrap();

    system
        .service()
        .analyze_custom_sentence(
            "She put the keys on the table.",
            DifficultyLevel::Basic,
            &ServiceOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(system.bank().size(None).await.unwrap(), 0);
}
