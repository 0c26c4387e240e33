//! # Application Wiring
//!
//! Builds the provider table, manager, analysis service and question bank
//! from one [`AppConfig`].
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                 SkeletonSystem                   │
//! │  ┌──────────────┐  ┌───────────┐  ┌────────────┐ │
//! │  │  Analysis    │─▶│ Provider  │─▶│ Providers  │ │
//! │  │  Service     │  │ Manager   │  │ (REST)     │ │
//! │  └──────┬───────┘  └───────────┘  └────────────┘ │
//! │         ▼                                        │
//! │  ┌──────────────┐                                │
//! │  │ QuestionBank │                                │
//! │  └──────────────┘                                │
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use sentence_skeleton::{AppConfig, DifficultyLevel, GenerationRequest, SkeletonSystem};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut config = AppConfig::default();
//!     config.apply_env_overrides();
//!     let system = SkeletonSystem::new(config)?;
//!
//!     let analysis = system
//!         .service()
//!         .generate_sentence_analysis(DifficultyLevel::Basic, &GenerationRequest::default())
//!         .await?;
//!     println!("{}", analysis.original_sentence);
//!     Ok(())
//! }
//! ```

use crate::analysis::{GenerationConfig, SentenceAnalysisService, TemplatePromptBuilder};
use crate::bank::{JsonFileQuestionBank, QuestionBank};
use crate::env;
use crate::llm::{
    AIProvider, FallbackConfig, ProviderConfig, ProviderFactory, ProviderManager, ProviderStatus,
};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Upper bound on per-provider retries accepted from configuration
pub const MAX_RETRY_COUNT: u32 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "ProviderConfig::defaults")]
    pub providers: Vec<ProviderConfig>,
    #[serde(default)]
    pub fallback: FallbackConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub bank: BankConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BankConfig {
    pub path: PathBuf,
    /// Store freshly generated level artifacts
    pub save_generated: bool,
}

impl Default for BankConfig {
    fn default() -> Self {
        Self {
            path: env::default_bank_path(),
            save_generated: true,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            providers: ProviderConfig::defaults(),
            fallback: FallbackConfig::default(),
            generation: GenerationConfig::default(),
            bank: BankConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_toml_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Load configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML configuration")
    }

    /// Save configuration to a TOML file
    pub fn to_toml_file<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let content = self.to_toml_string()?;
        std::fs::write(path, content).context("Failed to write config file")
    }

    /// Convert configuration to a TOML string
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")
    }

    /// Resolve credentials and base URLs from the process environment.
    ///
    /// Call once at startup; nothing reads the environment after this.
    pub fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_with(|var| std::env::var(var).ok());
    }

    pub fn apply_env_overrides_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for provider in &mut self.providers {
            provider.apply_env_overrides(&lookup);
        }
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for provider in &self.providers {
            if provider.name.trim().is_empty() {
                bail!("Provider names must not be empty");
            }
            if !seen.insert(provider.name.as_str()) {
                bail!("Duplicate provider name '{}'", provider.name);
            }
            let base = provider.resolved_base_url();
            url::Url::parse(base).with_context(|| {
                format!("Invalid base URL for provider '{}': {}", provider.name, base)
            })?;
        }

        if self.fallback.retry_count > MAX_RETRY_COUNT {
            bail!(
                "fallback.retry_count must be at most {}, got {}",
                MAX_RETRY_COUNT,
                self.fallback.retry_count
            );
        }
        if self.generation.timeout_ms == 0 {
            bail!("generation.timeout_ms must be greater than zero");
        }
        Ok(())
    }

    pub fn priorities(&self) -> HashMap<String, u32> {
        self.providers
            .iter()
            .map(|p| (p.name.clone(), p.priority))
            .collect()
    }
}

/// Snapshot of provider health and bank size
#[derive(Debug, Clone, Serialize)]
pub struct SystemStatus {
    pub providers: Vec<ProviderStatus>,
    pub available_providers: usize,
    pub fallback: FallbackConfig,
    /// `None` when the bank could not be read
    pub bank_size: Option<usize>,
    pub is_healthy: bool,
}

/// Fully wired application: providers, manager, analysis service and bank.
pub struct SkeletonSystem {
    config: AppConfig,
    manager: Arc<ProviderManager>,
    service: SentenceAnalysisService,
    bank: Arc<JsonFileQuestionBank>,
}

impl SkeletonSystem {
    /// Validate `config` and build one provider per enabled entry.
    pub fn new(config: AppConfig) -> Result<Self> {
        config.validate()?;

        let mut providers: Vec<Arc<dyn AIProvider>> = Vec::new();
        for provider_config in config.providers.iter().filter(|p| p.enabled) {
            let provider = ProviderFactory::create(provider_config.clone())
                .with_context(|| format!("Failed to create provider '{}'", provider_config.name))?;
            providers.push(provider);
        }

        Self::with_providers(config, providers)
    }

    /// Wire the system around already constructed providers.
    pub fn with_providers(config: AppConfig, providers: Vec<Arc<dyn AIProvider>>) -> Result<Self> {
        let manager = Arc::new(ProviderManager::new(
            config.priorities(),
            config.fallback.clone(),
        ));
        for provider in providers {
            info!(
                "Provider {} available: {}",
                provider.name(),
                provider.is_available()
            );
            manager.register_provider(provider);
        }

        if manager.get_available_providers(None).is_empty() {
            warn!("No AI provider is available; level generation will serve the fallback sentence");
        }

        let bank = Arc::new(JsonFileQuestionBank::new(config.bank.path.clone()));
        let mut service = SentenceAnalysisService::new(
            Arc::clone(&manager),
            Arc::new(TemplatePromptBuilder::new()),
            config.generation.clone(),
        );
        if config.bank.save_generated {
            service = service.with_bank(bank.clone());
        }

        Ok(Self {
            config,
            manager,
            service,
            bank,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn manager(&self) -> Arc<ProviderManager> {
        Arc::clone(&self.manager)
    }

    pub fn service(&self) -> &SentenceAnalysisService {
        &self.service
    }

    pub fn bank(&self) -> Arc<JsonFileQuestionBank> {
        Arc::clone(&self.bank)
    }

    pub async fn status(&self) -> SystemStatus {
        let providers = self.manager.all_provider_status().await;
        let available_providers = providers.iter().filter(|p| p.available).count();
        let bank_size = match self.bank.size(None).await {
            Ok(size) => Some(size),
            Err(e) => {
                warn!("Failed to read question bank: {:#}", e);
                None
            }
        };

        SystemStatus {
            providers,
            available_providers,
            fallback: self.config.fallback.clone(),
            bank_size,
            is_healthy: available_providers > 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ProviderKind;
    use tempfile::TempDir;

    #[test]
    fn test_app_config_toml_serialization() {
        let config = AppConfig::default();

        let toml_str = config
            .to_toml_string()
            .expect("Failed to serialize to TOML");
        assert!(toml_str.contains("[[providers]]"));
        assert!(toml_str.contains("retry_count"));

        let deserialized =
            AppConfig::from_toml_str(&toml_str).expect("Failed to deserialize from TOML");
        assert_eq!(deserialized.providers.len(), config.providers.len());
        assert_eq!(deserialized.fallback, config.fallback);
        assert_eq!(deserialized.bank, config.bank);
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config.providers.len(), 4);
        assert_eq!(config.fallback.retry_count, 2);
        assert_eq!(config.fallback.retry_delay_ms, 1000);
        assert_eq!(config.generation.timeout_ms, 30_000);
        assert_eq!(config.generation.temperature, None);
        assert_eq!(config.generation.max_tokens, None);
        assert!(config.bank.save_generated);
    }

    #[test]
    fn test_provider_options_survive_partial_generation_table() {
        let config = AppConfig::from_toml_str(
            r#"
[generation]
timeout_ms = 5000

[[providers]]
name = "local"
kind = "openai"
api_key = "local-key"

[providers.options]
temperature = 0.25
"#,
        )
        .unwrap();

        assert_eq!(config.generation.temperature, None);
        assert_eq!(config.generation.max_tokens, None);
        assert_eq!(config.providers[0].options.temperature, 0.25);
        assert_eq!(config.providers[0].options.max_tokens, 2000);
    }

    #[test]
    fn test_validation_rejects_bad_configs() {
        let mut config = AppConfig::default();
        config.providers.push(ProviderConfig::new("qwen", ProviderKind::Qwen));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Duplicate provider name 'qwen'"));

        let mut config = AppConfig::default();
        config.providers[0].base_url = Some("::not a url".to_string());
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.fallback.retry_count = MAX_RETRY_COUNT + 1;
        assert!(config.validate().is_err());

        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_env_overrides_are_applied_once_per_provider() {
        let mut config = AppConfig::default();
        config.apply_env_overrides_with(|var| match var {
            "QWEN_API_KEY" => Some("q-key".to_string()),
            "GEMINI_API_KEY" => Some("g-key".to_string()),
            _ => None,
        });

        let keyed: Vec<_> = config
            .providers
            .iter()
            .filter(|p| p.has_credentials())
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(keyed, vec!["qwen", "gemini"]);
    }

    #[tokio::test]
    async fn test_system_status_without_credentials() {
        let dir = TempDir::new().unwrap();
        let mut config = AppConfig::default();
        config.bank.path = dir.path().join("bank.json");
        config.providers[3].enabled = false;

        let system = SkeletonSystem::new(config).unwrap();
        let status = system.status().await;

        // disabled providers are never registered
        assert_eq!(status.providers.len(), 3);
        assert_eq!(status.available_providers, 0);
        assert_eq!(status.bank_size, Some(0));
        assert!(!status.is_healthy);
    }
}
