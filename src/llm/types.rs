use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Output format requested from a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    #[default]
    Json,
    Text,
}

/// Per-call generation options shared by every provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateOptions {
    pub model: Option<String>,
    /// Falls back to the provider's configured request options when unset
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub response_format: ResponseFormat,
    /// JSON schema describing the expected structured output
    pub schema: Option<serde_json::Value>,
    pub system_prompt: Option<String>,
    pub timeout: Duration,
}

/// Result of a single successful provider call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResult {
    pub content: String,
    pub model: String,
    pub provider: String,
    pub usage: TokenUsage,
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Token usage statistics, as far as the backend reports them
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
}

/// Supported REST backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAI,
    DeepSeek,
    Qwen,
    Gemini,
}

impl ProviderKind {
    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "https://api.openai.com/v1",
            ProviderKind::DeepSeek => "https://dashscope.aliyuncs.com/compatible-mode/v1",
            ProviderKind::Qwen => "https://dashscope.aliyuncs.com/api/v1",
            ProviderKind::Gemini => "https://generativelanguage.googleapis.com",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "gpt-4o-mini",
            ProviderKind::DeepSeek => "deepseek-chat",
            ProviderKind::Qwen => "qwen-turbo",
            ProviderKind::Gemini => "gemini-2.5-flash-lite",
        }
    }
}

/// Static per-provider configuration, read once when the manager is built
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub kind: ProviderKind,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Environment variables consulted (in order) for the credential at load time
    #[serde(default)]
    pub api_key_env: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url_env: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_model: Option<String>,
    #[serde(default = "default_priority")]
    pub priority: u32,
    #[serde(default)]
    pub options: RequestOptions,
}

/// Request tuning carried in a provider's configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Provider health snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderStatus {
    pub name: String,
    pub available: bool,
    pub last_error: Option<String>,
    pub last_error_time: Option<DateTime<Utc>>,
    pub model: Option<String>,
    pub fallback_model: Option<String>,
}

fn default_enabled() -> bool {
    true
}

/// Priority assumed for providers that do not configure one.
pub const DEFAULT_PRIORITY: u32 = 999;

fn default_priority() -> u32 {
    DEFAULT_PRIORITY
}

impl ProviderConfig {
    pub fn new(name: impl Into<String>, kind: ProviderKind) -> Self {
        Self {
            name: name.into(),
            kind,
            enabled: true,
            api_key: None,
            api_key_env: Vec::new(),
            base_url: None,
            base_url_env: None,
            model: None,
            fallback_model: None,
            priority: DEFAULT_PRIORITY,
            options: RequestOptions::default(),
        }
    }

    /// A provider is usable only when it is enabled and holds a non-empty credential.
    pub fn has_credentials(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    pub fn resolved_base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.kind.default_base_url())
    }

    pub fn resolved_model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.kind.default_model())
    }

    /// Fill credential and base URL from the environment via `lookup`.
    ///
    /// An explicit `api_key` in the configuration wins over the environment.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if !self.has_credentials() {
            self.api_key = self
                .api_key_env
                .iter()
                .filter_map(|var| lookup(var))
                .find(|value| !value.trim().is_empty());
        }

        if let Some(var) = &self.base_url_env
            && let Some(url) = lookup(var).filter(|u| !u.trim().is_empty())
        {
            self.base_url = Some(url);
        }
    }

    /// Built-in provider table, matching the deployment defaults.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self {
                api_key_env: vec!["QWEN_API_KEY".to_string()],
                base_url_env: Some("QWEN_API_BASE".to_string()),
                model: Some("qwen-flash".to_string()),
                fallback_model: Some("qwen-turbo".to_string()),
                priority: 1,
                ..Self::new("qwen", ProviderKind::Qwen)
            },
            Self {
                api_key_env: vec!["DEEPSEEK_API_KEY".to_string()],
                base_url_env: Some("DEEPSEEK_API_BASE".to_string()),
                model: Some("deepseek-v3.2".to_string()),
                fallback_model: Some("deepseek-chat".to_string()),
                priority: 2,
                ..Self::new("deepseek", ProviderKind::DeepSeek)
            },
            Self {
                api_key_env: vec!["API_KEY".to_string(), "GEMINI_API_KEY".to_string()],
                model: Some("gemini-2.5-flash-lite".to_string()),
                fallback_model: Some("gemini-1.5-flash".to_string()),
                priority: 3,
                ..Self::new("gemini", ProviderKind::Gemini)
            },
            Self {
                api_key_env: vec!["OPENAI_API_KEY".to_string()],
                base_url_env: Some("OPENAI_API_BASE".to_string()),
                model: Some("gpt-4o-mini".to_string()),
                fallback_model: Some("gpt-3.5-turbo".to_string()),
                priority: 3,
                ..Self::new("openai", ProviderKind::OpenAI)
            },
        ]
    }
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            model: None,
            temperature: None,
            max_tokens: None,
            response_format: ResponseFormat::Json,
            schema: None,
            system_prompt: None,
            timeout: Duration::from_secs(30),
        }
    }
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 2000,
        }
    }
}

impl GenerateOptions {
    /// True when the caller asked for JSON and supplied a schema to honour.
    pub fn wants_structured_json(&self) -> bool {
        self.response_format == ResponseFormat::Json && self.schema.is_some()
    }
}
