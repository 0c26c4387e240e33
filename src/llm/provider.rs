use crate::llm::error::{AIError, ProviderSetupError, RawFailure};
use crate::llm::types::{GenerateOptions, GenerateResult, ProviderConfig, ProviderKind, ProviderStatus};
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

/// Uniform contract implemented by every LLM backend.
///
/// Providers perform exactly one outbound call per `generate`; retrying and
/// falling back to other providers is the job of
/// [`FallbackStrategy`](crate::llm::FallbackStrategy).
pub trait AIProvider: Send + Sync {
    /// Registered provider name
    fn name(&self) -> &str;

    /// True iff the provider is enabled and holds credentials
    fn is_available(&self) -> bool;

    /// Execute a single generation request
    fn generate(
        &self,
        prompt: String,
        options: GenerateOptions,
    ) -> BoxFuture<'_, Result<GenerateResult, AIError>>;

    /// Current availability and last recorded error
    fn get_status(&self) -> BoxFuture<'_, ProviderStatus>;
}

/// Diagnostic scratch state shared by concurrent requests to one provider.
///
/// Writes from overlapping requests may interleave; the value is advisory
/// and never consulted for control flow.
#[derive(Debug, Default)]
pub struct ProviderState {
    last_error: Mutex<Option<(String, DateTime<Utc>)>>,
}

impl ProviderState {
    pub async fn record_error(&self, error: &AIError) {
        let mut last = self.last_error.lock().await;
        *last = Some((error.message.clone(), Utc::now()));
    }

    pub async fn clear_error(&self) {
        let mut last = self.last_error.lock().await;
        *last = None;
    }

    pub async fn status(&self, config: &ProviderConfig, available: bool) -> ProviderStatus {
        let last = self.last_error.lock().await.clone();
        let (last_error, last_error_time) = match last {
            Some((message, at)) => (Some(message), Some(at)),
            None => (None, None),
        };

        ProviderStatus {
            name: config.name.clone(),
            available,
            last_error,
            last_error_time,
            model: config.model.clone(),
            fallback_model: config.fallback_model.clone(),
        }
    }
}

/// Build the shared HTTP client used by the REST providers.
pub(crate) fn build_http_client() -> Result<reqwest::Client, ProviderSetupError> {
    Ok(reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()?)
}

/// Validate a configured base URL and return it without a trailing slash.
pub(crate) fn normalize_base_url(config: &ProviderConfig) -> Result<String, ProviderSetupError> {
    let base = config.resolved_base_url();
    url::Url::parse(base).map_err(|source| ProviderSetupError::InvalidBaseUrl {
        provider: config.name.clone(),
        source,
    })?;
    Ok(base.trim_end_matches('/').to_string())
}

/// POST a JSON body and decode a JSON response.
///
/// Non-2xx responses are turned into a [`RawFailure`] carrying the status and
/// whatever message `extract_message` can find in the error body.
pub(crate) async fn post_json(
    request: reqwest::RequestBuilder,
    body: &serde_json::Value,
    extract_message: fn(&serde_json::Value) -> Option<String>,
) -> Result<serde_json::Value, RawFailure> {
    let response = request.json(body).send().await?;
    let status = response.status();

    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<serde_json::Value>(&text)
            .ok()
            .and_then(|v| extract_message(&v))
            .unwrap_or_else(|| format!("API error: {}", status.as_u16()));
        debug!("Provider returned HTTP {}: {}", status, message);
        return Err(RawFailure::new(message).with_status(status.as_u16()));
    }

    Ok(response.json::<serde_json::Value>().await?)
}

/// Factory for creating providers from configuration
pub struct ProviderFactory;

impl ProviderFactory {
    pub fn create(config: ProviderConfig) -> Result<Arc<dyn AIProvider>, ProviderSetupError> {
        match config.kind {
            ProviderKind::OpenAI | ProviderKind::DeepSeek => Ok(Arc::new(
                crate::llm::openai_provider::OpenAICompatibleProvider::new(config)?,
            )),
            ProviderKind::Qwen => Ok(Arc::new(crate::llm::qwen_provider::QwenProvider::new(
                config,
            )?)),
            ProviderKind::Gemini => Ok(Arc::new(
                crate::llm::gemini_provider::GeminiProvider::new(config)?,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::error::AIErrorKind;

    #[tokio::test]
    async fn state_records_and_clears_errors() {
        let config = ProviderConfig::new("qwen", ProviderKind::Qwen);
        let state = ProviderState::default();

        let status = state.status(&config, true).await;
        assert!(status.last_error.is_none());

        state
            .record_error(&AIError::new(AIErrorKind::RateLimit, "qwen", "slow down"))
            .await;
        let status = state.status(&config, true).await;
        assert_eq!(status.last_error.as_deref(), Some("slow down"));
        assert!(status.last_error_time.is_some());

        state.clear_error().await;
        let status = state.status(&config, false).await;
        assert!(status.last_error.is_none());
        assert!(!status.available);
    }

    #[test]
    fn factory_rejects_invalid_base_url() {
        let config = ProviderConfig {
            base_url: Some("not a url".to_string()),
            ..ProviderConfig::new("openai", ProviderKind::OpenAI)
        };
        let result = ProviderFactory::create(config);
        assert!(matches!(
            result,
            Err(ProviderSetupError::InvalidBaseUrl { .. })
        ));
    }

    #[test]
    fn factory_builds_each_kind() {
        for (name, kind) in [
            ("openai", ProviderKind::OpenAI),
            ("deepseek", ProviderKind::DeepSeek),
            ("qwen", ProviderKind::Qwen),
            ("gemini", ProviderKind::Gemini),
        ] {
            let config = ProviderConfig {
                api_key: Some("key".to_string()),
                ..ProviderConfig::new(name, kind)
            };
            let provider = ProviderFactory::create(config).unwrap();
            assert_eq!(provider.name(), name);
            assert!(provider.is_available());
        }
    }
}
