use crate::llm::error::{
    AIError, AllProvidersFailedError, GenerationError, ProviderFailure, RawFailure,
};
use crate::llm::provider::AIProvider;
use crate::llm::types::{GenerateOptions, GenerateResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Retry and fallback policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    pub enabled: bool,
    /// Extra attempts per provider after the first one
    pub retry_count: u32,
    /// Base delay; attempt `n` waits `retry_delay_ms * n`
    pub retry_delay_ms: u64,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            retry_count: 2,
            retry_delay_ms: 1000,
        }
    }
}

impl FallbackConfig {
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_delay_ms.saturating_mul(attempt as u64))
    }
}

/// Tries providers strictly one at a time; the first success wins.
///
/// Per provider: up to `retry_count + 1` attempts with linear backoff. A
/// retryable failure on the last attempt moves on to the next provider; a
/// non-retryable failure aborts the whole run and is returned as-is.
#[derive(Debug, Clone, Default)]
pub struct FallbackStrategy {
    config: FallbackConfig,
}

impl FallbackStrategy {
    pub fn new(config: FallbackConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FallbackConfig {
        &self.config
    }

    pub async fn execute_with_fallback(
        &self,
        providers: &[Arc<dyn AIProvider>],
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<GenerateResult, GenerationError> {
        self.execute(providers, prompt, options, Ok).await
    }

    /// Like [`execute_with_fallback`](Self::execute_with_fallback), but every
    /// raw result must also pass `accept`. A rejection counts as a failure of
    /// the provider that produced it.
    pub async fn execute<T, V>(
        &self,
        providers: &[Arc<dyn AIProvider>],
        prompt: &str,
        options: &GenerateOptions,
        accept: V,
    ) -> Result<T, GenerationError>
    where
        T: Send,
        V: Fn(GenerateResult) -> Result<T, AIError> + Send + Sync,
    {
        let mut errors = Vec::new();
        let mut tried = Vec::new();
        let retry_count = self.config.retry_count;

        for provider in providers {
            let name = provider.name().to_string();
            if !provider.is_available() {
                debug!("[Fallback] Skipping {} - not available", name);
                continue;
            }
            tried.push(name.clone());

            for attempt in 0..=retry_count {
                if attempt > 0 {
                    info!(
                        "[Fallback] Retrying {} (attempt {}/{})",
                        name,
                        attempt + 1,
                        retry_count + 1
                    );
                    tokio::time::sleep(self.config.delay_for_attempt(attempt)).await;
                }

                match call_provider(provider.as_ref(), prompt, options)
                    .await
                    .and_then(&accept)
                {
                    Ok(value) => {
                        info!("[Fallback] Success with {}", name);
                        return Ok(value);
                    }
                    Err(err) => {
                        warn!(
                            "[Fallback] {} failed (attempt {}): {}",
                            name,
                            attempt + 1,
                            err
                        );

                        if !err.retryable {
                            error!("[Fallback] Fatal error from {}, stopping fallback", name);
                            return Err(GenerationError::Provider(err));
                        }

                        if attempt == retry_count {
                            errors.push(ProviderFailure {
                                provider: name.clone(),
                                error: err,
                                attempts: attempt + 1,
                            });
                        }
                    }
                }
            }
        }

        Err(AllProvidersFailedError {
            providers: tried,
            errors,
        }
        .into())
    }
}

/// One provider call bounded by the caller's timeout.
pub(crate) async fn call_provider(
    provider: &dyn AIProvider,
    prompt: &str,
    options: &GenerateOptions,
) -> Result<GenerateResult, AIError> {
    let call = provider.generate(prompt.to_string(), options.clone());
    match tokio::time::timeout(options.timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(AIError::classified(
            provider.name(),
            RawFailure::timeout(format!(
                "Provider call exceeded {}ms",
                options.timeout.as_millis()
            )),
        )),
    }
}
