use crate::llm::error::{AIError, GenerationError};
use crate::llm::fallback::{FallbackConfig, FallbackStrategy, call_provider};
use crate::llm::provider::AIProvider;
use crate::llm::types::{DEFAULT_PRIORITY, GenerateOptions, GenerateResult, ProviderStatus};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{error, info};

/// Caller-side routing preferences for one generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceOptions {
    pub preferred_provider: Option<String>,
    pub enable_fallback: bool,
    /// When non-empty, only these providers (plus the preferred one) are used
    pub fallback_providers: Option<Vec<String>>,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            preferred_provider: None,
            enable_fallback: true,
            fallback_providers: None,
        }
    }
}

struct Registered {
    provider: Arc<dyn AIProvider>,
    seq: usize,
}

/// Owns the registered providers and routes requests across them.
pub struct ProviderManager {
    providers: DashMap<String, Registered>,
    priorities: HashMap<String, u32>,
    strategy: FallbackStrategy,
    next_seq: AtomicUsize,
}

impl ProviderManager {
    /// `priorities` maps provider names to their configured priority (lower first).
    pub fn new(priorities: HashMap<String, u32>, fallback: FallbackConfig) -> Self {
        Self {
            providers: DashMap::new(),
            priorities,
            strategy: FallbackStrategy::new(fallback),
            next_seq: AtomicUsize::new(0),
        }
    }

    pub fn register_provider(&self, provider: Arc<dyn AIProvider>) {
        let name = provider.name().to_string();
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        self.providers.insert(name.clone(), Registered { provider, seq });
        info!("[ProviderManager] Registered provider: {}", name);
    }

    pub fn get_provider(&self, name: &str) -> Option<Arc<dyn AIProvider>> {
        self.providers.get(name).map(|r| Arc::clone(&r.provider))
    }

    pub fn priority_of(&self, name: &str) -> u32 {
        self.priorities.get(name).copied().unwrap_or(DEFAULT_PRIORITY)
    }

    pub fn fallback_config(&self) -> &FallbackConfig {
        self.strategy.config()
    }

    /// Available providers ordered by ascending priority (ties keep registration
    /// order), with `preferred` moved to the front when it is available.
    ///
    /// The priority sort applies whether or not `preferred` is given, so the
    /// providers behind a preferred one (or behind an unknown preference) are
    /// in priority order, not registration order.
    pub fn get_available_providers(&self, preferred: Option<&str>) -> Vec<Arc<dyn AIProvider>> {
        let mut entries: Vec<(u32, usize, Arc<dyn AIProvider>)> = self
            .providers
            .iter()
            .filter(|r| r.provider.is_available())
            .map(|r| (self.priority_of(r.key()), r.seq, Arc::clone(&r.provider)))
            .collect();
        entries.sort_by_key(|(priority, seq, _)| (*priority, *seq));

        let mut providers: Vec<_> = entries.into_iter().map(|(_, _, p)| p).collect();
        if let Some(name) = preferred
            && let Some(pos) = providers.iter().position(|p| p.name() == name)
        {
            let chosen = providers.remove(pos);
            providers.insert(0, chosen);
        }
        providers
    }

    fn resolve_providers(
        &self,
        service: &ServiceOptions,
    ) -> Result<Vec<Arc<dyn AIProvider>>, GenerationError> {
        let preferred = service.preferred_provider.as_deref();
        let mut providers = self.get_available_providers(preferred);

        if let Some(allowed) = service.fallback_providers.as_ref().filter(|a| !a.is_empty()) {
            providers.retain(|p| Some(p.name()) == preferred || allowed.iter().any(|a| a == p.name()));
        }

        if providers.is_empty() {
            return Err(GenerationError::NoAvailableProviders);
        }
        Ok(providers)
    }

    pub async fn generate_with_fallback(
        &self,
        prompt: &str,
        options: &GenerateOptions,
        service: &ServiceOptions,
    ) -> Result<GenerateResult, GenerationError> {
        self.generate_accepted(prompt, options, service, Ok).await
    }

    /// Route a request and require the raw result to pass `accept`.
    ///
    /// With fallback enabled a rejected result is treated like any other
    /// provider failure, so the next attempt or provider gets a chance.
    pub async fn generate_accepted<T, V>(
        &self,
        prompt: &str,
        options: &GenerateOptions,
        service: &ServiceOptions,
        accept: V,
    ) -> Result<T, GenerationError>
    where
        T: Send,
        V: Fn(GenerateResult) -> Result<T, AIError> + Send + Sync,
    {
        let providers = self.resolve_providers(service)?;

        if !service.enable_fallback || !self.strategy.config().enabled {
            let provider = &providers[0];
            info!("[ProviderManager] Fallback disabled, using {}", provider.name());
            return call_provider(provider.as_ref(), prompt, options)
                .await
                .and_then(accept)
                .map_err(GenerationError::Provider);
        }

        let result = self
            .strategy
            .execute(&providers, prompt, options, accept)
            .await;
        if let Err(GenerationError::AllProvidersFailed(failure)) = &result {
            for f in &failure.errors {
                error!(
                    "[ProviderManager] {} failed after {} attempt(s): {}",
                    f.provider, f.attempts, f.error
                );
            }
        }
        result
    }

    /// Status of every registered provider, in registration order.
    pub async fn all_provider_status(&self) -> Vec<ProviderStatus> {
        let mut registered: Vec<(usize, Arc<dyn AIProvider>)> = self
            .providers
            .iter()
            .map(|r| (r.seq, Arc::clone(&r.provider)))
            .collect();
        registered.sort_by_key(|(seq, _)| *seq);

        let mut statuses = Vec::with_capacity(registered.len());
        for (_, provider) in registered {
            statuses.push(provider.get_status().await);
        }
        statuses
    }
}
