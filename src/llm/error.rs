//! Provider error taxonomy and the classifier that maps raw failures into it.
//!
//! Backends do not share an error model, so classification is deliberately
//! pattern based: an HTTP status when there is one, otherwise substrings of the
//! message and the name of the failure.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of provider-call failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AIErrorKind {
    QuotaExceeded,
    RateLimit,
    NetworkError,
    Timeout,
    InvalidResponse,
    AuthError,
    UnknownError,
}

impl AIErrorKind {
    /// Authentication failures are systemic; everything else may succeed elsewhere.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, AIErrorKind::AuthError)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AIErrorKind::QuotaExceeded => "QUOTA_EXCEEDED",
            AIErrorKind::RateLimit => "RATE_LIMIT",
            AIErrorKind::NetworkError => "NETWORK_ERROR",
            AIErrorKind::Timeout => "TIMEOUT",
            AIErrorKind::InvalidResponse => "INVALID_RESPONSE",
            AIErrorKind::AuthError => "AUTH_ERROR",
            AIErrorKind::UnknownError => "UNKNOWN_ERROR",
        }
    }
}

impl fmt::Display for AIErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unclassified failure as observed at the provider boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFailure {
    pub status: Option<u16>,
    pub message: String,
    /// Exception-style name of the failure, e.g. `TimeoutError`
    pub name: Option<String>,
}

impl RawFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(message).with_name("TimeoutError")
    }
}

impl From<reqwest::Error> for RawFailure {
    fn from(error: reqwest::Error) -> Self {
        let status = error.status().map(|s| s.as_u16());
        let failure = if error.is_timeout() {
            RawFailure::timeout(format!("request timeout: {}", error))
        } else if error.is_connect() || error.is_request() {
            RawFailure::new(format!("network error: {}", error))
        } else if error.is_body() {
            RawFailure::new(format!("fetch failed while reading body: {}", error))
        } else if error.is_decode() {
            RawFailure::new(format!("undecodable response body: {}", error))
        } else {
            RawFailure::new(error.to_string())
        };

        Self { status, ..failure }
    }
}

/// Map a raw failure onto the taxonomy. Rules are evaluated in priority order.
pub fn classify(failure: &RawFailure) -> AIErrorKind {
    let message = failure.message.to_lowercase();

    if failure.status == Some(429) {
        return AIErrorKind::RateLimit;
    }
    if failure.status == Some(503) || message.contains("quota") {
        return AIErrorKind::QuotaExceeded;
    }
    if matches!(failure.status, Some(401) | Some(403)) {
        return AIErrorKind::AuthError;
    }
    if message.contains("timeout") || failure.name.as_deref() == Some("TimeoutError") {
        return AIErrorKind::Timeout;
    }
    if message.contains("network") || message.contains("fetch") {
        return AIErrorKind::NetworkError;
    }
    AIErrorKind::UnknownError
}

/// Classified provider-call failure.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("[{provider}] {kind}: {message}")]
pub struct AIError {
    pub kind: AIErrorKind,
    pub message: String,
    pub provider: String,
    pub status: Option<u16>,
    pub retryable: bool,
}

impl AIError {
    pub fn new(kind: AIErrorKind, provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            provider: provider.into(),
            status: None,
            retryable: kind.is_retryable(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Classify `failure` and attribute it to `provider`.
    pub fn classified(provider: impl Into<String>, failure: RawFailure) -> Self {
        let kind = classify(&failure);
        Self {
            kind,
            message: failure.message,
            provider: provider.into(),
            status: failure.status,
            retryable: kind.is_retryable(),
        }
    }

    /// Failure raised when a provider is asked to generate without credentials.
    pub fn unavailable(provider: &str) -> Self {
        Self::new(
            AIErrorKind::AuthError,
            provider,
            format!(
                "{} provider is not available. Please check API key configuration.",
                provider
            ),
        )
        .with_status(401)
    }
}

/// Last failure recorded for a provider that the fallback strategy gave up on.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderFailure {
    pub provider: String,
    #[serde(serialize_with = "serialize_error")]
    pub error: AIError,
    pub attempts: u32,
}

fn serialize_error<S: serde::Serializer>(error: &AIError, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&error.to_string())
}

/// Every available provider was tried and none produced a result.
#[derive(Debug, Clone, thiserror::Error)]
#[error("All AI providers failed. Tried: {}", providers.join(", "))]
pub struct AllProvidersFailedError {
    pub providers: Vec<String>,
    pub errors: Vec<ProviderFailure>,
}

/// Errors produced by the manager and fallback strategy.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GenerationError {
    #[error(transparent)]
    Provider(#[from] AIError),
    #[error(transparent)]
    AllProvidersFailed(#[from] AllProvidersFailedError),
    #[error("No available AI providers")]
    NoAvailableProviders,
}

/// Failures while constructing a provider from its configuration.
#[derive(Debug, thiserror::Error)]
pub enum ProviderSetupError {
    #[error("Invalid base URL for provider '{provider}': {source}")]
    InvalidBaseUrl {
        provider: String,
        #[source]
        source: url::ParseError,
    },
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}
