pub mod error;
pub mod fallback;
pub mod gemini_provider;
pub mod manager;
pub mod openai_provider;
pub mod provider;
pub mod qwen_provider;
pub mod types;


pub use error::{
    AIError, AIErrorKind, AllProvidersFailedError, GenerationError, ProviderFailure,
    ProviderSetupError, RawFailure, classify,
};
pub use fallback::{FallbackConfig, FallbackStrategy};
pub use gemini_provider::GeminiProvider;
pub use manager::{ProviderManager, ServiceOptions};
pub use openai_provider::OpenAICompatibleProvider;
pub use provider::{AIProvider, ProviderFactory, ProviderState};
pub use qwen_provider::QwenProvider;
pub use types::*;
