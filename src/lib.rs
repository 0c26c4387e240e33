//! # Sentence Skeleton
//!
//! Generates English sentence-structure exercises with an AI provider pool,
//! then repairs and validates the grammatical roles the model assigned.
//!
//! ## Architecture Overview
//!
//! - **[`llm`]**: Provider trait, REST providers, error classification and
//!   the sequential retry/fallback strategy behind [`ProviderManager`]
//! - **[`analysis`]**: Prompt construction, response decoding, prepositional
//!   phrase repair and the [`SentenceAnalysisService`]
//! - **[`bank`]**: Question bank that stores generated exercises
//! - **[`integration`]**: Wires everything from one [`AppConfig`]
//!
//! ## Features
//!
//! ### 🤖 Provider Fallback
//! - **Priority Ordering**: Providers sorted by configured priority, with an optional preferred provider first
//! - **Linear Backoff**: Per-provider retries with `retry_delay_ms * attempt` waits
//! - **Error Classification**: Auth failures stop immediately; everything else moves on
//!
//! ### 🧩 Role Repair
//! - **Phrase Detection**: Prepositional phrases found by token scan
//! - **Consistent Roles**: Every token of a phrase carries the phrase's function
//! - **Validation Report**: Remaining inconsistencies reported, never fatal
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sentence_skeleton::{AppConfig, DifficultyLevel, ServiceOptions, SkeletonSystem};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut config = AppConfig::default();
//!     config.apply_env_overrides();
//!     let system = SkeletonSystem::new(config)?;
//!
//!     let analysis = system
//!         .service()
//!         .analyze_custom_sentence(
//!             "The boy in the room is reading.",
//!             DifficultyLevel::Intermediate,
//!             &ServiceOptions::default(),
//!         )
//!         .await?;
//!
//!     println!("{:?}", analysis.word_roles);
//!     Ok(())
//! }
//! ```

/// Provider-agnostic AI interface.
///
/// REST providers behind one trait, error classification, and the manager
/// that retries and falls back across them.
pub mod llm;

/// Sentence analysis pipeline.
pub mod analysis;

/// Question bank storage.
pub mod bank;

/// High-level system integration and orchestration.
pub mod integration;

/// Environment constants and path utilities.
///
/// Centralizes all hardcoded paths and directory names used throughout
/// the application for easier maintenance and consistency.
pub mod env;

// Re-export LLM abstraction types
pub use llm::{
    AIError, AIErrorKind, AIProvider, FallbackConfig, GenerateOptions, GenerateResult,
    GenerationError, ProviderConfig, ProviderKind, ProviderManager, ServiceOptions,
};

// Re-export analysis types
pub use analysis::{
    AnalysisError, DifficultyLevel, GenerationConfig, GenerationRequest, GrammarRole,
    SentenceAnalysis, SentenceAnalysisService, SentenceStructure,
};

pub use bank::{JsonFileQuestionBank, QuestionBank};

// Re-export integration types
pub use integration::{AppConfig, BankConfig, SkeletonSystem, SystemStatus};

// CLI module for command-line interface
pub mod cli;
