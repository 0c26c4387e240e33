//! Sentence analysis: prompt construction, response decoding, role repair
//! and the service that ties them to the provider manager.

pub mod fallback_data;
pub mod parser;
pub mod postprocess;
pub mod prompts;
pub mod service;
pub mod types;

pub use fallback_data::sample_analysis;
pub use parser::{ParsedResponse, ResponseFormatError, parse_ai_response};
pub use postprocess::{
    PhraseSpan, RoleChange, ValidationIssue, ValidationReport, determine_phrase_function,
    find_prepositional_phrases, post_process_roles, validate_prepositional_phrases,
};
pub use prompts::{PromptBuilder, TemplatePromptBuilder};
pub use service::{AnalysisError, GenerationConfig, GenerationRequest, SentenceAnalysisService};
pub use types::{DifficultyLevel, GrammarRole, SentenceAnalysis, SentenceStructure};
