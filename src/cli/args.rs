//! Command line argument parsing
//!
//! Subcommands:
//! - `generate`: Generate a fresh exercise for a difficulty level
//! - `analyze`: Analyze a sentence supplied on the command line
//! - `status`: Show provider health and bank size
//! - `bank`: Inspect the question bank
//! - `show-config`: Show configuration discovery information
//! - `init-config`: Write a default user configuration file

use crate::analysis::{DifficultyLevel, GenerationRequest};
use crate::llm::ServiceOptions;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "sentence-skeleton")]
#[command(author = "Sentence Skeleton Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Generate and repair sentence-skeleton grammar exercises with fallback across AI providers")]
#[command(long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Args {
    /// Configuration file path (skips discovery)
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,
    /// Enable verbose output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Provider routing flags shared by the generating subcommands
#[derive(Debug, Clone, Default, clap::Args)]
pub struct RoutingArgs {
    /// Try this provider first
    #[arg(short = 'p', long = "provider")]
    pub provider: Option<String>,
    /// Only call the first candidate provider
    #[arg(long = "no-fallback")]
    pub no_fallback: bool,
    /// Restrict fallback to these providers (comma separated)
    #[arg(long = "fallback-providers", value_delimiter = ',', value_name = "NAMES")]
    pub fallback_providers: Vec<String>,
}

impl RoutingArgs {
    pub fn service_options(&self) -> ServiceOptions {
        ServiceOptions {
            preferred_provider: self.provider.clone(),
            enable_fallback: !self.no_fallback,
            fallback_providers: if self.fallback_providers.is_empty() {
                None
            } else {
                Some(self.fallback_providers.clone())
            },
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Generate a new sentence analysis for a difficulty level
    Generate {
        /// basic, intermediate or advanced
        #[arg(short = 'l', long = "level", default_value = "advanced")]
        level: DifficultyLevel,
        #[command(flatten)]
        routing: RoutingArgs,
        /// Previous sentence, to avoid repeating it
        #[arg(long = "previous", value_name = "SENTENCE")]
        previous: Option<String>,
        /// Do not store the result in the question bank
        #[arg(long = "no-save")]
        no_save: bool,
    },
    /// Analyze a sentence you provide
    Analyze {
        /// English sentence to analyze
        sentence: String,
        #[arg(short = 'l', long = "level", default_value = "advanced")]
        level: DifficultyLevel,
        #[command(flatten)]
        routing: RoutingArgs,
    },
    /// Show provider status and question bank size
    Status,
    /// Inspect the question bank
    Bank {
        #[command(subcommand)]
        action: BankCommands,
    },
    /// Show configuration discovery information
    ShowConfig,
    /// Write the built-in configuration to ~/.sentence-skeleton/config.toml
    InitConfig,
}

#[derive(Debug, Subcommand)]
pub enum BankCommands {
    /// Print a random stored exercise
    Random {
        #[arg(short = 'l', long = "level")]
        level: Option<DifficultyLevel>,
        /// Skip this sentence
        #[arg(long = "exclude", value_name = "SENTENCE")]
        exclude: Option<String>,
    },
    /// Count stored exercises
    Size {
        #[arg(short = 'l', long = "level")]
        level: Option<DifficultyLevel>,
    },
}

impl Args {
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Build the service request for `generate`, if that is the command.
    pub fn generation_request(&self) -> Option<(DifficultyLevel, GenerationRequest)> {
        match &self.command {
            Some(Commands::Generate {
                level,
                routing,
                previous,
                no_save,
            }) => Some((
                *level,
                GenerationRequest {
                    routing: routing.service_options(),
                    previous_sentence: previous.clone(),
                    skip_bank: *no_save,
                },
            )),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_command_defaults() {
        let args = Args::try_parse_from(["sentence-skeleton", "generate"]).unwrap();
        let (level, request) = args.generation_request().unwrap();

        assert_eq!(level, DifficultyLevel::Advanced);
        assert!(request.routing.enable_fallback);
        assert!(request.routing.preferred_provider.is_none());
        assert!(request.routing.fallback_providers.is_none());
        assert!(!request.skip_bank);
        assert!(!args.verbose);
    }

    #[test]
    fn test_generate_command_routing_flags() {
        let args = Args::try_parse_from([
            "sentence-skeleton",
            "generate",
            "--level",
            "Basic",
            "--provider",
            "gemini",
            "--fallback-providers",
            "qwen,deepseek",
            "--previous",
            "The cat sat.",
            "--no-save",
            "-v",
        ])
        .unwrap();
        let (level, request) = args.generation_request().unwrap();

        assert_eq!(level, DifficultyLevel::Basic);
        assert_eq!(request.routing.preferred_provider.as_deref(), Some("gemini"));
        assert_eq!(
            request.routing.fallback_providers,
            Some(vec!["qwen".to_string(), "deepseek".to_string()])
        );
        assert_eq!(request.previous_sentence.as_deref(), Some("The cat sat."));
        assert!(request.skip_bank);
        assert!(args.verbose);
    }

    #[test]
    fn test_analyze_command() {
        let args = Args::try_parse_from([
            "sentence-skeleton",
            "-c",
            "custom.toml",
            "analyze",
            "She reads books.",
            "--no-fallback",
        ])
        .unwrap();

        assert_eq!(args.config, Some(PathBuf::from("custom.toml")));
        assert!(args.generation_request().is_none());
        match args.command {
            Some(Commands::Analyze {
                sentence,
                level,
                routing,
            }) => {
                assert_eq!(sentence, "She reads books.");
                assert_eq!(level, DifficultyLevel::Advanced);
                assert!(!routing.service_options().enable_fallback);
            }
            other => panic!("Expected Analyze, got {:?}", other),
        }
    }

    #[test]
    fn test_bank_subcommands() {
        let args = Args::try_parse_from([
            "sentence-skeleton",
            "bank",
            "random",
            "--level",
            "intermediate",
            "--exclude",
            "Old one.",
        ])
        .unwrap();
        match args.command {
            Some(Commands::Bank {
                action: BankCommands::Random { level, exclude },
            }) => {
                assert_eq!(level, Some(DifficultyLevel::Intermediate));
                assert_eq!(exclude.as_deref(), Some("Old one."));
            }
            other => panic!("Expected bank random, got {:?}", other),
        }

        let args = Args::try_parse_from(["sentence-skeleton", "init-config"]).unwrap();
        assert!(matches!(args.command, Some(Commands::InitConfig)));

        let args = Args::try_parse_from(["sentence-skeleton", "bank", "size"]).unwrap();
        assert!(matches!(
            args.command,
            Some(Commands::Bank {
                action: BankCommands::Size { level: None }
            })
        ));
    }

    #[test]
    fn test_invalid_level_is_rejected() {
        let result = Args::try_parse_from(["sentence-skeleton", "generate", "--level", "expert"]);
        assert!(result.is_err());
    }
}
