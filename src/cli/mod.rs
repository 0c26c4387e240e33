//! CLI-specific functionality for sentence-skeleton
//!
//! This module contains all CLI-related code including argument parsing
//! and configuration discovery.

pub mod args;
pub mod config;

pub use args::{Args, BankCommands, Commands, RoutingArgs};
pub use config::ConfigDiscovery;
