//! Environment constants and path utilities for sentence-skeleton.
//!
//! Centralizes the file and directory names the binary looks for, so config
//! discovery and the question bank agree on where things live.

use std::path::{Path, PathBuf};

/// Application directory name (hidden directory like .git)
pub const APP_DIR_NAME: &str = ".sentence-skeleton";

/// Configuration file name inside the application directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Stand-alone configuration file in the working directory
pub const LOCAL_CONFIG_FILE_NAME: &str = "sentence-skeleton.toml";

/// System-wide configuration file
pub const SYSTEM_CONFIG_FILE: &str = "/etc/sentence-skeleton/config.toml";

/// Question bank file name
pub const BANK_FILE_NAME: &str = "question-bank.json";

/// Default log filter when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "sentence_skeleton=info";

pub fn app_dir_path(root: &Path) -> PathBuf {
    root.join(APP_DIR_NAME)
}

/// `./sentence-skeleton.toml`
pub fn local_config_file_path(current_dir: &Path) -> PathBuf {
    current_dir.join(LOCAL_CONFIG_FILE_NAME)
}

/// `./.sentence-skeleton/config.toml`
pub fn local_app_config_file_path(current_dir: &Path) -> PathBuf {
    app_dir_path(current_dir).join(CONFIG_FILE_NAME)
}

/// `~/.sentence-skeleton/config.toml`
pub fn user_config_file_path(home_dir: &Path) -> PathBuf {
    app_dir_path(home_dir).join(CONFIG_FILE_NAME)
}

/// Default bank location, relative to the working directory
pub fn default_bank_path() -> PathBuf {
    PathBuf::from(APP_DIR_NAME).join(BANK_FILE_NAME)
}
