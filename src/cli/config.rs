//! Configuration discovery and loading
//!
//! This module handles the configuration discovery hierarchy:
//! 1. Current directory: ./sentence-skeleton.toml or ./.sentence-skeleton/config.toml
//! 2. User config: ~/.sentence-skeleton/config.toml
//! 3. System config: /etc/sentence-skeleton/config.toml
//! 4. Built-in defaults

use crate::{AppConfig, env};
use anyhow::{Context, Result};
use std::env as std_env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Configuration discovery system
pub struct ConfigDiscovery;

impl ConfigDiscovery {
    /// Load `override_path` if given, otherwise walk the discovery hierarchy.
    pub fn load(override_path: Option<&Path>) -> Result<AppConfig> {
        match override_path {
            Some(path) => {
                info!("Loading configuration override from: {:?}", path);
                AppConfig::from_toml_file(path)
            }
            None => Self::discover_config(),
        }
    }

    /// Discover and load configuration using the hierarchy
    pub fn discover_config() -> Result<AppConfig> {
        if let Some(config_path) = Self::find_config_file() {
            info!("Loading configuration from: {:?}", config_path);
            return AppConfig::from_toml_file(&config_path);
        }

        info!("No configuration file found, using defaults");
        Ok(AppConfig::default())
    }

    /// Find configuration file using discovery hierarchy
    pub fn find_config_file() -> Option<PathBuf> {
        Self::first_existing(Self::get_config_candidates())
    }

    fn first_existing(candidates: Vec<PathBuf>) -> Option<PathBuf> {
        for candidate in candidates {
            debug!("Checking for config file: {:?}", candidate);
            if candidate.is_file() {
                debug!("Found config file: {:?}", candidate);
                return Some(candidate);
            }
        }

        debug!("No config file found in discovery hierarchy");
        None
    }

    /// Get list of configuration file candidates in priority order
    fn get_config_candidates() -> Vec<PathBuf> {
        let current_dir = std_env::current_dir().ok();
        Self::candidates_for(current_dir.as_deref(), Self::get_home_dir().as_deref())
    }

    fn candidates_for(current_dir: Option<&Path>, home_dir: Option<&Path>) -> Vec<PathBuf> {
        let mut candidates = Vec::new();

        if let Some(current_dir) = current_dir {
            candidates.push(env::local_config_file_path(current_dir));
            candidates.push(env::local_app_config_file_path(current_dir));
        }

        if let Some(home_dir) = home_dir {
            candidates.push(env::user_config_file_path(home_dir));
        }

        #[cfg(unix)]
        candidates.push(PathBuf::from(env::SYSTEM_CONFIG_FILE));

        candidates
    }

    /// Get home directory path
    fn get_home_dir() -> Option<PathBuf> {
        std_env::var("HOME")
            .ok()
            .or_else(|| std_env::var("USERPROFILE").ok())
            .map(PathBuf::from)
    }

    /// Create a default config file in the user's home directory
    pub fn create_default_user_config() -> Result<PathBuf> {
        let home_dir = Self::get_home_dir().context("Could not determine home directory")?;
        Self::create_default_config_in(&home_dir)
    }

    fn create_default_config_in(home_dir: &Path) -> Result<PathBuf> {
        let config_dir = env::app_dir_path(home_dir);
        let config_path = env::user_config_file_path(home_dir);

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir).with_context(|| {
                format!("Failed to create configuration directory: {:?}", config_dir)
            })?;
            info!("Created configuration directory: {:?}", config_dir);
        }

        if !config_path.exists() {
            AppConfig::default().to_toml_file(&config_path)?;
            info!("Created default configuration file: {:?}", config_path);
        } else {
            warn!("Configuration file already exists: {:?}", config_path);
        }

        Ok(config_path)
    }

    /// Show configuration discovery information for debugging
    pub fn show_discovery_info() {
        println!("Configuration Discovery Hierarchy:");
        println!();

        let candidates = Self::get_config_candidates();
        for (i, candidate) in candidates.iter().enumerate() {
            let status = if candidate.exists() {
                if candidate.is_file() {
                    "✓ EXISTS"
                } else {
                    "✗ NOT A FILE"
                }
            } else {
                "✗ NOT FOUND"
            };

            println!("  {}. {:?} - {}", i + 1, candidate, status);
        }

        println!();
        if let Some(found) = Self::find_config_file() {
            println!("Active configuration: {:?}", found);
        } else {
            println!("Active configuration: Built-in defaults");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_candidates_order() {
        let current = Path::new("/work");
        let home = Path::new("/home/user");
        let candidates = ConfigDiscovery::candidates_for(Some(current), Some(home));

        assert_eq!(candidates[0], Path::new("/work/sentence-skeleton.toml"));
        assert_eq!(candidates[1], Path::new("/work/.sentence-skeleton/config.toml"));
        assert_eq!(
            candidates[2],
            Path::new("/home/user/.sentence-skeleton/config.toml")
        );
        #[cfg(unix)]
        assert_eq!(candidates[3], Path::new(env::SYSTEM_CONFIG_FILE));
    }

    #[test]
    fn test_first_existing_skips_missing_and_directories() {
        let temp_dir = TempDir::new().unwrap();
        let as_dir = temp_dir.path().join("dir.toml");
        fs::create_dir(&as_dir).unwrap();
        let real = temp_dir.path().join("real.toml");
        fs::write(&real, "").unwrap();

        let found = ConfigDiscovery::first_existing(vec![
            temp_dir.path().join("missing.toml"),
            as_dir,
            real.clone(),
        ]);
        assert_eq!(found, Some(real));
        assert_eq!(ConfigDiscovery::first_existing(vec![]), None);
    }

    #[test]
    fn test_load_override() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("custom.toml");
        fs::write(
            &config_path,
            "[fallback]\nretry_count = 4\nretry_delay_ms = 10\nenabled = true\n",
        )
        .unwrap();

        let config = ConfigDiscovery::load(Some(config_path.as_path())).unwrap();
        assert_eq!(config.fallback.retry_count, 4);
        assert_eq!(config.fallback.retry_delay_ms, 10);

        let missing = ConfigDiscovery::load(Some(temp_dir.path().join("nope.toml").as_path()));
        assert!(missing.is_err());
    }

    #[test]
    fn test_create_default_config() {
        let temp_dir = TempDir::new().unwrap();
        let path = ConfigDiscovery::create_default_config_in(temp_dir.path()).unwrap();
        assert!(path.exists());

        let loaded = AppConfig::from_toml_file(&path).unwrap();
        assert_eq!(loaded.providers.len(), AppConfig::default().providers.len());

        // second call leaves the file in place
        let again = ConfigDiscovery::create_default_config_in(temp_dir.path()).unwrap();
        assert_eq!(again, path);
    }
}
