//! Configuration loader with tier-based merging.

use super::merge::deep_merge_all;
use super::types::Config;
use anyhow::{Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Configuration tier priority (lowest to highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigTier {
    /// Embedded defaults (lowest priority)
    Defaults = 0,
    /// Project-level config (`./onboarding/`)
    Project = 1,
    /// User-level config (`~/.onboarding/`)
    User = 2,
    /// Environment variables (highest priority)
    Environment = 3,
}

impl std::fmt::Display for ConfigTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigTier::Defaults => write!(f, "defaults"),
            ConfigTier::Project => write!(f, "project"),
            ConfigTier::User => write!(f, "user"),
            ConfigTier::Environment => write!(f, "environment"),
        }
    }
}

/// Directories searched for `config.yaml`.
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub project_dir: Option<PathBuf>,
    pub user_dir: Option<PathBuf>,
}

impl Default for ConfigPaths {
    fn default() -> Self {
        Self::discover()
    }
}

impl ConfigPaths {
    /// Discover configuration paths from environment and defaults.
    pub fn discover() -> Self {
        // User dir: ONBOARD_USER_DIR or ~/.onboarding
        let user_dir = std::env::var("ONBOARD_USER_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|h| h.join(".onboarding")));

        // Project dir: ONBOARD_PROJECT_DIR or $CWD/onboarding
        let project_dir = std::env::var("ONBOARD_PROJECT_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| Some(PathBuf::from("onboarding")));

        Self {
            project_dir,
            user_dir,
        }
    }

    /// Create paths with explicit directories.
    pub fn with_dirs(project_dir: Option<PathBuf>, user_dir: Option<PathBuf>) -> Self {
        Self {
            project_dir,
            user_dir,
        }
    }

    fn config_file(dir: Option<&Path>) -> Option<PathBuf> {
        dir.map(|d| d.join("config.yaml")).filter(|f| f.exists())
    }
}

/// Read one tier's YAML file. Unreadable or malformed files are skipped with a warning.
fn read_tier(tier: ConfigTier, file: &Path) -> Option<Value> {
    let content = match std::fs::read_to_string(file) {
        Ok(content) => content,
        Err(e) => {
            warn!(%tier, path = %file.display(), error = %e, "Skipping unreadable config file");
            return None;
        }
    };
    match serde_yaml::from_str::<Value>(&content) {
        Ok(value) => {
            debug!(%tier, path = %file.display(), "Loaded config tier");
            Some(value)
        }
        Err(e) => {
            warn!(%tier, path = %file.display(), error = %e, "Skipping malformed config file");
            None
        }
    }
}

/// Loads and merges configuration tiers.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    pub paths: ConfigPaths,
    config: Config,
    /// Highest-priority config file that contributed, if any.
    config_path: Option<PathBuf>,
    /// Tier files that were found but could not be used.
    skipped: Vec<PathBuf>,
}

impl ConfigLoader {
    /// Load configuration from all tiers with proper merging.
    pub fn load() -> Result<Self> {
        Self::load_with_paths(ConfigPaths::discover())
    }

    /// Load configuration with explicit paths. `ONBOARD_CONFIG_PATH` names
    /// an explicit file.
    pub fn load_with_paths(paths: ConfigPaths) -> Result<Self> {
        let explicit = std::env::var("ONBOARD_CONFIG_PATH").ok().map(PathBuf::from);
        Self::load_with_explicit(explicit, paths)
    }

    /// Load configuration, with `explicit` replacing the file tiers entirely.
    pub fn load_with_explicit(explicit: Option<PathBuf>, paths: ConfigPaths) -> Result<Self> {
        if let Some(path) = explicit {
            let mut config = Config::load(&path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?;
            Self::apply_env_overrides(&mut config);
            config.validate()?;
            return Ok(Self {
                paths,
                config,
                config_path: Some(path),
                skipped: Vec::new(),
            });
        }

        let mut configs: Vec<Value> = vec![serde_json::to_value(Config::default())?];
        let mut config_path = None;
        let mut skipped = Vec::new();

        for (tier, dir) in [
            (ConfigTier::Project, paths.project_dir.as_deref()),
            (ConfigTier::User, paths.user_dir.as_deref()),
        ] {
            if let Some(file) = ConfigPaths::config_file(dir) {
                match read_tier(tier, &file) {
                    Some(value) => {
                        configs.push(value);
                        config_path = Some(file);
                    }
                    None => skipped.push(file),
                }
            }
        }

        let merged = deep_merge_all(configs);
        let mut config: Config = serde_json::from_value(merged)?;

        Self::apply_env_overrides(&mut config);
        config.validate()?;

        Ok(Self {
            paths,
            config,
            config_path,
            skipped,
        })
    }

    /// Apply environment variable overrides to config.
    fn apply_env_overrides(config: &mut Config) {
        if let Ok(db_path) = std::env::var("ONBOARD_DB_PATH") {
            config.server.db_path = PathBuf::from(db_path);
        }

        if let Ok(blob_dir) = std::env::var("ONBOARD_BLOB_DIR") {
            config.server.blob_dir = PathBuf::from(blob_dir);
        }

        if let Ok(log_dir) = std::env::var("ONBOARD_LOG_DIR") {
            config.server.log_dir = PathBuf::from(log_dir);
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn into_config(self) -> Config {
        self.config
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Config files skipped because they were unreadable or malformed.
    pub fn skipped_files(&self) -> &[PathBuf] {
        &self.skipped
    }
}
