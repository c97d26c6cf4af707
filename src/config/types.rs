//! Configuration types and structures.

use crate::types::{MAX_PHASE, MIN_PHASE, Phase, PhaseInfo};
use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Default port for the HTTP API.
pub const DEFAULT_HTTP_PORT: u16 = 31995;

/// HTTP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_host")]
    pub host: String,

    #[serde(default = "default_http_port")]
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: default_http_host(),
            port: default_http_port(),
        }
    }
}

fn default_http_host() -> String {
    "127.0.0.1".to_string()
}

fn default_http_port() -> u16 {
    DEFAULT_HTTP_PORT
}

/// Server-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Root directory of the filesystem blob store.
    #[serde(default = "default_blob_dir")]
    pub blob_dir: PathBuf,

    /// Path to the log directory.
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// URL prefix put in front of stored blob paths.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    #[serde(default)]
    pub http: HttpConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            blob_dir: default_blob_dir(),
            log_dir: default_log_dir(),
            public_base_url: default_public_base_url(),
            http: HttpConfig::default(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("onboarding/onboarding.db")
}

fn default_blob_dir() -> PathBuf {
    PathBuf::from("onboarding/files")
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("onboarding/logs")
}

fn default_public_base_url() -> String {
    "/files".to_string()
}

/// Onboarding behavior knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnboardingConfig {
    /// OM name stamped on new customers when none is given.
    #[serde(default = "default_om")]
    pub default_om: String,

    /// Days without activity before a partially done customer counts as stuck.
    #[serde(default = "default_stale_after_days")]
    pub stale_after_days: u32,

    /// Appended to the name of a task duplicated for one customer.
    #[serde(default = "default_custom_task_suffix")]
    pub custom_task_suffix: String,
}

impl Default for OnboardingConfig {
    fn default() -> Self {
        Self {
            default_om: default_om(),
            stale_after_days: default_stale_after_days(),
            custom_task_suffix: default_custom_task_suffix(),
        }
    }
}

fn default_om() -> String {
    "Unassigned".to_string()
}

fn default_stale_after_days() -> u32 {
    7
}

fn default_custom_task_suffix() -> String {
    " (Custom)".to_string()
}

fn default_phases() -> Vec<PhaseInfo> {
    [
        (0, "Pre-Onboarding", "gray"),
        (1, "Setup", "blue"),
        (2, "Launch", "orange"),
        (3, "Adoption", "green"),
        (4, "Optimization", "indigo"),
    ]
    .into_iter()
    .map(|(phase, label, color)| PhaseInfo {
        phase,
        label: label.to_string(),
        color: color.to_string(),
    })
    .collect()
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub onboarding: OnboardingConfig,

    /// The fixed phase table.
    #[serde(default = "default_phases")]
    pub phases: Vec<PhaseInfo>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            onboarding: OnboardingConfig::default(),
            phases: default_phases(),
        }
    }
}

impl Config {
    /// Load configuration from a single file, without tier merging.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        // Empty or comment-only files parse as null
        let config: Option<Config> = serde_yaml::from_str(&content)?;
        Ok(config.unwrap_or_default())
    }

    /// Check cross-field invariants.
    pub fn validate(&self) -> Result<()> {
        let numbers: BTreeSet<Phase> = self.phases.iter().map(|p| p.phase).collect();
        let expected: BTreeSet<Phase> = (MIN_PHASE..=MAX_PHASE).collect();
        if numbers != expected || self.phases.len() != expected.len() {
            return Err(anyhow!(
                "phases must list each of {}..={} exactly once, got {:?}",
                MIN_PHASE,
                MAX_PHASE,
                self.phases.iter().map(|p| p.phase).collect::<Vec<_>>()
            ));
        }
        if let Some(p) = self.phases.iter().find(|p| p.label.trim().is_empty()) {
            return Err(anyhow!("phase {} has an empty label", p.phase));
        }
        if self.onboarding.stale_after_days == 0 {
            return Err(anyhow!("onboarding.stale_after_days must be at least 1"));
        }
        Ok(())
    }

    /// Metadata for one phase.
    pub fn phase(&self, phase: Phase) -> Option<&PhaseInfo> {
        self.phases.iter().find(|p| p.phase == phase)
    }

    /// Label stored as a task's `phase_name`.
    pub fn phase_label(&self, phase: Phase) -> String {
        self.phase(phase)
            .map(|p| p.label.clone())
            .unwrap_or_else(|| format!("Phase {}", phase))
    }

    /// Ensure the database directory exists.
    pub fn ensure_db_dir(&self) -> Result<()> {
        if let Some(parent) = self.server.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    /// Ensure the blob directory exists.
    pub fn ensure_blob_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.server.blob_dir)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.phases.len(), 5);
        assert_eq!(config.onboarding.stale_after_days, 7);
        assert_eq!(config.onboarding.custom_task_suffix, " (Custom)");
        assert_eq!(config.phase_label(1), "Setup");
    }

    #[test]
    fn missing_or_duplicate_phases_fail_validation() {
        let mut config = Config::default();
        config.phases.pop();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.phases[4].phase = 3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn blank_label_and_zero_staleness_fail_validation() {
        let mut config = Config::default();
        config.phases[2].label = "  ".into();
        assert!(config.validate().unwrap_err().to_string().contains("phase 2"));

        let mut config = Config::default();
        config.onboarding.stale_after_days = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let config: Config = serde_yaml::from_str("onboarding:\n  default_om: Olive\n").unwrap();
        assert_eq!(config.onboarding.default_om, "Olive");
        assert_eq!(config.onboarding.stale_after_days, 7);
        assert_eq!(config.server.http.port, DEFAULT_HTTP_PORT);
    }
}
