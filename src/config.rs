//! Configuration (ambient stack): device identity for the startup
//! message, compat property names, telemetry flag, file paths, and the
//! §7 *Transient* retry/backoff policy.
//!
//! Loading follows the teacher's `config.rs` pattern: `serde_yaml` plus
//! `anyhow::Context`, with an `include_str!`-embedded default so the
//! crate runs out of the box without an external file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentConfig {
    pub device: DeviceProperties,
    #[serde(default)]
    pub compat_property_names: CompatPropertyNames,
    #[serde(default)]
    pub telemetry_versions: bool,
    #[serde(default)]
    pub paths: StatePaths,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceProperties {
    pub manufacturer: String,
    pub model: String,
    #[serde(rename = "interfaceId")]
    pub interface_id: String,
    #[serde(default)]
    pub versions: HashMap<String, String>,
}

/// §9 Design Notes: `compat_property_names: string|default`. Defaults to
/// `"manufacturer,model"` per §6.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum CompatPropertyNames {
    Default,
    Custom(String),
}

impl CompatPropertyNames {
    pub fn as_str(&self) -> &str {
        match self {
            CompatPropertyNames::Default => "manufacturer,model",
            CompatPropertyNames::Custom(s) => s,
        }
    }
}

impl Default for CompatPropertyNames {
    fn default() -> Self {
        CompatPropertyNames::Default
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StatePaths {
    #[serde(default = "default_resume_path")]
    pub resume_record: PathBuf,
    #[serde(default = "default_event_log_path")]
    pub event_log: PathBuf,
    #[serde(default = "default_snapshot_path")]
    pub event_snapshot: PathBuf,
    #[serde(default = "default_audit_log_path")]
    pub audit_log: PathBuf,
}

fn default_resume_path() -> PathBuf {
    PathBuf::from("/var/lib/device-update-agent/resume.json")
}
fn default_event_log_path() -> PathBuf {
    PathBuf::from("/var/lib/device-update-agent/events.jsonl")
}
fn default_snapshot_path() -> PathBuf {
    PathBuf::from("/var/lib/device-update-agent/snapshot.json")
}
fn default_audit_log_path() -> PathBuf {
    PathBuf::from("/var/log/device-update-agent/audit.jsonl")
}

impl Default for StatePaths {
    fn default() -> Self {
        Self {
            resume_record: default_resume_path(),
            event_log: default_event_log_path(),
            event_snapshot: default_snapshot_path(),
            audit_log: default_audit_log_path(),
        }
    }
}

/// §7 *Transient* retry/backoff policy, carried over from the teacher's
/// `domain/failure.rs` `FailurePolicy` (`max_retries`, `backoff_secs`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailurePolicy {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_secs")]
    pub backoff_secs: u32,
}

fn default_max_retries() -> u32 {
    2
}

fn default_backoff_secs() -> u32 {
    5
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_secs: default_backoff_secs(),
        }
    }
}

impl AgentConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse config file as YAML: {}", path.display()))?;
        Ok(config)
    }

    /// The embedded default configuration, compiled in from
    /// `default_config.yaml` so the agent runs without any external file.
    pub fn default_config() -> Self {
        const DEFAULT_CONFIG_YAML: &str = include_str!("../default_config.yaml");
        serde_yaml::from_str(DEFAULT_CONFIG_YAML)
            .expect("embedded default_config.yaml must parse; this is a bug in that file")
    }
}
