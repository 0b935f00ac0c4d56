// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Warden Configuration Types
//
// Kubernetes-style manifest (apiVersion/kind/metadata/spec) covering:
// - Ticket engine sizing and cancellation behaviour
// - Startup task record storage
// - Logging settings

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::domain::ticket::LateResultPolicy;

pub const API_VERSION: &str = "warden.dev/v1";
pub const KIND: &str = "WardenConfig";

/// Top-level configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WardenConfigManifest {
    /// API version (must be "warden.dev/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "WardenConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    #[serde(default)]
    pub spec: WardenConfigSpec,
}

/// Manifest metadata (Kubernetes-style)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WardenConfigSpec {
    #[serde(default)]
    pub tickets: TicketsConfig,

    #[serde(default)]
    pub startup_tasks: StartupTasksConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketsConfig {
    /// Upper bound on tickets running at once; the rest wait as Pending
    #[serde(default = "default_max_concurrent_workers")]
    pub max_concurrent_workers: usize,

    /// How long cancel_ticket waits for the worker before marking the ticket
    #[serde(default = "default_cancel_wait_ms")]
    pub cancel_wait_ms: u64,

    #[serde(default)]
    pub late_result_policy: LateResultPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartupTasksConfig {
    /// JSON file holding task execution records. Defaults to
    /// `~/.warden/completed_tasks.json`; an explicit `null` keeps records in
    /// memory, so completed one-time tasks run again after a restart.
    #[serde(default = "default_records_file")]
    pub records_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_max_concurrent_workers() -> usize {
    16
}

fn default_cancel_wait_ms() -> u64 {
    100
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_records_file() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".warden").join("completed_tasks.json"))
}

impl Default for TicketsConfig {
    fn default() -> Self {
        Self {
            max_concurrent_workers: default_max_concurrent_workers(),
            cancel_wait_ms: default_cancel_wait_ms(),
            late_result_policy: LateResultPolicy::default(),
        }
    }
}

impl Default for StartupTasksConfig {
    fn default() -> Self {
        Self {
            records_file: default_records_file(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}

impl Default for WardenConfigManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "warden".to_string(),
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: WardenConfigSpec::default(),
        }
    }
}

impl WardenConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Discover configuration file using precedence order
    /// 1. WARDEN_CONFIG_PATH environment variable
    /// 2. ./warden-config.yaml (working directory)
    /// 3. ~/.warden/config.yaml (user home)
    /// 4. /etc/warden/config.yaml (system)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("WARDEN_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./warden-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".warden").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/warden/config.yaml");
        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(explicit_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // An explicit path must exist and parse
        if let Some(path) = explicit_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            config.validate()?;
            return Ok(config);
        }

        let mut config = if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            Self::from_yaml_file(config_path)?
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            Self::default()
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("WARDEN_MAX_CONCURRENT_WORKERS") {
            match val.trim().parse::<usize>() {
                Ok(workers) => {
                    tracing::info!("Environment override: WARDEN_MAX_CONCURRENT_WORKERS={}", workers);
                    self.spec.tickets.max_concurrent_workers = workers;
                }
                Err(_) => tracing::warn!(
                    "Invalid value for WARDEN_MAX_CONCURRENT_WORKERS: '{}'. Expected a positive integer. Ignoring.",
                    val
                ),
            }
        }

        if let Some(val) = lookup("WARDEN_CANCEL_WAIT_MS") {
            match val.trim().parse::<u64>() {
                Ok(wait_ms) => {
                    tracing::info!("Environment override: WARDEN_CANCEL_WAIT_MS={}", wait_ms);
                    self.spec.tickets.cancel_wait_ms = wait_ms;
                }
                Err(_) => tracing::warn!(
                    "Invalid value for WARDEN_CANCEL_WAIT_MS: '{}'. Expected milliseconds. Ignoring.",
                    val
                ),
            }
        }

        if let Some(val) = lookup("WARDEN_LOG_LEVEL") {
            if val.trim().is_empty() {
                tracing::warn!("Empty value for WARDEN_LOG_LEVEL. Ignoring.");
            } else {
                tracing::info!("Environment override: WARDEN_LOG_LEVEL={}", val);
                self.spec.observability.log_level = val.trim().to_string();
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        if self.spec.tickets.max_concurrent_workers == 0 {
            anyhow::bail!("spec.tickets.max_concurrent_workers must be at least 1");
        }

        if self.spec.observability.log_level.trim().is_empty() {
            anyhow::bail!("spec.observability.log_level cannot be empty");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_manifest() {
        let manifest = WardenConfigManifest::default();
        assert_eq!(manifest.api_version, "warden.dev/v1");
        assert_eq!(manifest.kind, "WardenConfig");
        assert_eq!(manifest.spec.tickets.max_concurrent_workers, 16);
        assert_eq!(manifest.spec.tickets.cancel_wait_ms, 100);
        assert_eq!(manifest.spec.tickets.late_result_policy, LateResultPolicy::Discard);
        assert_eq!(manifest.spec.observability.log_format, LogFormat::Compact);
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_yaml_fills_defaults() {
        let yaml = r#"
apiVersion: warden.dev/v1
kind: WardenConfig
metadata:
  name: test-node
spec:
  tickets:
    max_concurrent_workers: 4
    late_result_policy: retain
  observability:
    log_format: json
"#;
        let manifest = WardenConfigManifest::from_yaml_str(yaml).unwrap();
        assert_eq!(manifest.metadata.name, "test-node");
        assert_eq!(manifest.spec.tickets.max_concurrent_workers, 4);
        assert_eq!(manifest.spec.tickets.cancel_wait_ms, 100);
        assert_eq!(manifest.spec.tickets.late_result_policy, LateResultPolicy::Retain);
        assert_eq!(manifest.spec.observability.log_format, LogFormat::Json);
        assert_eq!(manifest.spec.observability.log_level, "info");
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_records_file_default_and_null() {
        let base = "apiVersion: warden.dev/v1\nkind: WardenConfig\nmetadata:\n  name: n\n";
        let omitted =
            WardenConfigManifest::from_yaml_str(&format!("{base}spec:\n  startup_tasks: {{}}\n"))
                .unwrap();
        assert_eq!(omitted.spec.startup_tasks.records_file, default_records_file());

        let in_memory = WardenConfigManifest::from_yaml_str(&format!(
            "{base}spec:\n  startup_tasks:\n    records_file: null\n"
        ))
        .unwrap();
        assert!(in_memory.spec.startup_tasks.records_file.is_none());

        let explicit = WardenConfigManifest::from_yaml_str(&format!(
            "{base}spec:\n  startup_tasks:\n    records_file: /tmp/records.json\n"
        ))
        .unwrap();
        assert_eq!(
            explicit.spec.startup_tasks.records_file,
            Some(PathBuf::from("/tmp/records.json"))
        );
    }

    #[test]
    fn test_validation_rejects_bad_manifest() {
        let mut manifest = WardenConfigManifest::default();
        manifest.kind = "NodeConfig".to_string();
        assert!(manifest.validate().is_err());

        let mut manifest = WardenConfigManifest::default();
        manifest.spec.tickets.max_concurrent_workers = 0;
        let err = manifest.validate().unwrap_err();
        assert!(err.to_string().contains("max_concurrent_workers"));
    }

    #[test]
    fn test_overrides_apply_and_ignore_garbage() {
        let mut manifest = WardenConfigManifest::default();
        manifest.apply_overrides_from(|key| match key {
            "WARDEN_MAX_CONCURRENT_WORKERS" => Some("2".to_string()),
            "WARDEN_CANCEL_WAIT_MS" => Some("soon".to_string()),
            "WARDEN_LOG_LEVEL" => Some("debug".to_string()),
            _ => None,
        });
        assert_eq!(manifest.spec.tickets.max_concurrent_workers, 2);
        assert_eq!(manifest.spec.tickets.cancel_wait_ms, 100);
        assert_eq!(manifest.spec.observability.log_level, "debug");
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warden.yaml");
        let mut manifest = WardenConfigManifest::default();
        manifest.spec.tickets.cancel_wait_ms = 250;
        std::fs::write(&path, manifest.to_yaml_string().unwrap()).unwrap();

        let loaded = WardenConfigManifest::from_yaml_file(&path).unwrap();
        assert_eq!(loaded.spec.tickets.cancel_wait_ms, 250);
        assert!(WardenConfigManifest::load_or_default(Some(dir.path().join("missing.yaml"))).is_err());
    }
}
