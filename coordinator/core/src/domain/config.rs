// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Coordinator Configuration Types
//
// Defines the configuration schema for a coordinator deployment:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Storage backend selection and connection pool sizing
// - Scheduling windows for status refresh and the absence sweep
// - Attendance calendar offset
// - Category taxonomy
// - Observability settings

use chrono::{Duration, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::domain::activity::DEFAULT_UPCOMING_WINDOW_DAYS;
use crate::domain::repository::{PostgresConfig, StorageBackend};
use crate::domain::taxonomy::CategoryTaxonomy;

pub const API_VERSION: &str = "100monkeys.ai/v1";
pub const KIND: &str = "CoordinatorConfig";

/// Upper bound for `spec.scheduling.upcoming_window_days`
pub const MAX_UPCOMING_WINDOW_DAYS: i64 = 366;
/// Upper bound for `spec.scheduling.absence_lookback_days`
pub const MAX_ABSENCE_LOOKBACK_DAYS: i64 = 3660;

/// Top-level Kubernetes-style coordinator configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfigManifest {
    /// API version (must be "100monkeys.ai/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "CoordinatorConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    pub spec: CoordinatorConfigSpec,
}

/// Manifest metadata (Kubernetes-style)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Human-readable deployment name
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

/// Coordinator configuration specification (content under spec:)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoordinatorConfigSpec {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub scheduling: SchedulingConfig,

    #[serde(default)]
    pub attendance: AttendanceConfig,

    #[serde(default)]
    pub taxonomy: CategoryTaxonomy,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub observability: Option<ObservabilityConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackendKind {
    #[default]
    InMemory,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub backend: StorageBackendKind,

    /// PostgreSQL connection string (required for the postgres backend)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingConfig {
    /// Activities starting within this many days are `upcoming`
    #[serde(default = "default_upcoming_window_days")]
    pub upcoming_window_days: i64,

    /// The absence sweep processes activities that ended within this many days
    #[serde(default = "default_absence_lookback_days")]
    pub absence_lookback_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceConfig {
    /// Offset from UTC, in minutes, that defines the calendar day a daily
    /// check-in code is valid for
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "info", "debug", "trace")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format ("json" or "text")
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_max_connections() -> u32 {
    5
}

fn default_upcoming_window_days() -> i64 {
    DEFAULT_UPCOMING_WINDOW_DAYS
}

fn default_absence_lookback_days() -> i64 {
    7
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackendKind::InMemory,
            url: None,
            max_connections: default_max_connections(),
        }
    }
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            upcoming_window_days: default_upcoming_window_days(),
            absence_lookback_days: default_absence_lookback_days(),
        }
    }
}

impl Default for AttendanceConfig {
    fn default() -> Self {
        Self { utc_offset_minutes: 0 }
    }
}

impl Default for CoordinatorConfigManifest {
    fn default() -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "volunteer-coordinator".to_string());

        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: hostname,
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: CoordinatorConfigSpec::default(),
        }
    }
}

impl SchedulingConfig {
    /// `None` when the configured day count is not representable
    pub fn upcoming_window(&self) -> Option<Duration> {
        Duration::try_days(self.upcoming_window_days)
    }
}

impl AttendanceConfig {
    pub fn utc_offset(&self) -> Option<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_minutes.checked_mul(60)?)
    }
}

impl CoordinatorConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. VOLUNTEER_CONFIG_PATH environment variable
    /// 2. ./volunteer-config.yaml (working directory)
    /// 3. ~/.volunteer/config.yaml (user home)
    /// 4. /etc/volunteer/config.yaml (system, Unix) or
    ///    C:\ProgramData\Volunteer\config.yaml (Windows)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("VOLUNTEER_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./volunteer-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".volunteer").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        let system_config = PathBuf::from("/etc/volunteer/config.yaml");
        #[cfg(windows)]
        let system_config = PathBuf::from("C:\\ProgramData\\Volunteer\\config.yaml");

        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit CLI path must exist and parse
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    /// This allows container deployments to override config via env vars
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("VOLUNTEER_DATABASE_URL") {
            if !url.trim().is_empty() {
                tracing::info!("Environment override: VOLUNTEER_DATABASE_URL (postgres backend)");
                self.spec.database.url = Some(url);
                self.spec.database.backend = StorageBackendKind::Postgres;
            }
        }

        if let Ok(level) = std::env::var("VOLUNTEER_LOG_LEVEL") {
            if !level.trim().is_empty() {
                tracing::info!("Environment override: VOLUNTEER_LOG_LEVEL={}", level);
                let observability = self
                    .spec
                    .observability
                    .get_or_insert(ObservabilityConfig { logging: None });
                let logging = observability.logging.get_or_insert(LoggingConfig {
                    level: default_log_level(),
                    format: default_log_format(),
                });
                logging.level = level;
            }
        }

        if let Ok(val) = std::env::var("VOLUNTEER_UTC_OFFSET_MINUTES") {
            match val.trim().parse::<i32>() {
                Ok(minutes) => {
                    tracing::info!(
                        "Environment override: VOLUNTEER_UTC_OFFSET_MINUTES={}",
                        minutes
                    );
                    self.spec.attendance.utc_offset_minutes = minutes;
                }
                Err(_) => {
                    tracing::warn!(
                        "Invalid value for VOLUNTEER_UTC_OFFSET_MINUTES: '{}'. \
                         Expected an integer. Ignoring.",
                        val
                    );
                }
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

        let database = &self.spec.database;
        if database.backend == StorageBackendKind::Postgres
            && database.url.as_deref().map_or(true, |u| u.trim().is_empty())
        {
            anyhow::bail!("spec.database.url is required for the postgres backend");
        }
        if database.max_connections == 0 {
            anyhow::bail!("spec.database.max_connections must be at least 1");
        }

        let scheduling = &self.spec.scheduling;
        if !(0..=MAX_UPCOMING_WINDOW_DAYS).contains(&scheduling.upcoming_window_days) {
            anyhow::bail!(
                "spec.scheduling.upcoming_window_days must be between 0 and {}, got {}",
                MAX_UPCOMING_WINDOW_DAYS,
                scheduling.upcoming_window_days
            );
        }
        if !(1..=MAX_ABSENCE_LOOKBACK_DAYS).contains(&scheduling.absence_lookback_days) {
            anyhow::bail!(
                "spec.scheduling.absence_lookback_days must be between 1 and {}, got {}",
                MAX_ABSENCE_LOOKBACK_DAYS,
                scheduling.absence_lookback_days
            );
        }

        if self.spec.attendance.utc_offset().is_none() {
            anyhow::bail!(
                "spec.attendance.utc_offset_minutes out of range: {}",
                self.spec.attendance.utc_offset_minutes
            );
        }

        let taxonomy = &self.spec.taxonomy;
        if taxonomy.categories_max == 0 {
            anyhow::bail!("spec.taxonomy.categories_max must be at least 1");
        }
        if taxonomy.allowed().is_empty() {
            anyhow::bail!("spec.taxonomy must define at least one selectable category");
        }
        for group in &taxonomy.groups {
            if group.name.trim().is_empty() {
                anyhow::bail!("Category group name cannot be empty");
            }
            if group.items.iter().any(|item| item.trim().is_empty()) {
                anyhow::bail!("Category group '{}' contains an empty item", group.name);
            }
        }

        if let Some(logging) = self.spec.observability.as_ref().and_then(|o| o.logging.as_ref()) {
            if logging.format != "json" && logging.format != "text" {
                anyhow::bail!(
                    "Invalid log format: '{}'. Expected 'json' or 'text'",
                    logging.format
                );
            }
        }

        Ok(())
    }

    pub fn storage_backend(&self) -> anyhow::Result<StorageBackend> {
        let database = &self.spec.database;
        match database.backend {
            StorageBackendKind::InMemory => Ok(StorageBackend::InMemory),
            StorageBackendKind::Postgres => {
                let url = database
                    .url
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("spec.database.url is not set"))?;
                Ok(StorageBackend::PostgreSQL(PostgresConfig {
                    connection_string: url,
                    max_connections: database.max_connections,
                }))
            }
        }
    }

    pub fn logging(&self) -> Option<&LoggingConfig> {
        self.spec.observability.as_ref().and_then(|o| o.logging.as_ref())
    }
}
