//! Configuration for the handoff core.
//! TOML-based, resolved as: env (`HANDOFF_*`) > file > compiled defaults.

pub mod defaults;

use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::domain::HandoffError;

/// Staging store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagingConfig {
    /// Lifetime of a staged artifact (seconds).
    pub artifact_ttl_secs: u64,
    /// Durable path namespace used when a descriptor has no category.
    pub default_category: String,
    /// Directory for the filesystem backend. In-memory when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            artifact_ttl_secs: defaults::DEFAULT_ARTIFACT_TTL_SECS,
            default_category: defaults::DEFAULT_CATEGORY.to_string(),
            dir: None,
        }
    }
}

impl StagingConfig {
    pub fn artifact_ttl(&self) -> Duration {
        Duration::seconds(self.artifact_ttl_secs as i64)
    }
}

/// Anonymous session configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Lifetime of an anonymous session (seconds).
    pub ttl_secs: u64,
    /// File for the filesystem slot. In-memory when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: defaults::DEFAULT_SESSION_TTL_SECS,
            path: None,
        }
    }
}

impl SessionConfig {
    pub fn ttl(&self) -> Duration {
        Duration::seconds(self.ttl_secs as i64)
    }
}

/// Quota gate configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaConfig {
    /// Reconciliations per calendar day on the free tier.
    pub free_daily_cap: u32,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            free_daily_cap: defaults::DEFAULT_FREE_DAILY_CAP,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandoffConfig {
    pub staging: StagingConfig,
    pub session: SessionConfig,
    pub quota: QuotaConfig,
}

/// Upper bound for TTLs; keeps `chrono::Duration` arithmetic in range.
const MAX_TTL_SECS: u64 = 365 * 24 * 60 * 60;

impl HandoffConfig {
    /// Load from a TOML file, then apply `HANDOFF_*` environment overrides.
    pub fn load(path: &Path) -> Result<Self, HandoffError> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// Like `load`, with overrides read from `lookup`.
    /// Validation runs once, on the merged result.
    pub fn load_with(
        path: &Path,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, HandoffError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| HandoffError::Config(format!("{}: {e}", path.display())))?;
        let mut config = Self::parse(&content)?;
        config.apply_overrides(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML string. Unknown keys are ignored.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, HandoffError> {
        let config = Self::parse(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    fn parse(toml_str: &str) -> Result<Self, HandoffError> {
        toml::from_str(toml_str).map_err(|e| HandoffError::Config(e.to_string()))
    }

    /// Apply overrides from a key lookup (the process environment in `load`).
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), HandoffError> {
        if let Some(v) = lookup("HANDOFF_ARTIFACT_TTL_SECS") {
            self.staging.artifact_ttl_secs = parse_override("HANDOFF_ARTIFACT_TTL_SECS", &v)?;
        }
        if let Some(v) = lookup("HANDOFF_SESSION_TTL_SECS") {
            self.session.ttl_secs = parse_override("HANDOFF_SESSION_TTL_SECS", &v)?;
        }
        if let Some(v) = lookup("HANDOFF_FREE_DAILY_CAP") {
            self.quota.free_daily_cap = parse_override("HANDOFF_FREE_DAILY_CAP", &v)?;
        }
        if let Some(v) = lookup("HANDOFF_STAGING_DIR") {
            self.staging.dir = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("HANDOFF_SESSION_PATH") {
            self.session.path = Some(PathBuf::from(v));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), HandoffError> {
        for (field, value) in [
            ("staging.artifact_ttl_secs", self.staging.artifact_ttl_secs),
            ("session.ttl_secs", self.session.ttl_secs),
        ] {
            if value == 0 || value > MAX_TTL_SECS {
                return Err(HandoffError::Config(format!(
                    "{field} must be between 1 and {MAX_TTL_SECS}"
                )));
            }
        }
        Ok(())
    }
}

fn parse_override<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, HandoffError> {
    value
        .trim()
        .parse()
        .map_err(|_| HandoffError::Config(format!("{key}={value:?} is not a valid number")))
}
