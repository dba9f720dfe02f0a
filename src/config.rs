use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Admission limits for a single tracked resource.
///
/// A limit of zero is valid configuration and means the resource is always
/// refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceLimit {
    pub max_per_minute: u64,
    pub max_per_day: u64,
}

#[derive(Debug, Clone)]
pub struct QuotaConfig {
    /// Directory holding the persisted usage record.
    pub data_dir: PathBuf,
    /// Tracked resources and their limits. Requests for anything else are
    /// refused as unknown.
    pub limits: HashMap<String, ResourceLimit>,
    /// Persist the pruned minute window on read-only admission checks too,
    /// instead of only when a request is recorded.
    pub persist_pruned_on_check: bool,
    /// Log level hint for the embedding host; the library itself never
    /// installs a subscriber.
    pub log_level: String,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            limits: default_limits(),
            persist_pruned_on_check: false,
            log_level: "info".to_string(),
        }
    }
}

impl QuotaConfig {
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();

        if let Ok(dir) = env::var("QUOTA_DATA_DIR") {
            if !dir.trim().is_empty() {
                let path = PathBuf::from(&dir);
                cfg.data_dir = if path.is_absolute() {
                    path
                } else {
                    env::current_dir()
                        .unwrap_or_else(|_| PathBuf::from("."))
                        .join(path)
                };
            }
        }

        if let Ok(raw) = env::var("QUOTA_LIMITS") {
            cfg.limits = parse_limits(&raw).context("QUOTA_LIMITS is not a valid limits object")?;
        } else if let Ok(file) = env::var("QUOTA_LIMITS_FILE") {
            let raw = fs::read_to_string(&file)
                .with_context(|| format!("unable to read QUOTA_LIMITS_FILE {file}"))?;
            cfg.limits = parse_limits(&raw)
                .with_context(|| format!("QUOTA_LIMITS_FILE {file} is not a valid limits object"))?;
        }

        if let Ok(flag) = env::var("QUOTA_PERSIST_ON_CHECK") {
            cfg.persist_pruned_on_check = parse_bool(&flag)
                .with_context(|| format!("QUOTA_PERSIST_ON_CHECK is invalid: {flag}"))?;
        }

        if let Ok(level) = env::var("LOG_LEVEL") {
            if !level.trim().is_empty() {
                cfg.log_level = level;
            }
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.limits.is_empty() {
            anyhow::bail!("at least one resource limit must be configured");
        }
        if self.limits.keys().any(|key| key.trim().is_empty()) {
            anyhow::bail!("resource keys must not be empty");
        }
        ensure_directory(&self.data_dir)?;
        Ok(())
    }

    pub fn limit_for(&self, resource: &str) -> Option<ResourceLimit> {
        self.limits.get(resource).copied()
    }
}

/// Default to the same per-user configuration directory scheme the rest of
/// the host uses; fall back to the working directory when none exists.
fn default_data_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
        .join("model-quota")
}

/// Free-tier limits for the models tracked by default.
fn default_limits() -> HashMap<String, ResourceLimit> {
    HashMap::from([
        (
            "gemini-2.5-pro".to_string(),
            ResourceLimit {
                max_per_minute: 5,
                max_per_day: 25,
            },
        ),
        (
            "gemini-2.5-flash".to_string(),
            ResourceLimit {
                max_per_minute: 60,
                max_per_day: 1000,
            },
        ),
    ])
}

fn parse_limits(raw: &str) -> Result<HashMap<String, ResourceLimit>> {
    let limits: HashMap<String, ResourceLimit> =
        serde_json::from_str(raw).context("expected {\"resource\": {\"maxPerMinute\": n, \"maxPerDay\": n}}")?;
    Ok(limits)
}

fn ensure_directory(path: &Path) -> Result<()> {
    if path.exists() {
        if !path.is_dir() {
            anyhow::bail!("{} exists but is not a directory", path.display());
        }
    } else {
        fs::create_dir_all(path)
            .with_context(|| format!("unable to create data directory {}", path.display()))?;
    }
    Ok(())
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" => Ok(true),
        "false" | "0" | "no" | "n" => Ok(false),
        _ => anyhow::bail!("invalid boolean value {value}"),
    }
}
