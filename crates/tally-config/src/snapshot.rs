//! Configuration snapshots for forecast provenance.
//!
//! Each forecast embeds the config hash so a stored result can be traced back
//! to the exact configuration that produced it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::forecast::ForecastConfig;
use crate::resolve::ConfigPath;

/// A frozen snapshot of configuration state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    /// When this snapshot was taken.
    pub timestamp: DateTime<Utc>,

    /// Schema version of the configuration.
    pub schema_version: String,

    /// Path the configuration was loaded from.
    #[serde(default)]
    pub path: Option<String>,

    /// How the configuration was resolved.
    pub source: String,

    /// SHA-256 of the configuration bytes.
    pub config_hash: String,

    /// Key configuration values for quick reference.
    pub summary: ConfigSummary,
}

/// Summary of key configuration values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSummary {
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub total_hours: f64,
    pub lambda_prior: f64,
    pub model: String,
    pub band_count: usize,
}

impl ConfigSnapshot {
    pub fn new(config: &ForecastConfig, resolved: &ConfigPath, raw: &[u8]) -> Self {
        ConfigSnapshot {
            timestamp: Utc::now(),
            schema_version: config.schema_version.clone(),
            path: resolved.path.as_ref().map(|p| p.display().to_string()),
            source: resolved.source.to_string(),
            config_hash: sha256_hex(raw),
            summary: ConfigSummary {
                window_start: config.window.start,
                window_end: config.window.end,
                total_hours: config.total_hours(),
                lambda_prior: config.lambda_prior,
                model: config.model.name().to_string(),
                band_count: config.bands.len(),
            },
        }
    }

    /// First 12 hex characters of the config hash, for display.
    pub fn short_hash(&self) -> &str {
        self.config_hash.get(..12).unwrap_or(&self.config_hash)
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_and_content_sensitive() {
        let cfg = ForecastConfig::builtin();
        let a = ConfigSnapshot::new(&cfg, &ConfigPath::default(), b"{}");
        let b = ConfigSnapshot::new(&cfg, &ConfigPath::default(), b"{}");
        let c = ConfigSnapshot::new(&cfg, &ConfigPath::default(), b"{ }");
        assert_eq!(a.config_hash, b.config_hash);
        assert_ne!(a.config_hash, c.config_hash);
        assert_eq!(a.config_hash.len(), 64);
        assert_eq!(a.short_hash().len(), 12);
        assert_eq!(a.source, "builtin default");
        assert_eq!(a.summary.band_count, 10);
    }
}
