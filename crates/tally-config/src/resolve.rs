//! Configuration resolution and path discovery.
//!
//! Resolution order: CLI argument → environment variables → XDG path →
//! system path → built-in default.

use std::path::{Path, PathBuf};

use crate::forecast::ForecastConfig;
use crate::snapshot::ConfigSnapshot;
use crate::validate::{validate_config, ValidationError, ValidationResult};

/// Where the configuration file was found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigSource {
    /// Explicitly provided via CLI argument.
    CliArgument,

    /// Set via environment variable.
    Environment,

    /// Found in XDG config directory.
    XdgConfig,

    /// Found in /etc/tallycast/.
    SystemConfig,

    /// Using built-in defaults.
    #[default]
    BuiltinDefault,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::CliArgument => write!(f, "CLI argument"),
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::XdgConfig => write!(f, "XDG config"),
            ConfigSource::SystemConfig => write!(f, "system config"),
            ConfigSource::BuiltinDefault => write!(f, "builtin default"),
        }
    }
}

/// A resolved configuration path (None when falling back to defaults).
#[derive(Debug, Clone, Default)]
pub struct ConfigPath {
    pub path: Option<PathBuf>,
    pub source: ConfigSource,
}

/// Environment variable names.
pub const ENV_CONFIG_PATH: &str = "TALLY_CONFIG";
pub const ENV_CONFIG_DIR: &str = "TALLY_CONFIG_DIR";

/// Standard config file name.
pub const CONFIG_FILENAME: &str = "tally.json";

/// Application name for XDG directories.
const APP_NAME: &str = "tallycast";

/// Resolve the configuration path.
///
/// An explicit CLI path is returned even if it does not exist, so the caller
/// reports the missing file instead of silently using defaults. Every other
/// candidate must exist to be chosen.
pub fn resolve_config(cli_path: Option<&Path>) -> ConfigPath {
    if let Some(path) = cli_path {
        return ConfigPath {
            path: Some(path.to_path_buf()),
            source: ConfigSource::CliArgument,
        };
    }

    if let Ok(env_path) = std::env::var(ENV_CONFIG_PATH) {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return found(path, ConfigSource::Environment);
        }
    }

    if let Ok(config_dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = PathBuf::from(config_dir).join(CONFIG_FILENAME);
        if path.exists() {
            return found(path, ConfigSource::Environment);
        }
    }

    if let Some(dir) = xdg_config_dir() {
        let path = dir.join(CONFIG_FILENAME);
        if path.exists() {
            return found(path, ConfigSource::XdgConfig);
        }
    }

    let system_path = system_config_dir().join(CONFIG_FILENAME);
    if system_path.exists() {
        return found(system_path, ConfigSource::SystemConfig);
    }

    ConfigPath::default()
}

fn found(path: PathBuf, source: ConfigSource) -> ConfigPath {
    ConfigPath {
        path: Some(path),
        source,
    }
}

/// Get the XDG config directory for tallycast.
pub fn xdg_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Get the system config directory.
pub fn system_config_dir() -> PathBuf {
    PathBuf::from("/etc").join(APP_NAME)
}

/// A validated configuration together with its provenance.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: ForecastConfig,
    pub snapshot: ConfigSnapshot,
}

/// Resolve, read, parse and validate the configuration.
pub fn load_config(cli_path: Option<&Path>) -> ValidationResult<LoadedConfig> {
    let resolved = resolve_config(cli_path);
    let (config, raw) = match &resolved.path {
        Some(path) => {
            let raw = std::fs::read_to_string(path).map_err(|e| {
                ValidationError::IoError(format!("Failed to read {}: {}", path.display(), e))
            })?;
            (ForecastConfig::from_str(&raw)?, raw)
        }
        None => {
            let config = ForecastConfig::builtin();
            let raw = serde_json::to_string(&config)
                .map_err(|e| ValidationError::ParseError(e.to_string()))?;
            (config, raw)
        }
    };
    validate_config(&config)?;
    let snapshot = ConfigSnapshot::new(&config, &resolved, raw.as_bytes());
    Ok(LoadedConfig { config, snapshot })
}
