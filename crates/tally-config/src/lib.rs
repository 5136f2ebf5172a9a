//! Tallycast configuration loading and validation.
//!
//! This crate provides:
//! - Typed Rust structs for tally.json (window, prior rate, model, bands)
//! - Config resolution (CLI → env → XDG → system → builtin)
//! - Semantic validation
//! - Config snapshots for forecast provenance

pub mod bands;
pub mod forecast;
pub mod resolve;
pub mod snapshot;
pub mod validate;

pub use bands::{Band, Confidence};
pub use forecast::{BucketSpread, ForecastConfig, ModelConfig, WeekendConfig, WindowConfig};
pub use resolve::{load_config, resolve_config, ConfigPath, ConfigSource, LoadedConfig};
pub use snapshot::ConfigSnapshot;
pub use validate::{validate_config, ValidationError, ValidationResult};

/// Schema version for configuration files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";
