//! Forecast configuration types.
//!
//! A [`ForecastConfig`] is loaded once and treated as immutable: every engine
//! component borrows it and nothing writes back into it.

use chrono::{DateTime, FixedOffset, Offset, TimeZone, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::bands::{default_bands, Band};
use crate::validate::ValidationError;

/// Prior rate used when nothing else is known: 400 events per week, per hour.
pub const DEFAULT_LAMBDA_PRIOR: f64 = 400.0 / (7.0 * 24.0);

/// Eastern Standard Time. Daylight saving is deliberately not modelled.
pub const DEFAULT_UTC_OFFSET_HOURS: i32 = -5;

pub const DEFAULT_WEEKEND_BOOST: f64 = 1.1;
pub const DEFAULT_BUCKET_STD_DEV: f64 = 50.0;
pub const DEFAULT_NEGBIN_ALPHA: f64 = 0.1;

/// Complete forecast configuration (tally.json).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastConfig {
    pub schema_version: String,

    /// Market window being forecast.
    pub window: WindowConfig,

    /// Fixed offset of the reference timezone that defines calendar days.
    #[serde(default = "default_offset_hours")]
    pub reference_utc_offset_hours: i32,

    /// Prior event rate, events per hour.
    #[serde(default = "default_lambda_prior")]
    pub lambda_prior: f64,

    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub weekend: WeekendConfig,

    #[serde(default)]
    pub bucket_spread: BucketSpread,

    #[serde(default = "default_bands")]
    pub bands: Vec<Band>,
}

/// Start and end of the forecast window (RFC 3339 in the file, UTC in memory).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowConfig {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl WindowConfig {
    pub fn total_hours(&self) -> f64 {
        (self.end - self.start).num_milliseconds() as f64 / 3_600_000.0
    }
}

/// Count model for the remaining-window forecast.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelConfig {
    #[default]
    Poisson,
    /// Overdispersed counts; variance = mean + alpha · mean².
    NegBinom {
        #[serde(default = "default_alpha")]
        alpha: f64,
    },
}

impl ModelConfig {
    pub fn alpha(&self) -> Option<f64> {
        match self {
            ModelConfig::Poisson => None,
            ModelConfig::NegBinom { alpha } => Some(*alpha),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ModelConfig::Poisson => "poisson",
            ModelConfig::NegBinom { .. } => "neg_binom",
        }
    }
}

/// Weekend activity adjustment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekendConfig {
    #[serde(default = "default_weekend_boost")]
    pub boost: f64,
    #[serde(default = "default_weekend_days")]
    pub days: Vec<Weekday>,
}

impl Default for WeekendConfig {
    fn default() -> Self {
        WeekendConfig {
            boost: DEFAULT_WEEKEND_BOOST,
            days: default_weekend_days(),
        }
    }
}

impl WeekendConfig {
    pub fn is_weekend(&self, day: Weekday) -> bool {
        self.days.contains(&day)
    }
}

/// Standard deviation used by the bucket mapper.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BucketSpread {
    /// A constant spread regardless of the forecast.
    Fixed { std_dev: f64 },
    /// The standard deviation of the fitted count model.
    Distribution,
}

impl Default for BucketSpread {
    fn default() -> Self {
        BucketSpread::Fixed {
            std_dev: DEFAULT_BUCKET_STD_DEV,
        }
    }
}

fn default_offset_hours() -> i32 {
    DEFAULT_UTC_OFFSET_HOURS
}

fn default_lambda_prior() -> f64 {
    DEFAULT_LAMBDA_PRIOR
}

fn default_alpha() -> f64 {
    DEFAULT_NEGBIN_ALPHA
}

fn default_weekend_boost() -> f64 {
    DEFAULT_WEEKEND_BOOST
}

fn default_weekend_days() -> Vec<Weekday> {
    vec![Weekday::Sat, Weekday::Sun]
}

impl ForecastConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ValidationError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ValidationError::IoError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_str(&content)
    }

    /// Parse configuration from a JSON string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(json: &str) -> Result<Self, ValidationError> {
        serde_json::from_str(json)
            .map_err(|e| ValidationError::ParseError(format!("Invalid JSON: {}", e)))
    }

    /// Built-in configuration: the 48h window opening 2026-02-05 12:00 EST.
    pub fn builtin() -> Self {
        let offset = fixed_offset(DEFAULT_UTC_OFFSET_HOURS);
        let start = offset
            .with_ymd_and_hms(2026, 2, 5, 12, 0, 0)
            .single()
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_default();
        ForecastConfig {
            schema_version: crate::CONFIG_SCHEMA_VERSION.to_string(),
            window: WindowConfig {
                start,
                end: start + chrono::Duration::hours(48),
            },
            reference_utc_offset_hours: DEFAULT_UTC_OFFSET_HOURS,
            lambda_prior: DEFAULT_LAMBDA_PRIOR,
            model: ModelConfig::default(),
            weekend: WeekendConfig::default(),
            bucket_spread: BucketSpread::default(),
            bands: default_bands(),
        }
    }

    /// Offset of the reference timezone used for calendar-day boundaries.
    pub fn reference_offset(&self) -> FixedOffset {
        fixed_offset(self.reference_utc_offset_hours)
    }

    pub fn total_hours(&self) -> f64 {
        self.window.total_hours()
    }

    pub fn band_labels(&self) -> Vec<&str> {
        self.bands.iter().map(|b| b.label.as_str()).collect()
    }
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Out-of-range offsets fall back to UTC; validation rejects them first.
pub fn fixed_offset(hours: i32) -> FixedOffset {
    FixedOffset::east_opt(hours.saturating_mul(3600)).unwrap_or_else(|| Utc.fix())
}
