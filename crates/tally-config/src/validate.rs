//! Configuration validation errors and semantic validation.

use std::collections::HashSet;

use thiserror::Error;

use crate::forecast::{BucketSpread, ForecastConfig, ModelConfig};

/// Validation result type.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Configuration validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Semantic validation failed: {0}")]
    SemanticError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },
}

impl ValidationError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ValidationError::IoError(_) => 60,
            ValidationError::ParseError(_) => 61,
            ValidationError::SemanticError(_) => 63,
            ValidationError::InvalidValue { .. } => 65,
            ValidationError::VersionMismatch { .. } => 66,
        }
    }
}

impl From<ValidationError> for tally_common::Error {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::InvalidValue { field, message } => {
                tally_common::Error::InvalidConfig { field, message }
            }
            other => tally_common::Error::Config(other.to_string()),
        }
    }
}

fn invalid(field: impl Into<String>, message: impl Into<String>) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.into(),
        message: message.into(),
    }
}

/// Validate a forecast configuration semantically.
pub fn validate_config(cfg: &ForecastConfig) -> ValidationResult<()> {
    if cfg.schema_version != crate::CONFIG_SCHEMA_VERSION {
        return Err(ValidationError::VersionMismatch {
            expected: crate::CONFIG_SCHEMA_VERSION.to_string(),
            actual: cfg.schema_version.clone(),
        });
    }

    if cfg.window.end <= cfg.window.start {
        return Err(invalid(
            "window.end",
            format!(
                "Must be after window.start ({}), got {}",
                cfg.window.start.to_rfc3339(),
                cfg.window.end.to_rfc3339()
            ),
        ));
    }

    if !(-14..=14).contains(&cfg.reference_utc_offset_hours) {
        return Err(invalid(
            "reference_utc_offset_hours",
            format!("Must be in [-14, 14], got {}", cfg.reference_utc_offset_hours),
        ));
    }

    if !cfg.lambda_prior.is_finite() || cfg.lambda_prior <= 0.0 {
        return Err(invalid(
            "lambda_prior",
            format!("Must be positive and finite, got {}", cfg.lambda_prior),
        ));
    }

    if let ModelConfig::NegBinom { alpha } = cfg.model {
        if !alpha.is_finite() || alpha <= 0.0 {
            return Err(invalid(
                "model.alpha",
                format!("Must be positive and finite, got {}", alpha),
            ));
        }
    }

    if !cfg.weekend.boost.is_finite() || cfg.weekend.boost <= 0.0 {
        return Err(invalid(
            "weekend.boost",
            format!("Must be positive and finite, got {}", cfg.weekend.boost),
        ));
    }

    if let BucketSpread::Fixed { std_dev } = cfg.bucket_spread {
        if !std_dev.is_finite() || std_dev <= 0.0 {
            return Err(invalid(
                "bucket_spread.std_dev",
                format!("Must be positive and finite, got {}", std_dev),
            ));
        }
    }

    validate_bands(cfg)
}

/// Bands must start at 0, be contiguous, and only the last may be open.
fn validate_bands(cfg: &ForecastConfig) -> ValidationResult<()> {
    let bands = &cfg.bands;
    let first = bands
        .first()
        .ok_or_else(|| ValidationError::SemanticError("At least one band is required".into()))?;

    if first.lower != 0 {
        return Err(invalid(
            "bands[0].lower",
            format!("First band must start at 0, got {}", first.lower),
        ));
    }

    let mut labels = HashSet::new();
    for (i, band) in bands.iter().enumerate() {
        if !labels.insert(band.label.as_str()) {
            return Err(ValidationError::SemanticError(format!(
                "Duplicate band label {:?}",
                band.label
            )));
        }
        let is_last = i + 1 == bands.len();
        match band.upper {
            None if !is_last => {
                return Err(ValidationError::SemanticError(format!(
                    "Only the last band may be open-ended, but {:?} is not last",
                    band.label
                )));
            }
            Some(upper) if upper < band.lower => {
                return Err(invalid(
                    format!("bands[{}].upper", i),
                    format!("Must be >= lower ({}), got {}", band.lower, upper),
                ));
            }
            _ => {}
        }
        if let Some(next) = bands.get(i + 1) {
            let expected = band.upper.map(|u| u + 1);
            if expected != Some(next.lower) {
                return Err(ValidationError::SemanticError(format!(
                    "Bands must be contiguous: {:?} ends at {:?} but {:?} starts at {}",
                    band.label, band.upper, next.label, next.lower
                )));
            }
        }
    }

    Ok(())
}
