//! Error types for Tallycast.
//!
//! Every error carries:
//! - A stable numeric code for machine parsing
//! - A category for grouping
//! - A recoverability hint and a suggested action for automation
//! - A remediation sentence and headline for humans
//!
//! # Human-Facing Output
//!
//! ```text
//! ✗ Invalid Interval
//!   Reason: invalid interval: end 2026-02-05T17:00:00Z is not after start 2026-02-05T17:00:00Z
//!   Fix: Remove duplicate snapshots or correct their timestamps, then re-run 'tally allocate'.
//! ```
//!
//! # Agent-Facing Output
//!
//! ```json
//! {
//!   "code": 30,
//!   "category": "forecast",
//!   "message": "invalid forecast window: elapsed -1h, total 48h",
//!   "recoverable": true,
//!   "suggested_action": "fix_input",
//!   "context": { "elapsed_hours": -1.0, "total_hours": 48.0 }
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Result type alias for Tallycast operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Configuration file errors.
    Config,
    /// Snapshot interval and allocation errors.
    Allocation,
    /// Rate estimation and bucket distribution errors.
    Forecast,
    /// Record store errors.
    Storage,
    /// File I/O and serialization errors.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Allocation => write!(f, "allocation"),
            ErrorCategory::Forecast => write!(f, "forecast"),
            ErrorCategory::Storage => write!(f, "storage"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Suggested actions for agents to take in response to errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedAction {
    /// Retry the operation.
    Retry,
    /// Run config validation.
    RunCheck,
    /// Correct the offending input and re-run.
    FixInput,
    /// Skip this item and continue.
    Skip,
    /// Abort the operation.
    Abort,
    /// Manual intervention required.
    ManualIntervention,
}

impl std::fmt::Display for SuggestedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SuggestedAction::Retry => write!(f, "retry"),
            SuggestedAction::RunCheck => write!(f, "run_check"),
            SuggestedAction::FixInput => write!(f, "fix_input"),
            SuggestedAction::Skip => write!(f, "skip"),
            SuggestedAction::Abort => write!(f, "abort"),
            SuggestedAction::ManualIntervention => write!(f, "manual_intervention"),
        }
    }
}

/// Unified error type for Tallycast.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid configuration value for {field}: {message}")]
    InvalidConfig { field: String, message: String },

    // Allocation errors (20-29)
    #[error("invalid interval: end {end} is not after start {start}")]
    InvalidInterval {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("counter regression between {start} and {end}: {from} -> {to}")]
    CounterRegression {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        from: u64,
        to: u64,
    },

    // Forecast errors (30-39)
    #[error("invalid forecast window: elapsed {elapsed_hours}h, total {total_hours}h")]
    InvalidWindow {
        elapsed_hours: f64,
        total_hours: f64,
    },

    #[error("degenerate bucket distribution: no band has mass (mean {mean}, std dev {std_dev})")]
    DegenerateDistribution { mean: f64, std_dev: f64 },

    #[error("invalid parameter {name}: {message}")]
    InvalidParameter { name: String, message: String },

    // Storage errors (50-59)
    #[error("record store {path} is corrupted: {message}")]
    StoreCorrupted { path: String, message: String },

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the error code for this error type.
    ///
    /// Error codes are stable and grouped by category:
    /// - 10-19: Configuration errors
    /// - 20-29: Allocation errors
    /// - 30-39: Forecast errors
    /// - 50-59: Storage errors
    /// - 60-69: I/O errors
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::InvalidConfig { .. } => 11,
            Error::InvalidInterval { .. } => 20,
            Error::CounterRegression { .. } => 21,
            Error::InvalidWindow { .. } => 30,
            Error::DegenerateDistribution { .. } => 31,
            Error::InvalidParameter { .. } => 32,
            Error::StoreCorrupted { .. } => 50,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) | Error::InvalidConfig { .. } => ErrorCategory::Config,
            Error::InvalidInterval { .. } | Error::CounterRegression { .. } => {
                ErrorCategory::Allocation
            }
            Error::InvalidWindow { .. }
            | Error::DegenerateDistribution { .. }
            | Error::InvalidParameter { .. } => ErrorCategory::Forecast,
            Error::StoreCorrupted { .. } => ErrorCategory::Storage,
            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,
        }
    }

    /// Returns whether this error is potentially recoverable.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Config(_) | Error::InvalidConfig { .. } => true,

            // Skipped per interval; the rest of the batch proceeds.
            Error::InvalidInterval { .. } => true,
            Error::CounterRegression { .. } => true,

            Error::InvalidWindow { .. } => true,
            Error::DegenerateDistribution { .. } => true, // point estimate still valid
            Error::InvalidParameter { .. } => false,

            Error::StoreCorrupted { .. } => false,
            Error::Io(_) => true,
            Error::Json(_) => true,
        }
    }

    /// Returns the suggested action for agents.
    pub fn suggested_action(&self) -> SuggestedAction {
        match self {
            Error::Config(_) | Error::InvalidConfig { .. } => SuggestedAction::RunCheck,
            Error::InvalidInterval { .. } | Error::CounterRegression { .. } => {
                SuggestedAction::Skip
            }
            Error::InvalidWindow { .. } => SuggestedAction::FixInput,
            Error::DegenerateDistribution { .. } => SuggestedAction::RunCheck,
            Error::InvalidParameter { .. } => SuggestedAction::Abort,
            Error::StoreCorrupted { .. } => SuggestedAction::ManualIntervention,
            Error::Io(_) => SuggestedAction::Retry,
            Error::Json(_) => SuggestedAction::ManualIntervention,
        }
    }

    /// Returns a human-readable remediation hint.
    pub fn remediation(&self) -> &'static str {
        match self {
            Error::Config(_) => {
                "Run 'tally config validate' to check the configuration, or remove it to use built-in defaults."
            }
            Error::InvalidConfig { .. } => {
                "Correct the named field in tally.json and re-run 'tally config validate'."
            }
            Error::InvalidInterval { .. } => {
                "Remove duplicate snapshots or correct their timestamps, then re-run 'tally allocate'."
            }
            Error::CounterRegression { .. } => {
                "The cumulative counter went backwards (deletion or source reset). The interval is excluded from daily totals."
            }
            Error::InvalidWindow { .. } => {
                "Check the forecast window in tally.json and the observation time passed with '--at'."
            }
            Error::DegenerateDistribution { .. } => {
                "The forecast lies far outside every band. Widen the band set or increase the bucket spread."
            }
            Error::InvalidParameter { .. } => {
                "Internal parameter out of range. Report as a bug with the config and snapshot log attached."
            }
            Error::StoreCorrupted { .. } => {
                "Restore the store file from backup, or move it aside and rebuild with 'tally allocate'."
            }
            Error::Io(_) => {
                "Check disk space, permissions, and that the data directory exists. Retry the operation."
            }
            Error::Json(_) => {
                "Invalid JSON in file. Check syntax with 'jq . <file>' or restore from backup."
            }
        }
    }

    /// Returns a short headline for human-readable output.
    pub fn headline(&self) -> &'static str {
        match self {
            Error::Config(_) => "Configuration Error",
            Error::InvalidConfig { .. } => "Invalid Configuration",
            Error::InvalidInterval { .. } => "Invalid Interval",
            Error::CounterRegression { .. } => "Counter Regression",
            Error::InvalidWindow { .. } => "Invalid Forecast Window",
            Error::DegenerateDistribution { .. } => "Degenerate Distribution",
            Error::InvalidParameter { .. } => "Invalid Parameter",
            Error::StoreCorrupted { .. } => "Record Store Corrupted",
            Error::Io(_) => "I/O Error",
            Error::Json(_) => "JSON Parse Error",
        }
    }
}

/// Structured error response for JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// Stable error code.
    pub code: u32,

    /// Error category for grouping.
    pub category: ErrorCategory,

    /// Human-readable error message.
    pub message: String,

    /// Whether the error is potentially recoverable.
    pub recoverable: bool,

    /// Suggested action for agents.
    pub suggested_action: SuggestedAction,

    /// Additional structured context (interval bounds, parameters).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,
}

impl From<&Error> for StructuredError {
    fn from(err: &Error) -> Self {
        let mut context = HashMap::new();

        match err {
            Error::InvalidConfig { field, .. } => {
                context.insert("field".to_string(), serde_json::json!(field));
            }
            Error::InvalidInterval { start, end } => {
                context.insert("start".to_string(), serde_json::json!(start));
                context.insert("end".to_string(), serde_json::json!(end));
            }
            Error::CounterRegression {
                start,
                end,
                from,
                to,
            } => {
                context.insert("start".to_string(), serde_json::json!(start));
                context.insert("end".to_string(), serde_json::json!(end));
                context.insert("from".to_string(), serde_json::json!(from));
                context.insert("to".to_string(), serde_json::json!(to));
            }
            Error::InvalidWindow {
                elapsed_hours,
                total_hours,
            } => {
                context.insert("elapsed_hours".to_string(), serde_json::json!(elapsed_hours));
                context.insert("total_hours".to_string(), serde_json::json!(total_hours));
            }
            Error::DegenerateDistribution { mean, std_dev } => {
                context.insert("mean".to_string(), serde_json::json!(mean));
                context.insert("std_dev".to_string(), serde_json::json!(std_dev));
            }
            Error::InvalidParameter { name, .. } => {
                context.insert("parameter".to_string(), serde_json::json!(name));
            }
            Error::StoreCorrupted { path, .. } => {
                context.insert("path".to_string(), serde_json::json!(path));
            }
            _ => {}
        }

        StructuredError {
            code: err.code(),
            category: err.category(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
            suggested_action: err.suggested_action(),
            context,
        }
    }
}

impl StructuredError {
    /// Add additional context to the error.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"code":{},"error":"serialization_failed"}}"#, self.code)
        })
    }
}

/// Format an error for human-readable stderr output.
///
/// ```text
/// ✗ [Headline]
///   Reason: [Error message]
///   Fix: [Remediation hint]
/// ```
pub fn format_error_human(err: &Error, use_color: bool) -> String {
    let (red, cyan, reset) = if use_color {
        ("\x1b[31m", "\x1b[36m", "\x1b[0m")
    } else {
        ("", "", "")
    };

    format!(
        "{red}✗{reset} {headline}\n  Reason: {message}\n  {cyan}Fix:{reset} {remediation}",
        headline = err.headline(),
        message = err,
        remediation = err.remediation()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 5, h, 0, 0).unwrap()
    }

    #[test]
    fn test_error_code() {
        assert_eq!(Error::Config("x".into()).code(), 10);
        assert_eq!(
            Error::InvalidInterval {
                start: ts(1),
                end: ts(1)
            }
            .code(),
            20
        );
        assert_eq!(
            Error::DegenerateDistribution {
                mean: 1e6,
                std_dev: 1.0
            }
            .code(),
            31
        );
    }

    #[test]
    fn test_error_category() {
        let regression = Error::CounterRegression {
            start: ts(1),
            end: ts(2),
            from: 10,
            to: 8,
        };
        assert_eq!(regression.category(), ErrorCategory::Allocation);
        assert_eq!(regression.suggested_action(), SuggestedAction::Skip);

        let window = Error::InvalidWindow {
            elapsed_hours: -1.0,
            total_hours: 48.0,
        };
        assert_eq!(window.category(), ErrorCategory::Forecast);
    }

    #[test]
    fn test_structured_error_context() {
        let err = Error::CounterRegression {
            start: ts(1),
            end: ts(2),
            from: 10,
            to: 8,
        };
        let structured = StructuredError::from(&err);
        assert_eq!(structured.code, 21);
        assert!(structured.recoverable);
        assert_eq!(structured.context.get("from"), Some(&serde_json::json!(10)));
        assert_eq!(structured.context.get("to"), Some(&serde_json::json!(8)));

        let json = structured.to_json();
        assert!(json.contains("\"category\":\"allocation\""));
        assert!(json.contains("\"suggested_action\":\"skip\""));
    }

    #[test]
    fn test_with_context() {
        let err = Error::Config("missing window".into());
        let structured = StructuredError::from(&err).with_context("path", "/tmp/tally.json");
        assert_eq!(
            structured.context.get("path"),
            Some(&serde_json::json!("/tmp/tally.json"))
        );
    }

    #[test]
    fn test_format_error_human_plain() {
        let err = Error::InvalidWindow {
            elapsed_hours: -2.0,
            total_hours: 48.0,
        };
        let out = format_error_human(&err, false);
        assert!(out.starts_with("✗ Invalid Forecast Window"));
        assert!(out.contains("Reason: invalid forecast window"));
        assert!(out.contains("Fix: Check the forecast window"));
        assert!(!out.contains("\x1b["));
    }
}
