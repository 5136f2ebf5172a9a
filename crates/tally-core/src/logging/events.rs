//! Pipeline stages, event names and the per-run logging context.

use serde::{Deserialize, Serialize};
use tracing::Span;

/// Severity as written to JSONL output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Level::Trace,
            tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::ERROR => Level::Error,
        }
    }
}

/// Stages of a tally run, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Startup and configuration.
    Init,
    /// Snapshot intake.
    Record,
    /// Snapshot-to-day allocation and merge.
    Allocate,
    /// Rate blending and count distribution.
    Forecast,
    /// Band probability mapping.
    Buckets,
    Trend,
    Recommend,
    /// Store reads and writes.
    Persist,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Init => "init",
            Stage::Record => "record",
            Stage::Allocate => "allocate",
            Stage::Forecast => "forecast",
            Stage::Buckets => "buckets",
            Stage::Trend => "trend",
            Stage::Recommend => "recommend",
            Stage::Persist => "persist",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable event names; the JSONL `event` key.
pub mod event_names {
    pub const RUN_STARTED: &str = "run.started";
    pub const RUN_FINISHED: &str = "run.finished";

    pub const RECORD_APPENDED: &str = "record.appended";
    pub const RECORD_UNCHANGED: &str = "record.unchanged";

    pub const ALLOCATE_STARTED: &str = "allocate.started";
    pub const ALLOCATE_REGRESSION: &str = "allocate.regression";
    pub const ALLOCATE_INVALID_INTERVAL: &str = "allocate.invalid_interval";
    pub const ALLOCATE_MERGED: &str = "allocate.merged";

    pub const FORECAST_COMPUTED: &str = "forecast.computed";
    pub const FORECAST_WINDOW_CLOSED: &str = "forecast.window_closed";
    pub const BUCKETS_MAPPED: &str = "buckets.mapped";
    pub const BUCKETS_DEGENERATE: &str = "buckets.degenerate";
    pub const TREND_COMPUTED: &str = "trend.computed";
    pub const TREND_INSUFFICIENT: &str = "trend.insufficient";
    pub const RECOMMEND_ISSUED: &str = "recommend.issued";

    pub const HISTORY_APPENDED: &str = "history.appended";
    pub const STORE_WRITTEN: &str = "store.written";

    pub const CONFIG_LOADED: &str = "config.loaded";
    pub const CONFIG_DEFAULT_USED: &str = "config.default_used";
    pub const CONFIG_ERROR: &str = "config.error";

    pub const INTERNAL_ERROR: &str = "internal_error";
}

/// Correlates every line of one run.
///
/// Events logged with [`log_event!`](crate::log_event) carry the run id and
/// stage directly. Code that logs with bare `tracing` macros (the allocator)
/// picks both up from the span opened by [`LogContext::stage`].
#[derive(Debug, Clone)]
pub struct LogContext {
    pub run_id: String,
    config_hash: Option<String>,
}

impl LogContext {
    pub fn new(run_id: impl Into<String>) -> Self {
        LogContext {
            run_id: run_id.into(),
            config_hash: None,
        }
    }

    /// Attach the hash of the configuration in use to every stage span.
    pub fn with_config_hash(mut self, hash: Option<String>) -> Self {
        self.config_hash = hash;
        self
    }

    pub fn config_hash(&self) -> Option<&str> {
        self.config_hash.as_deref()
    }

    /// Span covering one pipeline stage of this run.
    ///
    /// Error level, so the span stays enabled under any filter that lets an
    /// event through.
    pub fn stage(&self, stage: Stage) -> Span {
        tracing::error_span!(
            "stage",
            run_id = self.run_id.as_str(),
            stage = stage.as_str(),
            config_hash = self.config_hash.as_deref(),
        )
    }
}
