//! Logging for the `tally` binary and the engine.
//!
//! stdout carries command payloads only; every log line goes to stderr,
//! either as plain text or as JSONL (see [`layer`]). Each run gets a
//! [`LogContext`] keyed by its run id; pipeline stages run inside
//! [`LogContext::stage`] spans and named events go through [`log_event!`].
//!
//! ```ignore
//! let config = LogConfig::from_env(LogLevel::from_flags(quiet, verbose), None);
//! init_logging(&config);
//! let ctx = LogContext::new(run_id.as_str());
//! let _stage = ctx.stage(Stage::Forecast).entered();
//! log_event!(ctx, DEBUG, event_names::FORECAST_COMPUTED, Stage::Forecast, "forecast computed");
//! ```

pub mod config;
pub mod events;
pub mod layer;

pub use config::{LogConfig, LogFormat, LogLevel};
pub use events::{event_names, Level, LogContext, Stage};
pub use layer::JsonlLayer;

use std::io::IsTerminal;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber. Later calls are no-ops.
pub fn init_logging(config: &LogConfig) {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from(config.level).into())
        .parse_lossy("");

    let registry = tracing_subscriber::registry().with(filter);
    let _ = match config.format {
        LogFormat::Human => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .without_time()
                    .with_ansi(std::io::stderr().is_terminal()),
            )
            .try_init(),
        LogFormat::Jsonl => registry.with(JsonlLayer::stderr()).try_init(),
    };
}

/// Emit a named event for one stage of a run.
///
/// The level is one of `TRACE`, `DEBUG`, `INFO`, `WARN`, `ERROR`; the event
/// name becomes the tracing target. Extra fields take plain expressions, so
/// format strings and timestamps into a local first.
///
/// ```ignore
/// log_event!(ctx, WARN, event_names::ALLOCATE_REGRESSION, Stage::Allocate,
///     "counter regression excluded from allocation", from = 130u64, to = 120u64);
/// ```
#[macro_export]
macro_rules! log_event {
    ($ctx:expr, $level:ident, $event:expr, $stage:expr, $msg:expr $(, $key:ident = $val:expr)* $(,)?) => {
        tracing::event!(
            target: $event,
            tracing::Level::$level,
            run_id = %$ctx.run_id,
            stage = %$stage,
            message = $msg,
            $($key = $val,)*
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_quiet_human_output() {
        let config = LogConfig::default();
        assert_eq!(config.format, LogFormat::Human);
        assert_eq!(config.level, LogLevel::Warn);
    }

    #[test]
    fn tracing_levels_map_one_to_one() {
        assert_eq!(Level::from(tracing::Level::INFO), Level::Info);
        assert_eq!(Level::from(tracing::Level::WARN), Level::Warn);
        assert_eq!(Level::from(tracing::Level::TRACE), Level::Trace);
    }

    #[test]
    fn init_twice_is_harmless() {
        init_logging(&LogConfig::default());
        init_logging(&LogConfig::resolve(None, Some(LogFormat::Jsonl), None, None));
    }
}
