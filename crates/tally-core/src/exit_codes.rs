//! Exit codes for the `tally` binary.
//!
//! Exit codes communicate the run outcome without requiring output parsing,
//! so a scheduler can branch on them directly.
//!
//! Exit code ranges:
//! - 0-2: Operational outcomes (not errors)
//! - 10-19: User/input errors (recoverable by fixing input or config)
//! - 20-29: Internal errors

use tally_common::Error;

/// Exit codes for tally operations.
///
/// These codes are a stable contract for automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    // ========================================================================
    // Operational Outcomes (0-2)
    // ========================================================================
    /// Success: everything computed
    Clean = 0,

    /// The forecast window has closed; the observed count is final
    WindowClosed = 1,

    /// Completed, but some snapshot intervals were skipped as anomalies
    PartialAnomalies = 2,

    // ========================================================================
    // User / Input Errors (10-19)
    // ========================================================================
    /// Invalid arguments
    ArgsError = 10,

    /// Config missing, malformed, or semantically invalid
    ConfigError = 11,

    /// Input rejected: invalid window, interval or parameter
    InputError = 12,

    // ========================================================================
    // Internal Errors (20-29)
    // ========================================================================
    /// Internal error (bug - please report)
    InternalError = 20,

    /// I/O or store error
    IoError = 21,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Check if this exit code indicates success (code 0).
    pub fn is_success(self) -> bool {
        matches!(self, ExitCode::Clean)
    }

    /// Operational outcomes (codes 0-2) communicate state, not failure.
    pub fn is_operational(self) -> bool {
        (self as i32) < 10
    }

    pub fn is_user_error(self) -> bool {
        (10..20).contains(&(self as i32))
    }

    pub fn is_internal_error(self) -> bool {
        (self as i32) >= 20
    }

    pub fn is_error(self) -> bool {
        (self as i32) >= 10
    }

    /// Stable name for JSON output.
    pub fn code_name(&self) -> &'static str {
        match self {
            ExitCode::Clean => "OK_CLEAN",
            ExitCode::WindowClosed => "OK_WINDOW_CLOSED",
            ExitCode::PartialAnomalies => "OK_PARTIAL_ANOMALIES",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::ConfigError => "ERR_CONFIG",
            ExitCode::InputError => "ERR_INPUT",
            ExitCode::InternalError => "ERR_INTERNAL",
            ExitCode::IoError => "ERR_IO",
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl From<&Error> for ExitCode {
    fn from(err: &Error) -> Self {
        match err {
            Error::Config(_) | Error::InvalidConfig { .. } => ExitCode::ConfigError,
            Error::InvalidInterval { .. }
            | Error::CounterRegression { .. }
            | Error::InvalidWindow { .. }
            | Error::InvalidParameter { .. }
            | Error::DegenerateDistribution { .. } => ExitCode::InputError,
            Error::StoreCorrupted { .. } | Error::Io(_) | Error::Json(_) => ExitCode::IoError,
        }
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}
