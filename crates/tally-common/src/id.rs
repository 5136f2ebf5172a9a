//! Forecast run identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier stamped on each forecast run and its log events.
///
/// Format: `tc-YYYYMMDD-HHMMSS-XXXX`
/// Example: `tc-20260206-120000-a7xq`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub String);

impl RunId {
    /// Generate a new run ID stamped with the current UTC time.
    pub fn new() -> Self {
        Self::at(chrono::Utc::now())
    }

    /// Generate a run ID stamped with `at`; the suffix is still random.
    pub fn at(at: chrono::DateTime<chrono::Utc>) -> Self {
        RunId(format!(
            "tc-{}-{}-{}",
            at.format("%Y%m%d"),
            at.format("%H%M%S"),
            base32_suffix()
        ))
    }

    /// Parse an existing run ID string.
    pub fn parse(s: &str) -> Option<Self> {
        let rest = s.strip_prefix("tc-")?;
        let mut parts = rest.split('-');
        let date = parts.next()?;
        let time = parts.next()?;
        let suffix = parts.next()?;
        if parts.next().is_some() {
            return None;
        }
        if date.len() != 8 || !date.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        if time.len() != 6 || !time.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        if suffix.len() != 4 || !suffix.chars().all(|c| matches!(c, 'a'..='z' | '2'..='7')) {
            return None;
        }
        Some(RunId(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn base32_suffix() -> String {
    let uuid = uuid::Uuid::new_v4();
    let bytes = uuid.as_bytes();
    let value = ((bytes[0] as u32) << 16 | (bytes[1] as u32) << 8 | bytes[2] as u32) & 0x000F_FFFF;
    let alphabet = b"abcdefghijklmnopqrstuvwxyz234567";
    [15_u32, 10, 5, 0]
        .iter()
        .map(|shift| alphabet[((value >> shift) & 0x1F) as usize] as char)
        .collect()
}
