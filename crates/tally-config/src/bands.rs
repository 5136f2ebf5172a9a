//! Outcome bands: contiguous integer ranges a final count can land in.

use serde::{Deserialize, Serialize};

use crate::validate::ValidationError;

/// Recommendation confidence attached to a band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Confidence::Low => write!(f, "low"),
            Confidence::Medium => write!(f, "medium"),
            Confidence::High => write!(f, "high"),
        }
    }
}

/// One outcome band. Bounds are inclusive; `upper = None` is open-ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub label: String,
    pub lower: u64,
    #[serde(default)]
    pub upper: Option<u64>,
    /// Baseline confidence when this band is the primary recommendation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Confidence>,
}

impl Band {
    pub fn new(label: impl Into<String>, lower: u64, upper: Option<u64>) -> Self {
        Band {
            label: label.into(),
            lower,
            upper,
            confidence: None,
        }
    }

    pub fn with_confidence(mut self, confidence: Confidence) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Build a band from its market label: `"<40"`, `"40-64"` or `"240+"`.
    pub fn from_label(label: &str) -> Result<Self, ValidationError> {
        let (lower, upper) = parse_label(label).ok_or_else(|| ValidationError::InvalidValue {
            field: "bands.label".to_string(),
            message: format!("cannot parse band label {label:?}"),
        })?;
        Ok(Band::new(label, lower, upper))
    }

    pub fn is_open(&self) -> bool {
        self.upper.is_none()
    }

    pub fn contains(&self, count: u64) -> bool {
        count >= self.lower && self.upper.map_or(true, |u| count <= u)
    }

    pub fn confidence_or_default(&self) -> Confidence {
        self.confidence.unwrap_or(Confidence::Medium)
    }
}

/// Parse a band label into inclusive `(lower, upper)` bounds.
pub fn parse_label(label: &str) -> Option<(u64, Option<u64>)> {
    let label = label.trim();
    if let Some(rest) = label.strip_prefix('<') {
        let bound: u64 = rest.trim().parse().ok()?;
        return bound.checked_sub(1).map(|u| (0, Some(u)));
    }
    if let Some(rest) = label.strip_suffix('+') {
        return rest.trim().parse().ok().map(|l| (l, None));
    }
    let (lo, hi) = label.split_once('-')?;
    let lo: u64 = lo.trim().parse().ok()?;
    let hi: u64 = hi.trim().parse().ok()?;
    (lo <= hi).then_some((lo, Some(hi)))
}

/// The ten default bands with their baseline confidences.
pub fn default_bands() -> Vec<Band> {
    use Confidence::*;
    [
        ("<40", 0, Some(39), Medium),
        ("40-64", 40, Some(64), High),
        ("65-89", 65, Some(89), High),
        ("90-114", 90, Some(114), High),
        ("115-139", 115, Some(139), Medium),
        ("140-164", 140, Some(164), Medium),
        ("165-189", 165, Some(189), Medium),
        ("190-214", 190, Some(214), Low),
        ("215-239", 215, Some(239), Low),
        ("240+", 240, None, Low),
    ]
    .into_iter()
    .map(|(label, lower, upper, conf)| Band::new(label, lower, upper).with_confidence(conf))
    .collect()
}
