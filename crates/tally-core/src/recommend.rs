//! Band recommendation from a forecast, its buckets and the recent trend.

use serde::{Deserialize, Serialize};
use tally_common::{Error, Result};
use tally_config::{Band, Confidence, ForecastConfig};

use crate::buckets::BucketDistribution;
use crate::forecast::RateForecast;
use crate::trend::TrendReport;

/// Bands at least this far from the primary are avoided first.
const AVOID_DISTANCE: usize = 3;
/// Fallback distance when nothing is that far on the chosen side.
const AVOID_DISTANCE_NEAR: usize = 2;

/// How far through the window we are, and what that allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStage {
    /// Below 20%: hold and gather data.
    Early,
    /// 20-50%: small probe position.
    Probe,
    /// 50-80%: main position.
    Commit,
    /// 80% and above: final adjustment.
    Final,
}

impl CompletionStage {
    pub fn from_progress(progress_pct: f64) -> Self {
        if progress_pct < 20.0 {
            CompletionStage::Early
        } else if progress_pct < 50.0 {
            CompletionStage::Probe
        } else if progress_pct < 80.0 {
            CompletionStage::Commit
        } else {
            CompletionStage::Final
        }
    }

    /// Share of the budget this stage puts to work, if any.
    pub fn budget_pct(self) -> Option<u8> {
        match self {
            CompletionStage::Early | CompletionStage::Final => None,
            CompletionStage::Probe => Some(25),
            CompletionStage::Commit => Some(50),
        }
    }

    /// Suggested delay before the next check, in hours.
    pub fn next_check_hours(self) -> (u32, u32) {
        match self {
            CompletionStage::Early | CompletionStage::Final => (6, 12),
            CompletionStage::Probe | CompletionStage::Commit => (12, 24),
        }
    }

    fn action(self) -> &'static str {
        match self {
            CompletionStage::Early => "hold: wait for more data",
            CompletionStage::Probe => "small position on the primary band",
            CompletionStage::Commit => "increase position, more if the trend is stable",
            CompletionStage::Final => "final adjustment before close",
        }
    }

    fn reason(self, progress_pct: f64) -> String {
        match self {
            CompletionStage::Early => {
                format!("only {progress_pct:.0}% complete, wait for more data")
            }
            CompletionStage::Probe => {
                format!("{progress_pct:.0}% complete, probe with a small stake (25% budget)")
            }
            CompletionStage::Commit => {
                format!("{progress_pct:.0}% complete, best entry point (50% budget)")
            }
            CompletionStage::Final => {
                format!("{progress_pct:.0}% complete, last chance to adjust")
            }
        }
    }
}

impl std::fmt::Display for CompletionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompletionStage::Early => write!(f, "early"),
            CompletionStage::Probe => write!(f, "probe"),
            CompletionStage::Commit => write!(f, "commit"),
            CompletionStage::Final => write!(f, "final"),
        }
    }
}

/// Staged-action guidance attached to a recommendation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageGuidance {
    pub stage: CompletionStage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget_pct: Option<u8>,
    pub next_check_hours: (u32, u32),
    pub action: String,
}

impl StageGuidance {
    pub fn for_progress(progress_pct: f64) -> Self {
        let stage = CompletionStage::from_progress(progress_pct);
        StageGuidance {
            stage,
            budget_pct: stage.budget_pct(),
            next_check_hours: stage.next_check_hours(),
            action: stage.action().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// Band containing the conservative estimate.
    pub primary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_probability: Option<f64>,
    /// Bands adjacent to the primary.
    pub secondary: Vec<String>,
    /// Far bands on the side the trend points away from.
    pub avoid: Vec<String>,
    pub confidence: Confidence,
    /// Ordered, human-readable; not used in any computation.
    pub reasons: Vec<String>,
    pub guidance: StageGuidance,
}

/// Composes bands, buckets, trend and progress into a [`Recommendation`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecommendationEngine {
    bands: Vec<Band>,
}

enum Side {
    Low,
    High,
}

impl RecommendationEngine {
    pub fn new(bands: Vec<Band>) -> Self {
        RecommendationEngine { bands }
    }

    pub fn from_config(config: &ForecastConfig) -> Self {
        RecommendationEngine::new(config.bands.clone())
    }

    pub fn recommend(
        &self,
        forecast: &RateForecast,
        buckets: Option<&BucketDistribution>,
        trend: &TrendReport,
    ) -> Result<Recommendation> {
        let value = forecast.predicted_conservative;
        let i = self
            .bands
            .iter()
            .position(|b| b.contains(value))
            .ok_or_else(|| Error::InvalidParameter {
                name: "bands".to_string(),
                message: format!("no band contains {value}"),
            })?;
        let primary = &self.bands[i];

        let secondary = [i.checked_sub(1), Some(i + 1)]
            .into_iter()
            .flatten()
            .filter_map(|j| self.bands.get(j))
            .map(|b| b.label.clone())
            .collect();

        let direction = trend.direction();
        let side = match direction {
            Some(d) if d.is_up() => Side::Low,
            Some(d) if d.is_down() => Side::High,
            _ if i < 2 => Side::High,
            _ => Side::Low,
        };
        let avoid = self.avoid(i, side);

        let mut reasons = vec![if primary.is_open() {
            format!(
                "conservative estimate {value} is in the open-ended band {}, high risk",
                primary.label
            )
        } else {
            format!("conservative estimate {value} falls in {}", primary.label)
        }];

        let mut confidence = primary.confidence_or_default();
        match direction {
            Some(d) if d.is_up() => {
                reasons.push("forecasts trending up, consider higher bands".to_string())
            }
            Some(d) if d.is_down() => {
                reasons.push("forecasts trending down, consider lower bands".to_string())
            }
            _ if trend.is_stable() => {
                confidence = Confidence::High;
                reasons.push("forecasts stable, confidence high".to_string());
            }
            None => reasons.push("not enough forecast history for a trend".to_string()),
            Some(_) => {}
        }

        let guidance = StageGuidance::for_progress(forecast.progress_pct);
        reasons.push(guidance.stage.reason(forecast.progress_pct));

        Ok(Recommendation {
            primary: primary.label.clone(),
            primary_probability: buckets.and_then(|b| b.probability_of(&primary.label)),
            secondary,
            avoid,
            confidence,
            reasons,
            guidance,
        })
    }

    /// Bands on `side` at distance ≥ 3 from `i`, else ≥ 2; if that side has
    /// none, the other side is tried.
    fn avoid(&self, i: usize, side: Side) -> Vec<String> {
        let pick = |side: &Side, distance: usize| -> Vec<String> {
            let range = match side {
                Side::Low => 0..i.saturating_sub(distance - 1),
                Side::High => (i + distance).min(self.bands.len())..self.bands.len(),
            };
            self.bands[range].iter().map(|b| b.label.clone()).collect()
        };
        let other = match side {
            Side::Low => Side::High,
            Side::High => Side::Low,
        };
        for s in [&side, &other] {
            for distance in [AVOID_DISTANCE, AVOID_DISTANCE_NEAR] {
                let bands = pick(s, distance);
                if !bands.is_empty() {
                    return bands;
                }
            }
        }
        Vec::new()
    }
}
