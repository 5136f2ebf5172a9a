//! Summary statistics over daily records.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tally_math::stats;

use crate::model::DailyRecord;

/// Days compared on each side for momentum.
const MOMENTUM_SPAN: usize = 3;
const MIN_MOMENTUM_DAYS: usize = 4;
const RECENT_WEEK: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayCount {
    pub date: NaiveDate,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub days: usize,
    pub total: u64,
    pub mean: f64,
    pub max: DayCount,
    pub min: DayCount,
    /// Mean of the last seven recorded days.
    pub recent_week_mean: f64,
    pub today_count: Option<u64>,
    /// Today relative to the mean, in percent (`+20.0` is 20% above).
    pub today_vs_mean_pct: Option<f64>,
}

/// Summarize `records`; `None` when there are none.
pub fn summarize_daily(records: &[DailyRecord], today: NaiveDate) -> Option<DailySummary> {
    let mut sorted: Vec<&DailyRecord> = records.iter().collect();
    sorted.sort_by_key(|r| r.date);

    let day = |r: &&DailyRecord| DayCount {
        date: r.date,
        count: r.count,
    };
    // Ties go to the earliest date
    let max = sorted.iter().rev().max_by_key(|r| r.count).map(day)?;
    let min = sorted.iter().rev().min_by_key(|r| r.count).map(day)?;

    let counts: Vec<f64> = sorted.iter().map(|r| r.count as f64).collect();
    let mean = stats::mean(&counts)?;
    let week = &counts[counts.len().saturating_sub(RECENT_WEEK)..];
    let recent_week_mean = stats::mean(week).unwrap_or(mean);

    let today_count = sorted.iter().find(|r| r.date == today).map(|r| r.count);
    let today_vs_mean_pct = today_count
        .filter(|_| mean > 0.0)
        .map(|c| (c as f64 / mean - 1.0) * 100.0);

    Some(DailySummary {
        days: sorted.len(),
        total: sorted.iter().map(|r| r.count).sum(),
        mean,
        max,
        min,
        recent_week_mean,
        today_count,
        today_vs_mean_pct,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MomentumDirection {
    Rising,
    Falling,
    Steady,
}

impl std::fmt::Display for MomentumDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MomentumDirection::Rising => write!(f, "rising"),
            MomentumDirection::Falling => write!(f, "falling"),
            MomentumDirection::Steady => write!(f, "steady"),
        }
    }
}

/// Last three days against the days before them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Momentum {
    Insufficient {
        days: usize,
    },
    Measured {
        direction: MomentumDirection,
        recent_mean: f64,
        previous_mean: f64,
    },
}

/// Compare the mean of the last three days with the three before them (or
/// every earlier day when fewer than six exist). A ±10% change counts.
pub fn recent_momentum(records: &[DailyRecord]) -> Momentum {
    if records.len() < MIN_MOMENTUM_DAYS {
        return Momentum::Insufficient {
            days: records.len(),
        };
    }
    let mut sorted: Vec<&DailyRecord> = records.iter().collect();
    sorted.sort_by_key(|r| r.date);
    let counts: Vec<f64> = sorted.iter().map(|r| r.count as f64).collect();

    let split = counts.len() - MOMENTUM_SPAN;
    let recent = &counts[split..];
    let previous = &counts[split.saturating_sub(MOMENTUM_SPAN)..split];
    let recent_mean = stats::mean(recent).unwrap_or(0.0);
    let previous_mean = stats::mean(previous).unwrap_or(0.0);

    let direction = if recent_mean > previous_mean * 1.1 {
        MomentumDirection::Rising
    } else if recent_mean < previous_mean * 0.9 {
        MomentumDirection::Falling
    } else {
        MomentumDirection::Steady
    };

    Momentum::Measured {
        direction,
        recent_mean,
        previous_mean,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, d).unwrap()
    }

    fn records(counts: &[u64]) -> Vec<DailyRecord> {
        counts
            .iter()
            .enumerate()
            .map(|(i, &c)| DailyRecord::calculated(date(i as u32 + 1), c))
            .collect()
    }

    #[test]
    fn empty_has_no_summary() {
        assert!(summarize_daily(&[], date(1)).is_none());
    }

    #[test]
    fn summary_picks_extremes_and_today() {
        let recs = records(&[40, 80, 60, 80, 20]);
        let s = summarize_daily(&recs, date(5)).unwrap();
        assert_eq!(s.days, 5);
        assert_eq!(s.total, 280);
        assert_eq!(s.mean, 56.0);
        assert_eq!(s.max, DayCount { date: date(2), count: 80 });
        assert_eq!(s.min, DayCount { date: date(5), count: 20 });
        assert_eq!(s.today_count, Some(20));
        let pct = s.today_vs_mean_pct.unwrap();
        assert!((pct - (20.0 / 56.0 - 1.0) * 100.0).abs() < 1e-9);
    }

    #[test]
    fn recent_week_uses_last_seven() {
        let recs = records(&[1000, 10, 10, 10, 10, 10, 10, 10]);
        let s = summarize_daily(&recs, date(20)).unwrap();
        assert_eq!(s.recent_week_mean, 10.0);
        assert_eq!(s.today_count, None);
        assert_eq!(s.today_vs_mean_pct, None);
    }

    #[test]
    fn momentum_needs_four_days() {
        assert_eq!(
            recent_momentum(&records(&[1, 2, 3])),
            Momentum::Insufficient { days: 3 }
        );
    }

    #[test]
    fn momentum_directions() {
        let m = recent_momentum(&records(&[50, 50, 50, 60, 60, 60]));
        assert!(matches!(
            m,
            Momentum::Measured {
                direction: MomentumDirection::Rising,
                ..
            }
        ));
        let m = recent_momentum(&records(&[60, 60, 60, 50, 50, 50]));
        assert!(matches!(
            m,
            Momentum::Measured {
                direction: MomentumDirection::Falling,
                ..
            }
        ));
        let m = recent_momentum(&records(&[50, 52, 50, 51]));
        assert_eq!(
            m,
            Momentum::Measured {
                direction: MomentumDirection::Steady,
                recent_mean: 51.0,
                previous_mean: 50.0,
            }
        );
    }
}
