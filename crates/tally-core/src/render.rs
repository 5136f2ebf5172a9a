//! Markdown and one-line renderings of command payloads.
//!
//! JSON output is plain `serde_json`; these cover `--format md` and
//! `--format summary`.

use std::fmt::Write;

use crate::allocate::{AllocationAnomaly, AllocationReport};
use crate::daily_stats::{DailySummary, Momentum};
use crate::model::DailyRecord;
use crate::result::{ForecastOutcome, ForecastResult};
use crate::store::MergeSummary;
use crate::trend::TrendReport;

fn pct(p: f64) -> String {
    format!("{:.1}%", p * 100.0)
}

pub fn forecast_summary(outcome: &ForecastOutcome) -> String {
    match outcome {
        ForecastOutcome::Closed(closed) => {
            format!("forecast: window closed, final count {}", closed.final_count)
        }
        ForecastOutcome::Open(r) => format!(
            "[{}] forecast: {} ({:.0}% complete) -> {} [{}-{}], {} ({} confidence)",
            r.run_id,
            r.current_count,
            r.progress_pct,
            r.point_estimates.conservative,
            r.interval_80.lower,
            r.interval_80.upper,
            r.recommendation.primary,
            r.recommendation.confidence,
        ),
    }
}

pub fn forecast_md(outcome: &ForecastOutcome) -> String {
    let r = match outcome {
        ForecastOutcome::Closed(closed) => {
            return format!(
                "# tally forecast\n\nWindow closed {:.1}h ago. Final count: **{}**\n",
                -closed.remaining_hours, closed.final_count
            );
        }
        ForecastOutcome::Open(r) => r,
    };

    let mut out = String::new();
    let _ = writeln!(out, "# tally forecast\n");
    let _ = writeln!(
        out,
        "Count **{}** after {:.1}h ({:.1}% complete, {:.1}h remaining)\n",
        r.current_count, r.elapsed_hours, r.progress_pct, r.remaining_hours
    );

    let _ = writeln!(out, "## Rates\n");
    let _ = writeln!(out, "- observed: {:.3}/h ({:.0}/day)", r.lambda_observed, r.daily_rate);
    let _ = writeln!(out, "- prior: {:.3}/h", r.lambda_prior);
    let _ = writeln!(
        out,
        "- combined: {:.3}/h (observed weight {:.2}, {} model)\n",
        r.lambda_combined, r.blend_weight, r.model
    );

    let p = &r.point_estimates;
    let _ = writeln!(out, "## Estimates\n");
    let _ = writeln!(out, "- linear: {}", p.linear);
    let _ = writeln!(out, "- conservative: {}", p.conservative);
    if r.weekend_hours > 0 {
        let _ = writeln!(out, "- weekend ({}h): {}", r.weekend_hours, p.weekend);
    }
    let _ = writeln!(out, "- distribution mean: {:.1}", p.distribution_mean);
    let _ = writeln!(out, "- 80%: {}-{}", r.interval_80.lower, r.interval_80.upper);
    let _ = writeln!(out, "- 90%: {}-{}\n", r.interval_90.lower, r.interval_90.upper);

    match &r.buckets {
        Some(buckets) => {
            let _ = writeln!(out, "## Bands (σ = {:.1})\n", buckets.std_dev);
            let _ = writeln!(out, "| band | probability |");
            let _ = writeln!(out, "|------|-------------|");
            for band in &buckets.bands {
                let _ = writeln!(out, "| {} | {} |", band.label, pct(band.probability));
            }
            let _ = writeln!(out);
        }
        None => {
            let _ = writeln!(out, "_No band distribution: the spread put no mass on any band._\n");
        }
    }

    let _ = writeln!(out, "## Trend\n");
    let _ = writeln!(out, "{}\n", trend_line(&r.trend));

    let rec = &r.recommendation;
    let _ = writeln!(out, "## Recommendation\n");
    let _ = write!(out, "- primary: **{}**", rec.primary);
    if let Some(p) = rec.primary_probability {
        let _ = write!(out, " ({})", pct(p));
    }
    let _ = writeln!(out, ", {} confidence", rec.confidence);
    if !rec.secondary.is_empty() {
        let _ = writeln!(out, "- secondary: {}", rec.secondary.join(", "));
    }
    if !rec.avoid.is_empty() {
        let _ = writeln!(out, "- avoid: {}", rec.avoid.join(", "));
    }
    let g = &rec.guidance;
    let _ = write!(out, "- stage: {} ({}", g.stage, g.action);
    if let Some(budget) = g.budget_pct {
        let _ = write!(out, ", {budget}% budget");
    }
    let _ = writeln!(
        out,
        "), next check in {}-{}h\n",
        g.next_check_hours.0, g.next_check_hours.1
    );
    for reason in &rec.reasons {
        let _ = writeln!(out, "- {reason}");
    }

    let _ = writeln!(out, "\nRun: {}", r.run_id);
    if let Some(hash) = &r.config_hash {
        let _ = writeln!(out, "Config: {}", hash.get(..12).unwrap_or(hash));
    }
    out
}

fn trend_line(trend: &TrendReport) -> String {
    match trend {
        TrendReport::Insufficient { samples } => {
            format!("insufficient history ({samples} prior forecast(s))")
        }
        TrendReport::Trend(stats) => format!(
            "{} (slope {:+.2}/forecast), {} (CV {:.1}%), mean {:.1} over {}",
            stats.direction,
            stats.slope,
            stats.volatility,
            stats.cv_pct,
            stats.mean,
            stats.values.len()
        ),
    }
}

pub fn trend_summary(trend: &TrendReport) -> String {
    format!("trend: {}", trend_line(trend))
}

pub fn trend_md(trend: &TrendReport) -> String {
    let mut out = format!("# tally trend\n\n{}\n", trend_line(trend));
    if let TrendReport::Trend(stats) = trend {
        let values: Vec<String> = stats.values.iter().map(u64::to_string).collect();
        let _ = writeln!(out, "\nConservative estimates: {}", values.join(" → "));
    }
    out
}

fn anomaly_line(anomaly: &AllocationAnomaly) -> String {
    match anomaly {
        AllocationAnomaly::CounterRegression {
            start,
            end,
            from,
            to,
        } => format!("counter regression {from} -> {to} between {start} and {end}"),
        AllocationAnomaly::InvalidInterval { start, end } => {
            format!("non-positive interval {start} -> {end}")
        }
    }
}

pub fn allocation_summary(report: &AllocationReport, merge: &MergeSummary) -> String {
    format!(
        "allocate: {} interval(s), {} allocated over {} day(s), {} skipped; {} created, {} updated, {} preserved",
        report.intervals.len(),
        report.total_allocated(),
        report.increments.len(),
        report.skipped(),
        merge.created(),
        merge.updated() + merge.overwritten(),
        merge.preserved(),
    )
}

pub fn allocation_md(report: &AllocationReport, merge: &MergeSummary) -> String {
    let mut out = String::from("# tally allocate\n\n");
    let _ = writeln!(out, "| date | increment |");
    let _ = writeln!(out, "|------|-----------|");
    for (date, count) in &report.increments {
        let _ = writeln!(out, "| {date} | {count} |");
    }
    let _ = writeln!(
        out,
        "\n{} interval(s), {} allocated",
        report.intervals.len(),
        report.total_allocated()
    );
    if !report.anomalies.is_empty() {
        let _ = writeln!(out, "\n## Skipped\n");
        for anomaly in &report.anomalies {
            let _ = writeln!(out, "- {}", anomaly_line(anomaly));
        }
    }
    let _ = writeln!(
        out,
        "\nMerged: {} created, {} updated, {} captured preserved, {} captured overwritten",
        merge.created(),
        merge.updated(),
        merge.preserved(),
        merge.overwritten()
    );
    out
}

fn momentum_line(momentum: &Momentum) -> String {
    match momentum {
        Momentum::Insufficient { days } => format!("insufficient ({days} day(s))"),
        Momentum::Measured {
            direction,
            recent_mean,
            previous_mean,
        } => format!(
            "{} (last 3 days {:.1}/day vs {:.1}/day before)",
            direction,
            recent_mean,
            previous_mean
        ),
    }
}

pub fn daily_summary(summary: Option<&DailySummary>, momentum: &Momentum) -> String {
    match summary {
        None => "daily: no records".to_string(),
        Some(s) => format!(
            "daily: {} day(s), total {}, mean {:.1}/day, momentum {}",
            s.days,
            s.total,
            s.mean,
            momentum_line(momentum)
        ),
    }
}

pub fn daily_md(
    records: &[DailyRecord],
    summary: Option<&DailySummary>,
    momentum: &Momentum,
) -> String {
    let mut out = String::from("# tally daily\n\n");
    let Some(s) = summary else {
        out.push_str("No daily records yet.\n");
        return out;
    };

    let _ = writeln!(out, "| date | count | kind |");
    let _ = writeln!(out, "|------|-------|------|");
    for r in records {
        let kind = if r.is_calculated { "calculated" } else { "captured" };
        let _ = writeln!(out, "| {} | {} | {} |", r.date, r.count, kind);
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "- days: {}", s.days);
    let _ = writeln!(out, "- total: {}", s.total);
    let _ = writeln!(out, "- mean: {:.1}/day", s.mean);
    let _ = writeln!(out, "- max: {} on {}", s.max.count, s.max.date);
    let _ = writeln!(out, "- min: {} on {}", s.min.count, s.min.date);
    let _ = writeln!(out, "- last 7 days: {:.1}/day", s.recent_week_mean);
    if let Some(today) = s.today_count {
        let _ = write!(out, "- today: {today}");
        if let Some(vs) = s.today_vs_mean_pct {
            let _ = write!(out, " ({vs:+.0}% vs mean)");
        }
        let _ = writeln!(out);
    }
    let _ = writeln!(out, "- momentum: {}", momentum_line(momentum));
    out
}

pub fn history_summary(entries: &[ForecastResult]) -> String {
    match entries.last() {
        None => "history: empty".to_string(),
        Some(last) => format!(
            "history: {} forecast(s), latest {} -> {} at {}",
            entries.len(),
            last.current_count,
            last.point_estimates.conservative,
            last.timestamp.to_rfc3339()
        ),
    }
}

pub fn history_md(entries: &[ForecastResult]) -> String {
    let mut out = String::from("# tally history\n\n");
    if entries.is_empty() {
        out.push_str("No forecasts recorded.\n");
        return out;
    }
    let _ = writeln!(out, "| time | count | progress | conservative | 80% | primary |");
    let _ = writeln!(out, "|------|-------|----------|--------------|-----|---------|");
    for r in entries {
        let _ = writeln!(
            out,
            "| {} | {} | {:.1}% | {} | {}-{} | {} |",
            r.timestamp.format("%Y-%m-%d %H:%M"),
            r.current_count,
            r.progress_pct,
            r.point_estimates.conservative,
            r.interval_80.lower,
            r.interval_80.upper,
            r.recommendation.primary
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ForecastEngine;
    use crate::forecast::ClosedWindow;
    use tally_common::RunId;
    use tally_config::ForecastConfig;

    fn midpoint() -> ForecastOutcome {
        let engine = ForecastEngine::new(&ForecastConfig::builtin());
        let now = "2026-02-06T12:00:00-05:00".parse().unwrap();
        engine.forecast_at(100, now, &[], &RunId::new()).unwrap()
    }

    #[test]
    fn summary_names_primary_band() {
        let line = forecast_summary(&midpoint());
        assert!(line.contains("-> 190"));
        assert!(line.contains("190-214"));
        assert!(!line.contains('\n'));
    }

    #[test]
    fn markdown_lists_every_band() {
        let md = forecast_md(&midpoint());
        for label in ForecastConfig::builtin().band_labels() {
            assert!(md.contains(&format!("| {label} |")), "missing {label}");
        }
        assert!(md.contains("insufficient history"));
    }

    #[test]
    fn closed_window_renders_final_count() {
        let outcome = ForecastOutcome::Closed(ClosedWindow {
            final_count: 250,
            elapsed_hours: 50.0,
            remaining_hours: -2.0,
        });
        assert!(forecast_md(&outcome).contains("**250**"));
        assert!(forecast_summary(&outcome).contains("250"));
    }

    #[test]
    fn empty_daily_has_placeholder() {
        let momentum = Momentum::Insufficient { days: 0 };
        assert!(daily_md(&[], None, &momentum).contains("No daily records"));
        assert_eq!(daily_summary(None, &momentum), "daily: no records");
    }
}
