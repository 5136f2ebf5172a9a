//! Tallycast core library
//!
//! Turns a feed of cumulative counter snapshots into per-day counts and a
//! probabilistic forecast of the final count at the close of a fixed window:
//! - Snapshot allocation over reference-zone calendar days
//! - Rate blending and Poisson / negative-binomial projections
//! - Band probabilities, forecast trend and band recommendations
//! - Daily and forecast-history stores for the `tally` binary
//!
//! The binary entry point is in `main.rs`.

pub mod allocate;
pub mod buckets;
pub mod calendar;
pub mod daily_stats;
pub mod engine;
pub mod exit_codes;
pub mod forecast;
pub mod logging;
pub mod model;
pub mod recommend;
pub mod render;
pub mod result;
pub mod store;
pub mod trend;

pub use allocate::{AllocationAnomaly, AllocationReport, SnapshotAllocator};
pub use buckets::{BandProbability, BucketDistribution, BucketMapper};
pub use calendar::ReferenceZone;
pub use engine::ForecastEngine;
pub use forecast::{ForecastInput, Projection, RateForecast, RateForecaster};
pub use model::{DailyRecord, Snapshot};
pub use recommend::{CompletionStage, Recommendation, RecommendationEngine};
pub use result::{ForecastOutcome, ForecastResult};
pub use trend::{TrendAnalyzer, TrendDirection, TrendReport, Volatility};
