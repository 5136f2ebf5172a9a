//! Tallycast math utilities.

pub mod math;

pub use math::beta::*;
pub use math::count::{CountDistribution, Percentiles};
pub use math::gamma::*;
pub use math::negbinom;
pub use math::normal::*;
pub use math::poisson;
pub use math::stable::*;
pub use math::stats;
