//! Core math modules.

pub mod beta;
pub mod count;
pub mod gamma;
pub mod negbinom;
pub mod normal;
pub mod poisson;
pub mod stable;
pub mod stats;
