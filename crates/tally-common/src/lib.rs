//! Tallycast common types, IDs, and errors.
//!
//! This crate provides foundational types shared across tally-core modules:
//! - Run identifiers for forecast provenance
//! - Schema versioning
//! - The unified error taxonomy
//! - Output format specifications

pub mod error;
pub mod id;
pub mod output;
pub mod schema;

pub use error::{Error, ErrorCategory, Result, StructuredError};
pub use id::RunId;
pub use output::OutputFormat;
pub use schema::SCHEMA_VERSION;
