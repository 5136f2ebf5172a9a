//! Schema versioning for persisted records and forecast output.

/// Version stamped into every persisted forecast and store file.
pub const SCHEMA_VERSION: &str = "1.0.0";
