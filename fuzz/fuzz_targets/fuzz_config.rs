//! Fuzz target for tally.json configuration parsing.
//!
//! Parsing and validation must reject bad input with an error, never a panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use tally_config::{validate_config, ForecastConfig};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(config) = ForecastConfig::from_str(text) {
        let _ = validate_config(&config);
    }
});
