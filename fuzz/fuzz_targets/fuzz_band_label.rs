//! Fuzz target for band label parsing ("<40", "190-214", "240+").

#![no_main]

use libfuzzer_sys::fuzz_target;
use tally_config::bands::parse_label;

fuzz_target!(|label: &str| {
    if let Some((lower, upper)) = parse_label(label) {
        if let Some(upper) = upper {
            assert!(lower <= upper, "inverted band from {label:?}");
        }
    }
});
