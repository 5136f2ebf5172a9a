//! Fuzz target for snapshot log lines.
//!
//! A corrupted snapshots.jsonl line must surface as a parse error.

#![no_main]

use libfuzzer_sys::fuzz_target;
use tally_core::model::Snapshot;

fuzz_target!(|data: &[u8]| {
    let _ = serde_json::from_slice::<Snapshot>(data);
});
