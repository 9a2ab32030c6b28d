//! Fuzz target for `blkid` output parsing.
//!
//! Tests that `parse_blkid_output` handles arbitrary input without panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use sf_core::resolvers::blkid::parse_blkid_output;

fuzz_target!(|data: &str| {
    // Malformed lines are skipped, never a panic
    let _ = parse_blkid_output(data);
});
