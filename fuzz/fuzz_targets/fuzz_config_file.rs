//! Fuzz target for sysfacts.json parsing.
//!
//! Tests that config parsing and group construction handle arbitrary input
//! without panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use sf_common::config::ConfigFile;

fuzz_target!(|data: &str| {
    // Parse errors and invalid groups are errors, never panics
    if let Ok(file) = ConfigFile::parse(data) {
        let _ = file.build_groups();
    }
});
