//! Fuzz target for /proc/meminfo parsing.

#![no_main]

use libfuzzer_sys::fuzz_target;
use sf_core::resolvers::memory::parse_meminfo_content;

fuzz_target!(|data: &str| {
    let _ = parse_meminfo_content(data);
});
