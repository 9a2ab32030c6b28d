//! sysfacts Core Library
//!
//! This library provides the core functionality for system fact gathering:
//! - Per-resolver memoization of raw reads
//! - Resolvers for partitions, DMI, OS release, and memory facts
//! - A TTL-governed persistent fact cache
//! - The fact catalog, query handling, and the resolution orchestrator
//! - Output rendering, logging, and exit codes for the CLI
//!
//! The binary entry point is in `main.rs`.

pub mod bytes;
pub mod cache;
pub mod collect;
pub mod exit_codes;
pub mod facts;
pub mod logging;
pub mod manager;
pub mod memo;
pub mod output;
pub mod resolvers;

pub use cache::{CacheError, FactCache, GroupStatus};
pub use manager::FactManager;
pub use memo::FactMemo;
pub use resolvers::{HostPaths, Resolver, ResolverKind, ResolverSet};

// Re-export test utilities for integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
