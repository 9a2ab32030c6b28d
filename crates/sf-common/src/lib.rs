//! sysfacts common types, errors, and configuration.
//!
//! This crate provides foundational types shared across sf-core modules:
//! - Fact request/result types
//! - Common error types
//! - Output format specifications
//! - Configuration loading and the cache group index

pub mod config;
pub mod error;
pub mod fact;
pub mod output;

pub use config::{CacheGroups, Config, ConfigPaths, ConfigResolver, GroupIndex};
pub use error::{Error, Result, StructuredError};
pub use fact::{FactKind, FactRequest, ResolvedFact};
pub use output::OutputFormat;
