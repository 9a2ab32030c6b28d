//! Fact catalog and query resolution.

pub mod catalog;
pub mod query;

pub use catalog::{lookup, Derivation, FactDefinition, CATALOG};
pub use query::{all_requests, requests_for_queries, requests_for_query};
