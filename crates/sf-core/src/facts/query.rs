//! Turning user queries into fact requests.
//!
//! A query matches, in order of preference:
//! 1. a catalog fact by exact name (`memory.system.total`)
//! 2. every core fact below a dotted prefix (`dmi`, `memory.system`)
//! 3. the longest catalog fact that prefixes it, with the rest of the query
//!    becoming filter tokens (`partitions./dev/sda1.uuid`)
//!
//! Anything else becomes a custom request that resolves to nothing.

use sf_common::{FactKind, FactRequest};

use super::catalog::{lookup, CATALOG};

/// Requests answering one user query.
pub fn requests_for_query(query: &str) -> Vec<FactRequest> {
    if let Some(def) = lookup(query) {
        return vec![FactRequest::new(def.name, def.kind).with_user_query(query)];
    }

    let prefix = format!("{}.", query);
    let below: Vec<FactRequest> = CATALOG
        .iter()
        .filter(|def| def.kind == FactKind::Core && def.name.starts_with(&prefix))
        .map(|def| FactRequest::new(def.name, def.kind).with_user_query(query))
        .collect();
    if !below.is_empty() {
        return below;
    }

    let longest = CATALOG
        .iter()
        .filter(|def| {
            query
                .strip_prefix(def.name)
                .is_some_and(|rest| rest.starts_with('.') && rest.len() > 1)
        })
        .max_by_key(|def| def.name.len());

    if let Some(def) = longest {
        let tokens = query[def.name.len() + 1..]
            .split('.')
            .map(str::to_string)
            .collect();
        return vec![FactRequest::new(def.name, def.kind)
            .with_user_query(query)
            .with_filter_tokens(tokens)];
    }

    vec![FactRequest::new(query, FactKind::Custom).with_user_query(query)]
}

/// Requests for several queries, in query order.
pub fn requests_for_queries<S: AsRef<str>>(queries: &[S]) -> Vec<FactRequest> {
    queries
        .iter()
        .flat_map(|q| requests_for_query(q.as_ref()))
        .collect()
}

/// Every core fact, plus legacy facts when asked.
pub fn all_requests(show_legacy: bool) -> Vec<FactRequest> {
    CATALOG
        .iter()
        .filter(|def| def.kind == FactKind::Core || show_legacy)
        .map(|def| FactRequest::new(def.name, def.kind))
        .collect()
}
