//! Fact request and result types.
//!
//! A [`FactRequest`] names a fact the caller wants; a [`ResolvedFact`] carries
//! the value back, either from a resolver or from the persistent cache. Both
//! carry the caller's query metadata through unchanged so output rendering can
//! apply the user's filter after resolution.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Classification of a fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactKind {
    /// Structured, dotted-name fact (`memory.system.total`). Only core facts
    /// are served from the persistent cache.
    #[default]
    Core,
    /// Flat legacy alias (`memorysize`).
    Legacy,
    /// User-supplied fact outside the built-in catalog.
    Custom,
}

impl std::fmt::Display for FactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FactKind::Core => write!(f, "core"),
            FactKind::Legacy => write!(f, "legacy"),
            FactKind::Custom => write!(f, "custom"),
        }
    }
}

/// A requested fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactRequest {
    /// Fact name, e.g. `partitions`.
    pub name: String,

    /// Fact classification.
    pub kind: FactKind,

    /// The query string the user typed, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_query: Option<String>,

    /// Path segments to descend into the resolved value.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filter_tokens: Vec<String>,
}

impl FactRequest {
    /// Create a request without query metadata.
    pub fn new(name: impl Into<String>, kind: FactKind) -> Self {
        Self {
            name: name.into(),
            kind,
            user_query: None,
            filter_tokens: Vec::new(),
        }
    }

    /// Shorthand for a core fact request.
    pub fn core(name: impl Into<String>) -> Self {
        Self::new(name, FactKind::Core)
    }

    /// Attach the originating user query.
    pub fn with_user_query(mut self, query: impl Into<String>) -> Self {
        self.user_query = Some(query.into());
        self
    }

    /// Attach filter tokens.
    pub fn with_filter_tokens(mut self, tokens: Vec<String>) -> Self {
        self.filter_tokens = tokens;
        self
    }

    /// Build the resolved counterpart, copying the query metadata.
    pub fn resolve_to(&self, value: Option<Value>) -> ResolvedFact {
        ResolvedFact {
            name: self.name.clone(),
            value,
            kind: self.kind,
            user_query: self.user_query.clone(),
            filter_tokens: self.filter_tokens.clone(),
        }
    }
}

/// The result of resolving a [`FactRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedFact {
    /// Fact name.
    pub name: String,

    /// Resolved value; `None` when the fact is unavailable on this system.
    pub value: Option<Value>,

    /// Fact classification.
    pub kind: FactKind,

    /// The query string the user typed, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_query: Option<String>,

    /// Path segments to descend into the value.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filter_tokens: Vec<String>,
}

impl ResolvedFact {
    /// Whether the fact has a value.
    pub fn is_present(&self) -> bool {
        self.value.as_ref().is_some_and(|v| !v.is_null())
    }

    /// The value after descending through the filter tokens.
    ///
    /// Object keys are matched by name, array elements by index. Returns
    /// `None` as soon as a token does not match.
    pub fn filtered_value(&self) -> Option<&Value> {
        let mut current = self.value.as_ref()?;
        for token in &self.filter_tokens {
            current = match current {
                Value::Object(map) => map.get(token)?,
                Value::Array(items) => items.get(token.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }
}
