//! Rendering resolved facts for the CLI.
//!
//! Without queries, present facts are nested by their dotted names
//! (`os.release.full` becomes `{"os": {"release": {"full": ..}}}`). With
//! queries, each query maps to the value it selected; absent facts render as
//! `null` so every query gets an answer.

use serde::Serialize;
use serde_json::{Map, Value};
use sf_common::{Error, OutputFormat, ResolvedFact, Result};

/// Build the output document for `facts`.
pub fn build_document(facts: &[ResolvedFact], queried: bool) -> Value {
    if queried {
        Value::Object(by_query(facts))
    } else {
        Value::Object(fact_tree(facts))
    }
}

/// Present facts nested by dotted name.
fn fact_tree(facts: &[ResolvedFact]) -> Map<String, Value> {
    let mut tree = Map::new();
    for fact in facts {
        if let Some(value) = fact.value.as_ref().filter(|v| !v.is_null()) {
            insert_dotted(&mut tree, &fact.name, value.clone());
        }
    }
    tree
}

/// Each query mapped to the value it selected.
fn by_query(facts: &[ResolvedFact]) -> Map<String, Value> {
    let mut out = Map::new();
    for fact in facts {
        let query = fact.user_query.as_deref().unwrap_or(&fact.name);
        let value = fact.filtered_value().filter(|v| !v.is_null()).cloned();

        let below_prefix = fact
            .name
            .strip_prefix(query)
            .and_then(|rest| rest.strip_prefix('.'))
            .filter(|_| fact.filter_tokens.is_empty());

        match below_prefix {
            Some(rest) => {
                let entry = out
                    .entry(query.to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
                if let (Value::Object(map), Some(value)) = (entry, value) {
                    insert_dotted(map, rest, value);
                }
            }
            None => {
                out.insert(query.to_string(), value.unwrap_or(Value::Null));
            }
        }
    }
    out
}

/// Insert `value` at a dotted path, creating intermediate objects.
///
/// A path that runs through an existing non-object value is dropped.
fn insert_dotted(tree: &mut Map<String, Value>, path: &str, value: Value) {
    let mut parts = path.split('.').peekable();
    let mut node = tree;
    while let Some(part) = parts.next() {
        if parts.peek().is_none() {
            node.insert(part.to_string(), value);
            return;
        }
        let child = node
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        match child {
            Value::Object(map) => node = map,
            _ => return,
        }
    }
}

/// Render a fact document.
///
/// In text format a document with a single entry prints just the value when
/// `bare` is set, matching a lone query on the command line.
pub fn render_document(document: &Value, format: OutputFormat, bare: bool) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(render_text(document, bare)),
        _ => render_serialized(document, format),
    }
}

/// Render any serializable value as JSON or YAML.
///
/// Text format falls back to pretty JSON; callers with a dedicated text
/// layout handle it themselves.
pub fn render_serialized<T: Serialize>(value: &T, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Yaml => serde_yaml::to_string(value).map_err(|e| Error::Output(e.to_string())),
        OutputFormat::Json | OutputFormat::Text => Ok(serde_json::to_string_pretty(value)?),
    }
}

fn render_text(document: &Value, bare: bool) -> String {
    let Value::Object(map) = document else {
        return text_value(document);
    };

    if bare && map.len() == 1 {
        if let Some(value) = map.values().next() {
            return text_value(value);
        }
    }

    map.iter()
        .map(|(name, value)| format!("{} => {}", name, text_value(value)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn text_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Object(_) | Value::Array(_) => {
            serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
        }
        other => other.to_string(),
    }
}
