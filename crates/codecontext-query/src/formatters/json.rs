//! Code JSON formatter: minimal by default, expands are additive.

use super::essential_snippet;
use codecontext_core::types::{ResultType, SearchResult};
use codecontext_store::VectorStore;
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;

pub fn format(
    results: &[SearchResult],
    query: &str,
    store: Option<&dyn VectorStore>,
    expand: &BTreeSet<String>,
) -> String {
    let formatted: Vec<Value> = results
        .iter()
        .map(|result| {
            if expand.is_empty() {
                minimal(result)
            } else {
                expanded(result, store, expand)
            }
        })
        .collect();

    serde_json::to_string_pretty(&json!({
        "results": formatted,
        "total": results.len(),
        "query": query,
    }))
    .unwrap_or_else(|_| String::from("{}"))
}

fn minimal(result: &SearchResult) -> Value {
    let mut out = Map::new();
    out.insert(
        "name".into(),
        json!(result.meta_str("name").unwrap_or_default()),
    );
    out.insert(
        "type".into(),
        json!(result.meta_str("node_type").unwrap_or_default()),
    );
    out.insert("file".into(), json!(result.file_path));

    if result.result_type == ResultType::Code || result.start_line > 0 {
        out.insert(
            "lines".into(),
            json!(format!("{}-{}", result.start_line, result.end_line)),
        );
    }
    if let Some(language) = &result.language {
        out.insert("language".into(), json!(language));
    }
    if result.score > 0.0 {
        out.insert("score".into(), json!((result.score * 100.0).round() / 100.0));
    }
    Value::Object(out)
}

fn expanded(
    result: &SearchResult,
    store: Option<&dyn VectorStore>,
    expand: &BTreeSet<String>,
) -> Value {
    let Value::Object(mut out) = minimal(result) else {
        return Value::Null;
    };
    let expand_all = expand.contains("all");
    let wants = |field: &str| expand_all || expand.contains(field);

    if wants("signature") {
        if let Some(signature) = result.meta_str("signature") {
            if !signature.is_empty() && Some(signature) != result.meta_str("name") {
                out.insert("signature".into(), json!(signature));
            }
        }
    }

    if wants("snippet") {
        let snippet = essential_snippet(&result.content, 3);
        if snippet.len() == 1 {
            out.insert("snippet".into(), json!(snippet[0]));
        } else if !snippet.is_empty() {
            out.insert("snippet".into(), json!(snippet));
        }
    }

    if wants("content") && !result.content.is_empty() {
        out.insert("content".into(), json!(result.content));
    }

    if let Some(parent) = result.meta_str("parent_id") {
        out.insert("parent".into(), json!(parent));
    }

    if wants("complexity") {
        let complexity = result
            .metadata
            .get("ast_metadata")
            .and_then(|m| m.get("complexity"));
        if let Some(complexity) = complexity {
            let cyclomatic = complexity
                .get("cyclomatic")
                .and_then(Value::as_u64)
                .unwrap_or(1);
            let lines = complexity.get("lines").and_then(Value::as_u64).unwrap_or(0);
            if cyclomatic > 1 || lines > 0 {
                out.insert(
                    "complexity".into(),
                    json!({"cyclomatic": cyclomatic, "lines": lines}),
                );
            }
        }
    }

    if wants("relationships") {
        if let Some(store) = store {
            if let Ok(edges) = store.relationships_from(&[result.chunk_id.clone()]) {
                if !edges.is_empty() {
                    let rendered: Vec<Value> = edges
                        .iter()
                        .map(|edge| {
                            json!({
                                "kind": edge.kind.as_str(),
                                "target": edge.target_name,
                                "resolved": edge.resolved,
                            })
                        })
                        .collect();
                    out.insert("relationships".into(), json!(rendered));
                }
            }
        }
    }

    if wants("impact") {
        if let Some(store) = store {
            let name = result.meta_str("name").unwrap_or_default();
            if let Ok(callers) = store.count_callers(&result.chunk_id, name) {
                if callers > 0 {
                    out.insert("impact".into(), json!({"direct_callers": callers}));
                }
            }
        }
    }

    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code_result() -> SearchResult {
        let mut metadata = Map::new();
        metadata.insert("name".into(), json!("calculate_tax"));
        metadata.insert("node_type".into(), json!("function"));
        metadata.insert("signature".into(), json!("def calculate_tax(amount)"));
        metadata.insert(
            "ast_metadata".into(),
            json!({"calls": [], "references": [], "complexity": {"cyclomatic": 3, "lines": 2}}),
        );
        SearchResult {
            chunk_id: "abc".into(),
            file_path: "src/tax.py".into(),
            start_line: 10,
            end_line: 20,
            content: "def calculate_tax(amount):\n    return amount * 0.2\n".into(),
            result_type: ResultType::Code,
            language: Some("python".into()),
            score: 0.4242,
            rank: 1,
            metadata,
        }
    }

    #[test]
    fn minimal_shape_has_name_type_file_lines() {
        let out = format(&[code_result()], "tax", None, &BTreeSet::new());
        let parsed: Value = serde_json::from_str(&out).unwrap();
        let first = &parsed["results"][0];
        assert_eq!(first["name"], "calculate_tax");
        assert_eq!(first["type"], "function");
        assert_eq!(first["file"], "src/tax.py");
        assert_eq!(first["lines"], "10-20");
        assert_eq!(first["score"], 0.42);
        assert!(first.get("content").is_none());
    }

    #[test]
    fn expands_are_additive() {
        let expand: BTreeSet<String> =
            ["signature", "complexity"].iter().map(|s| s.to_string()).collect();
        let out = format(&[code_result()], "tax", None, &expand);
        let parsed: Value = serde_json::from_str(&out).unwrap();
        let first = &parsed["results"][0];
        assert_eq!(first["signature"], "def calculate_tax(amount)");
        assert_eq!(first["complexity"]["cyclomatic"], 3);
        assert!(first.get("content").is_none());
    }

    #[test]
    fn expand_all_includes_content() {
        let expand: BTreeSet<String> = ["all".to_string()].into_iter().collect();
        let out = format(&[code_result()], "tax", None, &expand);
        let parsed: Value = serde_json::from_str(&out).unwrap();
        assert!(parsed["results"][0].get("content").is_some());
    }
}
