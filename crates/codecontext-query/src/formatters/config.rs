//! Configuration-section JSON formatter.

use codecontext_core::types::SearchResult;
use serde_json::{json, Value};

pub fn format(results: &[SearchResult], query: &str) -> String {
    let formatted: Vec<Value> = results
        .iter()
        .map(|result| {
            let config_keys = result
                .metadata
                .get("config_keys")
                .cloned()
                .unwrap_or_else(|| json!([]));
            let env_references = result
                .metadata
                .get("env_references")
                .cloned()
                .unwrap_or_else(|| json!([]));
            let section_depth = result
                .metadata
                .get("section_depth")
                .and_then(Value::as_u64)
                .unwrap_or(1);
            let title = result.meta_str("section_title").unwrap_or_default();
            let preview: Vec<&str> = result.content.lines().take(8).collect();

            json!({
                "id": result.chunk_id,
                "score": result.score,
                "rank": result.rank,
                "path": result.file_path,
                "location": {
                    "file": result.file_path,
                    "section": title,
                    "url": format!("{}#config", result.file_path),
                },
                "metadata": {
                    "title": title,
                    "config_format": result.meta_str("config_format").unwrap_or_default(),
                    "section_depth": section_depth,
                    "type": "config",
                },
                "config_keys": config_keys,
                "env_references": env_references,
                "snippet": {
                    "preview": preview,
                    "full": Value::Null,
                },
            })
        })
        .collect();

    serde_json::to_string_pretty(&json!({
        "results": formatted,
        "total": results.len(),
        "query": query,
    }))
    .unwrap_or_else(|_| String::from("{}"))
}
