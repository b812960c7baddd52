//! Markdown-section JSON formatter.

use codecontext_core::types::SearchResult;
use serde_json::{json, Value};

pub fn format(results: &[SearchResult], query: &str) -> String {
    let formatted: Vec<Value> = results
        .iter()
        .map(|result| {
            let related_code: Vec<Value> = result
                .metadata
                .get("code_references")
                .and_then(Value::as_array)
                .map(|refs| {
                    refs.iter()
                        .map(|reference| {
                            json!({
                                "name": reference.get("name").cloned().unwrap_or_default(),
                                "match_reason": reference
                                    .get("match_reason")
                                    .cloned()
                                    .unwrap_or_else(|| json!("mentioned")),
                            })
                        })
                        .collect()
                })
                .unwrap_or_default();

            let section = result.meta_str("section_title").unwrap_or_default();
            let preview: Vec<&str> = result.content.lines().take(5).collect();

            json!({
                "id": result.chunk_id,
                "score": result.score,
                "rank": result.rank,
                "path": result.file_path,
                "location": {
                    "file": result.file_path,
                    "section": section,
                    "start_line": result.start_line,
                    "end_line": result.end_line,
                    "url": format!(
                        "{}:{}-{}#section",
                        result.file_path, result.start_line, result.end_line
                    ),
                },
                "metadata": {
                    "title": section,
                    "type": "markdown_section",
                    "language": "markdown",
                },
                "related_code": related_code,
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

#[cfg(test)]
mod tests {
    use super::*;
    use codecontext_core::types::ResultType;

    #[test]
    fn document_shape_carries_section_and_refs() {
        let mut metadata = serde_json::Map::new();
        metadata.insert("node_type".into(), json!("markdown"));
        metadata.insert("section_title".into(), json!("Usage"));
        metadata.insert(
            "code_references".into(),
            json!([{"name": "OrderService", "match_reason": "backtick reference"}]),
        );
        let result = SearchResult {
            chunk_id: "doc1".into(),
            file_path: "README.md".into(),
            start_line: 5,
            end_line: 12,
            content: "## Usage\n\nCall `OrderService`.\n".into(),
            result_type: ResultType::Document,
            language: None,
            score: 0.5,
            rank: 1,
            metadata,
        };

        let out = format(&[result], "usage");
        let parsed: Value = serde_json::from_str(&out).unwrap();
        let first = &parsed["results"][0];
        assert_eq!(first["location"]["section"], "Usage");
        assert_eq!(first["related_code"][0]["name"], "OrderService");
        assert_eq!(first["metadata"]["type"], "markdown_section");
    }
}
