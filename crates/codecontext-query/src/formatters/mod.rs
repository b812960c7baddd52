//! Result shaping for machine and human consumption.
//!
//! Routing: pure-document result sets dispatch to the markdown/config
//! formatters by node type; everything else goes through the code JSON
//! formatter. The text path is universal.

mod config;
mod document;
mod json;
mod text;

use codecontext_core::types::{ResultType, SearchResult};
use codecontext_store::VectorStore;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn parse(raw: &str) -> OutputFormat {
        match raw.trim().to_ascii_lowercase().as_str() {
            "json" => OutputFormat::Json,
            _ => OutputFormat::Text,
        }
    }
}

/// Fields the caller may expand on top of the minimal JSON shape.
pub const EXPANDABLE_FIELDS: &[&str] = &[
    "signature",
    "snippet",
    "content",
    "complexity",
    "relationships",
    "impact",
    "all",
];

pub fn format_results(
    results: &[SearchResult],
    format: OutputFormat,
    query: &str,
    store: Option<&dyn VectorStore>,
    expand: &BTreeSet<String>,
) -> String {
    if results.is_empty() {
        return match format {
            OutputFormat::Json => {
                serde_json::json!({"results": [], "total": 0, "query": query}).to_string()
            }
            OutputFormat::Text => "No results found.".to_string(),
        };
    }

    if format == OutputFormat::Text {
        return text::format(results, query, expand);
    }

    let all_documents = results
        .iter()
        .all(|result| result.result_type == ResultType::Document);
    if all_documents {
        let node_types: BTreeSet<&str> = results
            .iter()
            .filter_map(|result| result.meta_str("node_type"))
            .collect();
        if node_types.len() == 1 {
            match node_types.iter().next().copied() {
                Some("config") => return config::format(results, query),
                Some("markdown") => return document::format(results, query),
                _ => {}
            }
        }
    }

    json::format(results, query, store, expand)
}

/// First few meaningful lines of a chunk, for previews.
pub(crate) fn essential_snippet(content: &str, max_lines: usize) -> Vec<String> {
    content
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .take(max_lines)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use codecontext_core::types::ResultType;

    fn result(result_type: ResultType, node_type: &str, name: &str) -> SearchResult {
        let mut metadata = serde_json::Map::new();
        metadata.insert("node_type".into(), serde_json::json!(node_type));
        metadata.insert("name".into(), serde_json::json!(name));
        SearchResult {
            chunk_id: format!("id-{name}"),
            file_path: "src/a.py".to_string(),
            start_line: 1,
            end_line: 4,
            content: "def a():\n    pass".to_string(),
            result_type,
            language: Some("python".to_string()),
            score: 0.7,
            rank: 1,
            metadata,
        }
    }

    #[test]
    fn empty_results_render_placeholders() {
        let empty: Vec<SearchResult> = Vec::new();
        assert_eq!(
            format_results(&empty, OutputFormat::Text, "q", None, &BTreeSet::new()),
            "No results found."
        );
        let json = format_results(&empty, OutputFormat::Json, "q", None, &BTreeSet::new());
        assert!(json.contains("\"total\":0"));
    }

    #[test]
    fn pure_markdown_results_use_document_shape() {
        let results = vec![result(ResultType::Document, "markdown", "Usage")];
        let out = format_results(&results, OutputFormat::Json, "q", None, &BTreeSet::new());
        assert!(out.contains("\"related_code\""), "got: {out}");
    }

    #[test]
    fn pure_config_results_use_config_shape() {
        let results = vec![result(ResultType::Document, "config", "server")];
        let out = format_results(&results, OutputFormat::Json, "q", None, &BTreeSet::new());
        assert!(out.contains("\"config_keys\""), "got: {out}");
    }

    #[test]
    fn mixed_results_use_code_shape() {
        let results = vec![
            result(ResultType::Code, "function", "calculate_tax"),
            result(ResultType::Document, "markdown", "Usage"),
        ];
        let out = format_results(&results, OutputFormat::Json, "q", None, &BTreeSet::new());
        assert!(out.contains("\"results\""));
        assert!(out.contains("calculate_tax"));
        assert!(!out.contains("\"related_code\""));
    }
}
