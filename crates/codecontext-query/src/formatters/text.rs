//! Human-readable text output.

use super::essential_snippet;
use codecontext_core::types::{ResultType, SearchResult};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt::Write as _;

pub fn format(results: &[SearchResult], query: &str, expand: &BTreeSet<String>) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Found {} result{} for \"{}\"\n",
        results.len(),
        if results.len() == 1 { "" } else { "s" },
        query
    );

    let expand_all = expand.contains("all");
    let wants = |field: &str| expand_all || expand.contains(field);

    for result in results {
        let name = result.meta_str("name").unwrap_or_default();
        let node_type = result.meta_str("node_type").unwrap_or_default();
        let location = match result.result_type {
            ResultType::Code => format!(
                "{}:{}-{}",
                result.file_path, result.start_line, result.end_line
            ),
            ResultType::Document => result.file_path.clone(),
        };
        let _ = writeln!(
            out,
            "{}. {} ({}) {} [score {:.2}]",
            result.rank, name, node_type, location, result.score
        );

        if wants("signature") {
            if let Some(signature) = result.meta_str("signature") {
                if !signature.is_empty() {
                    let _ = writeln!(out, "   signature: {signature}");
                }
            }
        }

        if wants("complexity") {
            if let Some(complexity) = result
                .metadata
                .get("ast_metadata")
                .and_then(|m| m.get("complexity"))
            {
                let cyclomatic = complexity
                    .get("cyclomatic")
                    .and_then(Value::as_u64)
                    .unwrap_or(1);
                if cyclomatic > 1 {
                    let _ = writeln!(out, "   complexity: cyclomatic {cyclomatic}");
                }
            }
        }

        let snippet_lines = if wants("content") {
            result.content.lines().map(str::to_string).collect()
        } else {
            essential_snippet(&result.content, 3)
        };
        for line in snippet_lines {
            let _ = writeln!(out, "   {line}");
        }
        out.push('\n');
    }

    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_output_lists_ranked_results() {
        let mut metadata = serde_json::Map::new();
        metadata.insert("name".into(), json!("calculate_tax"));
        metadata.insert("node_type".into(), json!("function"));
        let result = SearchResult {
            chunk_id: "abc".into(),
            file_path: "src/tax.py".into(),
            start_line: 1,
            end_line: 3,
            content: "def calculate_tax(amount):\n    return amount * 0.2\n".into(),
            result_type: ResultType::Code,
            language: Some("python".into()),
            score: 0.42,
            rank: 1,
            metadata,
        };

        let out = format(&[result], "calculate tax", &BTreeSet::new());
        assert!(out.starts_with("Found 1 result for \"calculate tax\""));
        assert!(out.contains("1. calculate_tax (function) src/tax.py:1-3 [score 0.42]"));
        assert!(out.contains("def calculate_tax"));
    }
}
