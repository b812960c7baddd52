//! Shared extraction machinery used by every language module: node text and
//! positions, content-addressed object construction, and the generic
//! calls/references/complexity walkers.

use codecontext_core::checksum;
use codecontext_core::languages::Language;
use codecontext_core::quality::calculate_score_weight;
use codecontext_core::tokenizer::tokenize_text;
use codecontext_core::types::{AstMetadata, CodeObject, Complexity, ObjectType};
use std::collections::BTreeSet;
use tree_sitter::Node;

const MAX_COLLECTED_NAMES: usize = 64;

pub fn node_text<'a>(node: Node, source: &'a str) -> &'a str {
    &source[node.start_byte()..node.end_byte()]
}

/// 1-based inclusive line span.
pub fn line_span(node: Node) -> (u32, u32) {
    (
        node.start_position().row as u32 + 1,
        node.end_position().row as u32 + 1,
    )
}

/// First named child with one of the given kinds.
pub fn find_child<'t>(node: Node<'t>, kinds: &[&str]) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    let found = node
        .named_children(&mut cursor)
        .find(|child| kinds.contains(&child.kind()));
    found
}

/// All named children with one of the given kinds.
pub fn find_children<'t>(node: Node<'t>, kinds: &[&str]) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|child| kinds.contains(&child.kind()))
        .collect()
}

/// Signature text: the source slice from the declaration start to its body
/// (or the whole node when it has no body), first line only, trimmed.
pub fn signature_text(node: Node, body: Option<Node>, source: &str) -> String {
    let end = body.map(|b| b.start_byte()).unwrap_or_else(|| node.end_byte());
    let slice = &source[node.start_byte()..end.max(node.start_byte())];
    let first_chunk = slice.lines().collect::<Vec<_>>().join(" ");
    let collapsed: String = first_chunk.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.trim_end_matches([':', '{']).trim().to_string()
}

/// A leading `/** … */`-style comment directly above the node, with comment
/// markers stripped. Used for Java/Kotlin/JS doc comments.
pub fn leading_doc_comment(node: Node, source: &str, comment_kinds: &[&str]) -> Option<String> {
    let prev = node.prev_named_sibling()?;
    if !comment_kinds.contains(&prev.kind()) {
        return None;
    }
    let text = node_text(prev, source);
    // Plain trailing comments are not documentation.
    if !text.starts_with("/**") && !text.starts_with("///") {
        return None;
    }
    // Only attach when the comment ends on the line right above.
    if prev.end_position().row + 1 < node.start_position().row {
        return None;
    }
    Some(strip_comment_markers(text))
}

fn strip_comment_markers(raw: &str) -> String {
    raw.lines()
        .map(|line| {
            line.trim()
                .trim_end_matches("*/")
                .trim_start_matches("/**")
                .trim_start_matches("/*")
                .trim_start_matches("///")
                .trim_start_matches("//")
                .trim_start_matches('*')
                .trim()
        })
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Per-language knobs for the generic AST metadata walkers.
pub struct AstSpec {
    pub call_kinds: &'static [&'static str],
    /// Resolve a call node to the callee's short name.
    pub call_name: fn(Node, &str) -> Option<String>,
    pub reference_kinds: &'static [&'static str],
    pub branch_kinds: &'static [&'static str],
    pub nesting_kinds: &'static [&'static str],
}

/// Walk a declaration body and collect callee names, referenced names, and
/// branching complexity.
pub fn extract_ast_metadata(node: Node, source: &str, spec: &AstSpec) -> AstMetadata {
    let mut calls = Vec::new();
    let mut call_seen = BTreeSet::new();
    let mut references = Vec::new();
    let mut reference_seen = BTreeSet::new();
    let mut cyclomatic = 1u32;
    let mut nesting = 0u32;

    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        let kind = current.kind();
        if spec.call_kinds.contains(&kind) {
            if let Some(name) = (spec.call_name)(current, source) {
                if calls.len() < MAX_COLLECTED_NAMES && call_seen.insert(name.clone()) {
                    calls.push(name);
                }
            }
        }
        if spec.reference_kinds.contains(&kind) {
            let text = node_text(current, source).to_string();
            if !text.is_empty()
                && references.len() < MAX_COLLECTED_NAMES
                && reference_seen.insert(text.clone())
            {
                references.push(text);
            }
        }
        if spec.branch_kinds.contains(&kind) {
            cyclomatic += 1;
        }
        if spec.nesting_kinds.contains(&kind) {
            nesting += 1;
        }
        for idx in (0..current.child_count()).rev() {
            if let Some(child) = current.child(idx) {
                stack.push(child);
            }
        }
    }

    AstMetadata {
        calls,
        references,
        complexity: Complexity {
            cyclomatic,
            lines: nesting,
        },
        members: Vec::new(),
    }
}

/// Assemble a CodeObject from an extracted node. The id is content-addressed
/// over (relative path, byte range, content); lexical stats and the score
/// weight are computed here so every language parser shares the policy.
#[allow(clippy::too_many_arguments)]
pub fn build_code_object(
    node: Node,
    source: &str,
    file_path: &str,
    relative_path: &str,
    language: Language,
    object_type: ObjectType,
    name: String,
    qualified_name: Option<String>,
    signature: String,
    docstring: Option<String>,
    parent_id: Option<String>,
    ast_metadata: AstMetadata,
) -> CodeObject {
    let content = node_text(node, source).to_string();
    let (start_line, end_line) = line_span(node);
    let id = checksum::chunk_id(relative_path, node.start_byte(), node.end_byte(), &content);

    let tokens = tokenize_text(&content);
    let token_count = tokens.len();
    let unique_token_count = tokens.iter().collect::<BTreeSet<_>>().len();
    let score_weight = calculate_score_weight(
        token_count,
        unique_token_count,
        docstring.is_some(),
        qualified_name.is_some(),
    );

    CodeObject {
        id,
        name,
        qualified_name,
        file_path: file_path.to_string(),
        relative_path: relative_path.to_string(),
        language,
        object_type,
        start_line,
        end_line,
        start_byte: node.start_byte(),
        end_byte: node.end_byte(),
        content,
        signature,
        docstring,
        parent_id,
        token_count,
        unique_token_count,
        score_weight,
        ast_metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;

    #[test]
    fn line_span_is_one_based_inclusive() {
        let source = "def first():\n    pass\n\ndef second():\n    pass\n";
        let tree = parse_source(source, Language::Python, "a.py").unwrap();
        let root = tree.root_node();
        let second = root.named_child(1).unwrap();
        assert_eq!(line_span(second), (4, 5));
    }

    #[test]
    fn built_object_content_matches_byte_range() {
        let source = "def calculate_tax(amount):\n    return amount * 0.2\n";
        let tree = parse_source(source, Language::Python, "a.py").unwrap();
        let func = tree.root_node().named_child(0).unwrap();
        let object = build_code_object(
            func,
            source,
            "/repo/a.py",
            "a.py",
            Language::Python,
            ObjectType::Function,
            "calculate_tax".to_string(),
            Some("calculate_tax".to_string()),
            "def calculate_tax(amount)".to_string(),
            None,
            None,
            AstMetadata::default(),
        );
        assert_eq!(
            object.content,
            &source[object.start_byte..object.end_byte]
        );
        assert!(object.start_line <= object.end_line);
        assert!((0.1..=1.2).contains(&object.score_weight));
        assert_eq!(object.id.len(), 16);
    }

    #[test]
    fn identical_location_and_content_yield_identical_id() {
        let source = "def f():\n    return 1\n";
        let tree = parse_source(source, Language::Python, "a.py").unwrap();
        let func = tree.root_node().named_child(0).unwrap();
        let build = || {
            build_code_object(
                func,
                source,
                "/repo/a.py",
                "a.py",
                Language::Python,
                ObjectType::Function,
                "f".to_string(),
                None,
                "def f()".to_string(),
                None,
                None,
                AstMetadata::default(),
            )
        };
        assert_eq!(build().id, build().id);
    }
}
