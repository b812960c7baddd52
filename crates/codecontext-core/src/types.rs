//! Shared data model: parsed code units, document sections, relationship
//! edges, persisted index state, and the search request/response types.

use crate::languages::Language;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    Class,
    Interface,
    Enum,
    Function,
    Method,
    Module,
    Constructor,
    Property,
    Variable,
}

impl ObjectType {
    pub const fn as_str(self) -> &'static str {
        match self {
            ObjectType::Class => "class",
            ObjectType::Interface => "interface",
            ObjectType::Enum => "enum",
            ObjectType::Function => "function",
            ObjectType::Method => "method",
            ObjectType::Module => "module",
            ObjectType::Constructor => "constructor",
            ObjectType::Property => "property",
            ObjectType::Variable => "variable",
        }
    }
}

impl std::fmt::Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cyclomatic and nesting-based complexity measured on the AST.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Complexity {
    pub cyclomatic: u32,
    pub lines: u32,
}

/// Names extracted from a code unit's body: outbound calls, referenced
/// attributes/fields, and branching complexity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AstMetadata {
    pub calls: Vec<String>,
    pub references: Vec<String>,
    pub complexity: Complexity,
    /// Enum member names, populated only for `ObjectType::Enum`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<String>,
}

/// A parsed code unit (class, method, function, …).
///
/// Invariants: `start_line <= end_line`; `content` is exactly the source
/// slice between `start_byte` and `end_byte`; the id is content-addressed
/// over (relative path, byte range, content).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeObject {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualified_name: Option<String>,
    pub file_path: String,
    pub relative_path: String,
    pub language: Language,
    pub object_type: ObjectType,
    pub start_line: u32,
    pub end_line: u32,
    pub start_byte: usize,
    pub end_byte: usize,
    pub content: String,
    pub signature: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docstring: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub token_count: usize,
    pub unique_token_count: usize,
    pub score_weight: f32,
    #[serde(default)]
    pub ast_metadata: AstMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Markdown,
    Config,
}

impl DocumentKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            DocumentKind::Markdown => "markdown",
            DocumentKind::Config => "config",
        }
    }
}

/// A code entity mentioned by a markdown section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeReference {
    pub name: String,
    pub match_reason: String,
}

/// A markdown section or a configuration-file section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentNode {
    pub id: String,
    pub file_path: String,
    pub relative_path: String,
    pub node_type: DocumentKind,
    pub section_title: String,
    pub start_line: u32,
    pub end_line: u32,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub code_references: Vec<CodeReference>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub config_keys: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env_references: Vec<String>,
    #[serde(default)]
    pub section_depth: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_format: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationKind {
    Calls,
    References,
    Inherits,
    Implements,
    Contains,
}

impl RelationKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            RelationKind::Calls => "CALLS",
            RelationKind::References => "REFERENCES",
            RelationKind::Inherits => "INHERITS",
            RelationKind::Implements => "IMPLEMENTS",
            RelationKind::Contains => "CONTAINS",
        }
    }

    pub fn parse(raw: &str) -> Option<RelationKind> {
        match raw {
            "CALLS" => Some(RelationKind::Calls),
            "REFERENCES" => Some(RelationKind::References),
            "INHERITS" => Some(RelationKind::Inherits),
            "IMPLEMENTS" => Some(RelationKind::Implements),
            "CONTAINS" => Some(RelationKind::Contains),
            _ => None,
        }
    }
}

/// An edge between code units. Cross-file targets are name-only stubs
/// (`target_id == None`, `resolved == false`) that stay queryable by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub source_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    pub target_name: String,
    pub kind: RelationKind,
    pub resolved: bool,
}

/// Persisted per-project index state; drives incremental-vs-full decisions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexState {
    pub last_commit_hash: Option<String>,
    pub total_files: usize,
    pub total_objects: usize,
    pub languages: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Recorded per-file digest used to skip unchanged files on full re-index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChecksum {
    pub relative_path: String,
    pub checksum: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultType {
    Code,
    Document,
}

impl ResultType {
    pub const fn as_str(self) -> &'static str {
        match self {
            ResultType::Code => "code",
            ResultType::Document => "document",
        }
    }

    pub fn parse(raw: &str) -> Option<ResultType> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "code" => Some(ResultType::Code),
            "document" => Some(ResultType::Document),
            _ => None,
        }
    }
}

/// A validated search request.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub query: String,
    pub limit: usize,
    pub language_filter: Option<String>,
    pub file_filter: Option<String>,
    pub type_filter: Option<ResultType>,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            limit: crate::constants::DEFAULT_LIMIT,
            language_filter: None,
            file_filter: None,
            type_filter: None,
        }
    }
}

/// A ranked search hit as returned to formatters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub chunk_id: String,
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
    pub content: String,
    pub result_type: ResultType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub score: f32,
    pub rank: usize,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl SearchResult {
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }
}

/// A retrievable unit: one code object with optional added context
/// (imports, enclosing class signature) prepended to its raw content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeChunk {
    pub object: CodeObject,
    /// Full embedding text including added context.
    pub content: String,
    /// Original source slice without added context. Must be a substring of
    /// `content`.
    pub raw_content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_definition: Option<String>,
    /// True for a class summary chunk standing in for an oversize class body.
    #[serde(default)]
    pub is_summary: bool,
}

impl CodeChunk {
    /// Added-context bytes in front of (and around) the raw content.
    pub fn context_size(&self) -> usize {
        self.content.len().saturating_sub(self.raw_content.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relation_kind_round_trips() {
        for kind in [
            RelationKind::Calls,
            RelationKind::References,
            RelationKind::Inherits,
            RelationKind::Implements,
            RelationKind::Contains,
        ] {
            assert_eq!(RelationKind::parse(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn result_type_parses_cli_values() {
        assert_eq!(ResultType::parse("code"), Some(ResultType::Code));
        assert_eq!(ResultType::parse("Document"), Some(ResultType::Document));
        assert_eq!(ResultType::parse("other"), None);
    }

    #[test]
    fn code_object_serializes_with_snake_case_tags() {
        let value = serde_json::to_value(ObjectType::Method).unwrap();
        assert_eq!(value, serde_json::json!("method"));
        let value = serde_json::to_value(DocumentKind::Markdown).unwrap();
        assert_eq!(value, serde_json::json!("markdown"));
    }
}
