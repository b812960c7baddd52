use codecontext_core::bm25::SparseVector;
use codecontext_core::types::{AstMetadata, CodeReference, ResultType};
use serde::{Deserialize, Serialize};

/// Everything co-stored with a point's vectors. Formatters read from here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointPayload {
    /// Repo-relative path.
    pub file_path: String,
    pub absolute_path: String,
    pub result_type: ResultType,
    /// Object type for code ("class", "method", …) or the document kind
    /// ("markdown", "config").
    pub node_type: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualified_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub start_line: u32,
    pub end_line: u32,
    /// Embedding text, including added context for code chunks.
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docstring: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default = "default_score_weight")]
    pub score_weight: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ast_metadata: Option<AstMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_title: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub code_references: Vec<CodeReference>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub config_keys: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env_references: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_depth: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_format: Option<String>,
    #[serde(default)]
    pub is_summary: bool,
}

fn default_score_weight() -> f32 {
    1.0
}

impl Default for PointPayload {
    fn default() -> Self {
        Self {
            file_path: String::new(),
            absolute_path: String::new(),
            result_type: ResultType::Code,
            node_type: String::new(),
            name: String::new(),
            qualified_name: None,
            language: None,
            start_line: 0,
            end_line: 0,
            content: String::new(),
            raw_content: None,
            signature: None,
            docstring: None,
            parent_id: None,
            score_weight: 1.0,
            ast_metadata: None,
            section_title: None,
            code_references: Vec::new(),
            config_keys: Vec::new(),
            env_references: Vec::new(),
            section_depth: None,
            config_format: None,
            is_summary: false,
        }
    }
}

/// One upsert unit: dense and sparse vectors co-stored under the same id.
#[derive(Debug, Clone)]
pub struct ChunkPoint {
    pub id: String,
    pub dense: Vec<f32>,
    pub sparse: SparseVector,
    pub payload: PointPayload,
}

/// A search hit leaving the store.
#[derive(Debug, Clone)]
pub struct ScoredPoint {
    pub id: String,
    pub score: f32,
    pub payload: PointPayload,
}

/// Filters the store enforces before fusion.
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub language: Option<String>,
    pub file_path: Option<String>,
    pub result_type: Option<ResultType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FusionMethod {
    /// Reciprocal rank fusion: `Σ 1/(k + rank)` per candidate per modality.
    Rrf,
    /// Distribution-based score fusion: normalize each modality's score
    /// distribution (mean ± 3σ), then sum.
    Dbsf,
}

impl FusionMethod {
    pub fn parse(raw: &str) -> FusionMethod {
        match raw.trim().to_ascii_lowercase().as_str() {
            "dbsf" => FusionMethod::Dbsf,
            _ => FusionMethod::Rrf,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreStatistics {
    pub content_count: usize,
    pub code_count: usize,
    pub document_count: usize,
    pub relationship_count: usize,
    pub languages: Vec<String>,
}
