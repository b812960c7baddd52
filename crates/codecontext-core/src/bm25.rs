//! BM25F sparse-vector encoder.
//!
//! Documents are field maps (`name`, `signature`, `docstring`, `content`, …)
//! with per-field weights. Each field contributes a weighted BM25 term score;
//! token scores are accumulated across fields and emitted as a parallel
//! `(indices, values)` sparse vector over the 2^32 hashed vocabulary.
//! Indices come from the process-stable token hash, so vectors written by one
//! process score correctly against queries encoded in another.

use crate::checksum::stable_token_hash;
use crate::constants::{BM25_AVG_DL, BM25_B, BM25_K1};
use crate::tokenizer::tokenize_text;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Parallel sparse vector arrays: `indices.len() == values.len()`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    pub indices: Vec<u32>,
    pub values: Vec<f32>,
}

impl SparseVector {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Sparse dot product against another vector.
    pub fn dot(&self, other: &SparseVector) -> f32 {
        let other_map: BTreeMap<u32, f32> = other
            .indices
            .iter()
            .copied()
            .zip(other.values.iter().copied())
            .collect();
        self.indices
            .iter()
            .zip(&self.values)
            .filter_map(|(index, value)| other_map.get(index).map(|o| o * value))
            .sum()
    }
}

/// Field-weighted BM25 encoder with length normalization.
#[derive(Debug, Clone)]
pub struct Bm25FEncoder {
    field_weights: BTreeMap<String, f32>,
    k1: f32,
    b: f32,
    avg_dl: f32,
}

impl Bm25FEncoder {
    pub fn new(field_weights: BTreeMap<String, f32>) -> Self {
        Self {
            field_weights,
            k1: BM25_K1,
            b: BM25_B,
            avg_dl: BM25_AVG_DL,
        }
    }

    pub fn with_params(field_weights: BTreeMap<String, f32>, k1: f32, b: f32, avg_dl: f32) -> Self {
        Self {
            field_weights,
            k1,
            b,
            avg_dl,
        }
    }

    /// Encode a document (map of field name → optional text) to a sparse vector.
    pub fn encode(&self, document: &BTreeMap<String, Option<String>>) -> SparseVector {
        // Tokenize all weighted fields up front; document length is the sum
        // of every field's token count, floored at 1.
        let mut field_tokens: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        let mut total_tokens = 0usize;
        for field_name in self.field_weights.keys() {
            if let Some(Some(text)) = document.get(field_name) {
                if text.is_empty() {
                    continue;
                }
                let tokens = tokenize_text(text);
                total_tokens += tokens.len();
                field_tokens.insert(field_name.as_str(), tokens);
            }
        }
        let dl = total_tokens.max(1) as f32;

        let mut token_scores: BTreeMap<String, f32> = BTreeMap::new();
        for (field_name, weight) in &self.field_weights {
            let Some(tokens) = field_tokens.get(field_name.as_str()) else {
                continue;
            };
            let mut tf_map: BTreeMap<&str, u32> = BTreeMap::new();
            for token in tokens {
                *tf_map.entry(token).or_insert(0) += 1;
            }
            for (token, tf) in tf_map {
                let tf = tf as f32;
                let numerator = tf * (self.k1 + 1.0);
                let denominator = tf + self.k1 * (1.0 - self.b + self.b * dl / self.avg_dl);
                let bm25_tf = numerator / denominator;
                *token_scores.entry(token.to_string()).or_insert(0.0) += weight * bm25_tf;
            }
        }

        let mut sparse = SparseVector::default();
        for (token, score) in token_scores {
            if score > 0.0 {
                sparse.indices.push(stable_token_hash(&token));
                sparse.values.push(score);
            }
        }
        sparse
    }

    /// Encode a query as raw term frequencies (no BM25 normalization),
    /// suitable for dot-product scoring against encoded documents.
    pub fn encode_query(&self, query: &str) -> SparseVector {
        let mut tf_map: BTreeMap<String, u32> = BTreeMap::new();
        for token in tokenize_text(query) {
            *tf_map.entry(token).or_insert(0) += 1;
        }

        let mut sparse = SparseVector::default();
        for (token, tf) in tf_map {
            sparse.indices.push(stable_token_hash(&token));
            sparse.values.push(tf as f32);
        }
        sparse
    }
}

/// Default field weights used when the config does not override them.
pub fn default_field_weights() -> BTreeMap<String, f32> {
    BTreeMap::from([
        ("name".to_string(), 3.0),
        ("qualified_name".to_string(), 2.0),
        ("signature".to_string(), 2.0),
        ("docstring".to_string(), 1.5),
        ("content".to_string(), 1.0),
    ])
}
