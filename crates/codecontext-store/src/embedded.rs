//! Embedded per-project vector store over SQLite.
//!
//! Dense and sparse vectors are co-stored as little-endian blobs under the
//! same point id; hybrid scoring loads the filtered candidate set, scores
//! both modalities in-process, and fuses them with RRF or DBSF before the
//! results leave the store.

use crate::point::{
    ChunkPoint, FusionMethod, PointPayload, ScoredPoint, SearchFilters, StoreStatistics,
};
use crate::{db, VectorStore};
use codecontext_core::bm25::SparseVector;
use codecontext_core::constants::RRF_K;
use codecontext_core::error::StorageError;
use codecontext_core::types::{FileChecksum, IndexState, RelationKind, Relationship, ResultType};
use rusqlite::{params, Connection};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Canonical DDL for the embedded store. Kept in one place so the runtime
/// schema and the tests never drift apart.
const STORE_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS chunks (
    id TEXT PRIMARY KEY,
    file_path TEXT NOT NULL,
    result_type TEXT NOT NULL,
    node_type TEXT NOT NULL,
    name TEXT NOT NULL DEFAULT '',
    qualified_name TEXT,
    language TEXT,
    start_line INTEGER NOT NULL DEFAULT 0,
    end_line INTEGER NOT NULL DEFAULT 0,
    score_weight REAL NOT NULL DEFAULT 1.0,
    payload TEXT NOT NULL,
    dense BLOB NOT NULL,
    sparse_indices BLOB NOT NULL,
    sparse_values BLOB NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_chunks_file ON chunks(file_path);
CREATE INDEX IF NOT EXISTS idx_chunks_name ON chunks(name);
CREATE TABLE IF NOT EXISTS edges (
    source_id TEXT NOT NULL,
    target_id TEXT,
    target_name TEXT NOT NULL,
    kind TEXT NOT NULL,
    resolved INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (source_id, target_name, kind)
);
CREATE TABLE IF NOT EXISTS file_checksums (
    relative_path TEXT PRIMARY KEY,
    checksum TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS index_state (
    state_key TEXT PRIMARY KEY,
    state_json TEXT NOT NULL
);
"#;

pub struct EmbeddedStore {
    db_path: PathBuf,
    conn: Option<Connection>,
}

impl EmbeddedStore {
    pub fn new(project_dir: &Path) -> Self {
        Self {
            db_path: project_dir.join("store.db"),
            conn: None,
        }
    }

    /// Open and initialize in one step.
    pub fn open(project_dir: &Path) -> Result<Self, StorageError> {
        let mut store = Self::new(project_dir);
        store.initialize()?;
        Ok(store)
    }

    fn conn(&self) -> Result<&Connection, StorageError> {
        self.conn
            .as_ref()
            .ok_or_else(|| StorageError::Sqlite("store is not initialized".to_string()))
    }

    fn load_candidates(&self, filters: &SearchFilters) -> Result<Vec<CandidateRow>, StorageError> {
        let conn = self.conn()?;
        let mut sql =
            String::from("SELECT id, payload, dense, sparse_indices, sparse_values FROM chunks");
        let mut clauses = Vec::new();
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(language) = &filters.language {
            clauses.push("language = ?");
            params_vec.push(Box::new(language.clone()));
        }
        if let Some(file_path) = &filters.file_path {
            clauses.push("file_path = ?");
            params_vec.push(Box::new(file_path.clone()));
        }
        if let Some(result_type) = filters.result_type {
            clauses.push("result_type = ?");
            params_vec.push(Box::new(result_type.as_str().to_string()));
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        let mut stmt = conn.prepare(&sql).map_err(StorageError::sqlite)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();
        let rows = stmt
            .query_map(params_refs.as_slice(), |row| {
                Ok(CandidateRow {
                    id: row.get(0)?,
                    payload_json: row.get(1)?,
                    dense: blob_to_f32(&row.get::<_, Vec<u8>>(2)?),
                    sparse_indices: blob_to_u32(&row.get::<_, Vec<u8>>(3)?),
                    sparse_values: blob_to_f32(&row.get::<_, Vec<u8>>(4)?),
                })
            })
            .map_err(StorageError::sqlite)?;

        let mut candidates = Vec::new();
        for row in rows {
            candidates.push(row.map_err(StorageError::sqlite)?);
        }
        Ok(candidates)
    }
}

struct CandidateRow {
    id: String,
    payload_json: String,
    dense: Vec<f32>,
    sparse_indices: Vec<u32>,
    sparse_values: Vec<f32>,
}

impl VectorStore for EmbeddedStore {
    fn initialize(&mut self) -> Result<(), StorageError> {
        if self.conn.is_some() {
            return Ok(());
        }
        let conn = db::open_connection(&self.db_path)?;
        conn.execute_batch(STORE_DDL).map_err(StorageError::sqlite)?;
        self.conn = Some(conn);
        Ok(())
    }

    fn close(&mut self) -> Result<(), StorageError> {
        self.conn = None;
        Ok(())
    }

    fn upsert(&mut self, points: &[ChunkPoint]) -> Result<(), StorageError> {
        if points.is_empty() {
            return Ok(());
        }
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| StorageError::Sqlite("store is not initialized".to_string()))?;
        let tx = conn.transaction().map_err(StorageError::sqlite)?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO chunks
                     (id, file_path, result_type, node_type, name, qualified_name, language,
                      start_line, end_line, score_weight, payload, dense, sparse_indices, sparse_values)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                     ON CONFLICT(id) DO UPDATE SET
                        file_path = excluded.file_path,
                        result_type = excluded.result_type,
                        node_type = excluded.node_type,
                        name = excluded.name,
                        qualified_name = excluded.qualified_name,
                        language = excluded.language,
                        start_line = excluded.start_line,
                        end_line = excluded.end_line,
                        score_weight = excluded.score_weight,
                        payload = excluded.payload,
                        dense = excluded.dense,
                        sparse_indices = excluded.sparse_indices,
                        sparse_values = excluded.sparse_values",
                )
                .map_err(StorageError::sqlite)?;
            for point in points {
                let payload_json = serde_json::to_string(&point.payload)
                    .map_err(|e| StorageError::CorruptState(e.to_string()))?;
                stmt.execute(params![
                    point.id,
                    point.payload.file_path,
                    point.payload.result_type.as_str(),
                    point.payload.node_type,
                    point.payload.name,
                    point.payload.qualified_name,
                    point.payload.language,
                    point.payload.start_line,
                    point.payload.end_line,
                    point.payload.score_weight,
                    payload_json,
                    f32_to_blob(&point.dense),
                    u32_to_blob(&point.sparse.indices),
                    f32_to_blob(&point.sparse.values),
                ])
                .map_err(StorageError::sqlite)?;
            }
        }
        tx.commit().map_err(StorageError::sqlite)?;
        debug!(count = points.len(), "upserted points");
        Ok(())
    }

    fn upsert_relationships(
        &mut self,
        relationships: &[Relationship],
    ) -> Result<(), StorageError> {
        if relationships.is_empty() {
            return Ok(());
        }
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| StorageError::Sqlite("store is not initialized".to_string()))?;
        let tx = conn.transaction().map_err(StorageError::sqlite)?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO edges (source_id, target_id, target_name, kind, resolved)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT(source_id, target_name, kind) DO UPDATE SET
                        target_id = excluded.target_id,
                        resolved = excluded.resolved",
                )
                .map_err(StorageError::sqlite)?;
            for edge in relationships {
                stmt.execute(params![
                    edge.source_id,
                    edge.target_id,
                    edge.target_name,
                    edge.kind.as_str(),
                    edge.resolved as i32,
                ])
                .map_err(StorageError::sqlite)?;
            }
        }
        tx.commit().map_err(StorageError::sqlite)?;
        Ok(())
    }

    fn delete_by_file(&mut self, file_path: &str) -> Result<usize, StorageError> {
        let conn = self.conn()?;
        // Drop edges rooted at the file's points first.
        conn.execute(
            "DELETE FROM edges WHERE source_id IN (SELECT id FROM chunks WHERE file_path = ?1)",
            params![file_path],
        )
        .map_err(StorageError::sqlite)?;
        let deleted = conn
            .execute("DELETE FROM chunks WHERE file_path = ?1", params![file_path])
            .map_err(StorageError::sqlite)?;
        conn.execute(
            "DELETE FROM file_checksums WHERE relative_path = ?1",
            params![file_path],
        )
        .map_err(StorageError::sqlite)?;
        Ok(deleted)
    }

    fn wipe(&mut self) -> Result<(), StorageError> {
        let conn = self.conn()?;
        conn.execute_batch(
            "DELETE FROM chunks; DELETE FROM edges; DELETE FROM file_checksums;",
        )
        .map_err(StorageError::sqlite)?;
        Ok(())
    }

    fn hybrid_search(
        &self,
        dense: &[f32],
        sparse: &SparseVector,
        limit: usize,
        filters: &SearchFilters,
        fusion: FusionMethod,
    ) -> Result<Vec<ScoredPoint>, StorageError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let candidates = self.load_candidates(filters)?;
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let dense_scores: Vec<f32> = candidates
            .iter()
            .map(|c| cosine_similarity(dense, &c.dense))
            .collect();
        let sparse_scores: Vec<f32> = candidates
            .iter()
            .map(|c| sparse_dot(sparse, &c.sparse_indices, &c.sparse_values))
            .collect();

        let fused = match fusion {
            FusionMethod::Rrf => fuse_rrf(&dense_scores, &sparse_scores, limit),
            FusionMethod::Dbsf => fuse_dbsf(&dense_scores, &sparse_scores),
        };

        // Quality weighting is baked into the sparse values at index time,
        // so fused scores are used as-is.
        let mut scored: Vec<(usize, f64)> = fused
            .into_iter()
            .filter(|(_, score)| *score > 0.0)
            .collect();
        scored.sort_by(|left, right| {
            right
                .1
                .partial_cmp(&left.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| candidates[left.0].id.cmp(&candidates[right.0].id))
        });
        scored.truncate(limit);

        scored
            .into_iter()
            .map(|(idx, score)| {
                let candidate = &candidates[idx];
                let payload: PointPayload = serde_json::from_str(&candidate.payload_json)
                    .map_err(|e| StorageError::CorruptState(e.to_string()))?;
                Ok(ScoredPoint {
                    id: candidate.id.clone(),
                    score: score as f32,
                    payload,
                })
            })
            .collect()
    }

    fn search_documents(
        &self,
        dense: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, StorageError> {
        let filters = SearchFilters {
            result_type: Some(ResultType::Document),
            ..SearchFilters::default()
        };
        let candidates = self.load_candidates(&filters)?;
        let mut scored: Vec<(f32, &CandidateRow)> = candidates
            .iter()
            .map(|c| (cosine_similarity(dense, &c.dense), c))
            .collect();
        scored.sort_by(|left, right| {
            right
                .0
                .partial_cmp(&left.0)
                .unwrap_or(Ordering::Equal)
                .then_with(|| left.1.id.cmp(&right.1.id))
        });
        scored.truncate(limit);

        scored
            .into_iter()
            .map(|(score, candidate)| {
                let payload: PointPayload = serde_json::from_str(&candidate.payload_json)
                    .map_err(|e| StorageError::CorruptState(e.to_string()))?;
                Ok(ScoredPoint {
                    id: candidate.id.clone(),
                    score,
                    payload,
                })
            })
            .collect()
    }

    fn get_code_object(&self, id: &str) -> Result<Option<PointPayload>, StorageError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT payload FROM chunks WHERE id = ?1")
            .map_err(StorageError::sqlite)?;
        let mut rows = stmt
            .query_map(params![id], |row| row.get::<_, String>(0))
            .map_err(StorageError::sqlite)?;
        match rows.next() {
            Some(row) => {
                let payload_json = row.map_err(StorageError::sqlite)?;
                let payload: PointPayload = serde_json::from_str(&payload_json)
                    .map_err(|e| StorageError::CorruptState(e.to_string()))?;
                Ok(Some(payload))
            }
            None => Ok(None),
        }
    }

    fn get_points(&self, ids: &[String]) -> Result<Vec<ScoredPoint>, StorageError> {
        let mut points = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(payload) = self.get_code_object(id)? {
                points.push(ScoredPoint {
                    id: id.clone(),
                    score: 0.0,
                    payload,
                });
            }
        }
        Ok(points)
    }

    fn relationships_from(
        &self,
        source_ids: &[String],
    ) -> Result<Vec<Relationship>, StorageError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT source_id, target_id, target_name, kind, resolved
                 FROM edges WHERE source_id = ?1",
            )
            .map_err(StorageError::sqlite)?;
        let mut edges = Vec::new();
        for source_id in source_ids {
            let rows = stmt
                .query_map(params![source_id], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, i32>(4)?,
                    ))
                })
                .map_err(StorageError::sqlite)?;
            for row in rows {
                let (source_id, target_id, target_name, kind, resolved) =
                    row.map_err(StorageError::sqlite)?;
                let Some(kind) = RelationKind::parse(&kind) else {
                    continue;
                };
                edges.push(Relationship {
                    source_id,
                    target_id,
                    target_name,
                    kind,
                    resolved: resolved != 0,
                });
            }
        }
        Ok(edges)
    }

    fn find_ids_by_name(&self, name: &str) -> Result<Vec<String>, StorageError> {
        let conn = self.conn()?;
        // Soft join: exact short-name match, or qualified-name suffix match
        // for dotted targets.
        let mut stmt = conn
            .prepare(
                "SELECT id FROM chunks
                 WHERE name = ?1
                    OR qualified_name = ?1
                    OR qualified_name LIKE ?2
                 ORDER BY id",
            )
            .map_err(StorageError::sqlite)?;
        let rows = stmt
            .query_map(params![name, format!("%.{name}")], |row| {
                row.get::<_, String>(0)
            })
            .map_err(StorageError::sqlite)?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(row.map_err(StorageError::sqlite)?);
        }
        Ok(ids)
    }

    fn count_callers(&self, id: &str, name: &str) -> Result<usize, StorageError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT COUNT(DISTINCT source_id) FROM edges
             WHERE kind = 'CALLS' AND (target_id = ?1 OR target_name = ?2)",
            params![id, name],
            |row| row.get(0),
        )
        .map_err(StorageError::sqlite)
    }

    fn get_index_state(&self) -> Result<Option<IndexState>, StorageError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT state_json FROM index_state WHERE state_key = 'current'")
            .map_err(StorageError::sqlite)?;
        let mut rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(StorageError::sqlite)?;
        match rows.next() {
            Some(row) => {
                let json = row.map_err(StorageError::sqlite)?;
                let state: IndexState = serde_json::from_str(&json)
                    .map_err(|e| StorageError::CorruptState(e.to_string()))?;
                Ok(Some(state))
            }
            None => Ok(None),
        }
    }

    fn set_index_state(&mut self, state: &IndexState) -> Result<(), StorageError> {
        let conn = self.conn()?;
        let json = serde_json::to_string(state)
            .map_err(|e| StorageError::CorruptState(e.to_string()))?;
        conn.execute(
            "INSERT INTO index_state (state_key, state_json) VALUES ('current', ?1)
             ON CONFLICT(state_key) DO UPDATE SET state_json = excluded.state_json",
            params![json],
        )
        .map_err(StorageError::sqlite)?;
        Ok(())
    }

    fn file_checksums(&self) -> Result<Vec<FileChecksum>, StorageError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT relative_path, checksum FROM file_checksums")
            .map_err(StorageError::sqlite)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(FileChecksum {
                    relative_path: row.get(0)?,
                    checksum: row.get(1)?,
                })
            })
            .map_err(StorageError::sqlite)?;
        let mut checksums = Vec::new();
        for row in rows {
            checksums.push(row.map_err(StorageError::sqlite)?);
        }
        Ok(checksums)
    }

    fn set_file_checksum(&mut self, checksum: &FileChecksum) -> Result<(), StorageError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO file_checksums (relative_path, checksum) VALUES (?1, ?2)
             ON CONFLICT(relative_path) DO UPDATE SET checksum = excluded.checksum",
            params![checksum.relative_path, checksum.checksum],
        )
        .map_err(StorageError::sqlite)?;
        Ok(())
    }

    fn delete_file_checksum(&mut self, relative_path: &str) -> Result<(), StorageError> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM file_checksums WHERE relative_path = ?1",
            params![relative_path],
        )
        .map_err(StorageError::sqlite)?;
        Ok(())
    }

    fn get_statistics(&self) -> Result<StoreStatistics, StorageError> {
        let conn = self.conn()?;
        let content_count: usize = conn
            .query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))
            .map_err(StorageError::sqlite)?;
        let code_count: usize = conn
            .query_row(
                "SELECT COUNT(*) FROM chunks WHERE result_type = 'code'",
                [],
                |row| row.get(0),
            )
            .map_err(StorageError::sqlite)?;
        let relationship_count: usize = conn
            .query_row("SELECT COUNT(*) FROM edges", [], |row| row.get(0))
            .map_err(StorageError::sqlite)?;
        let mut stmt = conn
            .prepare(
                "SELECT DISTINCT language FROM chunks
                 WHERE language IS NOT NULL ORDER BY language",
            )
            .map_err(StorageError::sqlite)?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(StorageError::sqlite)?;
        let mut languages = Vec::new();
        for row in rows {
            languages.push(row.map_err(StorageError::sqlite)?);
        }
        Ok(StoreStatistics {
            content_count,
            code_count,
            document_count: content_count - code_count,
            relationship_count,
            languages,
        })
    }
}

fn f32_to_blob(values: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(values.len() * 4);
    for value in values {
        blob.extend_from_slice(&value.to_le_bytes());
    }
    blob
}

fn blob_to_f32(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

fn u32_to_blob(values: &[u32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(values.len() * 4);
    for value in values {
        blob.extend_from_slice(&value.to_le_bytes());
    }
    blob
}

fn blob_to_u32(blob: &[u8]) -> Vec<u32> {
    blob.chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

fn cosine_similarity(query: &[f32], candidate: &[f32]) -> f32 {
    if query.is_empty() || query.len() != candidate.len() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut query_norm = 0.0f64;
    let mut candidate_norm = 0.0f64;
    for (q, c) in query.iter().zip(candidate) {
        dot += (*q as f64) * (*c as f64);
        query_norm += (*q as f64).powi(2);
        candidate_norm += (*c as f64).powi(2);
    }
    if query_norm == 0.0 || candidate_norm == 0.0 {
        return 0.0;
    }
    (dot / (query_norm.sqrt() * candidate_norm.sqrt())) as f32
}

fn sparse_dot(query: &SparseVector, indices: &[u32], values: &[f32]) -> f32 {
    if query.is_empty() || indices.is_empty() {
        return 0.0;
    }
    let candidate: HashMap<u32, f32> = indices.iter().copied().zip(values.iter().copied()).collect();
    query
        .indices
        .iter()
        .zip(&query.values)
        .filter_map(|(index, value)| candidate.get(index).map(|c| c * value))
        .sum()
}

/// Rank both modalities and accumulate `Σ 1/(k + rank)` per candidate.
/// Only the top `per_modality` ranks of each modality contribute.
fn fuse_rrf(
    dense_scores: &[f32],
    sparse_scores: &[f32],
    per_modality: usize,
) -> HashMap<usize, f64> {
    let mut fused: HashMap<usize, f64> = HashMap::new();
    for scores in [dense_scores, sparse_scores] {
        let mut ranked: Vec<(usize, f32)> = scores
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, score)| *score > 0.0)
            .collect();
        ranked.sort_by(|left, right| {
            right
                .1
                .partial_cmp(&left.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| left.0.cmp(&right.0))
        });
        for (rank, (idx, _)) in ranked.into_iter().take(per_modality).enumerate() {
            *fused.entry(idx).or_insert(0.0) += 1.0 / (RRF_K + (rank + 1) as f64);
        }
    }
    fused
}

/// Normalize each modality over mean ± 3σ, clamp to [0, 1], then sum.
fn fuse_dbsf(dense_scores: &[f32], sparse_scores: &[f32]) -> HashMap<usize, f64> {
    let mut fused: HashMap<usize, f64> = HashMap::new();
    for scores in [dense_scores, sparse_scores] {
        let normalized = dbsf_normalize(scores);
        for (idx, score) in normalized.into_iter().enumerate() {
            if score > 0.0 {
                *fused.entry(idx).or_insert(0.0) += score;
            }
        }
    }
    fused
}

fn dbsf_normalize(scores: &[f32]) -> Vec<f64> {
    let positive: Vec<f64> = scores.iter().map(|s| *s as f64).collect();
    let n = positive.len() as f64;
    if n == 0.0 {
        return Vec::new();
    }
    let mean = positive.iter().sum::<f64>() / n;
    let variance = positive.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
    let sigma = variance.sqrt();
    if sigma == 0.0 {
        // A flat distribution carries no ranking signal.
        return scores.iter().map(|s| if *s > 0.0 { 0.5 } else { 0.0 }).collect();
    }
    let low = mean - 3.0 * sigma;
    let high = mean + 3.0 * sigma;
    positive
        .into_iter()
        .map(|s| ((s - low) / (high - low)).clamp(0.0, 1.0))
        .collect()
}
