pub mod db;
pub mod embedded;
pub mod embedding;
pub mod metadata;
pub mod point;
pub mod registry;
pub mod translation;

pub use embedded::EmbeddedStore;
pub use point::{ChunkPoint, FusionMethod, PointPayload, ScoredPoint, SearchFilters, StoreStatistics};

use codecontext_core::bm25::SparseVector;
use codecontext_core::error::StorageError;
use codecontext_core::types::{FileChecksum, IndexState, Relationship};

/// Abstract vector store: dense-kNN + sparse dot-product search with
/// co-stored payloads, plus the per-project persistence the sync engine
/// needs (index state, file checksums, relationship edges).
pub trait VectorStore: Send {
    fn initialize(&mut self) -> Result<(), StorageError>;
    fn close(&mut self) -> Result<(), StorageError>;

    fn upsert(&mut self, points: &[ChunkPoint]) -> Result<(), StorageError>;
    fn upsert_relationships(&mut self, relationships: &[Relationship])
        -> Result<(), StorageError>;
    fn delete_by_file(&mut self, file_path: &str) -> Result<usize, StorageError>;
    /// Drop every point, edge, and checksum; index state survives until the
    /// next `set_index_state`.
    fn wipe(&mut self) -> Result<(), StorageError>;

    /// Dense + sparse retrieval fused in-store (RRF or DBSF), best first.
    fn hybrid_search(
        &self,
        dense: &[f32],
        sparse: &SparseVector,
        limit: usize,
        filters: &SearchFilters,
        fusion: FusionMethod,
    ) -> Result<Vec<ScoredPoint>, StorageError>;

    /// Dense-only retrieval over document points.
    fn search_documents(&self, dense: &[f32], limit: usize)
        -> Result<Vec<ScoredPoint>, StorageError>;

    fn get_code_object(&self, id: &str) -> Result<Option<PointPayload>, StorageError>;
    fn get_points(&self, ids: &[String]) -> Result<Vec<ScoredPoint>, StorageError>;

    /// Outbound relationship edges for the given source points.
    fn relationships_from(&self, source_ids: &[String])
        -> Result<Vec<Relationship>, StorageError>;
    /// Resolve a (possibly qualified) name to point ids; used for soft joins
    /// over unresolved cross-file edges.
    fn find_ids_by_name(&self, name: &str) -> Result<Vec<String>, StorageError>;
    /// Distinct callers of a point, by resolved id or by name stub.
    fn count_callers(&self, id: &str, name: &str) -> Result<usize, StorageError>;

    fn get_index_state(&self) -> Result<Option<IndexState>, StorageError>;
    fn set_index_state(&mut self, state: &IndexState) -> Result<(), StorageError>;

    fn file_checksums(&self) -> Result<Vec<FileChecksum>, StorageError>;
    fn set_file_checksum(&mut self, checksum: &FileChecksum) -> Result<(), StorageError>;
    fn delete_file_checksum(&mut self, relative_path: &str) -> Result<(), StorageError>;

    fn get_statistics(&self) -> Result<StoreStatistics, StorageError>;
}

impl std::fmt::Debug for dyn VectorStore + '_ {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStore").finish_non_exhaustive()
    }
}
