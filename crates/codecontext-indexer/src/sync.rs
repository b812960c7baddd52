//! Index orchestration: full and incremental sync.
//!
//! Files are processed in fixed-size chunks. Within a chunk, parsing runs on
//! a rayon worker pool (CPU-bound, no store access); embedding and upserts
//! run on the coordinator thread. Chunks are strictly sequential, and a
//! memory barrier (dropping per-chunk state, releasing embedding caches)
//! runs between them so RSS stays bounded on long runs. IndexState is only
//! written after every chunk has been committed.

use crate::chunker;
use crate::documents;
use crate::embed_batch::EmbeddingCoordinator;
use crate::languages;
use crate::scanner::{FileScanner, ScannedFile, ScannedKind};
use codecontext_core::bm25::Bm25FEncoder;
use codecontext_core::checksum;
use codecontext_core::config::Config;
use codecontext_core::error::IndexError;
use codecontext_core::instruction::InstructionType;
use codecontext_core::types::{
    CodeChunk, DocumentKind, DocumentNode, FileChecksum, IndexState, Relationship, ResultType,
};
use codecontext_store::{ChunkPoint, PointPayload, VectorStore};
use codecontext_vcs::GitRepo;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

/// Cooperative cancellation, checked at chunk boundaries.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SyncOutcome {
    pub files_indexed: usize,
    pub files_skipped: usize,
    pub files_deleted: usize,
    pub objects_indexed: usize,
    pub documents_indexed: usize,
    pub relationships_indexed: usize,
    pub last_commit: Option<String>,
    /// True when an incremental run found nothing to do.
    pub no_op: bool,
}

/// Per-file parse output produced by the worker pool.
struct FileOutput {
    relative_path: String,
    code_chunks: Vec<CodeChunk>,
    documents: Vec<DocumentNode>,
    relationships: Vec<Relationship>,
}

pub struct SyncEngine<'a> {
    config: &'a Config,
    repo_root: PathBuf,
    store: &'a mut dyn VectorStore,
    coordinator: &'a mut EmbeddingCoordinator,
    encoder: Bm25FEncoder,
    cancel: CancelFlag,
}

impl<'a> SyncEngine<'a> {
    pub fn new(
        config: &'a Config,
        repo_root: &Path,
        store: &'a mut dyn VectorStore,
        coordinator: &'a mut EmbeddingCoordinator,
    ) -> Self {
        Self {
            config,
            repo_root: repo_root.to_path_buf(),
            store,
            coordinator,
            encoder: Bm25FEncoder::new(config.indexing.field_weights.clone()),
            cancel: CancelFlag::default(),
        }
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Index every file in the repository. Unchanged files (by content
    /// digest) are skipped unless `force` wipes the collection first.
    pub fn full_sync(&mut self, force: bool) -> Result<SyncOutcome, IndexError> {
        let scan = FileScanner::new(&self.repo_root, self.config).scan();
        let mut all_files = scan.code_files;
        all_files.extend(scan.document_files);
        info!(files = all_files.len(), force, "full sync started");

        if force {
            self.store.wipe()?;
        }

        let known: HashSet<(String, String)> = self
            .store
            .file_checksums()?
            .into_iter()
            .map(|fc| (fc.relative_path, fc.checksum))
            .collect();

        let mut outcome = SyncOutcome::default();
        let mut to_process = Vec::new();
        for file in all_files {
            match checksum::digest_file(&file.path) {
                Ok(digest) => {
                    if !force && known.contains(&(file.relative_path.clone(), digest.clone())) {
                        outcome.files_skipped += 1;
                    } else {
                        to_process.push((file, digest));
                    }
                }
                Err(e) => {
                    warn!(path = %file.relative_path, "unreadable file skipped: {e}");
                }
            }
        }

        self.process_in_chunks(&mut outcome, to_process)?;
        self.write_state(&mut outcome)?;
        info!(
            files = outcome.files_indexed,
            skipped = outcome.files_skipped,
            objects = outcome.objects_indexed,
            "full sync complete"
        );
        Ok(outcome)
    }

    /// Re-index only files changed since the recorded commit. Falls back to
    /// a full sync when no previous commit is recorded.
    pub fn incremental_sync(&mut self) -> Result<SyncOutcome, IndexError> {
        let state = self.store.get_index_state()?;
        let Some(last_commit) = state.as_ref().and_then(|s| s.last_commit_hash.clone()) else {
            debug!("no previous commit recorded; falling back to full sync");
            return self.full_sync(false);
        };

        let repo = GitRepo::open(&self.repo_root)?;
        let changed = repo.diff_since(&last_commit)?;
        if changed.is_empty() {
            // Nothing moved: no upserts, no deletes, state untouched.
            return Ok(SyncOutcome {
                last_commit: Some(last_commit),
                no_op: true,
                ..SyncOutcome::default()
            });
        }
        info!(
            added = changed.added.len(),
            modified = changed.modified.len(),
            deleted = changed.deleted.len(),
            "incremental sync started"
        );

        let mut outcome = SyncOutcome::default();
        for path in changed.deleted.iter().chain(changed.modified.iter()) {
            let removed = self.store.delete_by_file(path)?;
            if removed > 0 {
                debug!(path, removed, "removed stale points");
            }
        }
        for path in &changed.deleted {
            self.store.delete_file_checksum(path)?;
            outcome.files_deleted += 1;
        }

        let affected: HashSet<&str> = changed
            .added
            .iter()
            .chain(changed.modified.iter())
            .map(String::as_str)
            .collect();
        let scan = FileScanner::new(&self.repo_root, self.config).scan();
        let mut to_process = Vec::new();
        for file in scan.code_files.into_iter().chain(scan.document_files) {
            if !affected.contains(file.relative_path.as_str()) {
                continue;
            }
            match checksum::digest_file(&file.path) {
                Ok(digest) => to_process.push((file, digest)),
                Err(e) => warn!(path = %file.relative_path, "unreadable file skipped: {e}"),
            }
        }

        self.process_in_chunks(&mut outcome, to_process)?;
        self.write_state(&mut outcome)?;
        info!(
            files = outcome.files_indexed,
            deleted = outcome.files_deleted,
            "incremental sync complete"
        );
        Ok(outcome)
    }

    /// The chunked core shared by both strategies.
    fn process_in_chunks(
        &mut self,
        outcome: &mut SyncOutcome,
        files: Vec<(ScannedFile, String)>,
    ) -> Result<(), IndexError> {
        if files.is_empty() {
            return Ok(());
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.effective_workers())
            .build()
            .map_err(|e| IndexError::ChunkFailed {
                chunk_index: 0,
                attempts: 0,
                reason: format!("worker pool: {e}"),
            })?;

        let chunk_size = self.config.indexing.chunk_size.max(1);
        for (chunk_index, chunk) in files.chunks(chunk_size).enumerate() {
            if self.cancel.is_cancelled() {
                return Err(IndexError::Cancelled);
            }

            // Stage 1: parse in parallel. Workers never touch the store.
            let outputs: Vec<FileOutput> = pool.install(|| {
                use rayon::prelude::*;
                chunk
                    .par_iter()
                    .filter_map(|(file, _)| process_file(file))
                    .collect()
            });

            // Stage 2: embed + upsert sequentially on this thread.
            self.commit_chunk(chunk_index, &outputs, outcome)?;

            // Only successfully parsed files get their digest recorded;
            // failed files stay eligible for the next run.
            let processed: HashSet<&str> = outputs
                .iter()
                .map(|output| output.relative_path.as_str())
                .collect();
            for (file, digest) in chunk {
                if processed.contains(file.relative_path.as_str()) {
                    self.store.set_file_checksum(&FileChecksum {
                        relative_path: file.relative_path.clone(),
                        checksum: digest.clone(),
                    })?;
                }
            }

            // Memory barrier: per-chunk state drops here; release embedding
            // caches before the next chunk starts.
            drop(outputs);
            if self.config.indexing.memory_management.force_gc_after_chunk
                || self.config.indexing.memory_management.clear_gpu_cache
            {
                self.coordinator.release_caches();
            }
            debug!(chunk_index, "chunk committed");
        }
        Ok(())
    }

    fn commit_chunk(
        &mut self,
        chunk_index: usize,
        outputs: &[FileOutput],
        outcome: &mut SyncOutcome,
    ) -> Result<(), IndexError> {
        let mut code_texts = Vec::new();
        let mut document_texts = Vec::new();
        for output in outputs {
            for chunk in &output.code_chunks {
                // Hard invariant: added context must preserve the raw source
                // slice verbatim.
                if !chunk.content.contains(&chunk.raw_content) {
                    return Err(IndexError::Validation(format!(
                        "chunk {} lost its raw content under added context",
                        chunk.object.id
                    )));
                }
                code_texts.push(chunk.content.clone());
            }
            for document in &output.documents {
                document_texts.push(document.content.clone());
            }
        }

        let code_vectors = self
            .coordinator
            .embed_passages(&code_texts, InstructionType::Nl2CodePassage)?;
        let document_vectors = self
            .coordinator
            .embed_passages(&document_texts, InstructionType::DocumentPassage)?;

        let mut points = Vec::new();
        let mut relationships = Vec::new();
        let mut code_cursor = 0usize;
        let mut document_cursor = 0usize;
        for output in outputs {
            // Replace any stale points for this file before new ones land.
            self.store.delete_by_file(&output.relative_path)?;

            for chunk in &output.code_chunks {
                let sparse = self.encoder.encode(&code_field_map(chunk));
                points.push(code_point(chunk, code_vectors[code_cursor].clone(), sparse));
                code_cursor += 1;
            }
            for document in &output.documents {
                let sparse = self.encoder.encode(&document_field_map(document));
                points.push(document_point(
                    document,
                    document_vectors[document_cursor].clone(),
                    sparse,
                ));
                document_cursor += 1;
            }
            relationships.extend(output.relationships.iter().cloned());

            outcome.files_indexed += 1;
            outcome.objects_indexed += output.code_chunks.len();
            outcome.documents_indexed += output.documents.len();
        }

        let batch_size = self.config.storage.upsert_batch_size;
        for batch in points.chunks(batch_size) {
            self.upsert_with_retry(chunk_index, batch)?;
        }
        self.store.upsert_relationships(&relationships)?;
        outcome.relationships_indexed += relationships.len();
        Ok(())
    }

    /// Retries with exponential backoff; repeated failure aborts the run so
    /// a partial index is never silently committed.
    fn upsert_with_retry(
        &mut self,
        chunk_index: usize,
        batch: &[ChunkPoint],
    ) -> Result<(), IndexError> {
        let max_attempts = self.config.indexing.retry.max_attempts.max(1);
        let base_backoff = self.config.indexing.retry.backoff_ms;
        let mut last_error = String::new();
        for attempt in 0..max_attempts {
            match self.store.upsert(batch) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    last_error = e.to_string();
                    warn!(
                        chunk_index,
                        attempt = attempt + 1,
                        "upsert batch failed: {last_error}"
                    );
                    if attempt + 1 < max_attempts {
                        let backoff = base_backoff.saturating_mul(1 << attempt);
                        std::thread::sleep(std::time::Duration::from_millis(backoff));
                    }
                }
            }
        }
        Err(IndexError::ChunkFailed {
            chunk_index,
            attempts: max_attempts,
            reason: last_error,
        })
    }

    fn write_state(&mut self, outcome: &mut SyncOutcome) -> Result<(), IndexError> {
        let head = GitRepo::open(&self.repo_root)
            .ok()
            .and_then(|repo| repo.head_sha().ok())
            .flatten();
        outcome.last_commit = head.clone();

        let statistics = self.store.get_statistics()?;
        let now = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"));
        let created_at = self
            .store
            .get_index_state()?
            .map(|s| s.created_at)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| now.clone());

        self.store.set_index_state(&IndexState {
            last_commit_hash: head,
            total_files: self.store.file_checksums()?.len(),
            total_objects: statistics.content_count,
            languages: statistics.languages,
            created_at,
            updated_at: now,
        })?;
        Ok(())
    }
}

/// Parse one file into chunks, documents, and relationships. Errors are
/// logged and swallowed; a broken file never aborts the sync.
fn process_file(file: &ScannedFile) -> Option<FileOutput> {
    let source = match std::fs::read_to_string(&file.path) {
        Ok(source) => source,
        Err(e) => {
            warn!(path = %file.relative_path, "read failed, skipped: {e}");
            return None;
        }
    };
    let absolute = file.path.to_string_lossy().to_string();

    match file.kind {
        ScannedKind::Code(language) => {
            let extraction =
                match languages::extract_file(&absolute, &file.relative_path, &source, language) {
                    Ok(extraction) => extraction,
                    Err(e) => {
                        warn!(path = %file.relative_path, "parse failed, skipped: {e}");
                        return None;
                    }
                };
            let relationships = languages::build_relationships(&extraction);
            let code_chunks = chunker::chunk_objects(&extraction);
            Some(FileOutput {
                relative_path: file.relative_path.clone(),
                code_chunks,
                documents: Vec::new(),
                relationships,
            })
        }
        ScannedKind::Markdown => Some(FileOutput {
            relative_path: file.relative_path.clone(),
            code_chunks: Vec::new(),
            documents: documents::parse_markdown(&absolute, &file.relative_path, &source),
            relationships: Vec::new(),
        }),
        ScannedKind::Config => Some(FileOutput {
            relative_path: file.relative_path.clone(),
            code_chunks: Vec::new(),
            documents: documents::parse_config(&absolute, &file.relative_path, &source),
            relationships: Vec::new(),
        }),
    }
}

fn code_field_map(
    chunk: &CodeChunk,
) -> std::collections::BTreeMap<String, Option<String>> {
    let object = &chunk.object;
    std::collections::BTreeMap::from([
        ("name".to_string(), Some(object.name.clone())),
        ("qualified_name".to_string(), object.qualified_name.clone()),
        ("signature".to_string(), Some(object.signature.clone())),
        ("docstring".to_string(), object.docstring.clone()),
        ("content".to_string(), Some(chunk.content.clone())),
    ])
}

fn document_field_map(
    document: &DocumentNode,
) -> std::collections::BTreeMap<String, Option<String>> {
    std::collections::BTreeMap::from([
        ("name".to_string(), Some(document.section_title.clone())),
        ("content".to_string(), Some(document.content.clone())),
    ])
}

fn code_point(
    chunk: &CodeChunk,
    dense: Vec<f32>,
    mut sparse: codecontext_core::bm25::SparseVector,
) -> ChunkPoint {
    let object = &chunk.object;
    // Quality weighting shapes the lexical channel at index time; the fused
    // ranking downstream stays a pure rank computation.
    for value in &mut sparse.values {
        *value *= object.score_weight;
    }
    ChunkPoint {
        id: object.id.clone(),
        dense,
        sparse,
        payload: PointPayload {
            file_path: object.relative_path.clone(),
            absolute_path: object.file_path.clone(),
            result_type: ResultType::Code,
            node_type: object.object_type.as_str().to_string(),
            name: object.name.clone(),
            qualified_name: object.qualified_name.clone(),
            language: Some(object.language.as_str().to_string()),
            start_line: object.start_line,
            end_line: object.end_line,
            content: chunk.content.clone(),
            raw_content: Some(chunk.raw_content.clone()),
            signature: Some(object.signature.clone()),
            docstring: object.docstring.clone(),
            parent_id: object.parent_id.clone(),
            score_weight: object.score_weight,
            ast_metadata: Some(object.ast_metadata.clone()),
            is_summary: chunk.is_summary,
            ..PointPayload::default()
        },
    }
}

fn document_point(
    document: &DocumentNode,
    dense: Vec<f32>,
    sparse: codecontext_core::bm25::SparseVector,
) -> ChunkPoint {
    ChunkPoint {
        id: document.id.clone(),
        dense,
        sparse,
        payload: PointPayload {
            file_path: document.relative_path.clone(),
            absolute_path: document.file_path.clone(),
            result_type: ResultType::Document,
            node_type: match document.node_type {
                DocumentKind::Markdown => "markdown".to_string(),
                DocumentKind::Config => "config".to_string(),
            },
            name: document.section_title.clone(),
            start_line: document.start_line,
            end_line: document.end_line,
            content: document.content.clone(),
            section_title: Some(document.section_title.clone()),
            code_references: document.code_references.clone(),
            config_keys: document.config_keys.clone(),
            env_references: document.env_references.clone(),
            section_depth: Some(document.section_depth),
            config_format: document.config_format.clone(),
            ..PointPayload::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codecontext_core::error::EmbeddingError;
    use codecontext_store::embedding::EmbeddingProvider;
    use codecontext_store::EmbeddedStore;
    use std::fs;

    /// Deterministic provider used instead of the fastembed runtime.
    struct HashProvider;

    impl EmbeddingProvider for HashProvider {
        fn model_id(&self) -> &str {
            "hash"
        }
        fn vector_dim(&self) -> usize {
            16
        }
        fn embed(
            &mut self,
            texts: &[String],
            instruction: InstructionType,
        ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(texts
                .iter()
                .map(|t| {
                    let digest = codecontext_core::checksum::digest_str(&format!(
                        "{}{t}",
                        instruction.prefix()
                    ));
                    let seed = u64::from_str_radix(&digest, 16).unwrap_or(1);
                    (0..16)
                        .map(|i| ((seed.rotate_left(i * 4) & 0xff) as f32) / 255.0)
                        .collect()
                })
                .collect())
        }
    }

    fn write_fixture(dir: &Path, files: &[(&str, &str)]) {
        for (path, content) in files {
            let full = dir.join(path);
            if let Some(parent) = full.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(full, content).unwrap();
        }
    }

    /// Store data lives outside the fixture repo so git diffs never see it.
    fn engine_parts() -> (Config, tempfile::TempDir, EmbeddedStore, EmbeddingCoordinator) {
        let mut config = Config::default();
        config.indexing.parallel_workers = 2;
        let data_dir = tempfile::tempdir().unwrap();
        let store = EmbeddedStore::open(data_dir.path()).unwrap();
        let coordinator = EmbeddingCoordinator::new(Box::new(HashProvider), 8);
        (config, data_dir, store, coordinator)
    }

    const PY_TAX: &str = "def calculate_tax(amount):\n    \"\"\"Flat tax.\"\"\"\n    return amount * 0.2\n";

    #[test]
    fn full_sync_indexes_code_and_documents() {
        let repo = tempfile::tempdir().unwrap();
        write_fixture(
            repo.path(),
            &[
                ("src/tax.py", PY_TAX),
                ("README.md", "# App\n\n## Taxes\n\nUses `calculate_tax`.\n"),
            ],
        );
        let (config, _data_dir, mut store, mut coordinator) = engine_parts();
        let mut engine = SyncEngine::new(&config, repo.path(), &mut store, &mut coordinator);
        let outcome = engine.full_sync(false).unwrap();

        assert_eq!(outcome.files_indexed, 2);
        assert_eq!(outcome.objects_indexed, 1);
        assert_eq!(outcome.documents_indexed, 1);

        let statistics = store.get_statistics().unwrap();
        assert_eq!(statistics.content_count, 2);
        assert_eq!(statistics.code_count, 1);
        assert_eq!(statistics.languages, vec!["python".to_string()]);

        let state = store.get_index_state().unwrap().unwrap();
        assert_eq!(state.total_objects, 2);
        // Not a git repo, so no commit is recorded.
        assert!(state.last_commit_hash.is_none());
    }

    #[test]
    fn unchanged_files_are_skipped_on_resync() {
        let repo = tempfile::tempdir().unwrap();
        write_fixture(repo.path(), &[("src/tax.py", PY_TAX)]);
        let (config, _data_dir, mut store, mut coordinator) = engine_parts();

        {
            let mut engine = SyncEngine::new(&config, repo.path(), &mut store, &mut coordinator);
            let first = engine.full_sync(false).unwrap();
            assert_eq!(first.files_indexed, 1);
        }
        {
            let mut engine = SyncEngine::new(&config, repo.path(), &mut store, &mut coordinator);
            let second = engine.full_sync(false).unwrap();
            assert_eq!(second.files_indexed, 0);
            assert_eq!(second.files_skipped, 1);
        }
    }

    #[test]
    fn force_reindexes_everything() {
        let repo = tempfile::tempdir().unwrap();
        write_fixture(repo.path(), &[("src/tax.py", PY_TAX)]);
        let (config, _data_dir, mut store, mut coordinator) = engine_parts();
        {
            let mut engine = SyncEngine::new(&config, repo.path(), &mut store, &mut coordinator);
            engine.full_sync(false).unwrap();
        }
        {
            let mut engine = SyncEngine::new(&config, repo.path(), &mut store, &mut coordinator);
            let forced = engine.full_sync(true).unwrap();
            assert_eq!(forced.files_indexed, 1);
        }
    }

    fn git_commit_all(repo_path: &Path, message: &str) -> String {
        let repo = git2::Repository::open(repo_path)
            .unwrap_or_else(|_| git2::Repository::init(repo_path).unwrap());
        let sig = git2::Signature::now("tester", "tester@example.com").unwrap();
        let mut index = repo.index().unwrap();
        index
            .add_all(["*"], git2::IndexAddOption::DEFAULT, None)
            .unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let parent = repo
            .head()
            .ok()
            .and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.iter().collect();
        let id = repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .unwrap();
        id.to_string()
    }

    #[test]
    fn incremental_sync_is_a_no_op_without_changes() {
        let repo = tempfile::tempdir().unwrap();
        write_fixture(repo.path(), &[("src/tax.py", PY_TAX)]);
        git_commit_all(repo.path(), "initial");

        let (config, _data_dir, mut store, mut coordinator) = engine_parts();
        {
            let mut engine = SyncEngine::new(&config, repo.path(), &mut store, &mut coordinator);
            engine.full_sync(false).unwrap();
        }
        let state_before = store.get_index_state().unwrap().unwrap();

        let mut engine = SyncEngine::new(&config, repo.path(), &mut store, &mut coordinator);
        let outcome = engine.incremental_sync().unwrap();
        assert!(outcome.no_op);
        assert_eq!(outcome.files_indexed, 0);
        assert_eq!(outcome.files_deleted, 0);

        let state_after = store.get_index_state().unwrap().unwrap();
        assert_eq!(state_before.updated_at, state_after.updated_at);
        assert_eq!(state_before.last_commit_hash, state_after.last_commit_hash);
    }

    #[test]
    fn incremental_sync_removes_deleted_files() {
        let repo = tempfile::tempdir().unwrap();
        write_fixture(
            repo.path(),
            &[
                ("src/tax.py", PY_TAX),
                ("src/other.py", "def keep_me():\n    return 1\n"),
            ],
        );
        git_commit_all(repo.path(), "initial");

        let (config, _data_dir, mut store, mut coordinator) = engine_parts();
        {
            let mut engine = SyncEngine::new(&config, repo.path(), &mut store, &mut coordinator);
            engine.full_sync(false).unwrap();
        }
        assert_eq!(store.get_statistics().unwrap().content_count, 2);

        fs::remove_file(repo.path().join("src/tax.py")).unwrap();

        let mut engine = SyncEngine::new(&config, repo.path(), &mut store, &mut coordinator);
        let outcome = engine.incremental_sync().unwrap();
        assert!(!outcome.no_op);
        assert_eq!(outcome.files_deleted, 1);

        // Every point for the deleted path is gone, the other file survives.
        let statistics = store.get_statistics().unwrap();
        assert_eq!(statistics.content_count, 1);
        assert_eq!(store.find_ids_by_name("keep_me").unwrap().len(), 1);
        assert!(store.find_ids_by_name("calculate_tax").unwrap().is_empty());
    }

    #[test]
    fn cancellation_stops_before_the_next_chunk() {
        let repo = tempfile::tempdir().unwrap();
        write_fixture(repo.path(), &[("src/tax.py", PY_TAX)]);
        let (config, _data_dir, mut store, mut coordinator) = engine_parts();
        let mut engine = SyncEngine::new(&config, repo.path(), &mut store, &mut coordinator);
        engine.cancel_flag().cancel();
        let err = engine.full_sync(false).unwrap_err();
        assert!(matches!(err, IndexError::Cancelled));
    }
}
