/// Directory under the user's home holding global config and per-project data.
pub const DATA_DIR_NAME: &str = ".codecontext";

/// Global config file name inside the data directory.
pub const GLOBAL_CONFIG_FILE: &str = "config.toml";

/// Project-local config file, discovered by walking up from the working directory.
pub const PROJECT_CONFIG_FILE: &str = ".codecontext.toml";

/// Per-project metadata side file.
pub const METADATA_FILE: &str = "metadata.json";

pub const DEFAULT_MAX_FILE_SIZE_MB: u64 = 5;
pub const DEFAULT_LIMIT: usize = 10;
pub const MAX_LIMIT: usize = 100;

/// Files processed per sync chunk before the memory barrier runs.
pub const DEFAULT_SYNC_CHUNK_SIZE: usize = 100;
pub const DEFAULT_UPSERT_BATCH_SIZE: usize = 100;
pub const MIN_UPSERT_BATCH_SIZE: usize = 10;
pub const MAX_UPSERT_BATCH_SIZE: usize = 1000;
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 250;

// BM25F defaults.
pub const BM25_K1: f32 = 1.2;
pub const BM25_B: f32 = 0.75;
pub const BM25_AVG_DL: f32 = 100.0;

/// Rank constant for reciprocal rank fusion.
pub const RRF_K: f64 = 60.0;

/// Candidate over-fetch multiplier applied before per-file capping.
pub const SEARCH_OVERFETCH: usize = 3;

// Chunking policy: classes above either bound are split into a summary
// chunk plus per-method chunks.
pub const MAX_CLASS_METHODS: usize = 30;
pub const MAX_OBJECT_BYTES: usize = 8192;

/// Identifier tokenization cache entries.
pub const IDENTIFIER_CACHE_CAPACITY: usize = 10_000;

/// Embedding batches between accelerator cache releases.
pub const EMBED_CLEANUP_INTERVAL: usize = 16;
