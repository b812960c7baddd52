use crate::bm25;
use crate::constants;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub embeddings: EmbeddingsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub translation: TranslationConfig,
    #[serde(default)]
    pub indexing: IndexingConfig,
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingsConfig {
    /// Name of the embedding provider plugin in the registry.
    #[serde(default = "default_embeddings_provider")]
    pub provider: String,
    #[serde(default)]
    pub fastembed: FastembedConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FastembedConfig {
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_embedding_dimensions")]
    pub dimensions: usize,
    #[serde(default = "default_embedding_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_device")]
    pub device: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Name of the vector store plugin in the registry.
    #[serde(default = "default_storage_provider")]
    pub provider: String,
    #[serde(default = "default_storage_mode")]
    pub mode: String,
    /// Data directory root; empty means `<home>/.codecontext/data`.
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default = "default_fusion_method")]
    pub fusion_method: String,
    #[serde(default = "default_upsert_batch_size")]
    pub upsert_batch_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default)]
    pub enable_graph_expansion: bool,
    #[serde(default = "default_graph_max_hops")]
    pub graph_max_hops: u32,
    #[serde(default = "default_graph_ppr_threshold")]
    pub graph_ppr_threshold: f64,
    #[serde(default = "default_max_chunks_per_file")]
    pub max_chunks_per_file: usize,
    #[serde(default = "default_limit")]
    pub default_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_translation_provider")]
    pub provider: String,
    #[serde(default = "default_translation_target")]
    pub target_language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    /// Parse worker count; 0 derives it from available CPU parallelism.
    #[serde(default)]
    pub parallel_workers: usize,
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,
    /// Files per sync chunk between memory barriers.
    #[serde(default = "default_sync_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "bm25::default_field_weights")]
    pub field_weights: BTreeMap<String, f32>,
    #[serde(default)]
    pub memory_management: MemoryManagementConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryManagementConfig {
    #[serde(default = "default_true")]
    pub force_gc_after_chunk: bool,
    #[serde(default = "default_true")]
    pub clear_gpu_cache: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_retry_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub backoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default = "default_include")]
    pub include: Vec<String>,
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_embeddings_provider() -> String {
    "fastembed".into()
}
fn default_embedding_model() -> String {
    "BGESmallENV15Q".into()
}
fn default_embedding_dimensions() -> usize {
    384
}
fn default_embedding_batch_size() -> usize {
    64
}
fn default_device() -> String {
    "cpu".into()
}
fn default_storage_provider() -> String {
    "embedded".into()
}
fn default_storage_mode() -> String {
    "embedded".into()
}
fn default_fusion_method() -> String {
    "rrf".into()
}
fn default_upsert_batch_size() -> usize {
    constants::DEFAULT_UPSERT_BATCH_SIZE
}
fn default_graph_max_hops() -> u32 {
    2
}
fn default_graph_ppr_threshold() -> f64 {
    0.15
}
fn default_max_chunks_per_file() -> usize {
    3
}
fn default_limit() -> usize {
    constants::DEFAULT_LIMIT
}
fn default_translation_provider() -> String {
    "identity".into()
}
fn default_translation_target() -> String {
    "en".into()
}
fn default_max_file_size_mb() -> u64 {
    constants::DEFAULT_MAX_FILE_SIZE_MB
}
fn default_sync_chunk_size() -> usize {
    constants::DEFAULT_SYNC_CHUNK_SIZE
}
fn default_retry_attempts() -> u32 {
    constants::DEFAULT_RETRY_ATTEMPTS
}
fn default_retry_backoff_ms() -> u64 {
    constants::DEFAULT_RETRY_BACKOFF_MS
}
fn default_include() -> Vec<String> {
    vec!["**/*".into()]
}
fn default_exclude() -> Vec<String> {
    [
        ".git/",
        "node_modules/",
        "__pycache__/",
        "target/",
        "build/",
        "dist/",
        ".venv/",
        "venv/",
        "*.min.js",
        "*.min.css",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
fn default_log_level() -> String {
    "info".into()
}
fn default_true() -> bool {
    true
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            provider: default_embeddings_provider(),
            fastembed: FastembedConfig::default(),
        }
    }
}

impl Default for FastembedConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            dimensions: default_embedding_dimensions(),
            batch_size: default_embedding_batch_size(),
            device: default_device(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            provider: default_storage_provider(),
            mode: default_storage_mode(),
            path: String::new(),
            url: String::new(),
            api_key: String::new(),
            port: None,
            fusion_method: default_fusion_method(),
            upsert_batch_size: default_upsert_batch_size(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            enable_graph_expansion: false,
            graph_max_hops: default_graph_max_hops(),
            graph_ppr_threshold: default_graph_ppr_threshold(),
            max_chunks_per_file: default_max_chunks_per_file(),
            default_limit: default_limit(),
        }
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: default_translation_provider(),
            target_language: default_translation_target(),
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            parallel_workers: 0,
            max_file_size_mb: default_max_file_size_mb(),
            chunk_size: default_sync_chunk_size(),
            field_weights: bm25::default_field_weights(),
            memory_management: MemoryManagementConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl Default for MemoryManagementConfig {
    fn default() -> Self {
        Self {
            force_gc_after_chunk: true,
            clear_gpu_cache: true,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_retry_attempts(),
            backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            include: default_include(),
            exclude: default_exclude(),
            name: String::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// `<home>/.codecontext`
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(constants::DATA_DIR_NAME)
}

pub fn global_config_path() -> PathBuf {
    config_dir().join(constants::GLOBAL_CONFIG_FILE)
}

/// `<home>/.codecontext/data`
pub fn default_data_dir() -> PathBuf {
    config_dir().join("data")
}

/// Find `.codecontext.toml` by walking up from `start`.
pub fn find_project_config(start: &Path) -> Option<PathBuf> {
    let mut current = Some(start);
    while let Some(dir) = current {
        let candidate = dir.join(constants::PROJECT_CONFIG_FILE);
        if candidate.is_file() {
            return Some(candidate);
        }
        current = dir.parent();
    }
    None
}

impl Config {
    /// Load configuration with the layered precedence (low → high):
    /// built-in defaults < global `~/.codecontext/config.toml` <
    /// `CODECONTEXT_CONFIG` file < project `.codecontext.toml` (walking up
    /// from `cwd`) < environment variables < `overrides`.
    ///
    /// Only fields explicitly set in a higher-priority layer override lower
    /// layers.
    pub fn load(cwd: &Path, overrides: Option<toml::Value>) -> Result<Self, ConfigError> {
        let mut merged = toml::Value::Table(toml::map::Map::new());

        let global_path = global_config_path();
        if global_path.exists() {
            merge_toml_values(&mut merged, &load_toml_value(&global_path)?);
        }

        if let Ok(env_path) = std::env::var("CODECONTEXT_CONFIG") {
            let env_path = PathBuf::from(env_path);
            if env_path.exists() {
                merge_toml_values(&mut merged, &load_toml_value(&env_path)?);
            }
        }

        if let Some(project_path) = find_project_config(cwd) {
            merge_toml_values(&mut merged, &load_toml_value(&project_path)?);
        }

        merge_toml_values(&mut merged, &env_overrides_layer());

        if let Some(programmatic) = overrides {
            merge_toml_values(&mut merged, &programmatic);
        }

        let config_str =
            toml::to_string(&merged).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let mut config: Config =
            toml::from_str(&config_str).map_err(|e| ConfigError::Parse(e.to_string()))?;

        config.normalize();
        Ok(config)
    }

    /// Clamp and canonicalize values after merging.
    fn normalize(&mut self) {
        self.storage.fusion_method = match self.storage.fusion_method.trim().to_ascii_lowercase().as_str() {
            "dbsf" => "dbsf".to_string(),
            _ => "rrf".to_string(),
        };
        self.storage.upsert_batch_size = self.storage.upsert_batch_size.clamp(
            constants::MIN_UPSERT_BATCH_SIZE,
            constants::MAX_UPSERT_BATCH_SIZE,
        );
        self.storage.mode = match self.storage.mode.trim().to_ascii_lowercase().as_str() {
            "remote" => "remote".to_string(),
            _ => "embedded".to_string(),
        };
        if self.search.max_chunks_per_file == 0 {
            self.search.max_chunks_per_file = default_max_chunks_per_file();
        }
        if self.search.graph_max_hops == 0 {
            self.search.graph_max_hops = 1;
        }
        self.search.graph_ppr_threshold = self.search.graph_ppr_threshold.clamp(0.0, 1.0);
        if self.search.default_limit == 0 {
            self.search.default_limit = default_limit();
        }
        self.search.default_limit = self.search.default_limit.min(constants::MAX_LIMIT);
        if self.indexing.chunk_size == 0 {
            self.indexing.chunk_size = default_sync_chunk_size();
        }
        if self.indexing.retry.max_attempts == 0 {
            self.indexing.retry.max_attempts = default_retry_attempts();
        }
        if self.indexing.field_weights.is_empty() {
            self.indexing.field_weights = bm25::default_field_weights();
        }
        if self.project.include.is_empty() {
            self.project.include = default_include();
        }
        if self.embeddings.fastembed.batch_size == 0 {
            self.embeddings.fastembed.batch_size = default_embedding_batch_size();
        }
    }

    /// Resolved data directory root.
    pub fn data_dir(&self) -> PathBuf {
        if self.storage.path.trim().is_empty() {
            default_data_dir()
        } else {
            PathBuf::from(expand_tilde(self.storage.path.trim()))
        }
    }

    /// Per-project data directory.
    pub fn project_data_dir(&self, project_id: &str) -> PathBuf {
        self.data_dir().join(project_id)
    }

    /// Resolved parse worker count (0 means derive from the CPU).
    pub fn effective_workers(&self) -> usize {
        if self.indexing.parallel_workers > 0 {
            self.indexing.parallel_workers
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        }
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.indexing.max_file_size_mb * 1024 * 1024
    }
}

fn load_toml_value(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    content
        .parse::<toml::Value>()
        .map_err(|e| ConfigError::Parse(format!("{}: {e}", path.display())))
}

/// Deep-merge `overlay` into `base`. Only keys present in `overlay` are written.
fn merge_toml_values(base: &mut toml::Value, overlay: &toml::Value) {
    if let (toml::Value::Table(base_map), toml::Value::Table(overlay_map)) = (base, overlay) {
        for (key, overlay_val) in overlay_map {
            if let Some(base_val) = base_map.get_mut(key) {
                if base_val.is_table() && overlay_val.is_table() {
                    merge_toml_values(base_val, overlay_val);
                } else {
                    *base_val = overlay_val.clone();
                }
            } else {
                base_map.insert(key.clone(), overlay_val.clone());
            }
        }
    }
}

/// Environment overrides recognized across the CLI surface, expressed as a
/// merge layer so programmatic overrides still win.
fn env_overrides_layer() -> toml::Value {
    let mut root = toml::map::Map::new();

    let mut fastembed = toml::map::Map::new();
    if let Ok(v) = std::env::var("CODECONTEXT_DEVICE") {
        fastembed.insert("device".into(), toml::Value::String(v));
    }
    if let Ok(v) = std::env::var("CODECONTEXT_BATCH_SIZE") {
        if let Ok(n) = v.parse::<i64>() {
            fastembed.insert("batch_size".into(), toml::Value::Integer(n));
        }
    }
    if let Ok(v) = std::env::var("CODECONTEXT_MODEL") {
        fastembed.insert("model".into(), toml::Value::String(v));
    }
    if !fastembed.is_empty() {
        let mut embeddings = toml::map::Map::new();
        embeddings.insert("fastembed".into(), toml::Value::Table(fastembed));
        root.insert("embeddings".into(), toml::Value::Table(embeddings));
    }

    if let Ok(v) = std::env::var("CODECONTEXT_PORT") {
        if let Ok(n) = v.parse::<i64>() {
            let mut storage = toml::map::Map::new();
            storage.insert("port".into(), toml::Value::Integer(n));
            root.insert("storage".into(), toml::Value::Table(storage));
        }
    }

    if let Ok(v) = std::env::var("CODECONTEXT_LOG_LEVEL") {
        let mut logging = toml::map::Map::new();
        logging.insert("level".into(), toml::Value::String(v));
        root.insert("logging".into(), toml::Value::Table(logging));
    }

    toml::Value::Table(root)
}

fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest).to_string_lossy().to_string();
        }
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.storage.fusion_method, "rrf");
        assert_eq!(config.storage.upsert_batch_size, 100);
        assert_eq!(config.indexing.chunk_size, 100);
        assert!(!config.search.enable_graph_expansion);
        assert_eq!(config.search.max_chunks_per_file, 3);
        assert!(config.indexing.field_weights.contains_key("name"));
    }

    #[test]
    fn normalize_clamps_out_of_range_values() {
        let mut config = Config::default();
        config.storage.upsert_batch_size = 5;
        config.storage.fusion_method = "RRFX".into();
        config.search.graph_ppr_threshold = 7.0;
        config.normalize();
        assert_eq!(config.storage.upsert_batch_size, 10);
        assert_eq!(config.storage.fusion_method, "rrf");
        assert_eq!(config.search.graph_ppr_threshold, 1.0);
    }

    #[test]
    fn dbsf_is_accepted_as_fusion_method() {
        let mut config = Config::default();
        config.storage.fusion_method = "DBSF".into();
        config.normalize();
        assert_eq!(config.storage.fusion_method, "dbsf");
    }

    #[test]
    fn project_config_is_found_walking_up() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b/c");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(
            dir.path().join(".codecontext.toml"),
            "[search]\nmax_chunks_per_file = 5\n",
        )
        .unwrap();
        let found = find_project_config(&nested).unwrap();
        assert!(found.ends_with(".codecontext.toml"));
    }

    #[test]
    fn overrides_take_precedence_over_project_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(".codecontext.toml"),
            "[search]\nmax_chunks_per_file = 5\n[storage]\nfusion_method = \"dbsf\"\n",
        )
        .unwrap();
        let overrides: toml::Value = "[search]\nmax_chunks_per_file = 7"
            .parse()
            .unwrap();
        let config = Config::load(dir.path(), Some(overrides)).unwrap();
        assert_eq!(config.search.max_chunks_per_file, 7);
        // Untouched project-file key survives the override layer.
        assert_eq!(config.storage.fusion_method, "dbsf");
    }
}
