//! Embedding providers.
//!
//! The default provider runs fastembed locally. When the runtime cannot
//! initialize (no model download, unsupported host), embedding degrades to a
//! deterministic unit-norm vector derived from a blake3 seed so offline
//! indexing and the test suite keep working; retrieval quality degrades but
//! behavior stays stable.

use codecontext_core::config::Config;
use codecontext_core::error::{ConfigError, EmbeddingError};
use codecontext_core::instruction::InstructionType;
use fastembed::{EmbeddingModel, TextEmbedding, TextInitOptions};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, OnceLock};
use tracing::warn;

const DEFAULT_TEXT_CACHE_CAPACITY: usize = 4096;

type SharedTextEmbeddingRuntime = Arc<Mutex<TextEmbedding>>;
type RuntimeCache = HashMap<String, Option<SharedTextEmbeddingRuntime>>;
static FASTEMBED_RUNTIME_CACHE: OnceLock<Mutex<RuntimeCache>> = OnceLock::new();

fn runtime_cache() -> &'static Mutex<RuntimeCache> {
    FASTEMBED_RUNTIME_CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

/// A dense embedding backend. The instruction prefix is attached inside
/// `embed`, so callers pass raw text.
pub trait EmbeddingProvider: Send {
    fn initialize(&mut self) -> Result<(), EmbeddingError> {
        Ok(())
    }
    fn model_id(&self) -> &str;
    fn vector_dim(&self) -> usize;
    fn embed(
        &mut self,
        texts: &[String],
        instruction: InstructionType,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError>;
    /// Release accelerator/scratch caches between sync chunks.
    fn release_caches(&mut self) {}
}

impl std::fmt::Debug for dyn EmbeddingProvider + '_ {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingProvider")
            .field("model_id", &self.model_id())
            .finish()
    }
}

pub type EmbeddingFactory =
    fn(&Config) -> Result<Box<dyn EmbeddingProvider>, ConfigError>;

pub struct EmbeddingRegistry {
    factories: BTreeMap<String, EmbeddingFactory>,
}

impl EmbeddingRegistry {
    pub fn with_builtins() -> Self {
        let mut registry = Self {
            factories: BTreeMap::new(),
        };
        registry.register("fastembed", |config| {
            Ok(Box::new(FastEmbedProvider::from_config(config)))
        });
        registry
    }

    pub fn register(&mut self, name: &str, factory: EmbeddingFactory) {
        self.factories.insert(name.to_string(), factory);
    }

    pub fn available(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    pub fn build(&self, config: &Config) -> Result<Box<dyn EmbeddingProvider>, ConfigError> {
        let name = config.embeddings.provider.trim().to_ascii_lowercase();
        let factory = self
            .factories
            .get(&name)
            .ok_or_else(|| ConfigError::ProviderNotFound {
                name: name.clone(),
                available: self.available(),
            })?;
        factory(config)
    }
}

impl Default for EmbeddingRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

pub struct FastEmbedProvider {
    model_id: String,
    dimensions: usize,
    batch_size: usize,
    fastembed_model: Option<EmbeddingModel>,
    runtime: Option<SharedTextEmbeddingRuntime>,
    cache: HashMap<String, Vec<f32>>,
    cache_order: VecDeque<String>,
    cache_capacity: usize,
    enable_runtime: bool,
    attempted_runtime_init: bool,
}

impl FastEmbedProvider {
    pub fn from_config(config: &Config) -> Self {
        let fastembed = &config.embeddings.fastembed;
        let model = parse_fastembed_model(&fastembed.model);
        Self {
            model_id: fastembed.model.clone(),
            dimensions: fastembed.dimensions,
            batch_size: fastembed.batch_size.max(1),
            fastembed_model: model,
            runtime: None,
            cache: HashMap::new(),
            cache_order: VecDeque::new(),
            cache_capacity: DEFAULT_TEXT_CACHE_CAPACITY,
            enable_runtime: fastembed_runtime_enabled(),
            attempted_runtime_init: false,
        }
    }

    #[cfg(test)]
    fn deterministic_only(dimensions: usize) -> Self {
        Self {
            model_id: "deterministic".to_string(),
            dimensions,
            batch_size: 8,
            fastembed_model: None,
            runtime: None,
            cache: HashMap::new(),
            cache_order: VecDeque::new(),
            cache_capacity: DEFAULT_TEXT_CACHE_CAPACITY,
            enable_runtime: false,
            attempted_runtime_init: false,
        }
    }

    fn ensure_runtime(&mut self) {
        if self.attempted_runtime_init || !self.enable_runtime {
            return;
        }
        self.attempted_runtime_init = true;
        let Some(model) = self.fastembed_model.clone() else {
            return;
        };
        let cache_key = self.model_id.clone();

        if let Ok(cache) = runtime_cache().lock() {
            if let Some(cached) = cache.get(&cache_key).cloned() {
                self.runtime = cached;
                return;
            }
        }

        let options = TextInitOptions::new(model).with_show_download_progress(false);
        match TextEmbedding::try_new(options) {
            Ok(runtime) => {
                let shared: SharedTextEmbeddingRuntime = Arc::new(Mutex::new(runtime));
                self.runtime = Some(shared.clone());
                if let Ok(mut cache) = runtime_cache().lock() {
                    cache.insert(cache_key, Some(shared));
                }
            }
            Err(err) => {
                warn!(
                    model = self.model_id,
                    error = %err,
                    "fastembed initialization failed, falling back to deterministic embeddings"
                );
                if let Ok(mut cache) = runtime_cache().lock() {
                    cache.insert(cache_key, None);
                }
            }
        }
    }

    fn embed_uncached(&mut self, inputs: &[String]) -> Vec<Vec<f32>> {
        self.ensure_runtime();
        if let Some(runtime) = self.runtime.as_ref() {
            let refs: Vec<&str> = inputs.iter().map(String::as_str).collect();
            let embed_result = runtime
                .lock()
                .ok()
                .and_then(|mut runtime| runtime.embed(refs, Some(self.batch_size)).ok());
            if let Some(vectors) = embed_result {
                if vectors.iter().all(|v| v.len() == self.dimensions) {
                    return vectors;
                }
            }
            warn!(
                model = self.model_id,
                "fastembed runtime returned invalid embedding shape; switching to deterministic fallback"
            );
            self.runtime = None;
            if let Ok(mut cache) = runtime_cache().lock() {
                cache.insert(self.model_id.clone(), None);
            }
        }

        inputs
            .iter()
            .map(|input| deterministic_embedding(input, self.dimensions))
            .collect()
    }

    fn insert_cache_entry(&mut self, input: String, vector: Vec<f32>) {
        if self.cache_capacity == 0 {
            return;
        }
        if self.cache.contains_key(&input) {
            return;
        }
        while self.cache.len() >= self.cache_capacity {
            let Some(evicted) = self.cache_order.pop_front() else {
                break;
            };
            self.cache.remove(&evicted);
        }
        self.cache_order.push_back(input.clone());
        self.cache.insert(input, vector);
    }
}

impl EmbeddingProvider for FastEmbedProvider {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn vector_dim(&self) -> usize {
        self.dimensions
    }

    fn embed(
        &mut self,
        texts: &[String],
        instruction: InstructionType,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let prefixed: Vec<String> = texts
            .iter()
            .map(|text| format!("{}{}", instruction.prefix(), text))
            .collect();

        let uncached: Vec<String> = prefixed
            .iter()
            .filter(|input| !self.cache.contains_key(*input))
            .cloned()
            .collect();
        if !uncached.is_empty() {
            let vectors = self.embed_uncached(&uncached);
            if vectors.len() != uncached.len() {
                return Err(EmbeddingError::ShapeMismatch {
                    expected: uncached.len(),
                    got: vectors.len(),
                });
            }
            for (input, vector) in uncached.into_iter().zip(vectors) {
                self.insert_cache_entry(input, vector);
            }
        }

        let mut output = Vec::with_capacity(prefixed.len());
        for input in &prefixed {
            match self.cache.get(input) {
                Some(vector) => output.push(vector.clone()),
                None => output.push(deterministic_embedding(input, self.dimensions)),
            }
        }
        Ok(output)
    }

    fn release_caches(&mut self) {
        self.cache.clear();
        self.cache_order.clear();
    }
}

fn parse_fastembed_model(model: &str) -> Option<EmbeddingModel> {
    let key = model.trim().to_ascii_lowercase();
    match key.as_str() {
        "bgesmallenv15q" => Some(EmbeddingModel::BGESmallENV15Q),
        "bgebaseenv15q" => Some(EmbeddingModel::BGEBaseENV15Q),
        "nomicembedtextv15q" => Some(EmbeddingModel::NomicEmbedTextV15Q),
        "jinaembeddingsv2basecode" => Some(EmbeddingModel::JinaEmbeddingsV2BaseCode),
        "bgelargeenv15" => Some(EmbeddingModel::BGELargeENV15),
        _ => model.parse::<EmbeddingModel>().ok(),
    }
}

fn fastembed_runtime_enabled() -> bool {
    match std::env::var("CODECONTEXT_ENABLE_FASTEMBED_RUNTIME") {
        Err(_) => true,
        Ok(value) => !matches!(
            value.to_ascii_lowercase().as_str(),
            "0" | "false" | "no"
        ),
    }
}

/// Deterministic unit-norm pseudo-embedding from a blake3 seed.
fn deterministic_embedding(input: &str, dimensions: usize) -> Vec<f32> {
    if dimensions == 0 {
        return Vec::new();
    }
    let seed_hash = blake3::hash(input.as_bytes());
    let mut state = u64::from_le_bytes(
        seed_hash.as_bytes()[0..8]
            .try_into()
            .expect("seed hash has at least 8 bytes"),
    );
    if state == 0 {
        // xorshift generators must not use an all-zero state.
        state = 0x9e37_79b9_7f4a_7c15;
    }

    let mut vector = Vec::with_capacity(dimensions);
    for _ in 0..dimensions {
        state ^= state >> 12;
        state ^= state << 25;
        state ^= state >> 27;
        let n = state.wrapping_mul(0x2545_F491_4F6C_DD1D);
        let scaled = (n as f64 / u64::MAX as f64) * 2.0 - 1.0;
        vector.push(scaled as f32);
    }

    let norm = vector
        .iter()
        .map(|v| (*v as f64).powi(2))
        .sum::<f64>()
        .sqrt();
    if norm == 0.0 {
        return vector;
    }
    vector
        .into_iter()
        .map(|v| (v as f64 / norm) as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_embedding_is_stable_and_normalized() {
        let first = deterministic_embedding("calculate_tax", 64);
        let second = deterministic_embedding("calculate_tax", 64);
        assert_eq!(first, second);
        let norm: f64 = first.iter().map(|v| (*v as f64).powi(2)).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn instruction_prefix_distinguishes_query_from_passage() {
        let mut provider = FastEmbedProvider::deterministic_only(32);
        let query = provider
            .embed(&["tax".to_string()], InstructionType::Nl2CodeQuery)
            .unwrap();
        let passage = provider
            .embed(&["tax".to_string()], InstructionType::Nl2CodePassage)
            .unwrap();
        assert_ne!(query[0], passage[0]);
    }

    #[test]
    fn embed_preserves_input_order_with_cache_hits() {
        let mut provider = FastEmbedProvider::deterministic_only(16);
        let texts = vec!["alpha".to_string(), "beta".to_string(), "alpha".to_string()];
        let vectors = provider
            .embed(&texts, InstructionType::Nl2CodePassage)
            .unwrap();
        assert_eq!(vectors.len(), 3);
        assert_eq!(vectors[0], vectors[2]);
        assert_ne!(vectors[0], vectors[1]);
    }

    #[test]
    fn release_caches_clears_text_cache() {
        let mut provider = FastEmbedProvider::deterministic_only(16);
        provider
            .embed(&["alpha".to_string()], InstructionType::Nl2CodePassage)
            .unwrap();
        assert!(!provider.cache.is_empty());
        provider.release_caches();
        assert!(provider.cache.is_empty());
    }

    #[test]
    fn registry_rejects_unknown_provider() {
        let registry = EmbeddingRegistry::with_builtins();
        let mut config = Config::default();
        config.embeddings.provider = "openai".into();
        let err = registry.build(&config).unwrap_err();
        assert!(err.to_string().contains("fastembed"));
    }
}
