//! Per-invocation context threaded through the commands.
//!
//! Replaces process-wide singletons: configuration, project identity, the
//! vector store, and the embedding coordinator are built once per command
//! from the entry point and passed down explicitly.

use anyhow::Context as _;
use codecontext_core::config::Config;
use codecontext_indexer::embed_batch::EmbeddingCoordinator;
use codecontext_store::embedding::EmbeddingRegistry;
use codecontext_store::registry::StoreRegistry;
use codecontext_store::VectorStore;
use codecontext_vcs::{normalize_project_id, project_id};
use std::path::{Path, PathBuf};

pub struct CliContext {
    pub config: Config,
    pub project_id: String,
    pub collection_name: String,
    pub data_dir: PathBuf,
}

impl CliContext {
    pub fn build(repo_path: &Path, config_file: Option<&str>) -> anyhow::Result<Self> {
        let overrides = match config_file {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config file {path}"))?;
                Some(
                    raw.parse::<toml::Value>()
                        .with_context(|| format!("parsing config file {path}"))?,
                )
            }
            None => None,
        };
        let config = Config::load(repo_path, overrides)?;

        let raw_id = project_id(repo_path);
        let collection_name = normalize_project_id(&raw_id);
        let data_dir = config.data_dir();

        Ok(Self {
            config,
            project_id: raw_id,
            collection_name,
            data_dir,
        })
    }

    pub fn project_dir(&self) -> PathBuf {
        self.data_dir.join(&self.collection_name)
    }

    pub fn open_store(&self) -> anyhow::Result<Box<dyn VectorStore>> {
        let registry = StoreRegistry::with_builtins();
        let mut store = registry.build(&self.config, &self.project_dir())?;
        store.initialize()?;
        Ok(store)
    }

    pub fn build_coordinator(&self) -> anyhow::Result<EmbeddingCoordinator> {
        let registry = EmbeddingRegistry::with_builtins();
        let provider = registry.build(&self.config)?;
        Ok(EmbeddingCoordinator::new(
            provider,
            self.config.embeddings.fastembed.batch_size,
        ))
    }
}
