//! Named factories for pluggable providers.
//!
//! Providers (vector stores, embedding backends, translators) are looked up
//! by the name configured under `storage.provider` / `embeddings.provider` /
//! `translation.provider`. Built-ins are seeded at construction; hosts that
//! want more can register additional factories before building.

use crate::embedded::EmbeddedStore;
use crate::VectorStore;
use codecontext_core::config::Config;
use codecontext_core::error::ConfigError;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub type StoreFactory =
    fn(&Config, &Path) -> Result<Box<dyn VectorStore>, ConfigError>;

pub struct StoreRegistry {
    factories: BTreeMap<String, StoreFactory>,
}

impl StoreRegistry {
    /// Registry seeded with the built-in providers.
    pub fn with_builtins() -> Self {
        let mut registry = Self {
            factories: BTreeMap::new(),
        };
        registry.register("embedded", |_config, project_dir| {
            Ok(Box::new(EmbeddedStore::new(project_dir)))
        });
        registry
    }

    pub fn register(&mut self, name: &str, factory: StoreFactory) {
        self.factories.insert(name.to_string(), factory);
    }

    pub fn available(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    pub fn build(
        &self,
        config: &Config,
        project_dir: &Path,
    ) -> Result<Box<dyn VectorStore>, ConfigError> {
        let name = config.storage.provider.trim().to_ascii_lowercase();
        let factory = self
            .factories
            .get(&name)
            .ok_or_else(|| ConfigError::ProviderNotFound {
                name: name.clone(),
                available: self.available(),
            })?;
        factory(config, project_dir)
    }
}

impl Default for StoreRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Resolve the per-project directory a store lives under.
pub fn project_dir(config: &Config, project_id: &str) -> PathBuf {
    config.project_data_dir(project_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_provider_is_builtin() {
        let registry = StoreRegistry::with_builtins();
        assert_eq!(registry.available(), vec!["embedded".to_string()]);
    }

    #[test]
    fn unknown_provider_reports_available_names() {
        let registry = StoreRegistry::with_builtins();
        let mut config = Config::default();
        config.storage.provider = "qdrant".into();
        let dir = tempfile::tempdir().unwrap();
        let err = registry.build(&config, dir.path()).unwrap_err();
        assert!(err.to_string().contains("qdrant"));
        assert!(err.to_string().contains("embedded"));
    }
}
