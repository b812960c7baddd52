//! Optional cross-lingual query rewriting.
//!
//! The retriever passes the query through the configured translation provider
//! before dense encoding when `translation.enabled` is set. The built-in
//! provider is the identity; hosts with a real translation model register
//! their own factory.

use codecontext_core::config::Config;
use codecontext_core::error::{ConfigError, EmbeddingError};
use std::collections::BTreeMap;

pub trait TranslationProvider: Send {
    fn initialize(&mut self) -> Result<(), EmbeddingError> {
        Ok(())
    }
    fn translate(
        &mut self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<String, EmbeddingError>;
}

/// Passes text through unchanged.
pub struct IdentityTranslation;

impl TranslationProvider for IdentityTranslation {
    fn translate(
        &mut self,
        text: &str,
        _source_language: &str,
        _target_language: &str,
    ) -> Result<String, EmbeddingError> {
        Ok(text.to_string())
    }
}

pub type TranslationFactory =
    fn(&Config) -> Result<Box<dyn TranslationProvider>, ConfigError>;

pub struct TranslationRegistry {
    factories: BTreeMap<String, TranslationFactory>,
}

impl TranslationRegistry {
    pub fn with_builtins() -> Self {
        let mut registry = Self {
            factories: BTreeMap::new(),
        };
        registry.register("identity", |_config| Ok(Box::new(IdentityTranslation)));
        registry
    }

    pub fn register(&mut self, name: &str, factory: TranslationFactory) {
        self.factories.insert(name.to_string(), factory);
    }

    pub fn available(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    pub fn build(&self, config: &Config) -> Result<Box<dyn TranslationProvider>, ConfigError> {
        let name = config.translation.provider.trim().to_ascii_lowercase();
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

impl Default for TranslationRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
