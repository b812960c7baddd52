//! Hybrid retriever: instruction-typed query embedding, sparse query
//! encoding, in-store fusion, optional graph expansion, and per-file
//! capping.

use crate::graph;
use codecontext_core::bm25::Bm25FEncoder;
use codecontext_core::config::Config;
use codecontext_core::constants::{MAX_LIMIT, SEARCH_OVERFETCH};
use codecontext_core::error::SearchError;
use codecontext_core::instruction::InstructionType;
use codecontext_core::types::{SearchQuery, SearchResult};
use codecontext_indexer::embed_batch::EmbeddingCoordinator;
use codecontext_store::translation::TranslationProvider;
use codecontext_store::{FusionMethod, ScoredPoint, SearchFilters, VectorStore};
use std::collections::HashMap;
use tracing::{debug, instrument};

pub struct Retriever<'a> {
    config: &'a Config,
    store: &'a dyn VectorStore,
    coordinator: &'a mut EmbeddingCoordinator,
    encoder: Bm25FEncoder,
    translator: Option<Box<dyn TranslationProvider>>,
}

impl<'a> Retriever<'a> {
    pub fn new(
        config: &'a Config,
        store: &'a dyn VectorStore,
        coordinator: &'a mut EmbeddingCoordinator,
    ) -> Self {
        Self {
            config,
            store,
            coordinator,
            encoder: Bm25FEncoder::new(config.indexing.field_weights.clone()),
            translator: None,
        }
    }

    /// Install the translation provider used for cross-lingual query
    /// rewriting; only consulted when `translation.enabled` is set.
    pub fn with_translator(mut self, translator: Box<dyn TranslationProvider>) -> Self {
        self.translator = Some(translator);
        self
    }

    #[instrument(skip_all, fields(limit = query.limit))]
    pub fn search(
        &mut self,
        query: &SearchQuery,
        instruction: InstructionType,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let query_text = query.query.trim();
        if query_text.is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        if query.limit == 0 || query.limit > MAX_LIMIT {
            return Err(SearchError::invalid_parameter(
                "limit",
                query.limit,
                format!("must be between 1 and {MAX_LIMIT}"),
            ));
        }

        let query_text = self.rewrite_query(query_text)?;

        let dense = self
            .coordinator
            .embed_passages(&[query_text.clone()], instruction)?;
        let dense = dense.into_iter().next().unwrap_or_default();
        let sparse = self.encoder.encode_query(&query_text);

        // Over-fetch to leave room for per-file capping and expansion merge.
        let mut fetch_limit = query.limit * SEARCH_OVERFETCH;
        if self.config.search.enable_graph_expansion {
            fetch_limit += query.limit;
        }

        let filters = SearchFilters {
            language: query
                .language_filter
                .as_ref()
                .map(|l| l.trim().to_ascii_lowercase()),
            file_path: query.file_filter.clone(),
            result_type: query.type_filter,
        };
        let fusion = FusionMethod::parse(&self.config.storage.fusion_method);

        let seeds = self
            .store
            .hybrid_search(&dense, &sparse, fetch_limit, &filters, fusion)?;
        debug!(seeds = seeds.len(), "fusion returned candidates");

        let merged = if self.config.search.enable_graph_expansion {
            let expanded = graph::expand(
                self.store,
                &seeds,
                self.config.search.graph_max_hops,
                self.config.search.graph_ppr_threshold,
            )?;
            graph::merge(seeds, expanded)
        } else {
            seeds
        };

        // Filters are enforced in-store for the fused candidates, but graph
        // neighbors arrive unfiltered; enforce once more over the merged set.
        let filtered: Vec<ScoredPoint> = merged
            .into_iter()
            .filter(|point| matches_filters(point, &filters))
            .collect();

        let capped = cap_per_file(filtered, self.config.search.max_chunks_per_file);

        Ok(capped
            .into_iter()
            .take(query.limit)
            .enumerate()
            .map(|(idx, point)| to_search_result(point, idx + 1))
            .collect())
    }

    fn rewrite_query(&mut self, query_text: &str) -> Result<String, SearchError> {
        if !self.config.translation.enabled {
            return Ok(query_text.to_string());
        }
        let Some(translator) = self.translator.as_mut() else {
            return Ok(query_text.to_string());
        };
        let target = &self.config.translation.target_language;
        Ok(translator.translate(query_text, "auto", target)?)
    }
}

fn matches_filters(point: &ScoredPoint, filters: &SearchFilters) -> bool {
    if let Some(language) = &filters.language {
        if point.payload.language.as_deref() != Some(language.as_str()) {
            return false;
        }
    }
    if let Some(file_path) = &filters.file_path {
        if point.payload.file_path != *file_path {
            return false;
        }
    }
    if let Some(result_type) = filters.result_type {
        if point.payload.result_type != result_type {
            return false;
        }
    }
    true
}

/// At most `max_chunks_per_file` survivors per unique file; dropped chunks
/// free slots for lower-ranked chunks from other files.
fn cap_per_file(points: Vec<ScoredPoint>, max_chunks_per_file: usize) -> Vec<ScoredPoint> {
    if max_chunks_per_file == 0 {
        return points;
    }
    let mut per_file: HashMap<String, usize> = HashMap::new();
    let mut kept = Vec::with_capacity(points.len());
    for point in points {
        let count = per_file
            .entry(point.payload.file_path.clone())
            .or_insert(0);
        if *count < max_chunks_per_file {
            *count += 1;
            kept.push(point);
        }
    }
    kept
}

fn to_search_result(point: ScoredPoint, rank: usize) -> SearchResult {
    let payload = &point.payload;
    let metadata = match serde_json::to_value(payload) {
        Ok(serde_json::Value::Object(map)) => map,
        _ => serde_json::Map::new(),
    };

    SearchResult {
        chunk_id: point.id,
        file_path: payload.file_path.clone(),
        start_line: payload.start_line,
        end_line: payload.end_line,
        content: payload.content.clone(),
        result_type: payload.result_type,
        language: payload.language.clone(),
        score: point.score,
        rank,
        metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codecontext_core::bm25::SparseVector;
    use codecontext_core::error::EmbeddingError;
    use codecontext_store::embedding::EmbeddingProvider;
    use codecontext_store::{ChunkPoint, EmbeddedStore, PointPayload};

    struct ZeroProvider;

    impl EmbeddingProvider for ZeroProvider {
        fn model_id(&self) -> &str {
            "zero"
        }
        fn vector_dim(&self) -> usize {
            2
        }
        fn embed(
            &mut self,
            texts: &[String],
            _instruction: InstructionType,
        ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

    fn make_point(id: &str, file: &str, name: &str, content: &str) -> ChunkPoint {
        let encoder = Bm25FEncoder::new(codecontext_core::bm25::default_field_weights());
        let sparse = encoder.encode(&std::collections::BTreeMap::from([
            ("name".to_string(), Some(name.to_string())),
            ("content".to_string(), Some(content.to_string())),
        ]));
        ChunkPoint {
            id: id.to_string(),
            dense: vec![1.0, 0.0],
            sparse,
            payload: PointPayload {
                file_path: file.to_string(),
                absolute_path: format!("/repo/{file}"),
                node_type: "function".to_string(),
                name: name.to_string(),
                language: Some("python".to_string()),
                start_line: 1,
                end_line: 3,
                content: content.to_string(),
                ..PointPayload::default()
            },
        }
    }

    fn search_setup(points: Vec<ChunkPoint>) -> (tempfile::TempDir, EmbeddedStore) {
        let dir = tempfile::tempdir().unwrap();
        let mut store = EmbeddedStore::open(dir.path()).unwrap();
        store.upsert(&points).unwrap();
        (dir, store)
    }

    #[test]
    fn empty_query_fails_fast() {
        let (_dir, store) = search_setup(vec![]);
        let config = Config::default();
        let mut coordinator = EmbeddingCoordinator::new(Box::new(ZeroProvider), 8);
        let mut retriever = Retriever::new(&config, &store, &mut coordinator);
        let err = retriever
            .search(&SearchQuery::new("   "), InstructionType::Nl2CodeQuery)
            .unwrap_err();
        assert!(matches!(err, SearchError::EmptyQuery));
    }

    #[test]
    fn limit_is_validated() {
        let (_dir, store) = search_setup(vec![]);
        let config = Config::default();
        let mut coordinator = EmbeddingCoordinator::new(Box::new(ZeroProvider), 8);
        let mut retriever = Retriever::new(&config, &store, &mut coordinator);
        let mut query = SearchQuery::new("tax");
        query.limit = 500;
        let err = retriever
            .search(&query, InstructionType::Nl2CodeQuery)
            .unwrap_err();
        assert!(matches!(err, SearchError::InvalidParameter { .. }));
    }

    #[test]
    fn lexical_match_ranks_named_function_first() {
        let (_dir, store) = search_setup(vec![
            make_point("t1", "tax.py", "calculate_tax", "def calculate_tax(amount): return amount"),
            make_point("o1", "other.py", "parse_config", "def parse_config(): return {}"),
        ]);
        let config = Config::default();
        let mut coordinator = EmbeddingCoordinator::new(Box::new(ZeroProvider), 8);
        let mut retriever = Retriever::new(&config, &store, &mut coordinator);
        let mut query = SearchQuery::new("calculate tax");
        query.limit = 5;
        let results = retriever
            .search(&query, InstructionType::Nl2CodeQuery)
            .unwrap();
        assert!(!results.is_empty());
        assert_eq!(results[0].meta_str("name"), Some("calculate_tax"));
        assert_eq!(results[0].rank, 1);
    }

    #[test]
    fn per_file_cap_promotes_other_files() {
        let mut points = Vec::new();
        for i in 0..5 {
            points.push(make_point(
                &format!("same{i}"),
                "same.py",
                &format!("tax_helper_{i}"),
                "def tax(): pass",
            ));
        }
        points.push(make_point("other", "other.py", "tax_other", "def tax(): pass"));
        let (_dir, store) = search_setup(points);

        let mut config = Config::default();
        config.search.max_chunks_per_file = 2;
        let mut coordinator = EmbeddingCoordinator::new(Box::new(ZeroProvider), 8);
        let mut retriever = Retriever::new(&config, &store, &mut coordinator);
        let mut query = SearchQuery::new("tax");
        query.limit = 5;
        let results = retriever
            .search(&query, InstructionType::Nl2CodeQuery)
            .unwrap();

        let from_same = results.iter().filter(|r| r.file_path == "same.py").count();
        assert!(from_same <= 2, "cap violated: {from_same}");
        assert!(results.iter().any(|r| r.file_path == "other.py"));
    }

    #[test]
    fn filters_restrict_results() {
        let (_dir, store) = search_setup(vec![
            make_point("t1", "tax.py", "calculate_tax", "def calculate_tax(): pass"),
            make_point("t2", "vat.py", "calculate_vat", "def calculate_vat(): pass"),
        ]);
        let config = Config::default();
        let mut coordinator = EmbeddingCoordinator::new(Box::new(ZeroProvider), 8);
        let mut retriever = Retriever::new(&config, &store, &mut coordinator);
        let mut query = SearchQuery::new("calculate");
        query.file_filter = Some("vat.py".to_string());
        let results = retriever
            .search(&query, InstructionType::Nl2CodeQuery)
            .unwrap();
        assert!(results.iter().all(|r| r.file_path == "vat.py"));
        assert!(!results.is_empty());
    }

    #[test]
    fn disabling_graph_expansion_never_adds_results() {
        let (_dir, store) = search_setup(vec![
            make_point("t1", "tax.py", "calculate_tax", "def calculate_tax(): pass"),
        ]);
        let mut config = Config::default();
        let mut coordinator = EmbeddingCoordinator::new(Box::new(ZeroProvider), 8);

        config.search.enable_graph_expansion = false;
        let baseline = {
            let mut retriever = Retriever::new(&config, &store, &mut coordinator);
            retriever
                .search(&SearchQuery::new("calculate tax"), InstructionType::Nl2CodeQuery)
                .unwrap()
        };

        config.search.enable_graph_expansion = true;
        let expanded = {
            let mut retriever = Retriever::new(&config, &store, &mut coordinator);
            retriever
                .search(&SearchQuery::new("calculate tax"), InstructionType::Nl2CodeQuery)
                .unwrap()
        };

        // Expansion may add, never remove.
        for result in &baseline {
            assert!(expanded.iter().any(|r| r.chunk_id == result.chunk_id));
        }
    }
}
