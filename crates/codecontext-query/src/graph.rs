//! Retrieval-time graph expansion.
//!
//! Starting from the fused seed results, walk the relationship edges up to
//! `max_hops` hops and score neighbors with a damped weighted-neighbor
//! approximation of personalized PageRank: each node distributes
//! `score × 0.85^hop` uniformly across its out-edges. Unresolved edges are
//! soft-joined by matching their carried name against indexed names — a
//! best-effort join, not a guaranteed reference. Expansion only ever adds
//! candidates, so disabling it never removes results.

use codecontext_core::error::StorageError;
use codecontext_store::{ScoredPoint, VectorStore};
use std::collections::HashMap;
use tracing::debug;

const DAMPING: f64 = 0.85;
/// Soft-join fan-out guard: a name resolving to many points is too
/// ambiguous to be a useful edge.
const MAX_NAME_RESOLUTIONS: usize = 8;

pub fn expand(
    store: &dyn VectorStore,
    seeds: &[ScoredPoint],
    max_hops: u32,
    ppr_threshold: f64,
) -> Result<Vec<ScoredPoint>, StorageError> {
    if seeds.is_empty() || max_hops == 0 {
        return Ok(Vec::new());
    }

    let seed_ids: HashMap<&str, f64> = seeds
        .iter()
        .map(|seed| (seed.id.as_str(), seed.score as f64))
        .collect();

    // id -> accumulated expansion score
    let mut accumulated: HashMap<String, f64> = HashMap::new();
    let mut frontier: Vec<(String, f64)> = seeds
        .iter()
        .map(|seed| (seed.id.clone(), seed.score as f64))
        .collect();

    for hop in 1..=max_hops {
        let damp = DAMPING.powi(hop as i32);
        let mut next_frontier: Vec<(String, f64)> = Vec::new();

        for (source_id, source_score) in &frontier {
            let edges = store.relationships_from(&[source_id.clone()])?;
            if edges.is_empty() {
                continue;
            }

            let mut targets: Vec<String> = Vec::new();
            for edge in &edges {
                match &edge.target_id {
                    Some(target_id) => targets.push(target_id.clone()),
                    None => {
                        let resolved = store.find_ids_by_name(&edge.target_name)?;
                        if resolved.len() <= MAX_NAME_RESOLUTIONS {
                            targets.extend(resolved);
                        }
                    }
                }
            }
            if targets.is_empty() {
                continue;
            }

            let share = source_score * damp / targets.len() as f64;
            for target in targets {
                if target == *source_id {
                    continue;
                }
                let entry = accumulated.entry(target.clone()).or_insert(0.0);
                *entry += share;
                next_frontier.push((target, share));
            }
        }

        frontier = next_frontier;
        if frontier.is_empty() {
            break;
        }
    }

    // Keep neighbors above the threshold that are not already seeds.
    let mut kept: Vec<(String, f64)> = accumulated
        .into_iter()
        .filter(|(id, score)| *score >= ppr_threshold && !seed_ids.contains_key(id.as_str()))
        .collect();
    kept.sort_by(|left, right| {
        right
            .1
            .partial_cmp(&left.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| left.0.cmp(&right.0))
    });

    let ids: Vec<String> = kept.iter().map(|(id, _)| id.clone()).collect();
    let scores: HashMap<&str, f64> = kept.iter().map(|(id, s)| (id.as_str(), *s)).collect();
    let mut points = store.get_points(&ids)?;
    for point in &mut points {
        point.score = scores.get(point.id.as_str()).copied().unwrap_or(0.0) as f32;
    }
    debug!(
        seeds = seeds.len(),
        expanded = points.len(),
        max_hops,
        "graph expansion"
    );
    Ok(points)
}

/// Merge expansion results into the seed list, preferring the
/// higher-scoring occurrence per chunk id.
pub fn merge(seeds: Vec<ScoredPoint>, expanded: Vec<ScoredPoint>) -> Vec<ScoredPoint> {
    let mut by_id: HashMap<String, ScoredPoint> = HashMap::new();
    for point in seeds.into_iter().chain(expanded) {
        match by_id.get(&point.id) {
            Some(existing) if existing.score >= point.score => {}
            _ => {
                by_id.insert(point.id.clone(), point);
            }
        }
    }
    let mut merged: Vec<ScoredPoint> = by_id.into_values().collect();
    merged.sort_by(|left, right| {
        right
            .score
            .partial_cmp(&left.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| left.id.cmp(&right.id))
    });
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use codecontext_core::bm25::SparseVector;
    use codecontext_core::types::{RelationKind, Relationship};
    use codecontext_store::{ChunkPoint, EmbeddedStore, PointPayload};

    fn seed_store() -> (tempfile::TempDir, EmbeddedStore) {
        let dir = tempfile::tempdir().unwrap();
        let mut store = EmbeddedStore::open(dir.path()).unwrap();
        let point = |id: &str, name: &str, file: &str| ChunkPoint {
            id: id.to_string(),
            dense: vec![1.0, 0.0],
            sparse: SparseVector::default(),
            payload: PointPayload {
                file_path: file.to_string(),
                name: name.to_string(),
                node_type: "function".to_string(),
                content: format!("def {name}(): pass"),
                ..PointPayload::default()
            },
        };
        store
            .upsert(&[
                point("a", "alpha", "a.py"),
                point("b", "beta", "b.py"),
                point("c", "gamma", "c.py"),
            ])
            .unwrap();
        store
            .upsert_relationships(&[
                Relationship {
                    source_id: "a".to_string(),
                    target_id: Some("b".to_string()),
                    target_name: "beta".to_string(),
                    kind: RelationKind::Calls,
                    resolved: true,
                },
                Relationship {
                    source_id: "b".to_string(),
                    target_id: None,
                    target_name: "gamma".to_string(),
                    kind: RelationKind::Calls,
                    resolved: false,
                },
            ])
            .unwrap();
        (dir, store)
    }

    fn seed(id: &str, score: f32) -> ScoredPoint {
        ScoredPoint {
            id: id.to_string(),
            score,
            payload: PointPayload::default(),
        }
    }

    #[test]
    fn one_hop_reaches_direct_callees() {
        let (_dir, store) = seed_store();
        let expanded = expand(&store, &[seed("a", 1.0)], 1, 0.0).unwrap();
        let ids: Vec<&str> = expanded.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["b"]);
        assert!((expanded[0].score - 0.85).abs() < 1e-5);
    }

    #[test]
    fn second_hop_follows_name_stubs() {
        let (_dir, store) = seed_store();
        let expanded = expand(&store, &[seed("a", 1.0)], 2, 0.0).unwrap();
        let ids: Vec<&str> = expanded.iter().map(|p| p.id.as_str()).collect();
        assert!(ids.contains(&"b"));
        assert!(ids.contains(&"c"), "stub edge b->gamma should soft-join to c");
    }

    #[test]
    fn threshold_prunes_weak_neighbors() {
        let (_dir, store) = seed_store();
        let expanded = expand(&store, &[seed("a", 0.1)], 1, 0.5).unwrap();
        assert!(expanded.is_empty());
    }

    #[test]
    fn merge_prefers_higher_scores_and_sorts() {
        let merged = merge(
            vec![seed("a", 1.0), seed("b", 0.4)],
            vec![seed("b", 0.6), seed("c", 0.5)],
        );
        let pairs: Vec<(&str, f32)> = merged.iter().map(|p| (p.id.as_str(), p.score)).collect();
        assert_eq!(pairs, [("a", 1.0), ("b", 0.6), ("c", 0.5)]);
    }
}
