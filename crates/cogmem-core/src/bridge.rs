//! BridgeDiscovery — surfaces memories that are novel relative to the
//! query yet connectable to the currently-activated set: candidate
//! bridges between conceptual neighborhoods.

use crate::config::CognitiveConfig;
use crate::embeddings::cosine_similarity_unit;
use crate::error::Result;
use crate::memory::{Level, Memory};
use crate::storage::MetadataStore;

/// A candidate bridge with its score components and a short explanation.
#[derive(Debug, Clone)]
pub struct Bridge {
    pub memory: Memory,
    pub novelty: f32,
    pub connection_potential: f32,
    pub bridge_score: f32,
    pub explanation: String,
}

pub struct BridgeDiscovery<'a> {
    store: &'a MetadataStore,
    config: &'a CognitiveConfig,
}

impl<'a> BridgeDiscovery<'a> {
    pub fn new(store: &'a MetadataStore, config: &'a CognitiveConfig) -> Self {
        Self { store, config }
    }

    fn explain(&self, novelty: f32, connection_potential: f32) -> String {
        let novelty_band = if novelty > 0.7 {
            "highly novel"
        } else if novelty > 0.5 {
            "moderately novel"
        } else {
            "somewhat novel"
        };
        let connection_band = if connection_potential > 0.7 {
            "strong connections"
        } else if connection_potential > 0.4 {
            "moderate connections"
        } else {
            "weak connections"
        };
        format!("{novelty_band}, {connection_band} to the activated set")
    }

    /// `activated` are the memories already surfaced by ActivationEngine
    /// (or a small similarity prefetch when activation produced nothing).
    pub fn discover(&self, query: &[f32], activated: &[Memory]) -> Result<Vec<Bridge>> {
        let activated_ids: std::collections::HashSet<&str> =
            activated.iter().map(|m| m.id.as_str()).collect();

        let mut candidates = Vec::new();
        'outer: for level in [Level::Concept, Level::Context, Level::Episode] {
            for memory in self.store.get_memories_by_level(level)? {
                if activated_ids.contains(memory.id.as_str()) {
                    continue;
                }
                candidates.push(memory);
                if candidates.len() >= self.config.max_bridge_candidates {
                    break 'outer;
                }
            }
        }

        let mut bridges = Vec::new();
        for candidate in candidates {
            let Some(embedding) = candidate.embedding.as_ref() else {
                continue;
            };

            let novelty = 1.0 - cosine_similarity_unit(query, embedding);
            if novelty < self.config.min_novelty {
                continue;
            }

            let connection_potential = activated
                .iter()
                .filter_map(|a| a.embedding.as_ref())
                .map(|a_embedding| cosine_similarity_unit(embedding, a_embedding))
                .fold(0.0f32, f32::max);

            let bridge_score =
                self.config.novelty_weight * novelty + self.config.connection_weight * connection_potential;

            let explanation = self.explain(novelty, connection_potential);

            bridges.push(Bridge {
                memory: candidate,
                novelty,
                connection_potential,
                bridge_score,
                explanation,
            });
        }

        bridges.sort_by(|a, b| {
            b.bridge_score
                .partial_cmp(&a.bridge_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.novelty.partial_cmp(&a.novelty).unwrap_or(std::cmp::Ordering::Equal))
                .then_with(|| b.memory.timestamp.cmp(&a.memory.timestamp))
        });

        bridges.truncate(self.config.bridge_top_k);
        Ok(bridges)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{ConsolidationStatus, Dimensions, MemoryType};
    use std::collections::HashMap;

    fn memory(id: &str, embedding: Vec<f32>) -> Memory {
        let now = chrono::Utc::now();
        Memory {
            id: id.to_string(),
            content: "c".to_string(),
            level: Level::Episode,
            memory_type: MemoryType::Episodic,
            dimensions: Dimensions::default(),
            embedding: Some(embedding),
            timestamp: now,
            last_accessed: now,
            access_count: 0,
            strength: 1.0,
            importance_score: 0.0,
            decay_rate: 0.0,
            consolidation_status: ConsolidationStatus::None,
            parent_id: None,
            tags: vec![],
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn no_bridge_below_novelty_floor() {
        let store = MetadataStore::open_in_memory().unwrap();
        let config = CognitiveConfig::default();
        store.store_memory(&memory("near-query", vec![1.0, 0.0])).unwrap();

        let bridge = BridgeDiscovery::new(&store, &config);
        let bridges = bridge.discover(&[1.0, 0.0], &[]).unwrap();
        assert!(bridges.is_empty());
    }

    #[test]
    fn novel_candidate_with_connection_potential_surfaces() {
        let store = MetadataStore::open_in_memory().unwrap();
        let config = CognitiveConfig::default();
        store.store_memory(&memory("bridge-candidate", vec![0.0, 1.0])).unwrap();

        let activated = vec![memory("activated", vec![0.0, 0.9])];
        let bridge = BridgeDiscovery::new(&store, &config);
        let bridges = bridge.discover(&[1.0, 0.0], &activated).unwrap();

        assert_eq!(bridges.len(), 1);
        assert!(bridges[0].novelty >= config.min_novelty);
        assert!(bridges[0].connection_potential > 0.0);
    }

    #[test]
    fn excludes_already_activated_memories() {
        let store = MetadataStore::open_in_memory().unwrap();
        let config = CognitiveConfig::default();
        let m = memory("already-activated", vec![0.0, 1.0]);
        store.store_memory(&m).unwrap();

        let bridge = BridgeDiscovery::new(&store, &config);
        let bridges = bridge.discover(&[1.0, 0.0], std::slice::from_ref(&m)).unwrap();
        assert!(bridges.is_empty());
    }
}
