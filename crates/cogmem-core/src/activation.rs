//! ActivationEngine — BFS spreading activation seeded by level-0 concepts
//! similar to the query, producing tiers of **core** and **peripheral**
//! memories.

use std::collections::{HashSet, VecDeque};
use std::time::Instant;

use chrono::Utc;

use crate::config::CognitiveConfig;
use crate::embeddings::cosine_similarity_unit;
use crate::error::Result;
use crate::graph::ConnectionGraph;
use crate::memory::{Level, Memory};
use crate::storage::MetadataStore;

/// One activated memory with its computed activation strength.
#[derive(Debug, Clone)]
pub struct Activated {
    pub memory: Memory,
    pub activation: f32,
}

/// Result of one activation spread: core and peripheral tiers, ordered
/// descending by activation strength, plus timing.
#[derive(Debug, Clone, Default)]
pub struct ActivationResult {
    pub core: Vec<Activated>,
    pub peripheral: Vec<Activated>,
    pub elapsed_ms: u64,
}

impl ActivationResult {
    pub fn is_empty(&self) -> bool {
        self.core.is_empty() && self.peripheral.is_empty()
    }

    /// All activated ids, core first.
    pub fn activated_ids(&self) -> Vec<String> {
        self.core
            .iter()
            .chain(self.peripheral.iter())
            .map(|a| a.memory.id.clone())
            .collect()
    }
}

pub struct ActivationEngine<'a> {
    store: &'a MetadataStore,
    graph: &'a ConnectionGraph,
    config: &'a CognitiveConfig,
}

impl<'a> ActivationEngine<'a> {
    pub fn new(store: &'a MetadataStore, graph: &'a ConnectionGraph, config: &'a CognitiveConfig) -> Self {
        Self { store, graph, config }
    }

    fn activation_score(&self, memory: &Memory, query: &[f32]) -> f32 {
        let Some(embedding) = memory.embedding.as_ref() else {
            return 0.0;
        };
        let similarity = cosine_similarity_unit(query, embedding);
        let importance_term = 0.3 * memory.importance_score;
        let frequency_term = (0.1 * memory.access_count as f32).min(0.5);

        let days_since_access = (Utc::now() - memory.last_accessed).num_seconds() as f32 / 86_400.0;
        let recency_multiplier = (1.0 - memory.decay_rate * days_since_access).max(0.1);

        ((similarity + importance_term + frequency_term) * recency_multiplier).clamp(0.0, 1.0)
    }

    pub fn spread(&self, query: &[f32]) -> Result<ActivationResult> {
        let start = Instant::now();

        let concepts = self.store.get_memories_by_level(Level::Concept)?;
        let seeds: Vec<Memory> = concepts
            .into_iter()
            .filter(|m| m.embedding.is_some())
            .filter(|m| {
                let sim = cosine_similarity_unit(query, m.embedding.as_ref().unwrap());
                sim >= self.config.activation_threshold
            })
            .collect();

        if seeds.is_empty() {
            return Ok(ActivationResult {
                core: vec![],
                peripheral: vec![],
                elapsed_ms: start.elapsed().as_millis() as u64,
            });
        }

        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<Memory> = VecDeque::new();
        for seed in seeds {
            if visited.insert(seed.id.clone()) {
                queue.push_back(seed);
            }
        }

        let mut core: Vec<Activated> = Vec::new();
        let mut peripheral: Vec<Activated> = Vec::new();

        while let Some(memory) = queue.pop_front() {
            if core.len() + peripheral.len() >= self.config.max_activations {
                break;
            }

            let activation = self.activation_score(&memory, query);

            if activation >= self.config.core_threshold {
                let edges = self
                    .graph
                    .get_connection_edges(&memory.id, self.config.activation_threshold)?;
                core.push(Activated { memory: memory.clone(), activation });
                self.enqueue_neighbors(&memory, activation, &edges, &mut visited, &mut queue)?;
            } else if activation >= self.config.peripheral_threshold {
                let edges = self
                    .graph
                    .get_connection_edges(&memory.id, self.config.activation_threshold)?;
                peripheral.push(Activated { memory: memory.clone(), activation });
                self.enqueue_neighbors(&memory, activation, &edges, &mut visited, &mut queue)?;
            }
            // activation below peripheral_threshold: skip and do not expand.
        }

        core.sort_by(|a, b| b.activation.partial_cmp(&a.activation).unwrap_or(std::cmp::Ordering::Equal));
        peripheral.sort_by(|a, b| b.activation.partial_cmp(&a.activation).unwrap_or(std::cmp::Ordering::Equal));

        Ok(ActivationResult {
            core,
            peripheral,
            elapsed_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn enqueue_neighbors(
        &self,
        memory: &Memory,
        activation: f32,
        edges: &[crate::connection::ConnectionEdge],
        visited: &mut HashSet<String>,
        queue: &mut VecDeque<Memory>,
    ) -> Result<()> {
        for edge in edges {
            let Some(neighbor_id) = edge.other_end(&memory.id) else {
                continue;
            };
            if visited.contains(neighbor_id) {
                continue;
            }
            if edge.strength * activation <= self.config.peripheral_threshold {
                continue;
            }
            if let Some(neighbor) = self.store.retrieve_memory(neighbor_id)? {
                visited.insert(neighbor.id.clone());
                queue.push_back(neighbor);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::EdgeType;
    use crate::memory::{ConsolidationStatus, Dimensions, MemoryType};
    use std::collections::HashMap;
    use std::sync::Arc;

    fn memory(id: &str, level: Level, embedding: Vec<f32>) -> Memory {
        let now = Utc::now();
        Memory {
            id: id.to_string(),
            content: "c".to_string(),
            level,
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
    fn no_level_zero_seeds_yields_empty_result() {
        let store = MetadataStore::open_in_memory().unwrap();
        let graph = ConnectionGraph::new(Arc::new(MetadataStore::open_in_memory().unwrap()));
        let config = CognitiveConfig::default();
        let engine = ActivationEngine::new(&store, &graph, &config);

        let result = engine.spread(&[1.0, 0.0]).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn strong_seed_lands_in_core() {
        let store = MetadataStore::open_in_memory().unwrap();
        let mut seed = memory("concept-1", Level::Concept, vec![1.0, 0.0]);
        seed.importance_score = 1.0;
        store.store_memory(&seed).unwrap();

        let graph = ConnectionGraph::new(Arc::new(MetadataStore::open_in_memory().unwrap()));
        let config = CognitiveConfig::default();
        let engine = ActivationEngine::new(&store, &graph, &config);

        let result = engine.spread(&[1.0, 0.0]).unwrap();
        assert_eq!(result.core.len(), 1);
        assert_eq!(result.core[0].memory.id, "concept-1");
        assert!(result.core[0].activation >= config.core_threshold);
    }

    #[test]
    fn no_duplicates_across_core_and_peripheral() {
        let store = MetadataStore::open_in_memory().unwrap();
        let seed = memory("concept-1", Level::Concept, vec![1.0, 0.0]);
        store.store_memory(&seed).unwrap();

        let graph = ConnectionGraph::new(Arc::new(MetadataStore::open_in_memory().unwrap()));
        let config = CognitiveConfig::default();
        let engine = ActivationEngine::new(&store, &graph, &config);

        let result = engine.spread(&[1.0, 0.0]).unwrap();
        let core_ids: HashSet<_> = result.core.iter().map(|a| a.memory.id.clone()).collect();
        let peripheral_ids: HashSet<_> = result.peripheral.iter().map(|a| a.memory.id.clone()).collect();
        assert!(core_ids.is_disjoint(&peripheral_ids));
    }
}
