//! ConnectionGraph — typed weighted edges among memories, the substrate
//! for activation spreading. A thin layer over [`MetadataStore`] that
//! hydrates connected memories instead of returning raw edges.

use std::sync::Arc;

use crate::connection::{ConnectionEdge, EdgeType};
use crate::error::Result;
use crate::memory::Memory;
use crate::storage::MetadataStore;

pub struct ConnectionGraph {
    store: Arc<MetadataStore>,
}

impl ConnectionGraph {
    pub fn new(store: Arc<MetadataStore>) -> Self {
        Self { store }
    }

    /// Upsert by `(src, tgt)`. Callers are responsible for discarding
    /// edges below `strength_floor` before calling this, per §4.3.
    pub fn add_connection(&self, src: &str, tgt: &str, strength: f32, edge_type: EdgeType) -> Result<bool> {
        let edge = ConnectionEdge::new(src.to_string(), tgt.to_string(), strength, edge_type);
        self.store.upsert_connection(&edge)
    }

    /// Memories linked to `id` in either direction with `edge.strength >=
    /// min_strength`, ordered by strength descending.
    pub fn get_connections(&self, id: &str, min_strength: f32) -> Result<Vec<Memory>> {
        let edges = self.store.connections_for(id, min_strength)?;
        let mut memories = Vec::with_capacity(edges.len());
        for edge in edges {
            if let Some(other_id) = edge.other_end(id) {
                if let Some(m) = self.store.retrieve_memory(other_id)? {
                    memories.push(m);
                }
            }
        }
        Ok(memories)
    }

    /// The raw edges touching `id`, for callers that need edge strength
    /// rather than the hydrated memory (e.g. ActivationEngine's fan-out
    /// pruning).
    pub fn get_connection_edges(&self, id: &str, min_strength: f32) -> Result<Vec<ConnectionEdge>> {
        self.store.connections_for(id, min_strength)
    }

    pub fn update_connection_strength(&self, src: &str, tgt: &str, new_strength: f32) -> Result<bool> {
        self.store.update_connection_strength(src, tgt, new_strength.clamp(0.0, 1.0))
    }

    pub fn remove_connection(&self, src: &str, tgt: &str) -> Result<bool> {
        self.store.remove_connection(src, tgt)
    }

    pub fn activate_connection(&self, src: &str, tgt: &str) -> Result<bool> {
        self.store.activate_connection(src, tgt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{ConsolidationStatus, Dimensions, Level, MemoryType};
    use chrono::Utc;
    use std::collections::HashMap;

    fn sample_memory(id: &str) -> Memory {
        let now = Utc::now();
        Memory {
            id: id.to_string(),
            content: "content".to_string(),
            level: Level::Episode,
            memory_type: MemoryType::Episodic,
            dimensions: Dimensions::default(),
            embedding: None,
            timestamp: now,
            last_accessed: now,
            access_count: 0,
            strength: 1.0,
            importance_score: 0.1,
            decay_rate: 0.1,
            consolidation_status: ConsolidationStatus::None,
            parent_id: None,
            tags: vec![],
            metadata: HashMap::new(),
        }
    }

    fn graph_with(memories: &[&str]) -> ConnectionGraph {
        let store = Arc::new(MetadataStore::open_in_memory().unwrap());
        for id in memories {
            store.store_memory(&sample_memory(id)).unwrap();
        }
        ConnectionGraph::new(store)
    }

    #[test]
    fn connections_are_bidirectional_and_hydrated() {
        let graph = graph_with(&["a", "b"]);
        assert!(graph.add_connection("a", "b", 0.6, EdgeType::Hierarchical).unwrap());

        let from_a = graph.get_connections("a", 0.0).unwrap();
        assert_eq!(from_a.len(), 1);
        assert_eq!(from_a[0].id, "b");

        let from_b = graph.get_connections("b", 0.0).unwrap();
        assert_eq!(from_b.len(), 1);
        assert_eq!(from_b[0].id, "a");
    }

    #[test]
    fn activate_connection_updates_count() {
        let graph = graph_with(&["a", "b"]);
        graph.add_connection("a", "b", 0.5, EdgeType::Associative).unwrap();
        assert!(graph.activate_connection("a", "b").unwrap());

        let edges = graph.get_connection_edges("a", 0.0).unwrap();
        assert_eq!(edges[0].activation_count, 1);
    }

    #[test]
    fn remove_connection_drops_the_edge() {
        let graph = graph_with(&["a", "b"]);
        graph.add_connection("a", "b", 0.5, EdgeType::Associative).unwrap();
        assert!(graph.remove_connection("a", "b").unwrap());
        assert!(graph.get_connections("a", 0.0).unwrap().is_empty());
    }
}
