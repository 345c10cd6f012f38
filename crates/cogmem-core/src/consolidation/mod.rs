//! Consolidator — promotes persistently-accessed episodic memories into
//! semantic twins, and runs the separate expiration cleanup cycle.

use std::collections::HashMap;

use chrono::Utc;

use crate::config::CognitiveConfig;
use crate::connection::{ConnectionEdge, EdgeType};
use crate::decay::DecayEngine;
use crate::encoder::Encoder;
use crate::error::Result;
use crate::memory::{ConsolidationStatus, Memory, MemoryType};
use crate::storage::MetadataStore;
use crate::vector::{VectorPayload, VectorStore};

/// Per-cycle outcome of `consolidate_memories`.
#[derive(Debug, Clone, Default)]
pub struct ConsolidationReport {
    pub candidates_identified: usize,
    pub memories_consolidated: usize,
    pub errors: usize,
}

pub struct Consolidator<'a> {
    store: &'a MetadataStore,
    vector_store: &'a VectorStore,
    encoder: &'a dyn Encoder,
    config: &'a CognitiveConfig,
}

struct AccessStats {
    frequency: f64,
    recency: f64,
    distribution: f64,
}

impl<'a> Consolidator<'a> {
    pub fn new(
        store: &'a MetadataStore,
        vector_store: &'a VectorStore,
        encoder: &'a dyn Encoder,
        config: &'a CognitiveConfig,
    ) -> Self {
        Self { store, vector_store, encoder, config }
    }

    fn access_stats(&self, memory: &Memory) -> Result<AccessStats> {
        let window_start = Utc::now() - chrono::Duration::days(30);
        let timestamps = self.store.access_timestamps_since(&memory.id, window_start)?;

        let week_start = Utc::now() - chrono::Duration::weeks(1);
        let accesses_last_week = timestamps.iter().filter(|t| **t >= week_start).count();
        let frequency = accesses_last_week as f64 / 168.0;

        let recency = match timestamps.last() {
            Some(last) => {
                let hours_since = (Utc::now() - *last).num_seconds() as f64 / 3600.0;
                (-hours_since / 168.0).exp()
            }
            None => {
                let hours_since = (Utc::now() - memory.last_accessed).num_seconds() as f64 / 3600.0;
                (-hours_since / 168.0).exp()
            }
        };

        let distribution = if timestamps.len() >= 2 {
            let intervals: Vec<f64> = timestamps
                .windows(2)
                .map(|w| (w[1] - w[0]).num_seconds() as f64 / 3600.0)
                .collect();
            let mean = intervals.iter().sum::<f64>() / intervals.len() as f64;
            if mean > 0.0 {
                let variance =
                    intervals.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / intervals.len() as f64;
                let stddev = variance.sqrt();
                1.0 - (stddev / mean).min(1.0)
            } else {
                0.0
            }
        } else {
            0.0
        };

        Ok(AccessStats { frequency, recency, distribution })
    }

    fn consolidation_score(&self, stats: &AccessStats) -> f64 {
        0.4 * stats.frequency.min(1.0) + 0.3 * stats.recency + 0.3 * stats.distribution
    }

    fn is_candidate(&self, memory: &Memory) -> bool {
        if memory.memory_type != MemoryType::Episodic {
            return false;
        }
        if memory.consolidation_status != ConsolidationStatus::None {
            return false;
        }
        if memory.access_count < self.config.consolidation_min_access_count {
            return false;
        }
        let cooldown = chrono::Duration::hours(self.config.consolidation_cooldown_hours);
        Utc::now() - memory.last_accessed >= cooldown
    }

    fn consolidate_one(&self, episodic: &Memory) -> Result<bool> {
        let stats = self.access_stats(episodic)?;
        let score = self.consolidation_score(&stats);
        if score < self.config.consolidation_score_threshold {
            return Ok(false);
        }

        let new_level = episodic.level.one_lower();
        let embedding = self.encoder.encode(&episodic.content)?;
        let now = Utc::now();

        let semantic = Memory {
            id: uuid::Uuid::new_v4().to_string(),
            content: episodic.content.clone(),
            level: new_level,
            memory_type: MemoryType::Semantic,
            dimensions: episodic.dimensions.clone(),
            embedding: Some(embedding.clone()),
            timestamp: now,
            last_accessed: now,
            access_count: 0,
            strength: (episodic.strength * 1.2).min(self.config.consolidated_strength_cap),
            importance_score: score as f32,
            decay_rate: self.config.consolidated_decay_rate,
            consolidation_status: ConsolidationStatus::Consolidated,
            parent_id: episodic.parent_id.clone(),
            tags: episodic.tags.clone(),
            metadata: episodic.metadata.clone(),
        };

        self.store.store_memory(&semantic)?;
        self.vector_store.store_vector(
            &semantic.id,
            &embedding,
            VectorPayload {
                level: new_level,
                memory_type: MemoryType::Semantic.to_string(),
                timestamp: semantic.timestamp.to_rfc3339(),
                fields: HashMap::new(),
            },
        )?;

        let edge = ConnectionEdge::new(
            episodic.id.clone(),
            semantic.id.clone(),
            self.config.consolidation_edge_strength,
            EdgeType::Consolidation,
        );
        self.store.upsert_connection(&edge)?;

        let mut updated_episodic = episodic.clone();
        updated_episodic.consolidation_status = ConsolidationStatus::Consolidated;
        self.store.update_memory(&updated_episodic)?;

        Ok(true)
    }

    /// Runs one consolidation cycle: identifies candidates, promotes those
    /// scoring above threshold, and counts per-memory failures without
    /// aborting the cycle.
    pub fn consolidate_memories(&self) -> Result<ConsolidationReport> {
        let episodic = self.store.get_memories_by_type(MemoryType::Episodic)?;
        let candidates: Vec<Memory> = episodic.into_iter().filter(|m| self.is_candidate(m)).collect();

        let mut report = ConsolidationReport {
            candidates_identified: candidates.len(),
            memories_consolidated: 0,
            errors: 0,
        };

        for candidate in &candidates {
            match self.consolidate_one(candidate) {
                Ok(true) => report.memories_consolidated += 1,
                Ok(false) => {}
                Err(_) => report.errors += 1,
            }
        }

        Ok(report)
    }

    /// Removes episodic memories matching any expiration condition.
    /// Semantic memories are never auto-removed.
    pub fn cleanup_expired_memories(&self, activity: f64) -> Result<usize> {
        let decay = DecayEngine::new(self.config);
        let episodic = self.store.get_memories_by_type(MemoryType::Episodic)?;

        let mut removed = 0;
        for memory in episodic {
            if decay.is_expired(&memory, activity) {
                self.store.delete_memory(&memory.id)?;
                self.vector_store.delete_vector(&memory.id)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::DeterministicEncoder;
    use crate::memory::{Dimensions, Level};
    use chrono::Duration as ChronoDuration;

    fn episodic_memory(id: &str, access_count: i64, last_accessed_hours_ago: i64) -> Memory {
        let now = Utc::now();
        let mut metadata = HashMap::new();
        metadata.insert("source_type".to_string(), "manual_entry".to_string());
        Memory {
            id: id.to_string(),
            content: "promoted content".to_string(),
            level: Level::Episode,
            memory_type: MemoryType::Episodic,
            dimensions: Dimensions::default(),
            embedding: Some(vec![1.0, 0.0]),
            timestamp: now - ChronoDuration::weeks(3),
            last_accessed: now - ChronoDuration::hours(last_accessed_hours_ago),
            access_count,
            strength: 0.9,
            importance_score: 0.2,
            decay_rate: 0.1,
            consolidation_status: ConsolidationStatus::None,
            parent_id: None,
            tags: vec![],
            metadata,
        }
    }

    #[test]
    fn promotes_frequently_accessed_memory() {
        let store = MetadataStore::open_in_memory().unwrap();
        let vector_store = VectorStore::new("proj_abcd1234");
        let encoder = DeterministicEncoder::default();
        let config = CognitiveConfig::default();

        let mut memory = episodic_memory("episodic-1", 6, 30);
        memory.strength = 0.9;
        store.store_memory(&memory).unwrap();

        let now = Utc::now();
        for hours_ago in [5, 4, 3, 2, 1, 0] {
            store
                .record_retrieval_at("q", "episodic-1", "access", None, now - ChronoDuration::hours(hours_ago))
                .unwrap();
        }

        let consolidator = Consolidator::new(&store, &vector_store, &encoder, &config);
        let report = consolidator.consolidate_memories().unwrap();

        assert_eq!(report.candidates_identified, 1);
        assert_eq!(report.memories_consolidated, 1);

        let updated = store.retrieve_memory("episodic-1").unwrap().unwrap();
        assert_eq!(updated.consolidation_status, ConsolidationStatus::Consolidated);

        let edges = store.connections_for("episodic-1", 0.0).unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].edge_type, EdgeType::Consolidation);
    }

    #[test]
    fn cooldown_excludes_recently_accessed_memory() {
        let store = MetadataStore::open_in_memory().unwrap();
        let vector_store = VectorStore::new("proj_abcd1234");
        let encoder = DeterministicEncoder::default();
        let config = CognitiveConfig::default();

        let memory = episodic_memory("episodic-1", 6, 1);
        store.store_memory(&memory).unwrap();

        let consolidator = Consolidator::new(&store, &vector_store, &encoder, &config);
        let report = consolidator.consolidate_memories().unwrap();
        assert_eq!(report.candidates_identified, 0);
    }

    #[test]
    fn cleanup_never_removes_semantic_memories() {
        let store = MetadataStore::open_in_memory().unwrap();
        let vector_store = VectorStore::new("proj_abcd1234");
        let encoder = DeterministicEncoder::default();
        let config = CognitiveConfig::default();

        let mut semantic = episodic_memory("semantic-1", 0, 9000);
        semantic.memory_type = MemoryType::Semantic;
        semantic.strength = 0.0;
        semantic.importance_score = 0.0;
        store.store_memory(&semantic).unwrap();

        let consolidator = Consolidator::new(&store, &vector_store, &encoder, &config);
        let removed = consolidator.cleanup_expired_memories(0.5).unwrap();
        assert_eq!(removed, 0);
        assert!(store.retrieve_memory("semantic-1").unwrap().is_some());
    }
}
