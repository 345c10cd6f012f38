//! SimilaritySearch — level-aware cosine-similarity retrieval with an
//! optional recency-biased reranker and closeness-based date rerank.

use chrono::Utc;

use crate::config::CognitiveConfig;
use crate::embeddings::cosine_similarity_unit;
use crate::error::Result;
use crate::memory::{Level, Memory};
use crate::storage::MetadataStore;

/// One similarity-search hit with all the score components that went
/// into its ranking.
#[derive(Debug, Clone)]
pub struct SimilarityHit {
    pub memory: Memory,
    pub similarity: f32,
    pub distance: f32,
    pub recency_score: f32,
    pub combined_score: f32,
}

pub struct SimilaritySearch<'a> {
    store: &'a MetadataStore,
    config: &'a CognitiveConfig,
}

impl<'a> SimilaritySearch<'a> {
    pub fn new(store: &'a MetadataStore, config: &'a CognitiveConfig) -> Self {
        Self { store, config }
    }

    fn recency_score(&self, memory: &Memory) -> f32 {
        let anchor = memory.last_accessed.max(memory.timestamp);
        let hours_since = (Utc::now() - anchor).num_seconds() as f32 / 3600.0;
        (-hours_since / self.config.recency_decay_hours as f32).exp().clamp(0.0, 1.0)
    }

    /// `exp(-age_days / modification_recency_decay_days)` derived from
    /// `metadata.modified_date`, if present and parseable.
    fn modification_recency(&self, memory: &Memory) -> Option<f32> {
        let modified = memory.metadata.get("modified_date")?;
        let modified = chrono::DateTime::parse_from_rfc3339(modified).ok()?;
        let age_days = (Utc::now() - modified.with_timezone(&Utc)).num_seconds() as f32 / 86_400.0;
        Some((-age_days / self.config.modification_recency_decay_days as f32).exp())
    }

    /// Searches `levels` (default all three), discards hits below
    /// `min_similarity`, and returns the top `k` by combined score.
    pub fn search_memories(
        &self,
        query: &[f32],
        k: usize,
        levels: Option<&[Level]>,
        min_similarity: f32,
        include_recency_bias: bool,
    ) -> Result<Vec<SimilarityHit>> {
        let levels: &[Level] = levels.unwrap_or(&[Level::Concept, Level::Context, Level::Episode]);

        let mut hits = Vec::new();
        for &level in levels {
            for memory in self.store.get_memories_by_level(level)? {
                let Some(embedding) = memory.embedding.as_ref() else {
                    continue;
                };
                let similarity = cosine_similarity_unit(query, embedding);
                if similarity < min_similarity {
                    continue;
                }

                let recency_score = if include_recency_bias {
                    self.recency_score(&memory)
                } else {
                    0.0
                };

                let combined_score = if include_recency_bias {
                    self.config.similarity_weight * similarity + self.config.recency_weight * recency_score
                } else {
                    similarity
                };

                hits.push(SimilarityHit {
                    distance: 1.0 - similarity,
                    similarity,
                    recency_score,
                    combined_score,
                    memory,
                });
            }
        }

        hits.sort_by(|a, b| b.combined_score.partial_cmp(&a.combined_score).unwrap_or(std::cmp::Ordering::Equal));

        if include_recency_bias {
            self.apply_closeness_date_rerank(&mut hits);
        }

        hits.truncate(k);
        Ok(hits)
    }

    /// When two adjacent candidates' similarities differ by less than
    /// `similarity_closeness_threshold`, nudge the combined score by a
    /// modification-date term; never moves candidates that aren't close.
    fn apply_closeness_date_rerank(&self, hits: &mut [SimilarityHit]) {
        for i in 0..hits.len().saturating_sub(1) {
            let close = (hits[i].similarity - hits[i + 1].similarity).abs()
                < self.config.similarity_closeness_threshold;
            if !close {
                continue;
            }

            let adjustment_i = self.modification_recency(&hits[i].memory).unwrap_or(0.0)
                * self.config.modification_date_weight;
            let adjustment_j = self.modification_recency(&hits[i + 1].memory).unwrap_or(0.0)
                * self.config.modification_date_weight;
            hits[i].combined_score += adjustment_i;
            hits[i + 1].combined_score += adjustment_j;

            if hits[i + 1].combined_score > hits[i].combined_score {
                hits.swap(i, i + 1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{ConsolidationStatus, Dimensions, MemoryType};
    use chrono::Duration as ChronoDuration;
    use std::collections::HashMap;

    fn memory_with_access(id: &str, embedding: Vec<f32>, last_accessed_days_ago: i64) -> Memory {
        let now = Utc::now();
        Memory {
            id: id.to_string(),
            content: "c".to_string(),
            level: Level::Episode,
            memory_type: MemoryType::Episodic,
            dimensions: Dimensions::default(),
            embedding: Some(embedding),
            timestamp: now - ChronoDuration::days(last_accessed_days_ago),
            last_accessed: now - ChronoDuration::days(last_accessed_days_ago),
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
    fn cosine_is_exact_for_unit_vectors() {
        let store = MetadataStore::open_in_memory().unwrap();
        let config = CognitiveConfig::default();
        let search = SimilaritySearch::new(&store, &config);

        store.store_memory(&memory_with_access("m1", vec![1.0, 0.0], 0)).unwrap();
        let hits = search.search_memories(&[1.0, 0.0], 5, None, 0.0, false).unwrap();
        assert!((hits[0].similarity - 1.0).abs() < 1e-6);

        let hits = search.search_memories(&[0.0, 1.0], 5, None, 0.0, false).unwrap();
        assert!(hits[0].similarity.abs() < 1e-6);
    }

    #[test]
    fn newer_memory_ranks_higher_with_recency_bias() {
        let store = MetadataStore::open_in_memory().unwrap();
        let config = CognitiveConfig::default();
        let search = SimilaritySearch::new(&store, &config);

        store.store_memory(&memory_with_access("new", vec![1.0, 0.0], 0)).unwrap();
        store.store_memory(&memory_with_access("old", vec![1.0, 0.0], 60)).unwrap();

        let hits = search.search_memories(&[1.0, 0.0], 5, None, 0.0, true).unwrap();
        assert_eq!(hits[0].memory.id, "new");
    }

    #[test]
    fn below_min_similarity_is_discarded() {
        let store = MetadataStore::open_in_memory().unwrap();
        let config = CognitiveConfig::default();
        let search = SimilaritySearch::new(&store, &config);

        store.store_memory(&memory_with_access("orthogonal", vec![0.0, 1.0], 0)).unwrap();
        let hits = search.search_memories(&[1.0, 0.0], 5, None, 0.1, false).unwrap();
        assert!(hits.is_empty());
    }
}
