//! Coordinator — the public façade composing encoding, storage,
//! retrieval, and bridge discovery into the five operations a caller
//! actually invokes.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use crate::activation::ActivationEngine;
use crate::activity::ActivityTracker;
use crate::bridge::{Bridge, BridgeDiscovery};
use crate::config::CognitiveConfig;
use crate::consolidation::{ConsolidationReport, Consolidator};
use crate::encoder::Encoder;
use crate::error::{EngineError, Result};
use crate::graph::ConnectionGraph;
use crate::loader::SourceLoader;
use crate::memory::{ConsolidationStatus, Dimensions, Level, Memory, MemoryType};
use crate::similarity::SimilaritySearch;
use crate::storage::MetadataStore;
use crate::vector::{VectorPayload, VectorStore};

const CONCEPT_WORDS: &[&str] = &["concept", "idea", "principle", "theory", "pattern", "architecture"];
const CONTEXT_WORDS: &[&str] = &["context", "session", "discussion", "conversation", "decision"];

/// Optional hints for `store_experience`.
#[derive(Debug, Clone, Default)]
pub struct StoreContext {
    pub hierarchy_level: Option<u8>,
    pub tags: Vec<String>,
    pub metadata: HashMap<String, String>,
}

/// Which retrieval buckets to populate; all three by default.
#[derive(Debug, Clone, Copy)]
pub struct RetrievalTypes {
    pub core: bool,
    pub peripheral: bool,
    pub bridge: bool,
}

impl Default for RetrievalTypes {
    fn default() -> Self {
        Self { core: true, peripheral: true, bridge: true }
    }
}

/// Result of `retrieve_memories`.
#[derive(Debug, Clone, Default)]
pub struct RetrievalResult {
    pub core: Vec<Memory>,
    pub peripheral: Vec<Memory>,
    pub bridge: Vec<Bridge>,
}

/// Result of one `consolidate_memories` cycle.
pub type ConsolidateReport = ConsolidationReport;

/// Result of `load_memories_from_source`.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub success: bool,
    pub error: Option<String>,
    pub memories_loaded: u64,
    pub connections_created: u64,
    pub hierarchy_distribution: HashMap<String, u64>,
    pub processing_time_ms: u64,
    pub memories_failed: u64,
    pub connections_failed: u64,
}

/// Result of `upsert_memories`.
#[derive(Debug, Clone, Default)]
pub struct UpsertReport {
    pub success: bool,
    pub updated: u64,
    pub inserted: u64,
}

/// The public façade. Owns no mutable singleton beyond configuration and
/// the `ActivityTracker` cache, per §9.
pub struct Coordinator {
    store: Arc<MetadataStore>,
    vectors: Arc<VectorStore>,
    graph: ConnectionGraph,
    encoder: Arc<dyn Encoder>,
    config: CognitiveConfig,
    activity: ActivityTracker,
}

impl Coordinator {
    pub fn new(
        store: Arc<MetadataStore>,
        vectors: Arc<VectorStore>,
        encoder: Arc<dyn Encoder>,
        config: CognitiveConfig,
        repo_path: Option<std::path::PathBuf>,
    ) -> Self {
        let graph = ConnectionGraph::new(store.clone());
        Self {
            store,
            vectors,
            graph,
            encoder,
            config,
            activity: ActivityTracker::new(repo_path),
        }
    }

    fn current_activity(&self) -> f64 {
        self.activity.activity(&self.store, &self.config) as f64
    }

    fn resolve_level(text: &str, hint: Option<u8>) -> Level {
        if let Some(hint) = hint {
            if let Some(level) = Level::from_u8(hint) {
                return level;
            }
        }

        let lower = text.to_lowercase();
        if CONCEPT_WORDS.iter().any(|w| lower.contains(w)) {
            Level::Concept
        } else if CONTEXT_WORDS.iter().any(|w| lower.contains(w)) {
            Level::Context
        } else {
            Level::Episode
        }
    }

    fn default_decay_rate(memory_type: MemoryType) -> f32 {
        match memory_type {
            MemoryType::Episodic => 0.1,
            MemoryType::Semantic => 0.01,
        }
    }

    /// Encodes `text`, validating the contract that non-empty text never
    /// produces a zero vector (an `EncoderError` per §7).
    fn encode_checked(&self, text: &str) -> Result<Vec<f32>> {
        let v = self.encoder.encode(text)?;
        if !text.is_empty() && v.iter().all(|x| *x == 0.0) {
            return Err(EngineError::Encoder("encoder returned a zero vector for non-empty text".to_string()));
        }
        Ok(v)
    }

    /// Stores one experience. Returns the generated id, or an empty string
    /// on empty input or a storage failure.
    pub fn store_experience(&self, text: &str, context: Option<StoreContext>) -> String {
        if text.is_empty() {
            return String::new();
        }

        let context = context.unwrap_or_default();
        let embedding = match self.encode_checked(text) {
            Ok(v) => v,
            Err(e) => {
                warn!("store_experience: encoder failed: {e}");
                return String::new();
            }
        };

        let level = Self::resolve_level(text, context.hierarchy_level);
        let memory_type = if level == Level::Concept { MemoryType::Semantic } else { MemoryType::Episodic };

        let mut metadata = context.metadata;
        metadata.entry("source_type".to_string()).or_insert_with(|| "store_memory".to_string());

        let now = Utc::now();
        let id = Uuid::new_v4().to_string();
        let memory = Memory {
            id: id.clone(),
            content: text.to_string(),
            level,
            memory_type,
            dimensions: Dimensions::default(),
            embedding: Some(embedding.clone()),
            timestamp: now,
            last_accessed: now,
            access_count: 0,
            strength: 1.0,
            importance_score: 0.0,
            decay_rate: Self::default_decay_rate(memory_type),
            consolidation_status: ConsolidationStatus::None,
            parent_id: None,
            tags: context.tags,
            metadata,
        };

        match self.store.store_memory(&memory) {
            Ok(true) => {}
            Ok(false) | Err(_) => return String::new(),
        }

        let payload = VectorPayload {
            level,
            memory_type: memory_type.to_string(),
            timestamp: now.to_rfc3339(),
            fields: HashMap::new(),
        };
        if let Err(e) = self.vectors.store_vector(&id, &embedding, payload) {
            warn!("store_experience: vector store insert failed for {id}: {e}");
        }

        id
    }

    fn touch_and_record(&self, memory: &mut Memory, query_hash: &str, retrieval_type: &str) {
        memory.touch_access(Utc::now());
        if let Err(e) = self.store.update_memory(memory) {
            warn!("retrieve_memories: failed to touch access for {}: {e}", memory.id);
        }
        if let Err(e) = self.store.record_retrieval(query_hash, &memory.id, retrieval_type, None) {
            warn!("retrieve_memories: failed to record retrieval stat: {e}");
        }
    }

    /// Runs activation, similarity fallback, and bridge discovery over a
    /// query, touching every returned memory's access bookkeeping.
    pub fn retrieve_memories(&self, query: &str, types: RetrievalTypes, max_results: usize) -> RetrievalResult {
        if query.is_empty() {
            return RetrievalResult::default();
        }

        let query_vec = match self.encode_checked(query) {
            Ok(v) => v,
            Err(e) => {
                warn!("retrieve_memories: encoder failed: {e}");
                return RetrievalResult::default();
            }
        };

        let config = &self.config;
        let mut activated: Vec<Memory> = Vec::new();
        // Each entry keeps the real per-memory score it was retrieved with,
        // so it can be written into `metadata.similarity_score` below instead
        // of a placeholder.
        let mut core: Vec<(Memory, f32)> = Vec::new();
        let mut peripheral: Vec<(Memory, f32)> = Vec::new();

        if types.core || types.peripheral {
            let engine = ActivationEngine::new(&self.store, &self.graph, config);
            match engine.spread(&query_vec) {
                Ok(result) if !result.is_empty() => {
                    if types.core {
                        core = result.core.iter().map(|a| (a.memory.clone(), a.activation)).collect();
                    }
                    if types.peripheral {
                        peripheral =
                            result.peripheral.iter().map(|a| (a.memory.clone(), a.activation)).collect();
                    }
                    activated = result.core.into_iter().chain(result.peripheral).map(|a| a.memory).collect();
                }
                Ok(_) => {
                    let limit = max_results.min(config.max_activations);
                    let search = SimilaritySearch::new(&self.store, config);
                    if let Ok(hits) = search.search_memories(&query_vec, limit, None, config.min_similarity, true) {
                        let half = hits.len() / 2;
                        let (first, second) = hits.split_at(half);
                        if types.core {
                            core = first.iter().map(|h| (h.memory.clone(), h.combined_score)).collect();
                        }
                        if types.peripheral {
                            peripheral = second.iter().map(|h| (h.memory.clone(), h.combined_score)).collect();
                        }
                        activated = hits.iter().map(|h| h.memory.clone()).collect();
                    }
                }
                Err(e) => warn!("retrieve_memories: activation failed: {e}"),
            }
        }

        let mut bridge = Vec::new();
        if types.bridge {
            let seed = if activated.is_empty() {
                let search = SimilaritySearch::new(&self.store, config);
                search
                    .search_memories(&query_vec, 5, None, config.min_similarity, false)
                    .map(|hits| hits.into_iter().map(|h| h.memory).collect())
                    .unwrap_or_default()
            } else {
                activated.clone()
            };

            let discovery = BridgeDiscovery::new(&self.store, config);
            match discovery.discover(&query_vec, &seed) {
                Ok(b) => bridge = b,
                Err(e) => warn!("retrieve_memories: bridge discovery failed: {e}"),
            }
        }

        let query_hash = format!("{:x}", simple_hash(query));
        for (memory, score) in core.iter_mut().chain(peripheral.iter_mut()) {
            memory.metadata.insert("similarity_score".to_string(), format!("{score:.4}"));
            self.touch_and_record(memory, &query_hash, "retrieval");
        }
        for b in bridge.iter_mut() {
            self.touch_and_record(&mut b.memory, &query_hash, "bridge");
        }

        RetrievalResult {
            core: core.into_iter().map(|(m, _)| m).collect(),
            peripheral: peripheral.into_iter().map(|(m, _)| m).collect(),
            bridge,
        }
    }

    /// Runs one consolidation cycle.
    pub fn consolidate_memories(&self) -> Result<ConsolidateReport> {
        let encoder_ref: &dyn Encoder = self.encoder.as_ref();
        let consolidator = Consolidator::new(&self.store, &self.vectors, encoder_ref, &self.config);
        consolidator.consolidate_memories()
    }

    /// Removes expired episodic memories; semantic memories are never removed.
    pub fn cleanup_expired_memories(&self) -> Result<usize> {
        let encoder_ref: &dyn Encoder = self.encoder.as_ref();
        let consolidator = Consolidator::new(&self.store, &self.vectors, encoder_ref, &self.config);
        consolidator.cleanup_expired_memories(self.current_activity())
    }

    /// Loads memories and connections produced by `loader` from `path`.
    pub fn load_memories_from_source(&self, loader: &dyn SourceLoader, path: &Path) -> LoadReport {
        let start = Instant::now();

        if !loader.validate_source(path) {
            return LoadReport {
                success: false,
                error: Some("source failed validation".to_string()),
                processing_time_ms: start.elapsed().as_millis() as u64,
                ..Default::default()
            };
        }

        let loader_memories = match loader.load_from_source(path) {
            Ok(m) => m,
            Err(e) => {
                return LoadReport {
                    success: false,
                    error: Some(e.to_string()),
                    processing_time_ms: start.elapsed().as_millis() as u64,
                    ..Default::default()
                }
            }
        };

        let mut report = LoadReport { success: true, ..Default::default() };
        let mut inserted_ids: std::collections::HashSet<String> = std::collections::HashSet::new();

        for lm in &loader_memories {
            let embedding = match &lm.embedding {
                Some(v) => v.clone(),
                None => match self.encode_checked(&lm.content) {
                    Ok(v) => v,
                    Err(_) => {
                        report.memories_failed += 1;
                        continue;
                    }
                },
            };

            let now = Utc::now();
            let memory = Memory {
                id: lm.id.clone(),
                content: lm.content.clone(),
                level: lm.level,
                memory_type: lm.memory_type,
                dimensions: lm.dimensions.clone(),
                embedding: Some(embedding.clone()),
                timestamp: now,
                last_accessed: now,
                access_count: 0,
                strength: 1.0,
                importance_score: 0.0,
                decay_rate: Self::default_decay_rate(lm.memory_type),
                consolidation_status: ConsolidationStatus::None,
                parent_id: lm.parent_id.clone(),
                tags: lm.tags.clone(),
                metadata: lm.metadata.clone(),
            };

            match self.store.store_memory(&memory) {
                Ok(true) => {
                    inserted_ids.insert(memory.id.clone());
                    *report.hierarchy_distribution.entry(memory.level.to_string()).or_insert(0) += 1;
                    report.memories_loaded += 1;

                    let payload = VectorPayload {
                        level: memory.level,
                        memory_type: memory.memory_type.to_string(),
                        timestamp: now.to_rfc3339(),
                        fields: HashMap::new(),
                    };
                    if let Err(e) = self.vectors.store_vector(&memory.id, &embedding, payload) {
                        warn!("load_memories_from_source: vector insert failed for {}: {e}", memory.id);
                    }
                }
                _ => report.memories_failed += 1,
            }
        }

        let connections = loader.extract_connections(&loader_memories);
        for conn in connections {
            if conn.strength < self.config.strength_floor {
                continue;
            }
            if !inserted_ids.contains(&conn.source_id) || !inserted_ids.contains(&conn.target_id) {
                continue;
            }
            match self.graph.add_connection(&conn.source_id, &conn.target_id, conn.strength, conn.edge_type) {
                Ok(true) => report.connections_created += 1,
                _ => report.connections_failed += 1,
            }
        }

        report.processing_time_ms = start.elapsed().as_millis() as u64;
        report
    }

    /// Replaces or inserts each memory by its deterministic id, preserving
    /// `access_count` and `timestamp` from any existing record.
    pub fn upsert_memories(&self, memories: &[crate::loader::LoaderMemory]) -> Result<UpsertReport> {
        let mut report = UpsertReport { success: true, updated: 0, inserted: 0 };

        for lm in memories {
            let existing = self.store.retrieve_memory(&lm.id)?;
            let embedding = match &lm.embedding {
                Some(v) => v.clone(),
                None => self.encode_checked(&lm.content)?,
            };

            let now = Utc::now();
            let (timestamp, access_count) = match &existing {
                Some(e) => (e.timestamp, e.access_count),
                None => (now, 0),
            };

            let memory = Memory {
                id: lm.id.clone(),
                content: lm.content.clone(),
                level: lm.level,
                memory_type: lm.memory_type,
                dimensions: lm.dimensions.clone(),
                embedding: Some(embedding.clone()),
                timestamp,
                last_accessed: now,
                access_count,
                strength: 1.0,
                importance_score: 0.0,
                decay_rate: Self::default_decay_rate(lm.memory_type),
                consolidation_status: ConsolidationStatus::None,
                parent_id: lm.parent_id.clone(),
                tags: lm.tags.clone(),
                metadata: lm.metadata.clone(),
            };

            self.store.store_memory(&memory)?;
            let payload = VectorPayload {
                level: memory.level,
                memory_type: memory.memory_type.to_string(),
                timestamp: timestamp.to_rfc3339(),
                fields: HashMap::new(),
            };
            self.vectors.update_vector(&memory.id, &embedding, payload)?;

            if existing.is_some() {
                report.updated += 1;
            } else {
                report.inserted += 1;
            }
        }

        Ok(report)
    }
}

fn simple_hash(text: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for b in text.as_bytes() {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}
