//! VectorStore — per-project, per-level collections of `(id, vector,
//! payload)` triples over cosine-similarity k-NN.
//!
//! Backed by one in-process HNSW [`index::VectorIndex`] per collection.
//! Collections are named `<project>_{concepts|contexts|episodes}`; see
//! [`collection_name`] and [`parse_collection_name`].

pub mod index;

use std::collections::HashMap;
use std::sync::{LazyLock, RwLock};

use regex::Regex;

use crate::error::{EngineError, Result};
use crate::memory::Level;
use index::{VectorIndex, VectorIndexConfig};

static COLLECTION_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+)_(concepts|contexts|episodes)$").unwrap());

static PROJECT_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+_[0-9a-f]{8}$").unwrap());

/// A single hit from a similarity search.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub id: String,
    pub score: f32,
    pub payload: VectorPayload,
}

/// Metadata carried alongside a vector, used for filter pushdown.
#[derive(Debug, Clone)]
pub struct VectorPayload {
    pub level: Level,
    pub memory_type: String,
    pub timestamp: String,
    pub fields: HashMap<String, String>,
}

/// Builds the collection name `<project>_<suffix>` for a level.
pub fn collection_name(project_id: &str, level: Level) -> String {
    format!("{project_id}_{}", level.collection_suffix())
}

/// Parses a collection name into `(project_id, level)`, validating that
/// the project-id component is `<repo>_<8-hex-chars>` with `repo` drawn
/// from `[A-Za-z0-9_]+`. Rejects legacy collections and anything whose
/// project segment happens to end in a level suffix.
pub fn parse_collection_name(name: &str) -> Option<(String, Level)> {
    let caps = COLLECTION_NAME_RE.captures(name)?;
    let project_id = caps.get(1)?.as_str();
    let suffix = caps.get(2)?.as_str();

    if !PROJECT_ID_RE.is_match(project_id) {
        return None;
    }

    let level = match suffix {
        "concepts" => Level::Concept,
        "contexts" => Level::Context,
        "episodes" => Level::Episode,
        _ => return None,
    };

    Some((project_id.to_string(), level))
}

/// Owns the three per-level HNSW indices for a single project.
pub struct VectorStore {
    project_id: String,
    collections: RwLock<HashMap<Level, (VectorIndex, HashMap<String, VectorPayload>)>>,
}

impl VectorStore {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            collections: RwLock::new(HashMap::new()),
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Names of this project's three collections, whether or not they
    /// currently hold any vectors.
    pub fn collection_names(&self) -> [String; 3] {
        [
            collection_name(&self.project_id, Level::Concept),
            collection_name(&self.project_id, Level::Context),
            collection_name(&self.project_id, Level::Episode),
        ]
    }

    fn ensure_collection<'a>(
        collections: &'a mut HashMap<Level, (VectorIndex, HashMap<String, VectorPayload>)>,
        level: Level,
    ) -> Result<&'a mut (VectorIndex, HashMap<String, VectorPayload>)> {
        if !collections.contains_key(&level) {
            let index = VectorIndex::with_config(VectorIndexConfig::default())
                .map_err(|e| EngineError::VectorStore(e.to_string()))?;
            collections.insert(level, (index, HashMap::new()));
        }
        Ok(collections.get_mut(&level).unwrap())
    }

    /// Writes to the collection selected by `payload.level`. Unrecognized
    /// levels are impossible to construct (the enum is closed), so the
    /// spec's "unknown level defaults to episodes" clause is satisfied by
    /// construction rather than at this boundary.
    pub fn store_vector(&self, id: &str, vector: &[f32], payload: VectorPayload) -> Result<()> {
        let mut collections = self
            .collections
            .write()
            .map_err(|_| EngineError::VectorStore("lock poisoned".to_string()))?;
        let level = payload.level;
        let (index, payloads) = Self::ensure_collection(&mut collections, level)?;
        index
            .upsert(id, vector)
            .map_err(|e| EngineError::VectorStore(e.to_string()))?;
        payloads.insert(id.to_string(), payload);
        Ok(())
    }

    /// Delete-then-store; not atomic, matching the spec's adapter contract.
    pub fn update_vector(&self, id: &str, vector: &[f32], payload: VectorPayload) -> Result<()> {
        self.delete_vector(id)?;
        self.store_vector(id, vector, payload)
    }

    /// Deletes from every collection. Missing entries are not an error.
    pub fn delete_vector(&self, id: &str) -> Result<()> {
        let mut collections = self
            .collections
            .write()
            .map_err(|_| EngineError::VectorStore("lock poisoned".to_string()))?;
        for (index, payloads) in collections.values_mut() {
            index
                .remove(id)
                .map_err(|e| EngineError::VectorStore(e.to_string()))?;
            payloads.remove(id);
        }
        Ok(())
    }

    /// Searches a single level's collection.
    pub fn search_level(
        &self,
        level: Level,
        vector: &[f32],
        k: usize,
        score_threshold: Option<f32>,
    ) -> Result<Vec<SearchResult>> {
        let collections = self
            .collections
            .read()
            .map_err(|_| EngineError::VectorStore("lock poisoned".to_string()))?;

        let Some((index, payloads)) = collections.get(&level) else {
            return Ok(vec![]);
        };

        let hits = match score_threshold {
            Some(t) => index
                .search_with_threshold(vector, k, t)
                .map_err(|e| EngineError::VectorStore(e.to_string()))?,
            None => index
                .search(vector, k)
                .map_err(|e| EngineError::VectorStore(e.to_string()))?,
        };

        Ok(hits
            .into_iter()
            .filter_map(|(id, score)| {
                payloads.get(&id).map(|p| SearchResult {
                    id,
                    score,
                    payload: p.clone(),
                })
            })
            .collect())
    }

    /// Searches all three collections and merges top-k by score.
    pub fn search_similar(&self, vector: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        let mut merged = Vec::new();
        for level in [Level::Concept, Level::Context, Level::Episode] {
            merged.extend(self.search_level(level, vector, k, None)?);
        }
        merged.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        merged.truncate(k);
        Ok(merged)
    }

    /// Removes exactly this project's three collections.
    pub fn clear(&self) -> Result<()> {
        let mut collections = self
            .collections
            .write()
            .map_err(|_| EngineError::VectorStore("lock poisoned".to_string()))?;
        collections.clear();
        Ok(())
    }

    pub fn total_vectors(&self) -> Result<usize> {
        let collections = self
            .collections
            .read()
            .map_err(|_| EngineError::VectorStore("lock poisoned".to_string()))?;
        Ok(collections.values().map(|(idx, _)| idx.len()).sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(level: Level) -> VectorPayload {
        VectorPayload {
            level,
            memory_type: "episodic".to_string(),
            timestamp: "2026-01-01T00:00:00Z".to_string(),
            fields: HashMap::new(),
        }
    }

    fn vector_with_seed(seed: f32) -> Vec<f32> {
        (0..index::DEFAULT_DIMENSIONS)
            .map(|i| ((i as f32 + seed) / index::DEFAULT_DIMENSIONS as f32).sin())
            .collect()
    }

    #[test]
    fn collection_naming_roundtrips() {
        let name = collection_name("my_repo_abc12345", Level::Episode);
        assert_eq!(name, "my_repo_abc12345_episodes");
        let (project, level) = parse_collection_name(&name).unwrap();
        assert_eq!(project, "my_repo_abc12345");
        assert_eq!(level, Level::Episode);
    }

    #[test]
    fn rejects_malformed_project_segment() {
        assert!(parse_collection_name("bad-name_episodes").is_none());
        assert!(parse_collection_name("myproj_zzzzzzzz_episodes").is_none());
        assert!(parse_collection_name("myproj_abc123_episodes").is_none());
    }

    #[test]
    fn project_ending_in_suffix_word_still_parses() {
        let (project, level) = parse_collection_name("my_concepts_def67890_concepts").unwrap();
        assert_eq!(project, "my_concepts_def67890");
        assert_eq!(level, Level::Concept);
    }

    #[test]
    fn store_and_search_roundtrip() {
        let store = VectorStore::new("proj_abcd1234");
        let v = vector_with_seed(1.0);
        store.store_vector("m1", &v, payload(Level::Episode)).unwrap();

        let results = store.search_level(Level::Episode, &v, 5, None).unwrap();
        assert_eq!(results[0].id, "m1");

        let merged = store.search_similar(&v, 5).unwrap();
        assert_eq!(merged[0].id, "m1");
    }

    #[test]
    fn delete_vector_is_best_effort_across_collections() {
        let store = VectorStore::new("proj_abcd1234");
        store.delete_vector("missing").unwrap();

        let v = vector_with_seed(1.0);
        store.store_vector("m1", &v, payload(Level::Concept)).unwrap();
        store.delete_vector("m1").unwrap();
        assert_eq!(store.total_vectors().unwrap(), 0);
    }
}
