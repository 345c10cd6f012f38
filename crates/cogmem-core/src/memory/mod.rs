//! Memory module — the core data model.
//!
//! A [`Memory`] is a discrete textual experience enriched with fixed-size
//! feature vectors, living at one of three hierarchy levels and decaying
//! at a rate derived from its content type and the project's activity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Hierarchy level: routes a memory to a VectorStore collection and
/// determines its default decay profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Level {
    Concept = 0,
    Context = 1,
    Episode = 2,
}

impl Level {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Level::Concept),
            1 => Some(Level::Context),
            2 => Some(Level::Episode),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// The content-type fallback key used by the decay profile table
    /// when `metadata.source_type` isn't one of the eight recognized keys.
    pub fn fallback_content_type(self) -> &'static str {
        match self {
            Level::Concept => "L0_concept",
            Level::Context => "L1_context",
            Level::Episode => "L2_episode",
        }
    }

    /// The VectorStore collection suffix for this level.
    pub fn collection_suffix(self) -> &'static str {
        match self {
            Level::Concept => "concepts",
            Level::Context => "contexts",
            Level::Episode => "episodes",
        }
    }

    /// One level up the hierarchy (toward concepts), used by consolidation
    /// when promoting an episodic memory to its semantic twin. Saturates
    /// at `Concept`.
    pub fn one_lower(self) -> Level {
        match self {
            Level::Episode => Level::Context,
            Level::Context => Level::Concept,
            Level::Concept => Level::Concept,
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

/// Whether a memory is a fast-decaying experience or a consolidated,
/// slow-decaying generalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    Episodic,
    Semantic,
}

impl std::fmt::Display for MemoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemoryType::Episodic => write!(f, "episodic"),
            MemoryType::Semantic => write!(f, "semantic"),
        }
    }
}

impl std::str::FromStr for MemoryType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "episodic" => Ok(MemoryType::Episodic),
            "semantic" => Ok(MemoryType::Semantic),
            other => Err(format!("unknown memory_type: {other}")),
        }
    }
}

/// `Consolidated` on an episodic memory means a semantic twin already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsolidationStatus {
    None,
    Consolidated,
}

impl std::fmt::Display for ConsolidationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConsolidationStatus::None => write!(f, "none"),
            ConsolidationStatus::Consolidated => write!(f, "consolidated"),
        }
    }
}

impl std::str::FromStr for ConsolidationStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(ConsolidationStatus::None),
            "consolidated" => Ok(ConsolidationStatus::Consolidated),
            other => Err(format!("unknown consolidation_status: {other}")),
        }
    }
}

/// The four named feature vectors carried by every memory. Fixed-size
/// arrays rather than a dynamically-sized map: the category names and
/// lengths are closed and known at compile time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub emotional: [f32; 4],
    pub temporal: [f32; 3],
    pub contextual: [f32; 6],
    pub social: [f32; 3],
}

impl Default for Dimensions {
    fn default() -> Self {
        Self {
            emotional: [0.0; 4],
            temporal: [0.0; 3],
            contextual: [0.0; 6],
            social: [0.0; 3],
        }
    }
}

/// One of the eight recognized `source_type` values; anything else falls
/// back to a level-derived key when resolving a decay profile.
pub const RECOGNIZED_SOURCE_TYPES: &[&str] = &[
    "git_commit",
    "session_lesson",
    "store_memory",
    "documentation",
    "manual_entry",
];

/// A stored textual experience.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub id: String,
    pub content: String,
    pub level: Level,
    pub memory_type: MemoryType,
    pub dimensions: Dimensions,
    pub embedding: Option<Vec<f32>>,
    pub timestamp: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub access_count: i64,
    pub strength: f32,
    pub importance_score: f32,
    pub decay_rate: f32,
    pub consolidation_status: ConsolidationStatus,
    pub parent_id: Option<String>,
    pub tags: Vec<String>,
    pub metadata: HashMap<String, String>,
}

impl Memory {
    /// `metadata.source_type`, defaulting to `manual_entry` if absent or
    /// not one of the recognized keys.
    pub fn source_type(&self) -> &str {
        self.metadata
            .get("source_type")
            .map(|s| s.as_str())
            .filter(|s| RECOGNIZED_SOURCE_TYPES.contains(s))
            .unwrap_or("manual_entry")
    }

    pub fn source_path(&self) -> Option<&str> {
        self.metadata.get("source_path").map(|s| s.as_str())
    }

    /// Resolves the content-type key used for decay-profile lookup:
    /// a recognized `source_type`, else the level's fallback key.
    pub fn content_type_key(&self) -> String {
        match self.metadata.get("source_type") {
            Some(st) if RECOGNIZED_SOURCE_TYPES.contains(&st.as_str()) => st.clone(),
            _ => self.level.fallback_content_type().to_string(),
        }
    }

    pub fn touch_access(&mut self, at: DateTime<Utc>) {
        self.last_accessed = at;
        self.access_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_memory() -> Memory {
        let now = Utc::now();
        let mut metadata = HashMap::new();
        metadata.insert("source_type".to_string(), "git_commit".to_string());
        Memory {
            id: "mem-1".to_string(),
            content: "fixed a bug".to_string(),
            level: Level::Episode,
            memory_type: MemoryType::Episodic,
            dimensions: Dimensions::default(),
            embedding: Some(vec![1.0, 0.0]),
            timestamp: now,
            last_accessed: now,
            access_count: 0,
            strength: 0.9,
            importance_score: 0.1,
            decay_rate: 0.1,
            consolidation_status: ConsolidationStatus::None,
            parent_id: None,
            tags: vec![],
            metadata,
        }
    }

    #[test]
    fn content_type_key_uses_recognized_source_type() {
        assert_eq!(sample_memory().content_type_key(), "git_commit");
    }

    #[test]
    fn content_type_key_falls_back_to_level_when_unrecognized() {
        let mut m = sample_memory();
        m.metadata.insert("source_type".to_string(), "bogus".to_string());
        assert_eq!(m.content_type_key(), "L2_episode");
    }

    #[test]
    fn touch_access_is_monotonic() {
        let mut m = sample_memory();
        let first = m.access_count;
        m.touch_access(Utc::now());
        assert_eq!(m.access_count, first + 1);
    }

    #[test]
    fn level_roundtrips_through_u8() {
        for lvl in [Level::Concept, Level::Context, Level::Episode] {
            assert_eq!(Level::from_u8(lvl.as_u8()), Some(lvl));
        }
        assert_eq!(Level::from_u8(3), None);
    }
}
