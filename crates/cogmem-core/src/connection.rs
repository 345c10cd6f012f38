//! Typed, weighted edges between memories — the substrate for activation
//! spreading. Edges are directed in storage but looked up bidirectionally:
//! a query for connections of `X` returns edges where `X` is either endpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The relationship a connection edge represents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    Hierarchical,
    Sequential,
    Associative,
    Consolidation,
    FileRelationship,
    AuthorSession,
    /// An open-ended type not among the named ones above.
    Custom(String),
}

impl std::fmt::Display for EdgeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EdgeType::Hierarchical => write!(f, "hierarchical"),
            EdgeType::Sequential => write!(f, "sequential"),
            EdgeType::Associative => write!(f, "associative"),
            EdgeType::Consolidation => write!(f, "consolidation"),
            EdgeType::FileRelationship => write!(f, "file_relationship"),
            EdgeType::AuthorSession => write!(f, "author_session"),
            EdgeType::Custom(name) => write!(f, "{name}"),
        }
    }
}

impl std::str::FromStr for EdgeType {
    type Err = std::convert::Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "hierarchical" => EdgeType::Hierarchical,
            "sequential" => EdgeType::Sequential,
            "associative" => EdgeType::Associative,
            "consolidation" => EdgeType::Consolidation,
            "file_relationship" => EdgeType::FileRelationship,
            "author_session" => EdgeType::AuthorSession,
            other => EdgeType::Custom(other.to_string()),
        })
    }
}

impl EdgeType {
    /// Per-type base weight used when a loader doesn't supply an explicit
    /// strength, per §4.3.
    pub fn default_base_weight(&self) -> f32 {
        match self {
            EdgeType::Hierarchical => 0.80,
            EdgeType::Sequential => 0.70,
            EdgeType::Associative => 0.35,
            _ => 0.35,
        }
    }
}

/// A directed edge between two memories, with primary key `(source_id, target_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionEdge {
    pub source_id: String,
    pub target_id: String,
    pub strength: f32,
    pub edge_type: EdgeType,
    pub created_at: DateTime<Utc>,
    pub last_activated: Option<DateTime<Utc>>,
    pub activation_count: i64,
}

impl ConnectionEdge {
    pub fn new(source_id: String, target_id: String, strength: f32, edge_type: EdgeType) -> Self {
        Self {
            source_id,
            target_id,
            strength: strength.clamp(0.0, 1.0),
            edge_type,
            created_at: Utc::now(),
            last_activated: None,
            activation_count: 0,
        }
    }

    /// True if `id` is either endpoint — edges are looked up bidirectionally.
    pub fn touches(&self, id: &str) -> bool {
        self.source_id == id || self.target_id == id
    }

    /// The endpoint on the opposite side of `id`, if `id` is one of the two.
    pub fn other_end(&self, id: &str) -> Option<&str> {
        if self.source_id == id {
            Some(&self.target_id)
        } else if self.target_id == id {
            Some(&self.source_id)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_type_roundtrips_known_variants() {
        for (s, expected) in [
            ("hierarchical", EdgeType::Hierarchical),
            ("sequential", EdgeType::Sequential),
            ("associative", EdgeType::Associative),
            ("consolidation", EdgeType::Consolidation),
        ] {
            let parsed: EdgeType = s.parse().unwrap();
            assert_eq!(parsed, expected);
            assert_eq!(parsed.to_string(), s);
        }
    }

    #[test]
    fn unknown_edge_type_becomes_custom() {
        let parsed: EdgeType = "mentions".parse().unwrap();
        assert_eq!(parsed, EdgeType::Custom("mentions".to_string()));
    }

    #[test]
    fn touches_and_other_end_are_bidirectional() {
        let edge = ConnectionEdge::new(
            "a".to_string(),
            "b".to_string(),
            0.5,
            EdgeType::Associative,
        );
        assert!(edge.touches("a"));
        assert!(edge.touches("b"));
        assert!(!edge.touches("c"));
        assert_eq!(edge.other_end("a"), Some("b"));
        assert_eq!(edge.other_end("b"), Some("a"));
        assert_eq!(edge.other_end("c"), None);
    }
}
