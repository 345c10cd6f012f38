//! DecayEngine — computes a memory's current effective strength from its
//! stored strength, age, content-type profile, and project activity.

use chrono::Utc;

use crate::config::CognitiveConfig;
use crate::memory::{Memory, MemoryType};

/// Computes effective strength and expiration, given the current activity
/// score (see [`crate::activity::ActivityTracker`]).
pub struct DecayEngine<'a> {
    config: &'a CognitiveConfig,
}

impl<'a> DecayEngine<'a> {
    pub fn new(config: &'a CognitiveConfig) -> Self {
        Self { config }
    }

    fn activity_multiplier(&self, activity: f64) -> f64 {
        if activity > self.config.activity_high_threshold {
            self.config.activity_high_multiplier
        } else if activity < self.config.activity_low_threshold {
            self.config.activity_low_multiplier
        } else {
            1.0
        }
    }

    fn base_decay(&self, memory: &Memory) -> f64 {
        match memory.memory_type {
            MemoryType::Episodic => self.config.episodic_base_decay,
            MemoryType::Semantic => self.config.semantic_base_decay,
        }
    }

    /// `effective_rate = base_decay × profile_multiplier × activity_multiplier`.
    pub fn effective_rate(&self, memory: &Memory, activity: f64) -> f64 {
        let base = if memory.decay_rate > 0.0 {
            memory.decay_rate as f64
        } else {
            self.base_decay(memory)
        };
        let profile_multiplier = self.config.decay_profile.multiplier_for(&memory.content_type_key());
        let activity_multiplier = self.activity_multiplier(activity);
        base * profile_multiplier * activity_multiplier
    }

    /// Current effective strength, clamped to `[0,1]`. Episodic memories
    /// age in hours-over-24; semantic memories age in days-over-30.
    pub fn effective_strength(&self, memory: &Memory, activity: f64) -> f32 {
        let rate = self.effective_rate(memory, activity);
        let now = Utc::now();
        let age = now.signed_duration_since(memory.timestamp);

        let exponent = match memory.memory_type {
            MemoryType::Episodic => {
                let hours = age.num_seconds() as f64 / 3600.0;
                -rate * hours / 24.0
            }
            MemoryType::Semantic => {
                let days = age.num_seconds() as f64 / 86_400.0;
                -rate * days / 30.0
            }
        };

        ((memory.strength as f64) * exponent.exp()).clamp(0.0, 1.0) as f32
    }

    /// Age in days since `timestamp`.
    fn age_days(&self, memory: &Memory) -> i64 {
        Utc::now().signed_duration_since(memory.timestamp).num_days()
    }

    /// True if an episodic memory is eligible for removal: too old, too
    /// weak, or no longer important. Semantic memories are never expired.
    pub fn is_expired(&self, memory: &Memory, activity: f64) -> bool {
        if memory.memory_type != MemoryType::Episodic {
            return false;
        }

        self.age_days(memory) > self.config.max_retention_days
            || (self.effective_strength(memory, activity) as f64) < self.config.min_effective_strength
            || (memory.importance_score as f64) < self.config.min_importance_score
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{ConsolidationStatus, Dimensions, Level};
    use chrono::Duration as ChronoDuration;
    use std::collections::HashMap;

    fn memory_aged(hours: i64, memory_type: MemoryType, source_type: &str) -> Memory {
        let mut metadata = HashMap::new();
        metadata.insert("source_type".to_string(), source_type.to_string());
        let now = Utc::now() - ChronoDuration::hours(hours);
        Memory {
            id: "m".to_string(),
            content: "c".to_string(),
            level: Level::Episode,
            memory_type,
            dimensions: Dimensions::default(),
            embedding: None,
            timestamp: now,
            last_accessed: now,
            access_count: 0,
            strength: 1.0,
            importance_score: 0.5,
            decay_rate: match memory_type {
                MemoryType::Episodic => 0.1,
                MemoryType::Semantic => 0.01,
            },
            consolidation_status: ConsolidationStatus::None,
            parent_id: None,
            tags: vec![],
            metadata,
        }
    }

    #[test]
    fn decay_is_monotonic_in_age() {
        let config = CognitiveConfig::default();
        let engine = DecayEngine::new(&config);
        let younger = memory_aged(1, MemoryType::Episodic, "manual_entry");
        let older = memory_aged(200, MemoryType::Episodic, "manual_entry");
        assert!(
            engine.effective_strength(&older, 0.5) < engine.effective_strength(&younger, 0.5)
        );
    }

    #[test]
    fn git_commit_decays_faster_than_session_lesson() {
        let config = CognitiveConfig::default();
        let engine = DecayEngine::new(&config);
        let commit = memory_aged(100, MemoryType::Episodic, "git_commit");
        let lesson = memory_aged(100, MemoryType::Episodic, "session_lesson");
        assert!(engine.effective_strength(&commit, 0.5) < engine.effective_strength(&lesson, 0.5));
    }

    #[test]
    fn activity_modulates_decay_rate() {
        let config = CognitiveConfig::default();
        let engine = DecayEngine::new(&config);
        let m = memory_aged(100, MemoryType::Episodic, "manual_entry");
        let high = engine.effective_rate(&m, 0.9);
        let mid = engine.effective_rate(&m, 0.5);
        let low = engine.effective_rate(&m, 0.1);
        assert!(high > mid);
        assert!(mid > low);
    }

    #[test]
    fn semantic_memories_never_expire() {
        let config = CognitiveConfig::default();
        let engine = DecayEngine::new(&config);
        let mut m = memory_aged(24 * 400, MemoryType::Semantic, "manual_entry");
        m.importance_score = 0.0;
        m.strength = 0.0;
        assert!(!engine.is_expired(&m, 0.5));
    }

    #[test]
    fn old_low_strength_episodic_is_expired() {
        let config = CognitiveConfig::default();
        let engine = DecayEngine::new(&config);
        let mut m = memory_aged(24 * 60, MemoryType::Episodic, "manual_entry");
        m.strength = 0.0001;
        assert!(engine.is_expired(&m, 0.5));
    }
}
