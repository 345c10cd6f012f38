//! Runtime configuration.
//!
//! Every tunable named throughout the engine lives on [`CognitiveConfig`],
//! constructed once and passed explicitly through the [`crate::coordinator::Coordinator`] —
//! there is no module-level settings singleton.

use std::collections::HashMap;

/// Per-content-type decay multiplier table, keyed by `metadata.source_type`
/// or a level-derived fallback key (`L0_concept`, `L1_context`, `L2_episode`).
#[derive(Debug, Clone)]
pub struct DecayProfile {
    pub multipliers: HashMap<String, f64>,
}

impl Default for DecayProfile {
    fn default() -> Self {
        let mut multipliers = HashMap::new();
        multipliers.insert("git_commit".to_string(), 1.2);
        multipliers.insert("session_lesson".to_string(), 0.2);
        multipliers.insert("store_memory".to_string(), 1.0);
        multipliers.insert("documentation".to_string(), 0.2);
        multipliers.insert("manual_entry".to_string(), 1.0);
        multipliers.insert("L0_concept".to_string(), 0.3);
        multipliers.insert("L1_context".to_string(), 0.8);
        multipliers.insert("L2_episode".to_string(), 1.0);
        Self { multipliers }
    }
}

impl DecayProfile {
    pub fn multiplier_for(&self, content_type: &str) -> f64 {
        self.multipliers.get(content_type).copied().unwrap_or(1.0)
    }
}

/// Every tunable knob named in the component design, collected into one
/// struct so deployments can override via `COGMEM_*` environment variables.
#[derive(Debug, Clone)]
pub struct CognitiveConfig {
    // --- ConnectionGraph (§4.3) ---
    pub hierarchical_weight: f32,
    pub sequential_weight: f32,
    pub associative_weight: f32,
    pub strength_floor: f32,

    // --- ActivityTracker (§4.4) ---
    pub activity_window_days: i64,
    pub max_commits_per_day: f64,
    pub max_accesses_per_day: f64,
    pub commit_weight: f64,
    pub access_weight: f64,
    pub activity_cache_ttl_secs: u64,

    // --- DecayEngine (§4.5) ---
    pub episodic_base_decay: f64,
    pub semantic_base_decay: f64,
    pub decay_profile: DecayProfile,
    pub activity_high_threshold: f64,
    pub activity_low_threshold: f64,
    pub activity_high_multiplier: f64,
    pub activity_low_multiplier: f64,
    pub max_retention_days: i64,
    pub min_effective_strength: f64,
    pub min_importance_score: f64,

    // --- ActivationEngine (§4.6) ---
    pub activation_threshold: f32,
    pub core_threshold: f32,
    pub peripheral_threshold: f32,
    pub max_activations: usize,

    // --- SimilaritySearch (§4.7) ---
    pub similarity_weight: f32,
    pub recency_weight: f32,
    pub recency_decay_hours: f64,
    pub min_similarity: f32,
    pub similarity_closeness_threshold: f32,
    pub modification_date_weight: f32,
    pub modification_recency_decay_days: f64,

    // --- BridgeDiscovery (§4.8) ---
    pub novelty_weight: f32,
    pub connection_weight: f32,
    pub min_novelty: f32,
    pub max_bridge_candidates: usize,
    pub bridge_top_k: usize,

    // --- Consolidator (§4.9) ---
    pub consolidation_min_access_count: i64,
    pub consolidation_cooldown_hours: i64,
    pub consolidation_score_threshold: f64,
    pub consolidated_strength_cap: f32,
    pub consolidated_decay_rate: f32,
    pub consolidation_edge_strength: f32,
}

impl Default for CognitiveConfig {
    fn default() -> Self {
        Self {
            hierarchical_weight: 0.80,
            sequential_weight: 0.70,
            associative_weight: 0.35,
            strength_floor: 0.3,

            activity_window_days: 30,
            max_commits_per_day: 3.0,
            max_accesses_per_day: 100.0,
            commit_weight: 0.6,
            access_weight: 0.4,
            activity_cache_ttl_secs: 60,

            episodic_base_decay: 0.1,
            semantic_base_decay: 0.01,
            decay_profile: DecayProfile::default(),
            activity_high_threshold: 0.7,
            activity_low_threshold: 0.2,
            activity_high_multiplier: 2.0,
            activity_low_multiplier: 0.1,
            max_retention_days: 30,
            min_effective_strength: 0.01,
            min_importance_score: 0.01,

            activation_threshold: 0.5,
            core_threshold: 0.7,
            peripheral_threshold: 0.5,
            max_activations: 50,

            similarity_weight: 0.8,
            recency_weight: 0.2,
            recency_decay_hours: 168.0,
            min_similarity: 0.1,
            similarity_closeness_threshold: 0.05,
            modification_date_weight: 0.3,
            modification_recency_decay_days: 30.0,

            novelty_weight: 0.6,
            connection_weight: 0.4,
            min_novelty: 0.3,
            max_bridge_candidates: 100,
            bridge_top_k: 5,

            consolidation_min_access_count: 3,
            consolidation_cooldown_hours: 24,
            consolidation_score_threshold: 0.6,
            consolidated_strength_cap: 1.0,
            consolidated_decay_rate: 0.01,
            consolidation_edge_strength: 0.9,
        }
    }
}

impl CognitiveConfig {
    /// Build configuration from defaults, overridden by `COGMEM_*` environment
    /// variables where present. Unrecognized or unparsable values are ignored
    /// (a warning is left to the caller via `tracing`, matching the teacher's
    /// env-var override pattern).
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        macro_rules! env_f32 {
            ($var:expr, $field:ident) => {
                if let Ok(v) = std::env::var($var) {
                    if let Ok(parsed) = v.parse::<f32>() {
                        cfg.$field = parsed;
                    }
                }
            };
        }
        macro_rules! env_f64 {
            ($var:expr, $field:ident) => {
                if let Ok(v) = std::env::var($var) {
                    if let Ok(parsed) = v.parse::<f64>() {
                        cfg.$field = parsed;
                    }
                }
            };
        }
        macro_rules! env_usize {
            ($var:expr, $field:ident) => {
                if let Ok(v) = std::env::var($var) {
                    if let Ok(parsed) = v.parse::<usize>() {
                        cfg.$field = parsed;
                    }
                }
            };
        }
        macro_rules! env_i64 {
            ($var:expr, $field:ident) => {
                if let Ok(v) = std::env::var($var) {
                    if let Ok(parsed) = v.parse::<i64>() {
                        cfg.$field = parsed;
                    }
                }
            };
        }

        env_f32!("COGMEM_STRENGTH_FLOOR", strength_floor);
        env_i64!("COGMEM_ACTIVITY_WINDOW_DAYS", activity_window_days);
        env_f64!("COGMEM_MAX_COMMITS_PER_DAY", max_commits_per_day);
        env_f64!("COGMEM_MAX_ACCESSES_PER_DAY", max_accesses_per_day);
        env_f64!("COGMEM_EPISODIC_BASE_DECAY", episodic_base_decay);
        env_f64!("COGMEM_SEMANTIC_BASE_DECAY", semantic_base_decay);
        env_i64!("COGMEM_MAX_RETENTION_DAYS", max_retention_days);
        env_f32!("COGMEM_ACTIVATION_THRESHOLD", activation_threshold);
        env_f32!("COGMEM_CORE_THRESHOLD", core_threshold);
        env_f32!("COGMEM_PERIPHERAL_THRESHOLD", peripheral_threshold);
        env_usize!("COGMEM_MAX_ACTIVATIONS", max_activations);
        env_f32!("COGMEM_SIMILARITY_WEIGHT", similarity_weight);
        env_f32!("COGMEM_RECENCY_WEIGHT", recency_weight);
        env_f32!("COGMEM_MIN_SIMILARITY", min_similarity);
        env_f32!("COGMEM_NOVELTY_WEIGHT", novelty_weight);
        env_f32!("COGMEM_CONNECTION_WEIGHT", connection_weight);
        env_f32!("COGMEM_MIN_NOVELTY", min_novelty);
        env_usize!("COGMEM_BRIDGE_TOP_K", bridge_top_k);
        env_i64!(
            "COGMEM_CONSOLIDATION_MIN_ACCESS_COUNT",
            consolidation_min_access_count
        );
        env_f64!(
            "COGMEM_CONSOLIDATION_SCORE_THRESHOLD",
            consolidation_score_threshold
        );

        // Normalize similarity/recency weights to sum to 1, per §4.7.
        let sum = cfg.similarity_weight + cfg.recency_weight;
        if sum <= 0.0 {
            cfg.similarity_weight = 0.8;
            cfg.recency_weight = 0.2;
        } else {
            cfg.similarity_weight /= sum;
            cfg.recency_weight /= sum;
        }

        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_decay_profile_matches_spec() {
        let profile = DecayProfile::default();
        assert_eq!(profile.multiplier_for("git_commit"), 1.2);
        assert_eq!(profile.multiplier_for("session_lesson"), 0.2);
        assert_eq!(profile.multiplier_for("unknown_key"), 1.0);
    }

    #[test]
    fn default_config_weights_sum_to_one() {
        let cfg = CognitiveConfig::default();
        assert!((cfg.similarity_weight + cfg.recency_weight - 1.0).abs() < 1e-6);
    }
}
