//! ActivityTracker — a scalar `activity ∈ [0,1]` combining recent commit
//! rate and recent access rate, cached with a short TTL so repeated
//! queries don't re-scan the repository or re-aggregate retrieval stats.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::Utc;

use crate::config::CognitiveConfig;
use crate::storage::MetadataStore;

struct CachedScore {
    value: f32,
    computed_at: Instant,
}

/// Computes and caches the project's activity score.
pub struct ActivityTracker {
    repo_path: Option<PathBuf>,
    cache: Mutex<Option<CachedScore>>,
}

impl ActivityTracker {
    pub fn new(repo_path: Option<PathBuf>) -> Self {
        Self {
            repo_path,
            cache: Mutex::new(None),
        }
    }

    /// Returns the cached score if still within `ttl`, else recomputes.
    pub fn activity(&self, store: &MetadataStore, config: &CognitiveConfig) -> f32 {
        let ttl = Duration::from_secs(config.activity_cache_ttl_secs);
        {
            let cache = self.cache.lock().expect("activity cache mutex poisoned");
            if let Some(cached) = cache.as_ref() {
                if cached.computed_at.elapsed() < ttl {
                    return cached.value;
                }
            }
        }

        let value = self.compute(store, config);
        let mut cache = self.cache.lock().expect("activity cache mutex poisoned");
        *cache = Some(CachedScore {
            value,
            computed_at: Instant::now(),
        });
        value
    }

    fn compute(&self, store: &MetadataStore, config: &CognitiveConfig) -> f32 {
        let git_component = self.commits_in_window(config.activity_window_days) / (
            config.max_commits_per_day * config.activity_window_days as f64
        );
        let git_component = git_component.min(1.0);

        let access_component = self
            .accesses_in_window(store, config.activity_window_days)
            .map(|total| {
                (total as f64 / (config.max_accesses_per_day * config.activity_window_days as f64)).min(1.0)
            })
            .unwrap_or(0.0);

        let score = config.commit_weight * git_component + config.access_weight * access_component;
        score.clamp(0.0, 1.0) as f32
    }

    /// Number of commits in the last `window_days`, via `git log`. Returns
    /// 0 if `repo_path` is unset or isn't a git repository.
    fn commits_in_window(&self, window_days: i64) -> f64 {
        let Some(repo_path) = self.repo_path.as_deref() else {
            return 0.0;
        };
        if !is_git_repo(repo_path) {
            return 0.0;
        }

        let since = format!("--since={window_days}.days");
        let output = Command::new("git")
            .arg("-C")
            .arg(repo_path)
            .arg("log")
            .arg(since)
            .arg("--oneline")
            .output();

        match output {
            Ok(out) if out.status.success() => {
                String::from_utf8_lossy(&out.stdout).lines().count() as f64
            }
            _ => 0.0,
        }
    }

    /// Total retrieval-stats rows in the last `window_days`.
    fn accesses_in_window(&self, store: &MetadataStore, window_days: i64) -> Option<u64> {
        let cutoff = Utc::now() - chrono::Duration::days(window_days);
        store.count_retrieval_stats_since(cutoff).ok()
    }
}

fn is_git_repo(path: &Path) -> bool {
    path.join(".git").exists()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_repo_path_yields_zero_git_component() {
        let tracker = ActivityTracker::new(None);
        let store = MetadataStore::open_in_memory().unwrap();
        let config = CognitiveConfig::default();
        assert_eq!(tracker.activity(&store, &config), 0.0);
    }

    #[test]
    fn non_git_directory_yields_zero_git_component() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = ActivityTracker::new(Some(dir.path().to_path_buf()));
        let store = MetadataStore::open_in_memory().unwrap();
        let config = CognitiveConfig::default();
        assert_eq!(tracker.activity(&store, &config), 0.0);
    }

    #[test]
    fn cached_score_is_reused_within_ttl() {
        let tracker = ActivityTracker::new(None);
        let store = MetadataStore::open_in_memory().unwrap();
        let config = CognitiveConfig::default();
        let first = tracker.activity(&store, &config);
        let second = tracker.activity(&store, &config);
        assert_eq!(first, second);
    }
}
