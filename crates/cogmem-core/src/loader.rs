//! Source-loader contract. Parsers for external artifacts (markdown
//! chunkers, git history miners) are out of scope; only the output
//! contract matters here.

use std::collections::HashMap;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::connection::EdgeType;
use crate::error::{EngineError, Result};
use crate::memory::{Dimensions, Level, MemoryType};

/// A memory as produced by a loader, prior to insertion. `embedding` is
/// `None` when the coordinator should encode `content` itself.
#[derive(Debug, Clone)]
pub struct LoaderMemory {
    pub id: String,
    pub content: String,
    pub level: Level,
    pub memory_type: MemoryType,
    pub dimensions: Dimensions,
    pub embedding: Option<Vec<f32>>,
    pub parent_id: Option<String>,
    pub tags: Vec<String>,
    pub metadata: HashMap<String, String>,
}

/// A connection extracted by a loader, prior to filtering against
/// `strength_floor` and verifying both endpoints exist.
#[derive(Debug, Clone)]
pub struct LoaderConnection {
    pub source_id: String,
    pub target_id: String,
    pub strength: f32,
    pub edge_type: EdgeType,
}

/// The duck-typed loader capability set from the source system, collapsed
/// into a single trait. `upsert_memories` is optional and defaults to a
/// not-implemented sentinel.
pub trait SourceLoader: Send + Sync {
    fn validate_source(&self, path: &Path) -> bool;

    fn supported_extensions(&self) -> &[&str];

    fn load_from_source(&self, path: &Path) -> Result<Vec<LoaderMemory>>;

    fn extract_connections(&self, memories: &[LoaderMemory]) -> Vec<LoaderConnection>;

    fn upsert_memories(&self, _memories: &[LoaderMemory]) -> Result<bool> {
        Err(EngineError::NotImplemented("upsert_memories"))
    }
}

/// Treats each non-empty line of a text file as one memory with
/// `source_type = manual_entry` and no connections. Enough to exercise
/// `load_memories_from_source` end to end without the markdown/git
/// loaders, which are out of scope.
pub struct ManualEntryLoader;

impl SourceLoader for ManualEntryLoader {
    fn validate_source(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn supported_extensions(&self) -> &[&str] {
        &["txt", "md"]
    }

    fn load_from_source(&self, path: &Path) -> Result<Vec<LoaderMemory>> {
        let text = std::fs::read_to_string(path)?;
        let path_str = path.to_string_lossy().to_string();

        let memories = text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                let content = line.trim().to_string();
                let mut metadata = HashMap::new();
                metadata.insert("source_type".to_string(), "manual_entry".to_string());
                metadata.insert("source_path".to_string(), path_str.clone());

                LoaderMemory {
                    id: format!("manual_entry::line::{}", content_hash(&content)),
                    content,
                    level: Level::Episode,
                    memory_type: MemoryType::Episodic,
                    dimensions: Dimensions::default(),
                    embedding: None,
                    parent_id: None,
                    tags: vec![],
                    metadata,
                }
            })
            .collect();

        Ok(memories)
    }

    fn extract_connections(&self, _memories: &[LoaderMemory]) -> Vec<LoaderConnection> {
        Vec::new()
    }
}

/// Hex-encoded SHA-256 of `text`, used to derive content-addressed loader
/// ids so identical lines upsert to the same memory regardless of their
/// position in the source file.
fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn manual_entry_loader_skips_blank_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "first line").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "second line").unwrap();

        let loader = ManualEntryLoader;
        assert!(loader.validate_source(file.path()));

        let memories = loader.load_from_source(file.path()).unwrap();
        assert_eq!(memories.len(), 2);
        assert_eq!(memories[0].content, "first line");
        assert_eq!(memories[0].metadata.get("source_type").unwrap(), "manual_entry");
    }

    #[test]
    fn manual_entry_loader_produces_no_connections() {
        let loader = ManualEntryLoader;
        assert!(loader.extract_connections(&[]).is_empty());
    }

    #[test]
    fn identical_input_yields_identical_ids() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "same content").unwrap();

        let loader = ManualEntryLoader;
        let first = loader.load_from_source(file.path()).unwrap();
        let second = loader.load_from_source(file.path()).unwrap();
        assert_eq!(first[0].id, second[0].id);
    }

    #[test]
    fn ids_are_content_addressed_not_position_addressed() {
        let mut before = tempfile::NamedTempFile::new().unwrap();
        writeln!(before, "line a").unwrap();
        writeln!(before, "line b").unwrap();

        let mut after = tempfile::NamedTempFile::new().unwrap();
        writeln!(after, "inserted line").unwrap();
        writeln!(after, "line a").unwrap();
        writeln!(after, "line b").unwrap();

        let loader = ManualEntryLoader;
        let before = loader.load_from_source(before.path()).unwrap();
        let after = loader.load_from_source(after.path()).unwrap();

        // "line a" moved from index 0 to index 1; its id must follow the
        // content, not the line number.
        assert_eq!(before[0].id, after[1].id);
        assert_eq!(before[1].id, after[2].id);
    }

    #[test]
    fn distinct_content_yields_distinct_ids() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "alpha").unwrap();
        writeln!(file, "beta").unwrap();

        let loader = ManualEntryLoader;
        let memories = loader.load_from_source(file.path()).unwrap();
        assert_ne!(memories[0].id, memories[1].id);
    }
}
