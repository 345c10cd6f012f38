//! SQLite-backed MetadataStore: durable storage for memory records,
//! connection edges, the bridge-discovery cache and retrieval statistics.

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::connection::{ConnectionEdge, EdgeType};
use crate::error::{EngineError, Result};
use crate::memory::{ConsolidationStatus, Dimensions, Level, Memory, MemoryType};

/// Multi-reader, single-writer metadata store.
///
/// Two connections to the same file: a writer serialized behind a mutex,
/// and a reader for concurrent read paths. WAL mode lets the reader
/// observe committed writes without blocking on the writer's lock.
pub struct MetadataStore {
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
    #[cfg(test)]
    _tempdir: Option<tempfile::TempDir>,
}

impl MetadataStore {
    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;
        Ok(())
    }

    /// Opens (creating if necessary) the metadata store at `db_path`, or
    /// at the platform-specific default data directory when `None`.
    pub fn new(db_path: Option<PathBuf>) -> Result<Self> {
        let path = match db_path {
            Some(p) => p,
            None => {
                let proj_dirs = ProjectDirs::from("com", "cogmem", "core").ok_or_else(|| {
                    EngineError::Storage("could not determine project directories".to_string())
                })?;
                let data_dir = proj_dirs.data_dir();
                std::fs::create_dir_all(data_dir)?;
                data_dir.join("cogmem.db")
            }
        };

        let writer_conn = Connection::open(&path)?;
        Self::configure_connection(&writer_conn)?;
        super::migrations::apply_migrations(&writer_conn)?;

        let reader_conn = Connection::open(&path)?;
        Self::configure_connection(&reader_conn)?;

        Ok(Self {
            writer: Mutex::new(writer_conn),
            reader: Mutex::new(reader_conn),
            #[cfg(test)]
            _tempdir: None,
        })
    }

    /// Isolated on-disk store for tests, backed by a temp directory that's
    /// removed when the store is dropped.
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let tempdir = tempfile::tempdir()?;
        let path = tempdir.path().join("cogmem-test.db");

        let writer_conn = Connection::open(&path)?;
        Self::configure_connection(&writer_conn)?;
        super::migrations::apply_migrations(&writer_conn)?;

        let reader_conn = Connection::open(&path)?;
        Self::configure_connection(&reader_conn)?;

        Ok(Self {
            writer: Mutex::new(writer_conn),
            reader: Mutex::new(reader_conn),
            _tempdir: Some(tempdir),
        })
    }

    // ------------------------------------------------------------------
    // Memories
    // ------------------------------------------------------------------

    /// Upsert by id. Returns `false` (not an error) on IO fault so bulk
    /// callers can count failures instead of aborting.
    pub fn store_memory(&self, m: &Memory) -> Result<bool> {
        let conn = self.writer.lock().map_err(|_| EngineError::Storage("writer mutex poisoned".to_string()))?;
        let dimensions_blob = serde_json::to_string(&m.dimensions)?;
        let metadata_blob = serde_json::to_string(&m.metadata)?;
        let tags_blob = serde_json::to_string(&m.tags)?;
        let embedding_blob = m.embedding.as_ref().map(|v| encode_embedding(v));

        conn.execute(
            "INSERT INTO memories (
                id, level, content, dimensions_blob, embedding_blob, timestamp,
                last_accessed, access_count, importance_score, parent_id,
                memory_type, strength, decay_rate, consolidation_status,
                tags_blob, metadata_blob
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16)
            ON CONFLICT(id) DO UPDATE SET
                level=excluded.level,
                content=excluded.content,
                dimensions_blob=excluded.dimensions_blob,
                embedding_blob=excluded.embedding_blob,
                timestamp=excluded.timestamp,
                last_accessed=excluded.last_accessed,
                access_count=excluded.access_count,
                importance_score=excluded.importance_score,
                parent_id=excluded.parent_id,
                memory_type=excluded.memory_type,
                strength=excluded.strength,
                decay_rate=excluded.decay_rate,
                consolidation_status=excluded.consolidation_status,
                tags_blob=excluded.tags_blob,
                metadata_blob=excluded.metadata_blob",
            params![
                m.id,
                m.level.as_u8(),
                m.content,
                dimensions_blob,
                embedding_blob,
                m.timestamp.to_rfc3339(),
                m.last_accessed.to_rfc3339(),
                m.access_count,
                m.importance_score,
                m.parent_id,
                m.memory_type.to_string(),
                m.strength,
                m.decay_rate,
                m.consolidation_status.to_string(),
                tags_blob,
                metadata_blob,
            ],
        )?;

        Ok(true)
    }

    /// Same as `store_memory`: idempotent replace.
    pub fn update_memory(&self, m: &Memory) -> Result<bool> {
        self.store_memory(m)
    }

    pub fn retrieve_memory(&self, id: &str) -> Result<Option<Memory>> {
        let conn = self.reader_or_writer();
        let conn = conn.lock().map_err(|_| EngineError::Storage("mutex poisoned".to_string()))?;
        conn.query_row(
            "SELECT id, level, content, dimensions_blob, embedding_blob, timestamp,
                    last_accessed, access_count, importance_score, parent_id,
                    memory_type, strength, decay_rate, consolidation_status,
                    tags_blob, metadata_blob
             FROM memories WHERE id = ?1",
            params![id],
            row_to_memory,
        )
        .optional()
        .map_err(EngineError::from)
    }

    /// Returns whether a row was removed. Cascades to connection edges via
    /// the `ON DELETE CASCADE` foreign keys; bridge-cache rows referencing
    /// the id are cleaned up explicitly since that table has no FK.
    pub fn delete_memory(&self, id: &str) -> Result<bool> {
        let conn = self.writer.lock().map_err(|_| EngineError::Storage("writer mutex poisoned".to_string()))?;
        conn.execute("DELETE FROM bridge_cache WHERE bridge_id = ?1", params![id])?;
        let affected = conn.execute("DELETE FROM memories WHERE id = ?1", params![id])?;
        Ok(affected > 0)
    }

    pub fn get_memories_by_level(&self, level: Level) -> Result<Vec<Memory>> {
        let conn = self.reader_or_writer();
        let conn = conn.lock().map_err(|_| EngineError::Storage("mutex poisoned".to_string()))?;
        let mut stmt = conn.prepare(
            "SELECT id, level, content, dimensions_blob, embedding_blob, timestamp,
                    last_accessed, access_count, importance_score, parent_id,
                    memory_type, strength, decay_rate, consolidation_status,
                    tags_blob, metadata_blob
             FROM memories WHERE level = ?1 ORDER BY timestamp DESC",
        )?;
        let rows = stmt
            .query_map(params![level.as_u8()], row_to_memory)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn get_memories_by_type(&self, memory_type: MemoryType) -> Result<Vec<Memory>> {
        let conn = self.reader_or_writer();
        let conn = conn.lock().map_err(|_| EngineError::Storage("mutex poisoned".to_string()))?;
        let mut stmt = conn.prepare(
            "SELECT id, level, content, dimensions_blob, embedding_blob, timestamp,
                    last_accessed, access_count, importance_score, parent_id,
                    memory_type, strength, decay_rate, consolidation_status,
                    tags_blob, metadata_blob
             FROM memories WHERE memory_type = ?1 ORDER BY timestamp DESC",
        )?;
        let rows = stmt
            .query_map(params![memory_type.to_string()], row_to_memory)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Exact (case-sensitive) match of `metadata.source_path`. Returns
    /// empty if `path` is null, ordered by `strength` then `access_count`
    /// descending.
    pub fn get_memories_by_source_path(&self, path: Option<&str>) -> Result<Vec<Memory>> {
        let Some(path) = path else {
            return Ok(Vec::new());
        };

        let conn = self.reader_or_writer();
        let conn = conn.lock().map_err(|_| EngineError::Storage("mutex poisoned".to_string()))?;
        let mut stmt = conn.prepare(
            "SELECT id, level, content, dimensions_blob, embedding_blob, timestamp,
                    last_accessed, access_count, importance_score, parent_id,
                    memory_type, strength, decay_rate, consolidation_status,
                    tags_blob, metadata_blob
             FROM memories
             WHERE json_extract(metadata_blob, '$.source_path') = ?1
             ORDER BY strength DESC, access_count DESC",
        )?;
        let rows = stmt
            .query_map(params![path], row_to_memory)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn delete_memories_by_source_path(&self, path: &str) -> Result<u64> {
        let matches = self.get_memories_by_source_path(Some(path))?;
        let conn = self.writer.lock().map_err(|_| EngineError::Storage("writer mutex poisoned".to_string()))?;
        let mut count = 0u64;
        for m in &matches {
            conn.execute("DELETE FROM bridge_cache WHERE bridge_id = ?1", params![m.id])?;
            count += conn.execute("DELETE FROM memories WHERE id = ?1", params![m.id])? as u64;
        }
        Ok(count)
    }

    pub fn all_memories(&self) -> Result<Vec<Memory>> {
        let conn = self.reader_or_writer();
        let conn = conn.lock().map_err(|_| EngineError::Storage("mutex poisoned".to_string()))?;
        let mut stmt = conn.prepare(
            "SELECT id, level, content, dimensions_blob, embedding_blob, timestamp,
                    last_accessed, access_count, importance_score, parent_id,
                    memory_type, strength, decay_rate, consolidation_status,
                    tags_blob, metadata_blob
             FROM memories",
        )?;
        let rows = stmt
            .query_map([], row_to_memory)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    // ------------------------------------------------------------------
    // Connections
    // ------------------------------------------------------------------

    /// Upsert by `(source_id, target_id)`. Discarded by the caller at
    /// insertion time if below `strength_floor`, per §4.3.
    pub fn upsert_connection(&self, edge: &ConnectionEdge) -> Result<bool> {
        let conn = self.writer.lock().map_err(|_| EngineError::Storage("writer mutex poisoned".to_string()))?;
        conn.execute(
            "INSERT INTO memory_connections (
                source_id, target_id, strength, type, created_at, last_activated, activation_count
            ) VALUES (?1,?2,?3,?4,?5,?6,?7)
            ON CONFLICT(source_id, target_id) DO UPDATE SET
                strength=excluded.strength,
                type=excluded.type",
            params![
                edge.source_id,
                edge.target_id,
                edge.strength,
                edge.edge_type.to_string(),
                edge.created_at.to_rfc3339(),
                edge.last_activated.map(|t| t.to_rfc3339()),
                edge.activation_count,
            ],
        )?;
        Ok(true)
    }

    /// All edges touching `id` in either direction with `strength >= min_strength`.
    pub fn connections_for(&self, id: &str, min_strength: f32) -> Result<Vec<ConnectionEdge>> {
        let conn = self.reader_or_writer();
        let conn = conn.lock().map_err(|_| EngineError::Storage("mutex poisoned".to_string()))?;
        let mut stmt = conn.prepare(
            "SELECT source_id, target_id, strength, type, created_at, last_activated, activation_count
             FROM memory_connections
             WHERE (source_id = ?1 OR target_id = ?1) AND strength >= ?2
             ORDER BY strength DESC",
        )?;
        let rows = stmt
            .query_map(params![id, min_strength], row_to_connection)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn update_connection_strength(&self, src: &str, tgt: &str, new_strength: f32) -> Result<bool> {
        let conn = self.writer.lock().map_err(|_| EngineError::Storage("writer mutex poisoned".to_string()))?;
        let affected = conn.execute(
            "UPDATE memory_connections SET strength = ?3 WHERE source_id = ?1 AND target_id = ?2",
            params![src, tgt, new_strength],
        )?;
        Ok(affected > 0)
    }

    pub fn remove_connection(&self, src: &str, tgt: &str) -> Result<bool> {
        let conn = self.writer.lock().map_err(|_| EngineError::Storage("writer mutex poisoned".to_string()))?;
        let affected = conn.execute(
            "DELETE FROM memory_connections WHERE source_id = ?1 AND target_id = ?2",
            params![src, tgt],
        )?;
        Ok(affected > 0)
    }

    /// Touches `last_activated` and increments `activation_count`.
    pub fn activate_connection(&self, src: &str, tgt: &str) -> Result<bool> {
        let conn = self.writer.lock().map_err(|_| EngineError::Storage("writer mutex poisoned".to_string()))?;
        let affected = conn.execute(
            "UPDATE memory_connections
             SET last_activated = ?3, activation_count = activation_count + 1
             WHERE source_id = ?1 AND target_id = ?2",
            params![src, tgt, Utc::now().to_rfc3339()],
        )?;
        Ok(affected > 0)
    }

    // ------------------------------------------------------------------
    // Bridge cache / retrieval stats
    // ------------------------------------------------------------------

    pub fn cache_bridge(
        &self,
        query_hash: &str,
        bridge_id: &str,
        bridge_score: f32,
        novelty: f32,
        connection_potential: f32,
    ) -> Result<()> {
        let conn = self.writer.lock().map_err(|_| EngineError::Storage("writer mutex poisoned".to_string()))?;
        conn.execute(
            "INSERT INTO bridge_cache (query_hash, bridge_id, bridge_score, novelty, connection_potential, created_at)
             VALUES (?1,?2,?3,?4,?5,?6)
             ON CONFLICT(query_hash, bridge_id) DO UPDATE SET
                bridge_score=excluded.bridge_score,
                novelty=excluded.novelty,
                connection_potential=excluded.connection_potential",
            params![
                query_hash,
                bridge_id,
                bridge_score,
                novelty,
                connection_potential,
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    }

    pub fn record_retrieval(
        &self,
        query_hash: &str,
        memory_id: &str,
        retrieval_type: &str,
        success_score: Option<f32>,
    ) -> Result<()> {
        self.record_retrieval_at(query_hash, memory_id, retrieval_type, success_score, Utc::now())
    }

    /// Same as [`Self::record_retrieval`] with an explicit timestamp, for
    /// backfilling retrieval logs imported from another source.
    pub fn record_retrieval_at(
        &self,
        query_hash: &str,
        memory_id: &str,
        retrieval_type: &str,
        success_score: Option<f32>,
        timestamp: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.writer.lock().map_err(|_| EngineError::Storage("writer mutex poisoned".to_string()))?;
        conn.execute(
            "INSERT INTO retrieval_stats (query_hash, memory_id, retrieval_type, success_score, timestamp)
             VALUES (?1,?2,?3,?4,?5)",
            params![query_hash, memory_id, retrieval_type, success_score, timestamp.to_rfc3339()],
        )?;
        Ok(())
    }

    /// Access timestamps for `memory_id` at or after `since`, ascending,
    /// used by the Consolidator's access-pattern statistics.
    pub fn access_timestamps_since(&self, memory_id: &str, since: DateTime<Utc>) -> Result<Vec<DateTime<Utc>>> {
        let conn = self.reader_or_writer();
        let conn = conn.lock().map_err(|_| EngineError::Storage("mutex poisoned".to_string()))?;
        let mut stmt = conn.prepare(
            "SELECT timestamp FROM retrieval_stats
             WHERE memory_id = ?1 AND timestamp >= ?2
             ORDER BY timestamp ASC",
        )?;
        let rows = stmt
            .query_map(params![memory_id, since.to_rfc3339()], |row| {
                let s: String = row.get(0)?;
                Ok(s)
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.iter()
            .map(|s| parse_rfc3339(s).map_err(EngineError::from))
            .collect()
    }

    /// Total `retrieval_stats` rows recorded at or after `since`, used by
    /// `ActivityTracker`'s access-rate component.
    pub fn count_retrieval_stats_since(&self, since: DateTime<Utc>) -> Result<u64> {
        let conn = self.reader_or_writer();
        let conn = conn.lock().map_err(|_| EngineError::Storage("mutex poisoned".to_string()))?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM retrieval_stats WHERE timestamp >= ?1",
            params![since.to_rfc3339()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn reader_or_writer(&self) -> &Mutex<Connection> {
        &self.reader
    }
}

fn encode_embedding(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn decode_embedding(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    )
}

fn parse_rfc3339(s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn row_to_memory(row: &rusqlite::Row) -> rusqlite::Result<Memory> {
    let level_raw: u8 = row.get(1)?;
    let level = Level::from_u8(level_raw).unwrap_or(Level::Episode);

    let dimensions_blob: String = row.get(3)?;
    let dimensions: Dimensions = serde_json::from_str(&dimensions_blob).unwrap_or_default();

    let embedding_blob: Option<Vec<u8>> = row.get(4)?;
    let embedding = embedding_blob.and_then(|b| decode_embedding(&b));

    let timestamp: String = row.get(5)?;
    let last_accessed: String = row.get(6)?;

    let memory_type_raw: String = row.get(10)?;
    let memory_type = memory_type_raw.parse().unwrap_or(MemoryType::Episodic);

    let consolidation_raw: String = row.get(13)?;
    let consolidation_status = consolidation_raw.parse().unwrap_or(ConsolidationStatus::None);

    let tags_blob: String = row.get(14)?;
    let tags: Vec<String> = serde_json::from_str(&tags_blob).unwrap_or_default();

    let metadata_blob: String = row.get(15)?;
    let metadata: HashMap<String, String> = serde_json::from_str(&metadata_blob).unwrap_or_default();

    Ok(Memory {
        id: row.get(0)?,
        content: row.get(2)?,
        level,
        memory_type,
        dimensions,
        embedding,
        timestamp: parse_rfc3339(&timestamp)?,
        last_accessed: parse_rfc3339(&last_accessed)?,
        access_count: row.get(7)?,
        importance_score: row.get(8)?,
        parent_id: row.get(9)?,
        strength: row.get(11)?,
        decay_rate: row.get(12)?,
        consolidation_status,
        tags,
        metadata,
    })
}

fn row_to_connection(row: &rusqlite::Row) -> rusqlite::Result<ConnectionEdge> {
    let edge_type_raw: String = row.get(3)?;
    let edge_type: EdgeType = edge_type_raw.parse().unwrap_or(EdgeType::Associative);

    let created_at: String = row.get(4)?;
    let last_activated: Option<String> = row.get(5)?;

    Ok(ConnectionEdge {
        source_id: row.get(0)?,
        target_id: row.get(1)?,
        strength: row.get(2)?,
        edge_type,
        created_at: parse_rfc3339(&created_at)?,
        last_activated: last_activated.map(|s| parse_rfc3339(&s)).transpose()?,
        activation_count: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Dimensions;

    fn sample_memory(id: &str) -> Memory {
        let now = Utc::now();
        let mut metadata = HashMap::new();
        metadata.insert("source_type".to_string(), "manual_entry".to_string());
        Memory {
            id: id.to_string(),
            content: "the quick brown fox".to_string(),
            level: Level::Episode,
            memory_type: MemoryType::Episodic,
            dimensions: Dimensions::default(),
            embedding: Some(vec![1.0, 0.0, 0.0]),
            timestamp: now,
            last_accessed: now,
            access_count: 0,
            strength: 0.9,
            importance_score: 0.1,
            decay_rate: 0.1,
            consolidation_status: ConsolidationStatus::None,
            parent_id: None,
            tags: vec!["fox".to_string()],
            metadata,
        }
    }

    #[test]
    fn round_trip_persistence() {
        let store = MetadataStore::open_in_memory().unwrap();
        let m = sample_memory("mem-1");
        assert!(store.store_memory(&m).unwrap());

        let fetched = store.retrieve_memory("mem-1").unwrap().unwrap();
        assert_eq!(fetched.id, m.id);
        assert_eq!(fetched.content, m.content);
        assert_eq!(fetched.dimensions, m.dimensions);
        assert_eq!(fetched.metadata, m.metadata);
        assert_eq!(fetched.embedding, m.embedding);
    }

    #[test]
    fn delete_removes_memory_and_connections() {
        let store = MetadataStore::open_in_memory().unwrap();
        let a = sample_memory("a");
        let b = sample_memory("b");
        store.store_memory(&a).unwrap();
        store.store_memory(&b).unwrap();

        let edge = ConnectionEdge::new("a".to_string(), "b".to_string(), 0.5, EdgeType::Associative);
        store.upsert_connection(&edge).unwrap();

        assert!(store.delete_memory("a").unwrap());
        assert!(store.retrieve_memory("a").unwrap().is_none());
        assert!(store.connections_for("b", 0.0).unwrap().is_empty());
    }

    #[test]
    fn source_path_lookup_is_exact_and_ordered() {
        let store = MetadataStore::open_in_memory().unwrap();
        let mut m1 = sample_memory("m1");
        m1.metadata.insert("source_path".to_string(), "/repo/a.rs".to_string());
        m1.strength = 0.5;
        let mut m2 = sample_memory("m2");
        m2.metadata.insert("source_path".to_string(), "/repo/a.rs".to_string());
        m2.strength = 0.9;

        store.store_memory(&m1).unwrap();
        store.store_memory(&m2).unwrap();

        let results = store.get_memories_by_source_path(Some("/repo/a.rs")).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "m2");

        assert!(store.get_memories_by_source_path(None).unwrap().is_empty());
    }

    #[test]
    fn connections_are_bidirectional() {
        let store = MetadataStore::open_in_memory().unwrap();
        store.store_memory(&sample_memory("a")).unwrap();
        store.store_memory(&sample_memory("b")).unwrap();
        let edge = ConnectionEdge::new("a".to_string(), "b".to_string(), 0.6, EdgeType::Hierarchical);
        store.upsert_connection(&edge).unwrap();

        assert_eq!(store.connections_for("a", 0.0).unwrap().len(), 1);
        assert_eq!(store.connections_for("b", 0.0).unwrap().len(), 1);
        assert!(store.connections_for("a", 0.9).unwrap().is_empty());
    }
}
