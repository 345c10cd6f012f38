//! Database migrations — the persisted metadata-store schema (§6).

/// A database migration.
#[derive(Debug, Clone)]
pub struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub up: &'static str,
}

/// Applied in order against the writer connection at startup.
pub const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "Initial schema: memories, connections, bridge cache, retrieval stats",
    up: MIGRATION_V1_UP,
}];

const MIGRATION_V1_UP: &str = r#"
CREATE TABLE IF NOT EXISTS memories (
    id TEXT PRIMARY KEY,
    level INTEGER NOT NULL,
    content TEXT NOT NULL,
    dimensions_blob TEXT NOT NULL,
    embedding_blob BLOB,
    timestamp TEXT NOT NULL,
    last_accessed TEXT NOT NULL,
    access_count INTEGER NOT NULL DEFAULT 0,
    importance_score REAL NOT NULL DEFAULT 0.0,
    parent_id TEXT,
    memory_type TEXT NOT NULL,
    strength REAL NOT NULL DEFAULT 1.0,
    decay_rate REAL NOT NULL,
    consolidation_status TEXT NOT NULL DEFAULT 'none',
    tags_blob TEXT NOT NULL DEFAULT '[]',
    metadata_blob TEXT NOT NULL DEFAULT '{}'
);

CREATE INDEX IF NOT EXISTS idx_memories_level ON memories(level);
CREATE INDEX IF NOT EXISTS idx_memories_timestamp ON memories(timestamp);
CREATE INDEX IF NOT EXISTS idx_memories_access_count ON memories(access_count);
CREATE INDEX IF NOT EXISTS idx_memories_memory_type ON memories(memory_type);

CREATE TABLE IF NOT EXISTS memory_connections (
    source_id TEXT NOT NULL,
    target_id TEXT NOT NULL,
    strength REAL NOT NULL,
    type TEXT NOT NULL,
    created_at TEXT NOT NULL,
    last_activated TEXT,
    activation_count INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (source_id, target_id),
    FOREIGN KEY (source_id) REFERENCES memories(id) ON DELETE CASCADE,
    FOREIGN KEY (target_id) REFERENCES memories(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_connections_strength ON memory_connections(strength);
CREATE INDEX IF NOT EXISTS idx_connections_target ON memory_connections(target_id);

CREATE TABLE IF NOT EXISTS bridge_cache (
    query_hash TEXT NOT NULL,
    bridge_id TEXT NOT NULL,
    bridge_score REAL NOT NULL,
    novelty REAL NOT NULL,
    connection_potential REAL NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (query_hash, bridge_id)
);

CREATE INDEX IF NOT EXISTS idx_bridge_cache_query ON bridge_cache(query_hash);

CREATE TABLE IF NOT EXISTS retrieval_stats (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    query_hash TEXT NOT NULL,
    memory_id TEXT NOT NULL,
    retrieval_type TEXT NOT NULL,
    success_score REAL,
    timestamp TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_retrieval_stats_timestamp ON retrieval_stats(timestamp);

CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at TEXT NOT NULL
);
"#;

/// Applies every migration newer than the highest recorded version, in
/// order, inside a single writer transaction each.
pub fn apply_migrations(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL
        );",
    )?;

    let applied: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(CAST(version AS INTEGER)), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    for migration in MIGRATIONS {
        if (migration.version as i64) <= applied {
            continue;
        }
        conn.execute_batch(migration.up)?;
        conn.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
            rusqlite::params![
                migration.version.to_string(),
                chrono::Utc::now().to_rfc3339()
            ],
        )?;
    }

    Ok(())
}
