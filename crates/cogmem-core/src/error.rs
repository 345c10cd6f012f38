//! Error taxonomy for the cognitive memory engine.
//!
//! Every public operation returns [`Result<T>`]. Nothing in this crate
//! panics on a caller-reachable path; failures are always a structured
//! `EngineError` variant, per the propagation policy in the spec.

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EngineError>;

/// The engine's error taxonomy.
///
/// Kinds mirror the spec's error taxonomy (ValidationError, StorageError,
/// VectorStoreError, EncoderError, NotFound, ConsolidationError) rather
/// than wrapping every possible underlying error type 1:1.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Empty text/query, invalid level, unknown loader type, malformed id.
    #[error("validation error: {0}")]
    Validation(String),

    /// MetadataStore IO fault.
    #[error("storage error: {0}")]
    Storage(String),

    /// VectorStore adapter/remote error. Non-fatal: the engine stays queryable.
    #[error("vector store error: {0}")]
    VectorStore(String),

    /// Encoder raised, or returned a zero vector for non-empty text.
    #[error("encoder error: {0}")]
    Encoder(String),

    /// A looked-up id was absent where the operation requires it to exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Per-memory consolidation failure; logged and counted, never aborts a cycle.
    #[error("consolidation error: {0}")]
    Consolidation(String),

    /// An optional capability (e.g. `SourceLoader::upsert_memories`) was not implemented.
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),
}

impl From<rusqlite::Error> for EngineError {
    fn from(e: rusqlite::Error) -> Self {
        EngineError::Storage(e.to_string())
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::Storage(format!("serialization error: {e}"))
    }
}
