//! Error types for the locastore cache engine

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the cache engine
#[derive(Error, Debug)]
pub enum Error {
    /// Key absent or expired. Read-side I/O failures on metadata collapse
    /// into this kind; the store's diagnostic counters record them.
    #[error("cache entry not found: {name}")]
    NotFound { name: String },

    /// One or more batch operations failed; all writes from the batch
    /// have been rolled back. Removals that succeeded are permanent.
    #[error("batch partially failed, writes rolled back: {failed:?}")]
    PartialBatchFailure { failed: Vec<String> },

    /// Chunk merge attempted before the assembly metadata or all chunk
    /// files were present. Nothing was mutated.
    #[error("incomplete chunked transfer for {name}: missing chunks {missing:?}")]
    IncompleteTransfer { name: String, missing: Vec<u32> },

    /// Eviction exhausted its candidate list while usage was still over
    /// the limit.
    #[error("quota for {scope} unenforceable: {used} bytes used, limit {limit}")]
    QuotaUnenforceable {
        scope: String,
        used: u64,
        limit: u64,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Compression failed
    #[error("compression with {algorithm} failed: {reason}")]
    CompressionFailed { algorithm: String, reason: String },

    /// Decompression failed
    #[error("decompression with {algorithm} failed: {reason}")]
    DecompressionFailed { algorithm: String, reason: String },

    /// Value encoding/decoding error in the typed convenience layer
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
