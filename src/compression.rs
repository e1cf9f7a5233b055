//! Payload Compression
//!
//! LZ4 compression for the disk tier with automatic fallback on failure.
//! The disk tier stores no algorithm marker: the read path attempts LZ4
//! decompression and treats failure as "stored raw", returning the bytes
//! unchanged. Compression failure likewise falls back to storing raw.

use bytes::Bytes;

use crate::error::{Error, Result};

/// Upper bound on the length prefix accepted by [`CompressionManager::decompress_or_raw`]
const MAX_DECODED_BYTES: usize = 1 << 30;

/// Supported compression algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressionAlgorithm {
    /// No compression
    None,
    /// LZ4 block format, length-prefixed
    Lz4,
}

impl CompressionAlgorithm {
    /// Get human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            CompressionAlgorithm::None => "none",
            CompressionAlgorithm::Lz4 => "lz4",
        }
    }
}

/// Configuration for compression
#[derive(Debug, Clone)]
pub struct CompressionConfig {
    /// Minimum size to compress (smaller payloads are stored raw)
    pub min_size_bytes: u64,
    /// LZ4 high-compression level
    pub level: i32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            min_size_bytes: 64,
            level: 4,
        }
    }
}

/// Trait for compression implementations
pub trait Compressor: Send + Sync {
    /// Get the algorithm identifier
    fn algorithm(&self) -> CompressionAlgorithm;

    /// Compress data
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Decompress data
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>>;
}

/// Pass-through compressor (no compression)
pub struct NoopCompressor;

impl Compressor for NoopCompressor {
    fn algorithm(&self) -> CompressionAlgorithm {
        CompressionAlgorithm::None
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }
}

/// LZ4 compressor
pub struct Lz4Compressor {
    level: i32,
}

impl Lz4Compressor {
    /// Create new LZ4 compressor with default settings
    pub fn new() -> Self {
        Self { level: 4 }
    }

    /// Create with custom compression level
    pub fn with_level(level: i32) -> Self {
        Self { level }
    }
}

impl Default for Lz4Compressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Compressor for Lz4Compressor {
    fn algorithm(&self) -> CompressionAlgorithm {
        CompressionAlgorithm::Lz4
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        lz4::block::compress(
            data,
            Some(lz4::block::CompressionMode::HIGHCOMPRESSION(self.level)),
            true,
        )
        .map_err(|e| Error::CompressionFailed {
            algorithm: "LZ4".into(),
            reason: e.to_string(),
        })
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        lz4::block::decompress(data, None).map_err(|e| Error::DecompressionFailed {
            algorithm: "LZ4".into(),
            reason: e.to_string(),
        })
    }
}

/// Manager for compression operations with fallback support
pub struct CompressionManager {
    config: CompressionConfig,
    lz4: Lz4Compressor,
}

impl CompressionManager {
    /// Create a new compression manager with default config
    pub fn new() -> Self {
        Self::with_config(CompressionConfig::default())
    }

    /// Create with custom config
    pub fn with_config(config: CompressionConfig) -> Self {
        Self {
            lz4: Lz4Compressor::with_level(config.level),
            config,
        }
    }

    /// Compress for disk storage, falling back to the raw bytes when the
    /// payload is below the size floor, compression fails, or the result
    /// would not shrink. Never fails.
    pub fn compress_or_raw(&self, data: &[u8]) -> Bytes {
        if (data.len() as u64) < self.config.min_size_bytes {
            return Bytes::copy_from_slice(data);
        }

        match self.lz4.compress(data) {
            Ok(compressed) if compressed.len() < data.len() => Bytes::from(compressed),
            Ok(_) => Bytes::copy_from_slice(data),
            Err(e) => {
                tracing::warn!("compression failed, storing raw: {}", e);
                Bytes::copy_from_slice(data)
            }
        }
    }

    /// Decompress bytes read from disk. Decompression failure means the
    /// blob was stored raw; the input is returned unchanged.
    pub fn decompress_or_raw(&self, data: &[u8]) -> Bytes {
        // Raw blobs can carry arbitrary leading bytes; reject implausible
        // length prefixes before handing them to the decoder.
        if data.len() < 4 {
            return Bytes::copy_from_slice(data);
        }
        let declared = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
        if declared > MAX_DECODED_BYTES {
            return Bytes::copy_from_slice(data);
        }

        match self.lz4.decompress(data) {
            Ok(decompressed) => Bytes::from(decompressed),
            Err(_) => Bytes::copy_from_slice(data),
        }
    }

    /// Get configuration
    pub fn config(&self) -> &CompressionConfig {
        &self.config
    }
}

impl Default for CompressionManager {
    fn default() -> Self {
        Self::new()
    }
}
