//! Zstandard compression for wire payloads.
//!
//! The output is a self-describing zstd frame, so decompression needs no
//! external parameters.

use std::io::Read;

use crate::error::{Error, Result};

/// Default compression level (3 = fast with reasonable ratio).
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

/// Compressor for chunk payloads.
#[derive(Debug)]
pub struct Compressor {
    level: i32,
}

impl Compressor {
    /// Create a new compressor with the given compression level.
    pub fn new(level: i32) -> Self {
        Self { level }
    }

    /// Create a new compressor with the default compression level.
    pub fn with_default_level() -> Self {
        Self::new(DEFAULT_COMPRESSION_LEVEL)
    }

    /// Compress a block of data.
    pub fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        zstd::encode_all(data, self.level).map_err(|e| Error::Codec {
            message: format!("compression failed: {}", e),
        })
    }
}

impl Default for Compressor {
    fn default() -> Self {
        Self::with_default_level()
    }
}

/// Decompressor for chunk payloads.
#[derive(Debug, Default)]
pub struct Decompressor;

impl Decompressor {
    /// Create a new decompressor.
    pub fn new() -> Self {
        Self
    }

    /// Decompress a block of data.
    ///
    /// Fails when `data` is not a valid zstd frame.
    pub fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        zstd::decode_all(data).map_err(|e| Error::Codec {
            message: format!("decompression failed: {}", e),
        })
    }

    /// Decompress data, failing once the output exceeds `max_size`.
    ///
    /// Receivers use this so a malformed or hostile frame cannot expand
    /// past the chunk-size cap.
    pub fn decompress_with_limit(&self, data: &[u8], max_size: usize) -> Result<Vec<u8>> {
        let mut decoder = zstd::Decoder::new(data).map_err(|e| Error::Codec {
            message: format!("failed to create decompressor: {}", e),
        })?;

        let mut output = Vec::new();
        let mut buf = [0u8; 8192];

        loop {
            let n = decoder.read(&mut buf).map_err(|e| Error::Codec {
                message: format!("decompression read failed: {}", e),
            })?;

            if n == 0 {
                break;
            }

            if output.len() + n > max_size {
                return Err(Error::Codec {
                    message: format!(
                        "decompressed size exceeds limit: {} > {}",
                        output.len() + n,
                        max_size
                    ),
                });
            }

            output.extend_from_slice(&buf[..n]);
        }

        Ok(output)
    }
}
