//! Deterministic file chunking.
//!
//! Splits a file at byte offsets into fixed-size segments and fingerprints
//! each piece. For a given file and target size the output is identical on
//! every call; resume relies on this.

use std::io::{BufReader, Read};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::codec::hash_hex;
use crate::constants::{
    CHUNK_READ_BUFFER, DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE, MIN_CHUNK_SIZE, PREDICTOR_TIMEOUT,
};
use crate::error::Result;
use crate::model::{ChunkMetadata, ChunkStatus, FileMetadata};
use crate::telemetry::TelemetryCollector;

const MIB: u64 = 1024 * 1024;
const GIB: u64 = 1024 * MIB;

/// Controls how files are split into chunks.
#[derive(Debug, Clone, Copy)]
pub struct ChunkerConfig {
    pub min_chunk_size: u64,
    pub max_chunk_size: u64,
    pub default_chunk_size: u64,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            min_chunk_size: MIN_CHUNK_SIZE,
            max_chunk_size: MAX_CHUNK_SIZE,
            default_chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl ChunkerConfig {
    /// Clamp a requested size into `[min, max]`; zero means "use the default".
    pub fn clamp(&self, size: u64) -> u64 {
        let size = if size == 0 {
            self.default_chunk_size
        } else {
            size
        };
        size.clamp(self.min_chunk_size, self.max_chunk_size)
    }

    /// Static size selection: the override when given, the default otherwise,
    /// always clamped.
    pub fn choose_static(&self, override_size: u64) -> u64 {
        self.clamp(override_size)
    }

    /// Size heuristic by file size, used when no predictor is reachable.
    ///
    /// Small files get small chunks for quick progress feedback; very large
    /// files get large chunks to cut per-chunk overhead.
    fn heuristic(&self, file_size: u64) -> u64 {
        let chosen = match file_size {
            s if s <= 100 * MIB => 8 * MIB,
            s if s <= GIB => 32 * MIB,
            s if s <= 10 * GIB => 64 * MIB,
            _ => 128 * MIB,
        };
        self.clamp(chosen)
    }
}

#[derive(Serialize)]
struct PredictRequest<'a> {
    size_bytes: u64,
    mime_type: &'a str,
    estimated_bandwidth_mbps: f64,
    latency_ms: f64,
}

#[derive(Deserialize)]
struct PredictResponse {
    chunk_size_mb: f64,
}

/// Ask the chunk-size predictor service for a recommended target size.
///
/// Returns the clamped recommendation, or falls back to the size heuristic
/// when the service is unconfigured, unreachable, or returns nonsense. The
/// fallback is silent by design; the predictor is purely advisory.
pub async fn choose_chunk_size_auto(
    cfg: &ChunkerConfig,
    predictor_url: Option<&str>,
    file: &FileMetadata,
    telemetry: Option<&TelemetryCollector>,
) -> u64 {
    if let Some(url) = predictor_url {
        match predict(url, file, telemetry).await {
            Ok(size) if size > 0 => return cfg.clamp(size),
            Ok(_) => debug!("predictor returned non-positive size; using heuristic"),
            Err(e) => debug!(error = %e, "predictor unreachable; using heuristic"),
        }
    }
    cfg.heuristic(file.size)
}

async fn predict(
    url: &str,
    file: &FileMetadata,
    telemetry: Option<&TelemetryCollector>,
) -> std::result::Result<u64, reqwest::Error> {
    let request = PredictRequest {
        size_bytes: file.size,
        mime_type: &file.mime_type,
        estimated_bandwidth_mbps: telemetry.map_or(0.0, |t| t.bandwidth_mbps()),
        latency_ms: telemetry.map_or(0.0, |t| t.latency_ms()),
    };

    let client = reqwest::Client::builder()
        .timeout(PREDICTOR_TIMEOUT)
        .build()?;
    let response: PredictResponse = client
        .post(url)
        .json(&request)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    if response.chunk_size_mb <= 0.0 {
        return Ok(0);
    }
    Ok((response.chunk_size_mb * MIB as f64) as u64)
}

/// Splits files into fixed-size chunks with per-chunk SHA-256 fingerprints.
#[derive(Debug, Default)]
pub struct Chunker {
    cfg: ChunkerConfig,
}

impl Chunker {
    pub fn new(cfg: ChunkerConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.cfg
    }

    /// Split the file at `path` into chunks of up to `chunk_size` bytes.
    ///
    /// `chunk_size` is clamped first (zero selects the default). The
    /// resulting descriptors tile `[0, file_size)` exactly, in index order,
    /// with `id = decimal(index)`. A final short chunk is valid.
    pub fn chunk_file(&self, path: &Path, chunk_size: u64) -> Result<Vec<ChunkMetadata>> {
        let chunk_size = self.cfg.clamp(chunk_size);

        let file = std::fs::File::open(path)?;
        let file_size = file.metadata()?.len();
        let mut reader = BufReader::with_capacity(CHUNK_READ_BUFFER, file);

        let mut result = Vec::new();
        let mut offset: u64 = 0;
        let mut index: usize = 0;
        let mut buf = vec![0u8; chunk_size as usize];
        let now = chrono::Utc::now();

        loop {
            let n = read_full(&mut reader, &mut buf)?;
            if n == 0 {
                break;
            }

            let chunk = &buf[..n];
            result.push(ChunkMetadata {
                id: index.to_string(),
                size: n as u64,
                offset,
                sha256: hash_hex(chunk),
                is_parity: false,
                status: ChunkStatus::Pending,
                updated_at: now,
                created_at: now,
                session_id: String::new(),
                priority: 0,
                retry_count: 0,
                error: String::new(),
            });

            offset += n as u64;
            index += 1;

            if offset >= file_size || n < chunk_size as usize {
                break;
            }
        }

        debug!(
            path = %path.display(),
            chunks = result.len(),
            chunk_size,
            "chunked file"
        );
        Ok(result)
    }
}

/// Read until `buf` is full or EOF; returns the number of bytes read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
