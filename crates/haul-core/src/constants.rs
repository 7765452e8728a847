//! Protocol and configuration constants for haul.

use std::time::Duration;

// =============================================================================
// Chunking Constants
// =============================================================================

/// Smallest allowed chunk size (5 MiB).
pub const MIN_CHUNK_SIZE: u64 = 5 * 1024 * 1024;

/// Largest allowed chunk size (200 MiB).
pub const MAX_CHUNK_SIZE: u64 = 200 * 1024 * 1024;

/// Default target chunk size (50 MiB).
pub const DEFAULT_CHUNK_SIZE: u64 = 50 * 1024 * 1024;

/// Buffer capacity for sequential chunking reads.
pub const CHUNK_READ_BUFFER: usize = 1024 * 1024;

/// Buffer size for streaming whole-file hashing.
pub const FILE_HASH_BUFFER: usize = 256 * 1024;

// =============================================================================
// Stream Frame Constants
// =============================================================================

/// Maximum serialized metadata length in a stream frame (1 MiB).
pub const MAX_FRAME_META: usize = 1024 * 1024;

/// Maximum data blob length in a stream frame.
///
/// Payloads are compressed chunks; the slack above the chunk-size cap covers
/// the worst case of incompressible data plus compressor framing overhead.
pub const MAX_FRAME_DATA: usize = MAX_CHUNK_SIZE as usize + 16 * 1024 * 1024;

// =============================================================================
// Datagram Packet Constants
// =============================================================================

/// Maximum datagram packet payload (64 KiB).
pub const MAX_PACKET_PAYLOAD: usize = 64 * 1024;

/// Retransmit timeout for the datagram lane.
pub const DATAGRAM_RETRANSMIT_TIMEOUT: Duration = Duration::from_millis(200);

/// Retry cap for the datagram lane.
pub const DATAGRAM_MAX_RETRIES: u32 = 5;

// =============================================================================
// Timing Constants
// =============================================================================

/// Sender-side connection establishment timeout.
pub const DIAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for coordinator API calls.
pub const COORDINATOR_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for the chunk-size predictor call.
pub const PREDICTOR_TIMEOUT: Duration = Duration::from_secs(2);

// =============================================================================
// Retry Policy Constants
// =============================================================================

/// Maximum retry attempts before giving up.
pub const MAX_RETRIES: u32 = 5;

/// Initial backoff delay.
pub const BASE_BACKOFF: Duration = Duration::from_millis(100);

/// Backoff ceiling.
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Multiplier applied per attempt.
pub const BACKOFF_MULTIPLIER: f64 = 2.0;

/// Jitter fraction applied to each backoff (+/-).
pub const JITTER_FACTOR: f64 = 0.1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_bounds_are_ordered() {
        assert!(MIN_CHUNK_SIZE < DEFAULT_CHUNK_SIZE);
        assert!(DEFAULT_CHUNK_SIZE < MAX_CHUNK_SIZE);
    }

    #[test]
    fn frame_data_cap_covers_max_chunk() {
        assert!(MAX_FRAME_DATA > MAX_CHUNK_SIZE as usize);
    }

    #[test]
    fn backoff_constants_are_sane() {
        assert!(BASE_BACKOFF < MAX_BACKOFF);
        assert!(BACKOFF_MULTIPLIER > 1.0);
        assert!(JITTER_FACTOR > 0.0 && JITTER_FACTOR < 1.0);
    }
}
