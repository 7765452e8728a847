//! Error types for haul-core.

use thiserror::Error;

/// Main error type for haul operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from underlying system calls.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed descriptor or session rejected by a constructor.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Wire protocol violation (short frame, bad magic, checksum mismatch).
    #[error("protocol error: {message}")]
    Protocol { message: String },

    /// Encoding/decoding failure (JSON, compression, erasure shards).
    #[error("codec error: {message}")]
    Codec { message: String },

    /// Chunk content did not match its declared hash.
    #[error("integrity error: {message}")]
    Integrity { message: String },

    /// Session not found for given ID.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// Transport layer error.
    #[error("transport error: {message}")]
    Transport { message: String },

    /// Coordinator service error (advisory; callers usually continue).
    #[error("coordinator error: {message}")]
    Coordinator { message: String },

    /// Connection was closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// Operation timed out.
    #[error("operation timed out")]
    Timeout,
}

impl Error {
    /// Returns true if this error is transient and a retry may help.
    ///
    /// Transient errors cover network and disk hiccups where the peer or
    /// filesystem may recover; upper layers apply backoff before retrying.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Io(_)
                | Error::Transport { .. }
                | Error::Coordinator { .. }
                | Error::ConnectionClosed
                | Error::Timeout
        )
    }

    /// Returns true if this error is fatal and retrying cannot help.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Validation { .. } | Error::Protocol { .. } | Error::SessionNotFound(_)
        )
    }
}

/// Convenience result type for haul operations.
pub type Result<T> = std::result::Result<T, Error>;
