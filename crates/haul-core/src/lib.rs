//! haul-core: shared library for the haul bulk file-transfer engine.
//!
//! This crate provides:
//! - Data model for files, chunks, and transfer sessions
//! - Hash and compression primitives
//! - Deterministic file chunking
//! - Stream frame and datagram packet codecs
//! - Durable, crash-safe session store
//! - Reed-Solomon erasure coding
//! - Retry/backoff policy and coordinator client
//! - Logging setup

pub mod chunker;
pub mod codec;
pub mod constants;
pub mod coordinator;
pub mod erasure;
pub mod error;
pub mod logging;
pub mod model;
pub mod retry;
pub mod session;
pub mod telemetry;
pub mod wire;

pub use error::{Error, Result};
pub use logging::{LogFormat, init_logging};
pub use model::{ChunkMetadata, ChunkStatus, FileMetadata, SessionStatus, TransferSession};
pub use session::SessionStore;
