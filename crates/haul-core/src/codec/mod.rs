//! Byte-level primitives for the transfer pipeline.
//!
//! This module provides:
//! - SHA-256 hashing and constant-time verification of chunk content
//! - Streaming whole-file hashing
//! - Zstandard compression of wire payloads
//!
//! Hashing is always performed on raw chunk bytes and is authoritative for
//! integrity; compression only reduces the wire footprint.

pub mod compress;
pub mod hash;

pub use compress::{Compressor, Decompressor, DEFAULT_COMPRESSION_LEVEL};
pub use hash::{hash_chunk, hash_file, hash_hex, verify_chunk};
