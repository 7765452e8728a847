//! SHA-256 hashing for chunks and whole files.

use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::constants::FILE_HASH_BUFFER;
use crate::error::Result;

/// Compute the SHA-256 hash of a chunk.
pub fn hash_chunk(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Compute the SHA-256 hash of a chunk and hex-encode it.
pub fn hash_hex(data: &[u8]) -> String {
    hex::encode(hash_chunk(data))
}

/// Recompute the hash of `data` and compare with `expected` in constant time.
pub fn verify_chunk(data: &[u8], expected: &[u8; 32]) -> bool {
    let actual = hash_chunk(data);
    // Fold the XOR of every byte pair so the comparison does not short-circuit.
    let mut diff = 0u8;
    for (a, b) in actual.iter().zip(expected.iter()) {
        diff |= a ^ b;
    }
    diff == 0
}

/// Compute the hex-encoded SHA-256 of an entire file, streaming through a
/// fixed-size buffer.
pub fn hash_file(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; FILE_HASH_BUFFER];

    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}
