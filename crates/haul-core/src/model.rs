//! Data model for files, chunks, and transfer sessions.
//!
//! All types serialize to lower_snake_case JSON; the session store and the
//! stream wire both carry these encodings.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Reserved chunk id carried by the control frame that opens a connection.
pub const FILE_META_ID: &str = "__filemeta__";

/// Lifecycle state of a single chunk in a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
}

/// Lifecycle state of a transfer session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Created,
    Transferring,
    Paused,
    Completed,
    Failed,
}

/// Describes the file being transferred.
///
/// Immutable once a session is created; `hash` is the hex SHA-256 of the
/// full file content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub name: String,
    pub size: u64,
    pub hash: String,
    /// Optional, best-effort.
    #[serde(default)]
    pub mime_type: String,
}

impl FileMetadata {
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::Validation {
                message: "file name must not be empty".into(),
            });
        }
        // The name becomes the receiver's output file name; it must be a
        // bare file name, never a path.
        if self.name.contains('/') || self.name.contains('\\') || self.name == ".." {
            return Err(Error::Validation {
                message: format!("file name must not contain path components: {}", self.name),
            });
        }
        if self.size == 0 {
            return Err(Error::Validation {
                message: "file size must be greater than zero".into(),
            });
        }
        if self.hash.is_empty() {
            return Err(Error::Validation {
                message: "file hash must not be empty".into(),
            });
        }
        Ok(())
    }
}

/// Describes a single chunk of a file.
///
/// `sha256` is the hex SHA-256 of the raw (uncompressed) chunk bytes; the
/// compressed wire payload is never hashed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub id: String,
    pub size: u64,
    pub offset: u64,
    pub sha256: String,
    /// True for parity chunks when erasure coding is enabled.
    pub is_parity: bool,
    pub status: ChunkStatus,
    pub updated_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    /// Owning session.
    #[serde(default)]
    pub session_id: String,
    /// Used by the priority-aware datagram lane.
    #[serde(default)]
    pub priority: u8,
    #[serde(default)]
    pub retry_count: u32,
    /// Last error, if any.
    #[serde(default)]
    pub error: String,
}

impl ChunkMetadata {
    /// Build the metadata for the control frame carrying a [`FileMetadata`]
    /// payload. The payload hash is deliberately left empty; receivers do
    /// not verify control frames.
    pub fn control(payload_len: usize) -> Self {
        let now = Utc::now();
        Self {
            id: FILE_META_ID.to_string(),
            size: payload_len as u64,
            offset: 0,
            sha256: String::new(),
            is_parity: false,
            status: ChunkStatus::Pending,
            updated_at: now,
            created_at: now,
            session_id: String::new(),
            priority: 0,
            retry_count: 0,
            error: String::new(),
        }
    }

    /// Minimal entry created when a status update arrives for a chunk the
    /// session has never seen.
    pub fn placeholder(id: &str) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            size: 0,
            offset: 0,
            sha256: String::new(),
            is_parity: false,
            status: ChunkStatus::Pending,
            updated_at: now,
            created_at: now,
            session_id: String::new(),
            priority: 0,
            retry_count: 0,
            error: String::new(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(Error::Validation {
                message: "chunk id must not be empty".into(),
            });
        }
        if self.size == 0 {
            return Err(Error::Validation {
                message: format!("chunk {} size must be greater than zero", self.id),
            });
        }
        if self.sha256.is_empty() {
            return Err(Error::Validation {
                message: format!("chunk {} sha256 must not be empty", self.id),
            });
        }
        Ok(())
    }
}

/// Tracks the state of one file transfer between one sender and one receiver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferSession {
    pub id: String,
    pub file: FileMetadata,
    pub status: SessionStatus,
    /// Chunk id -> metadata; insertion order is not meaningful.
    pub chunks: HashMap<String, ChunkMetadata>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub total_chunks: usize,
    pub completed: usize,
    pub failed: usize,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

impl TransferSession {
    /// Create a fresh session for the given file with a new v4 UUID.
    pub fn new(file: FileMetadata) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            file,
            status: SessionStatus::Created,
            chunks: HashMap::new(),
            created_at: now,
            updated_at: now,
            completed_at: None,
            total_chunks: 0,
            completed: 0,
            failed: 0,
            bytes_sent: 0,
            bytes_received: 0,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(Error::Validation {
                message: "session id must not be empty".into(),
            });
        }
        self.file.validate()?;
        if self.total_chunks > 0 && self.completed + self.failed > self.total_chunks {
            return Err(Error::Validation {
                message: format!(
                    "session {}: completed ({}) + failed ({}) exceeds total chunks ({})",
                    self.id, self.completed, self.failed, self.total_chunks
                ),
            });
        }
        Ok(())
    }

    /// Mark the session finished and stamp `completed_at`.
    pub fn mark_completed(&mut self) {
        let now = Utc::now();
        self.status = SessionStatus::Completed;
        self.completed_at = Some(now);
        self.updated_at = now;
    }
}
