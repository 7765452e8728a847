//! Durable, crash-safe session store.
//!
//! Sessions live in an in-memory table keyed by id; every mutation is
//! persisted to `{base}/{id}.json` before the call returns. Writes go to a
//! temp file and are renamed over the final path, so readers only ever see
//! a complete prior or complete new encoding. On construction the base
//! directory is scanned and every readable session file is rehydrated;
//! corrupted files are skipped so one bad session cannot take down the rest.
//!
//! Locking: mutators take the exclusive side of the table lock and perform
//! the (small, rename-bounded) persistence write while holding it; readers
//! share.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::model::{ChunkMetadata, ChunkStatus, FileMetadata, TransferSession};

/// Lightweight snapshot of session progress, written beside the session file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionCheckpoint {
    pub session_id: String,
    pub completed_chunks: Vec<String>,
    pub pending_chunks: Vec<String>,
    pub total_chunks: usize,
    pub last_update_time: DateTime<Utc>,
}

/// In-memory session table with crash-safe persistence.
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, TransferSession>>,
    base_dir: PathBuf,
}

impl SessionStore {
    /// Open a store rooted at `base_dir`, creating the directory if needed
    /// and rehydrating any session files found there.
    ///
    /// Unreadable or invalid session files are logged and skipped; a failure
    /// to read the directory itself is fatal.
    pub fn open(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir)?;

        let mut sessions = HashMap::new();
        for entry in fs::read_dir(&base_dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.ends_with(".json.tmp") {
                // A crash between temp-write and rename left this behind;
                // the session file beside it still holds the prior version.
                warn!(file = name, "leftover temp session file from interrupted write");
                continue;
            }
            if !name.ends_with(".json") || name.ends_with(".checkpoint.json") {
                continue;
            }
            let id = name.trim_end_matches(".json");
            match load_session_file(&entry.path()) {
                Ok(session) => {
                    debug!(session_id = id, "rehydrated session");
                    sessions.insert(session.id.clone(), session);
                }
                Err(e) => {
                    warn!(session_id = id, error = %e, "failed to load session; skipping");
                }
            }
        }

        Ok(Self {
            sessions: RwLock::new(sessions),
            base_dir,
        })
    }

    fn session_path(&self, id: &str) -> PathBuf {
        self.base_dir.join(format!("{id}.json"))
    }

    fn checkpoint_path(&self, id: &str) -> PathBuf {
        self.base_dir.join(format!("{id}.checkpoint.json"))
    }

    /// Create and persist a new session for the given file.
    pub async fn create_session(&self, file: FileMetadata) -> Result<TransferSession> {
        file.validate()?;
        let session = TransferSession::new(file);
        session.validate()?;

        let mut sessions = self.sessions.write().await;
        self.persist(&session)?;
        sessions.insert(session.id.clone(), session.clone());
        Ok(session)
    }

    /// Return a copy of the in-memory session.
    pub async fn get_session(&self, id: &str) -> Result<TransferSession> {
        let sessions = self.sessions.read().await;
        sessions
            .get(id)
            .cloned()
            .ok_or_else(|| Error::SessionNotFound(id.to_string()))
    }

    /// Update one chunk's status and persist the session.
    ///
    /// If the chunk is absent a minimal entry is created. The session's
    /// `completed`/`failed` counters move only on a transition into that
    /// status, so repeated updates count once.
    pub async fn update_chunk_status(
        &self,
        session_id: &str,
        chunk_id: &str,
        status: ChunkStatus,
    ) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))?;

        let chunk = session
            .chunks
            .entry(chunk_id.to_string())
            .or_insert_with(|| ChunkMetadata::placeholder(chunk_id));

        let previous = chunk.status;
        chunk.status = status;
        chunk.updated_at = Utc::now();

        match status {
            ChunkStatus::Completed if previous != ChunkStatus::Completed => {
                session.completed += 1;
            }
            ChunkStatus::Failed if previous != ChunkStatus::Failed => {
                session.failed += 1;
            }
            _ => {}
        }
        session.updated_at = Utc::now();

        self.persist(session)
    }

    /// Insert or overwrite a chunk's full metadata without touching counters.
    ///
    /// Receivers use this to record the wire metadata (offset, size, hash)
    /// ahead of the status update that persists it.
    pub async fn record_chunk(&self, session_id: &str, chunk: ChunkMetadata) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))?;

        // Preserve a previously counted completion when a duplicate frame
        // overwrites the entry.
        let previous = session.chunks.get(&chunk.id).map(|c| c.status);
        let mut chunk = chunk;
        if let Some(prev) = previous {
            if prev == ChunkStatus::Completed {
                chunk.status = prev;
            }
        }
        session.chunks.insert(chunk.id.clone(), chunk);
        session.updated_at = Utc::now();
        Ok(())
    }

    /// Add to the session's sent-byte counter (persisted by the next status
    /// update).
    pub async fn add_bytes_sent(&self, session_id: &str, n: u64) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))?;
        session.bytes_sent += n;
        Ok(())
    }

    /// Add to the session's received-byte counter (persisted by the next
    /// status update).
    pub async fn add_bytes_received(&self, session_id: &str, n: u64) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))?;
        session.bytes_received += n;
        Ok(())
    }

    /// Persist the given session, replacing the in-memory copy.
    pub async fn save_session(&self, session: &TransferSession) -> Result<()> {
        session.validate()?;
        let mut sessions = self.sessions.write().await;
        self.persist(session)?;
        sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    /// Read a session from disk, bypassing the in-memory table.
    pub fn load_session(&self, id: &str) -> Result<TransferSession> {
        load_session_file(&self.session_path(id))
    }

    /// Snapshot of all in-memory sessions.
    pub async fn list_sessions(&self) -> Vec<TransferSession> {
        let sessions = self.sessions.read().await;
        sessions.values().cloned().collect()
    }

    /// Derive and atomically write the checkpoint projection for a session.
    pub async fn persist_checkpoint(&self, session_id: &str) -> Result<()> {
        let sessions = self.sessions.write().await;
        let session = sessions
            .get(session_id)
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))?;

        let mut completed = Vec::new();
        let mut pending = Vec::new();
        for (id, chunk) in &session.chunks {
            if chunk.status == ChunkStatus::Completed {
                completed.push(id.clone());
            } else {
                pending.push(id.clone());
            }
        }
        completed.sort();
        pending.sort();

        let checkpoint = SessionCheckpoint {
            session_id: session.id.clone(),
            completed_chunks: completed,
            pending_chunks: pending,
            total_chunks: session.total_chunks,
            last_update_time: Utc::now(),
        };

        let body = serde_json::to_vec(&checkpoint).map_err(|e| Error::Codec {
            message: format!("encode checkpoint: {}", e),
        })?;
        atomic_write(&self.checkpoint_path(session_id), &body)
    }

    /// Ids of all chunks whose status is not `completed`.
    pub async fn get_missing_chunks(&self, session_id: &str) -> Result<Vec<String>> {
        let sessions = self.sessions.read().await;
        let session = sessions
            .get(session_id)
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))?;

        Ok(session
            .chunks
            .iter()
            .filter(|(_, c)| c.status != ChunkStatus::Completed)
            .map(|(id, _)| id.clone())
            .collect())
    }

    /// Serialize and atomically replace the session file. Callers hold the
    /// exclusive table lock.
    fn persist(&self, session: &TransferSession) -> Result<()> {
        session.validate()?;
        let body = serde_json::to_vec_pretty(session).map_err(|e| Error::Codec {
            message: format!("encode session: {}", e),
        })?;
        atomic_write(&self.session_path(&session.id), &body)
    }
}

fn atomic_write(path: &Path, body: &[u8]) -> Result<()> {
    let tmp = path.with_file_name(format!(
        "{}.tmp",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("session.json")
    ));
    fs::write(&tmp, body)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn load_session_file(path: &Path) -> Result<TransferSession> {
    let body = fs::read(path)?;
    let session: TransferSession = serde_json::from_slice(&body).map_err(|e| Error::Codec {
        message: format!("decode session {}: {}", path.display(), e),
    })?;
    session.validate()?;
    Ok(session)
}
