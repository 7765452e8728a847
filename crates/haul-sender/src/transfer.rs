//! Sender driver: the per-file transfer pipeline.
//!
//! Stat and hash the file, create or resume a session, chunk, then stream a
//! control frame followed by one frame per chunk, updating the session store
//! as each chunk completes. On resume, chunks already marked completed are
//! skipped; the chunker is deterministic, so chunk ids match across runs.

use std::collections::HashSet;
use std::os::unix::fs::FileExt;
use std::path::PathBuf;
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use haul_core::chunker::{Chunker, ChunkerConfig, choose_chunk_size_auto};
use haul_core::codec::{Compressor, hash_file, hash_hex};
use haul_core::constants::DIAL_TIMEOUT;
use haul_core::coordinator::CoordinatorClient;
use haul_core::error::{Error, Result};
use haul_core::model::{ChunkMetadata, ChunkStatus, FileMetadata, SessionStatus};
use haul_core::session::SessionStore;
use haul_core::telemetry::TelemetryCollector;
use haul_core::wire::write_frame;

/// Configuration for one sender invocation.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    pub file: PathBuf,
    pub receiver_addr: String,
    /// Target chunk size in bytes; clamped by the chunker.
    pub chunk_size: u64,
    /// Choose the chunk size via predictor/heuristic instead of `chunk_size`.
    pub auto_chunk_size: bool,
    pub sessions_dir: PathBuf,
    /// Existing session id to resume.
    pub resume: Option<String>,
    pub coordinator_url: Option<String>,
    pub predictor_url: Option<String>,
    pub chunker: ChunkerConfig,
    /// Render a progress bar on stderr.
    pub progress: bool,
}

/// Result summary of a completed transfer.
#[derive(Debug)]
pub struct TransferOutcome {
    pub session_id: String,
    pub chunks_sent: usize,
    pub chunks_skipped: usize,
    pub bytes_sent: u64,
}

/// Run one file transfer to completion.
pub async fn run_transfer(cfg: &TransferConfig) -> Result<TransferOutcome> {
    let started = Instant::now();

    let file_info = std::fs::metadata(&cfg.file)?;
    if !file_info.is_file() {
        return Err(Error::Validation {
            message: format!("{} is not a regular file", cfg.file.display()),
        });
    }

    let name = cfg
        .file
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::Validation {
            message: format!("cannot derive a file name from {}", cfg.file.display()),
        })?
        .to_string();

    info!(file = %cfg.file.display(), "hashing input file");
    let file_meta = FileMetadata {
        name,
        size: file_info.len(),
        hash: hash_file(&cfg.file)?,
        mime_type: String::new(),
    };
    file_meta.validate()?;

    let store = SessionStore::open(&cfg.sessions_dir)?;
    let mut session = match &cfg.resume {
        Some(id) => {
            let session = store.get_session(id).await?;
            info!(session_id = %session.id, completed = session.completed, "resuming session");
            session
        }
        None => store.create_session(file_meta.clone()).await?,
    };

    // Advisory registration; the coordinator being down never blocks us.
    if let Some(url) = &cfg.coordinator_url {
        match CoordinatorClient::new(url.clone()) {
            Ok(client) => match client.create_session(&file_meta).await {
                Ok(remote) => debug!(remote_id = %remote.id, "registered with coordinator"),
                Err(e) => warn!(error = %e, "coordinator unavailable; continuing"),
            },
            Err(e) => warn!(error = %e, "coordinator client setup failed; continuing"),
        }
    }

    let telemetry = TelemetryCollector::new();
    let chunk_size = if cfg.auto_chunk_size {
        let size = choose_chunk_size_auto(
            &cfg.chunker,
            cfg.predictor_url.as_deref(),
            &file_meta,
            Some(&telemetry),
        )
        .await;
        debug!(chunk_size = size, "auto-selected chunk size");
        size
    } else {
        cfg.chunker.choose_static(cfg.chunk_size)
    };

    let chunker = Chunker::new(cfg.chunker);
    let mut chunks = chunker.chunk_file(&cfg.file, chunk_size)?;

    session.total_chunks = chunks.len();
    session.status = SessionStatus::Transferring;
    store.save_session(&session).await?;

    // Snapshot of chunks already done, for resume skipping.
    let already_completed: HashSet<String> = session
        .chunks
        .iter()
        .filter(|(_, c)| c.status == ChunkStatus::Completed)
        .map(|(id, _)| id.clone())
        .collect();

    info!(
        session_id = %session.id,
        file = %file_meta.name,
        size = file_meta.size,
        chunks = chunks.len(),
        receiver = %cfg.receiver_addr,
        "starting transfer"
    );

    let mut stream = tokio::time::timeout(DIAL_TIMEOUT, TcpStream::connect(&cfg.receiver_addr))
        .await
        .map_err(|_| Error::Timeout)?
        .map_err(|e| Error::Transport {
            message: format!("dial tcp {}: {}", cfg.receiver_addr, e),
        })?;

    let compressor = Compressor::with_default_level();

    // Control frame first: compressed FileMetadata JSON under the reserved id.
    let meta_payload = serde_json::to_vec(&file_meta).map_err(|e| Error::Codec {
        message: format!("marshal file metadata: {}", e),
    })?;
    let control = ChunkMetadata::control(meta_payload.len());
    let compressed_meta = compressor.compress(&meta_payload)?;
    write_frame(&mut stream, &control, &compressed_meta).await?;

    let progress = make_progress_bar(cfg.progress, file_meta.size);
    let input = std::fs::File::open(&cfg.file)?;

    let mut chunks_sent = 0usize;
    let mut chunks_skipped = 0usize;
    let mut bytes_sent = 0u64;

    for meta in &mut chunks {
        if cfg.resume.is_some() && already_completed.contains(&meta.id) {
            chunks_skipped += 1;
            progress.inc(meta.size);
            continue;
        }

        let mut buf = vec![0u8; meta.size as usize];
        input.read_exact_at(&mut buf, meta.offset)?;

        meta.sha256 = hash_hex(&buf);
        meta.session_id = session.id.clone();

        let compressed = compressor.compress(&buf)?;
        write_frame(&mut stream, meta, &compressed).await?;

        store.add_bytes_sent(&session.id, meta.size).await?;
        store
            .update_chunk_status(&session.id, &meta.id, ChunkStatus::Completed)
            .await?;

        telemetry.record_bytes_sent(compressed.len() as u64);
        bytes_sent += meta.size;
        chunks_sent += 1;
        progress.inc(meta.size);
    }

    // Half-close the write side; the receiver treats this as clean EOF.
    stream.shutdown().await?;
    progress.finish_and_clear();

    let mut session = store.get_session(&session.id).await?;
    session.mark_completed();
    store.save_session(&session).await?;
    store.persist_checkpoint(&session.id).await?;

    info!(
        session_id = %session.id,
        chunks_sent,
        chunks_skipped,
        bytes_sent,
        elapsed_secs = started.elapsed().as_secs_f64(),
        "transfer complete"
    );

    Ok(TransferOutcome {
        session_id: session.id,
        chunks_sent,
        chunks_skipped,
        bytes_sent,
    })
}

fn make_progress_bar(enabled: bool, total_bytes: u64) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total_bytes);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}) {msg}")
            .unwrap()
            .progress_chars("=>-"),
    );
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn test_chunker() -> ChunkerConfig {
        ChunkerConfig {
            min_chunk_size: 16,
            max_chunk_size: 4096,
            default_chunk_size: 256,
        }
    }

    fn config_for(dir: &std::path::Path, file: PathBuf, addr: &str) -> TransferConfig {
        TransferConfig {
            file,
            receiver_addr: addr.to_string(),
            chunk_size: 64,
            auto_chunk_size: false,
            sessions_dir: dir.join("sessions"),
            resume: None,
            coordinator_url: None,
            predictor_url: None,
            chunker: test_chunker(),
            progress: false,
        }
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config_for(dir.path(), dir.path().join("absent.bin"), "127.0.0.1:1");
        assert!(run_transfer(&cfg).await.is_err());
    }

    #[tokio::test]
    async fn unreachable_receiver_is_a_transport_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.bin");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(&[9u8; 256])
            .unwrap();

        // Port 1 refuses connections immediately.
        let cfg = config_for(dir.path(), path, "127.0.0.1:1");
        let err = run_transfer(&cfg).await.unwrap_err();
        assert!(err.is_transient(), "expected transient error, got {err}");
    }

    #[tokio::test]
    async fn resume_with_unknown_session_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.bin");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(&[1u8; 64])
            .unwrap();

        let mut cfg = config_for(dir.path(), path, "127.0.0.1:1");
        cfg.resume = Some("no-such-session".into());
        let err = run_transfer(&cfg).await.unwrap_err();
        assert!(matches!(err, Error::SessionNotFound(_)));
    }
}
