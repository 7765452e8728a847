//! Per-connection receive pipeline.
//!
//! Frame processing is strictly sequential: parse metadata, decompress,
//! verify, spool, update status. The first frame on a connection must be the
//! `__filemeta__` control frame; data frames arriving before it are dropped.
//! A half-close at a frame boundary ends the loop cleanly and triggers
//! assembly.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::BufReader;
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use haul_core::codec::{Decompressor, verify_chunk};
use haul_core::constants::MAX_CHUNK_SIZE;
use haul_core::model::{ChunkStatus, FILE_META_ID, FileMetadata, TransferSession};
use haul_core::session::SessionStore;
use haul_core::wire::read_frame;

use crate::assemble::ChunkSpool;

const READ_BUFFER_SIZE: usize = 256 * 1024;

/// Service one accepted connection to completion.
pub async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    store: Arc<SessionStore>,
    spool: Arc<ChunkSpool>,
) {
    let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, stream);
    let decompressor = Decompressor::new();

    // One session per connection, created lazily from the control frame.
    let mut session: Option<TransferSession> = None;

    loop {
        let frame = match read_frame(&mut reader).await {
            Ok(Some(frame)) => frame,
            Ok(None) => break, // clean half-close at a frame boundary
            Err(e) => {
                warn!(%peer, error = %e, "connection error");
                break;
            }
        };

        let data = match decompressor.decompress_with_limit(&frame.data, MAX_CHUNK_SIZE as usize) {
            Ok(data) => data,
            Err(e) => {
                warn!(%peer, chunk_id = %frame.meta.id, error = %e, "decompress failed");
                break;
            }
        };

        if frame.meta.id == FILE_META_ID {
            let file_meta: FileMetadata = match serde_json::from_slice(&data) {
                Ok(meta) => meta,
                Err(e) => {
                    warn!(%peer, error = %e, "invalid file metadata frame; closing");
                    return;
                }
            };
            match store.create_session(file_meta).await {
                Ok(s) => {
                    info!(%peer, session_id = %s.id, file = %s.file.name, size = s.file.size, "session created");
                    session = Some(s);
                }
                Err(e) => {
                    warn!(%peer, error = %e, "create session failed; closing");
                    return;
                }
            }
            continue;
        }

        let Some(sess) = session.as_ref() else {
            warn!(%peer, chunk_id = %frame.meta.id, "data frame before file metadata; dropping");
            continue;
        };

        let expected: [u8; 32] = match hex::decode(&frame.meta.sha256) {
            Ok(bytes) => match bytes.try_into() {
                Ok(arr) => arr,
                Err(_) => {
                    warn!(session_id = %sess.id, chunk_id = %frame.meta.id, "hash has wrong length; dropping chunk");
                    continue;
                }
            },
            Err(e) => {
                warn!(session_id = %sess.id, chunk_id = %frame.meta.id, error = %e, "invalid hash encoding; dropping chunk");
                continue;
            }
        };

        if !verify_chunk(&data, &expected) {
            warn!(session_id = %sess.id, chunk_id = %frame.meta.id, "hash mismatch; dropping chunk");
            continue;
        }

        let mut chunk = frame.meta;
        chunk.session_id = sess.id.clone();
        let chunk_id = chunk.id.clone();

        if let Err(e) = store.record_chunk(&sess.id, chunk).await {
            warn!(session_id = %sess.id, chunk_id = %chunk_id, error = %e, "record chunk failed");
            continue;
        }

        if let Err(e) = spool.store_chunk(&sess.id, &chunk_id, &data) {
            warn!(session_id = %sess.id, chunk_id = %chunk_id, error = %e, "store chunk failed");
            continue;
        }

        if let Err(e) = store.add_bytes_received(&sess.id, data.len() as u64).await {
            warn!(session_id = %sess.id, error = %e, "byte accounting failed");
        }
        if let Err(e) = store
            .update_chunk_status(&sess.id, &chunk_id, ChunkStatus::Completed)
            .await
        {
            warn!(session_id = %sess.id, chunk_id = %chunk_id, error = %e, "update chunk status failed");
        }

        debug!(session_id = %sess.id, chunk_id = %chunk_id, bytes = data.len(), "chunk received");
    }

    let Some(sess) = session else { return };

    // Re-read the session so assembly sees every recorded chunk.
    let current = match store.get_session(&sess.id).await {
        Ok(current) => current,
        Err(e) => {
            warn!(session_id = %sess.id, error = %e, "session lookup before assembly failed");
            return;
        }
    };

    match spool.assemble(&current) {
        Ok(path) => {
            let mut completed = current;
            completed.mark_completed();
            if let Err(e) = store.save_session(&completed).await {
                warn!(session_id = %completed.id, error = %e, "persist completed session failed");
            }
            if let Err(e) = store.persist_checkpoint(&completed.id).await {
                warn!(session_id = %completed.id, error = %e, "persist checkpoint failed");
            }
            info!(
                session_id = %completed.id,
                path = %path.display(),
                bytes = completed.file.size,
                "assembled file"
            );
        }
        Err(e) => {
            // Scratch files stay on disk for inspection and resume.
            warn!(session_id = %sess.id, error = %e, "assemble failed");
        }
    }
}
