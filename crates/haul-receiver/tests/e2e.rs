//! End-to-end transfer tests over localhost.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

use haul_core::chunker::ChunkerConfig;
use haul_core::codec::{Compressor, hash_file, hash_hex};
use haul_core::model::{ChunkMetadata, ChunkStatus, FileMetadata, SessionStatus};
use haul_core::session::SessionStore;
use haul_core::wire::{read_frame, write_frame};
use haul_receiver::{Receiver, ReceiverConfig};
use haul_sender::{TransferConfig, run_transfer};

fn test_chunker() -> ChunkerConfig {
    ChunkerConfig {
        min_chunk_size: 16,
        max_chunk_size: 1024 * 1024,
        default_chunk_size: 8192,
    }
}

fn write_test_file(path: &Path, len: usize, seed: u32) -> Vec<u8> {
    let data: Vec<u8> = (0..len as u32)
        .map(|i| (i.wrapping_mul(seed).wrapping_add(i >> 8) % 256) as u8)
        .collect();
    std::fs::write(path, &data).unwrap();
    data
}

async fn start_receiver(root: &Path) -> (std::net::SocketAddr, PathBuf, PathBuf) {
    let output_dir = root.join("received");
    let sessions_dir = root.join("recv-sessions");
    let receiver = Receiver::bind(&ReceiverConfig {
        bind_addr: "127.0.0.1".into(),
        port: 0,
        output_dir: output_dir.clone(),
        temp_dir: None,
        sessions_dir: sessions_dir.clone(),
    })
    .await
    .unwrap();
    let addr = receiver.local_addr().unwrap();
    tokio::spawn(receiver.run());
    (addr, output_dir, sessions_dir)
}

fn sender_config(file: PathBuf, addr: std::net::SocketAddr, sessions_dir: PathBuf) -> TransferConfig {
    TransferConfig {
        file,
        receiver_addr: addr.to_string(),
        chunk_size: 8192,
        auto_chunk_size: false,
        sessions_dir,
        resume: None,
        coordinator_url: None,
        predictor_url: None,
        chunker: test_chunker(),
        progress: false,
    }
}

async fn wait_for_file(path: &Path, expected_len: u64) {
    for _ in 0..200 {
        if let Ok(meta) = std::fs::metadata(path) {
            if meta.len() == expected_len {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("timed out waiting for {}", path.display());
}

/// Poll the receiver's session directory until `count` sessions are marked
/// completed, then return them.
async fn wait_for_completed_sessions(
    sessions_dir: &Path,
    count: usize,
) -> Vec<haul_core::model::TransferSession> {
    for _ in 0..200 {
        if let Ok(store) = SessionStore::open(sessions_dir) {
            let sessions = store.list_sessions().await;
            let done = sessions
                .iter()
                .filter(|s| s.status == SessionStatus::Completed)
                .count();
            if done == count {
                return sessions;
            }
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("timed out waiting for {count} completed sessions");
}

#[tokio::test]
async fn full_transfer_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("payload.bin");
    let data = write_test_file(&input, 100_000, 2654435761);

    let (addr, output_dir, recv_sessions) = start_receiver(dir.path()).await;

    let cfg = sender_config(input.clone(), addr, dir.path().join("send-sessions"));
    let outcome = run_transfer(&cfg).await.unwrap();

    // 100_000 / 8192 -> 12 full chunks + a short tail.
    assert_eq!(outcome.chunks_sent, 13);
    assert_eq!(outcome.chunks_skipped, 0);
    assert_eq!(outcome.bytes_sent, data.len() as u64);

    let output = output_dir.join("payload.bin");
    wait_for_file(&output, data.len() as u64).await;

    assert_eq!(std::fs::read(&output).unwrap(), data);
    assert_eq!(hash_file(&output).unwrap(), hash_file(&input).unwrap());

    // Receiver-side session reached completed with every chunk accounted.
    let sessions = wait_for_completed_sessions(&recv_sessions, 1).await;
    let session = &sessions[0];
    assert_eq!(session.completed, 13);
    assert_eq!(session.bytes_received, data.len() as u64);
    assert!(session.completed_at.is_some());

    // Sender-side session is also completed and resumable state is on disk.
    let sender_store = SessionStore::open(dir.path().join("send-sessions")).unwrap();
    let session = sender_store.get_session(&outcome.session_id).await.unwrap();
    assert_eq!(session.status, SessionStatus::Completed);
    assert!(sender_store
        .get_missing_chunks(&outcome.session_id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn resume_skips_completed_chunks() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("resume.bin");
    write_test_file(&input, 8192 * 10, 40503);

    // A counting receiver records which chunk ids actually hit the wire.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let collector = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut reader = tokio::io::BufReader::new(stream);
        let mut ids = Vec::new();
        while let Some(frame) = read_frame(&mut reader).await.unwrap() {
            ids.push(frame.meta.id);
        }
        ids
    });

    // Seed a session as if a prior run had finished chunks 0..=4.
    let sessions_dir = dir.path().join("send-sessions");
    let session_id = {
        let store = SessionStore::open(&sessions_dir).unwrap();
        let file_meta = FileMetadata {
            name: "resume.bin".into(),
            size: 8192 * 10,
            hash: hash_file(&input).unwrap(),
            mime_type: String::new(),
        };
        let session = store.create_session(file_meta).await.unwrap();
        for i in 0..5 {
            store
                .update_chunk_status(&session.id, &i.to_string(), ChunkStatus::Completed)
                .await
                .unwrap();
        }
        session.id
    };

    let mut cfg = sender_config(input, addr, sessions_dir);
    cfg.resume = Some(session_id.clone());
    let outcome = run_transfer(&cfg).await.unwrap();

    assert_eq!(outcome.session_id, session_id);
    assert_eq!(outcome.chunks_skipped, 5);
    assert_eq!(outcome.chunks_sent, 5);

    let ids = collector.await.unwrap();
    // Control frame plus only the chunks that were still missing.
    assert_eq!(ids[0], haul_core::model::FILE_META_ID);
    let tail: Vec<&str> = ids[1..].iter().map(|s| s.as_str()).collect();
    assert_eq!(tail, vec!["5", "6", "7", "8", "9"]);
}

#[tokio::test]
async fn corrupt_chunk_is_dropped_but_connection_continues() {
    let dir = tempfile::tempdir().unwrap();
    let (addr, output_dir, recv_sessions) = start_receiver(dir.path()).await;

    let compressor = Compressor::with_default_level();
    let good_data = b"good chunk content".to_vec();
    let bad_data = b"tampered chunk bytes".to_vec();

    let file_meta = FileMetadata {
        name: "partial.bin".into(),
        size: (good_data.len() + bad_data.len()) as u64,
        hash: "ab".repeat(32),
        mime_type: String::new(),
    };

    let mut stream = TcpStream::connect(addr).await.unwrap();

    let payload = serde_json::to_vec(&file_meta).unwrap();
    let control = ChunkMetadata::control(payload.len());
    write_frame(&mut stream, &control, &compressor.compress(&payload).unwrap())
        .await
        .unwrap();

    // Frame 1: declared hash does not match the bytes.
    let mut bad_meta = ChunkMetadata::placeholder("0");
    bad_meta.size = bad_data.len() as u64;
    bad_meta.offset = 0;
    bad_meta.sha256 = "00".repeat(32);
    write_frame(&mut stream, &bad_meta, &compressor.compress(&bad_data).unwrap())
        .await
        .unwrap();

    // Frame 2: consistent hash.
    let mut good_meta = ChunkMetadata::placeholder("1");
    good_meta.size = good_data.len() as u64;
    good_meta.offset = bad_data.len() as u64;
    good_meta.sha256 = hash_hex(&good_data);
    write_frame(&mut stream, &good_meta, &compressor.compress(&good_data).unwrap())
        .await
        .unwrap();

    stream.shutdown().await.unwrap();
    drop(stream);

    // The good chunk lands; the session records exactly one completion.
    let store_path = recv_sessions.clone();
    let session = {
        let mut found = None;
        for _ in 0..200 {
            let store = SessionStore::open(&store_path).unwrap();
            let sessions = store.list_sessions().await;
            if let Some(s) = sessions.first() {
                if s.completed == 1 {
                    found = Some(s.clone());
                    break;
                }
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        found.expect("receiver never recorded the good chunk")
    };

    let temp_dir = output_dir.join("temp");
    assert!(temp_dir.join(format!("{}_1.part", session.id)).exists());
    // The corrupt chunk was never spooled.
    assert!(!temp_dir.join(format!("{}_0.part", session.id)).exists());
    assert!(!session.chunks.contains_key("0"));
}

#[tokio::test]
async fn parallel_sessions_do_not_collide() {
    let dir = tempfile::tempdir().unwrap();
    let (addr, output_dir, recv_sessions) = start_receiver(dir.path()).await;

    let input_a = dir.path().join("alpha.bin");
    let input_b = dir.path().join("bravo.bin");
    let data_a = write_test_file(&input_a, 50_000, 77777);
    let data_b = write_test_file(&input_b, 60_000, 13131);

    let cfg_a = sender_config(input_a, addr, dir.path().join("send-a"));
    let cfg_b = sender_config(input_b, addr, dir.path().join("send-b"));

    let (a, b) = tokio::join!(run_transfer(&cfg_a), run_transfer(&cfg_b));
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_ne!(a.session_id, b.session_id);

    wait_for_file(&output_dir.join("alpha.bin"), data_a.len() as u64).await;
    wait_for_file(&output_dir.join("bravo.bin"), data_b.len() as u64).await;

    assert_eq!(std::fs::read(output_dir.join("alpha.bin")).unwrap(), data_a);
    assert_eq!(std::fs::read(output_dir.join("bravo.bin")).unwrap(), data_b);

    let sessions = wait_for_completed_sessions(&recv_sessions, 2).await;
    assert_eq!(sessions.len(), 2);
}

#[tokio::test]
async fn duplicate_frames_count_once() {
    let dir = tempfile::tempdir().unwrap();
    let (addr, output_dir, recv_sessions) = start_receiver(dir.path()).await;

    let compressor = Compressor::with_default_level();
    let data = b"only chunk".to_vec();

    let file_meta = FileMetadata {
        name: "dup.bin".into(),
        size: data.len() as u64,
        hash: hash_hex(&data),
        mime_type: String::new(),
    };

    let mut stream = TcpStream::connect(addr).await.unwrap();
    let payload = serde_json::to_vec(&file_meta).unwrap();
    let control = ChunkMetadata::control(payload.len());
    write_frame(&mut stream, &control, &compressor.compress(&payload).unwrap())
        .await
        .unwrap();

    let mut meta = ChunkMetadata::placeholder("0");
    meta.size = data.len() as u64;
    meta.sha256 = hash_hex(&data);
    let compressed = compressor.compress(&data).unwrap();
    write_frame(&mut stream, &meta, &compressed).await.unwrap();
    write_frame(&mut stream, &meta, &compressed).await.unwrap();

    stream.shutdown().await.unwrap();
    drop(stream);

    wait_for_file(&output_dir.join("dup.bin"), data.len() as u64).await;
    assert_eq!(std::fs::read(output_dir.join("dup.bin")).unwrap(), data);

    let sessions = wait_for_completed_sessions(&recv_sessions, 1).await;
    assert_eq!(sessions[0].completed, 1);
}
