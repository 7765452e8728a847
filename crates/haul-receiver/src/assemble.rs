//! Chunk spooling and final assembly.
//!
//! Each verified chunk is written whole to its own scratch file under the
//! temp directory; after the stream ends, the assembler concatenates the
//! scratch files in ascending offset order into the output file. Assembly
//! does not re-verify hashes (receive-time verification is authoritative)
//! and does not delete scratch files; that is a housekeeping concern.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use haul_core::error::Result;
use haul_core::model::TransferSession;

/// On-disk scratch storage for received chunks plus the output directory.
#[derive(Debug, Clone)]
pub struct ChunkSpool {
    output_dir: PathBuf,
    temp_dir: PathBuf,
}

impl ChunkSpool {
    /// Create the spool, defaulting the temp directory to
    /// `{output_dir}/temp`; both directories are created if needed.
    pub fn new(output_dir: impl Into<PathBuf>, temp_dir: Option<PathBuf>) -> Result<Self> {
        let output_dir = output_dir.into();
        let temp_dir = temp_dir.unwrap_or_else(|| output_dir.join("temp"));
        fs::create_dir_all(&output_dir)?;
        fs::create_dir_all(&temp_dir)?;
        Ok(Self {
            output_dir,
            temp_dir,
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Scratch path for a chunk: `{temp_dir}/{session_id}_{chunk_id}.part`.
    ///
    /// Paths embed the session id, so parallel sessions never collide.
    pub fn part_path(&self, session_id: &str, chunk_id: &str) -> PathBuf {
        self.temp_dir.join(format!("{session_id}_{chunk_id}.part"))
    }

    /// Write the decompressed chunk bytes to their scratch file. A duplicate
    /// chunk simply replaces its file.
    pub fn store_chunk(&self, session_id: &str, chunk_id: &str, data: &[u8]) -> Result<PathBuf> {
        let path = self.part_path(session_id, chunk_id);
        fs::write(&path, data)?;
        Ok(path)
    }

    /// Join all of the session's chunks into `{output_dir}/{file.name}`,
    /// ordered by offset, and return the output path.
    pub fn assemble(&self, session: &TransferSession) -> Result<PathBuf> {
        let out_path = self.output_dir.join(&session.file.name);
        let mut out = fs::OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&out_path)?;

        let mut chunks: Vec<_> = session.chunks.values().collect();
        chunks.sort_by_key(|c| c.offset);

        for chunk in chunks {
            let part = self.part_path(&session.id, &chunk.id);
            let data = fs::read(&part)?;
            out.write_all(&data)?;
        }
        out.flush()?;

        debug!(
            session_id = %session.id,
            path = %out_path.display(),
            "assembled output file"
        );
        Ok(out_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haul_core::model::{ChunkMetadata, FileMetadata};

    fn session_with_chunks(parts: &[(&str, u64, &[u8])]) -> TransferSession {
        let total: u64 = parts.iter().map(|(_, _, d)| d.len() as u64).sum();
        let mut session = TransferSession::new(FileMetadata {
            name: "out.bin".into(),
            size: total,
            hash: "ab".repeat(32),
            mime_type: String::new(),
        });
        for (id, offset, data) in parts {
            let mut chunk = ChunkMetadata::placeholder(id);
            chunk.offset = *offset;
            chunk.size = data.len() as u64;
            session.chunks.insert((*id).to_string(), chunk);
        }
        session
    }

    #[test]
    fn part_paths_include_session_id() {
        let dir = tempfile::tempdir().unwrap();
        let spool = ChunkSpool::new(dir.path(), None).unwrap();

        let a = spool.part_path("sess-a", "0");
        let b = spool.part_path("sess-b", "0");
        assert_ne!(a, b);
        assert!(a.to_string_lossy().ends_with("sess-a_0.part"));
    }

    #[test]
    fn temp_dir_defaults_under_output() {
        let dir = tempfile::tempdir().unwrap();
        let spool = ChunkSpool::new(dir.path().join("recv"), None).unwrap();
        assert_eq!(spool.temp_dir(), dir.path().join("recv").join("temp"));
        assert!(spool.temp_dir().is_dir());
    }

    #[test]
    fn store_then_assemble_in_offset_order() {
        let dir = tempfile::tempdir().unwrap();
        let spool = ChunkSpool::new(dir.path(), None).unwrap();

        // Insert out of order; assembly must sort by offset.
        let session = session_with_chunks(&[
            ("1", 5, b"world"),
            ("0", 0, b"hello"),
            ("2", 10, b"!"),
        ]);
        spool.store_chunk(&session.id, "1", b"world").unwrap();
        spool.store_chunk(&session.id, "0", b"hello").unwrap();
        spool.store_chunk(&session.id, "2", b"!").unwrap();

        let out = spool.assemble(&session).unwrap();
        assert_eq!(fs::read(out).unwrap(), b"helloworld!");
    }

    #[test]
    fn duplicate_chunk_replaces_scratch_file() {
        let dir = tempfile::tempdir().unwrap();
        let spool = ChunkSpool::new(dir.path(), None).unwrap();

        spool.store_chunk("s", "0", b"first").unwrap();
        spool.store_chunk("s", "0", b"second").unwrap();

        assert_eq!(fs::read(spool.part_path("s", "0")).unwrap(), b"second");
    }

    #[test]
    fn assemble_missing_part_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let spool = ChunkSpool::new(dir.path(), None).unwrap();

        let session = session_with_chunks(&[("0", 0, b"data")]);
        assert!(spool.assemble(&session).is_err());
    }

    #[test]
    fn assemble_truncates_previous_output() {
        let dir = tempfile::tempdir().unwrap();
        let spool = ChunkSpool::new(dir.path(), None).unwrap();

        let session = session_with_chunks(&[("0", 0, b"new")]);
        fs::write(dir.path().join("out.bin"), b"obsolete longer content").unwrap();
        spool.store_chunk(&session.id, "0", b"new").unwrap();

        let out = spool.assemble(&session).unwrap();
        assert_eq!(fs::read(out).unwrap(), b"new");
    }

    #[test]
    fn scratch_files_survive_assembly() {
        let dir = tempfile::tempdir().unwrap();
        let spool = ChunkSpool::new(dir.path(), None).unwrap();

        let session = session_with_chunks(&[("0", 0, b"data")]);
        let part = spool.store_chunk(&session.id, "0", b"data").unwrap();
        spool.assemble(&session).unwrap();
        assert!(part.exists());
    }
}
