//! Stream frame codec.
//!
//! A frame is the atomic unit on the reliable byte stream:
//!
//! ```text
//! u32 BE   meta_len
//! bytes    metadata JSON (ChunkMetadata)
//! u64 BE   data_len
//! bytes    data (compressed payload)
//! ```
//!
//! No magic is needed; ordering and reliability come from the transport.
//! End-of-stream is the sender closing its write half: a half-close at a
//! frame boundary is a clean EOF (`Ok(None)`), never an error. A short read
//! inside a frame is fatal for the connection and the partial frame is
//! discarded.

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::constants::{MAX_FRAME_DATA, MAX_FRAME_META};
use crate::error::{Error, Result};
use crate::model::ChunkMetadata;

/// One decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub meta: ChunkMetadata,
    pub data: Vec<u8>,
}

/// Encode a frame into a single contiguous buffer.
pub fn encode_frame(meta: &ChunkMetadata, data: &[u8]) -> Result<Bytes> {
    let meta_bytes = serde_json::to_vec(meta).map_err(|e| Error::Codec {
        message: format!("marshal metadata: {}", e),
    })?;

    if meta_bytes.len() > MAX_FRAME_META {
        return Err(Error::Protocol {
            message: format!(
                "metadata too large: {} bytes (max {})",
                meta_bytes.len(),
                MAX_FRAME_META
            ),
        });
    }
    if data.len() > MAX_FRAME_DATA {
        return Err(Error::Protocol {
            message: format!("data too large: {} bytes (max {})", data.len(), MAX_FRAME_DATA),
        });
    }

    let mut buf = BytesMut::with_capacity(4 + meta_bytes.len() + 8 + data.len());
    buf.put_u32(meta_bytes.len() as u32);
    buf.put_slice(&meta_bytes);
    buf.put_u64(data.len() as u64);
    buf.put_slice(data);
    Ok(buf.freeze())
}

/// Write one frame to the stream.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    meta: &ChunkMetadata,
    data: &[u8],
) -> Result<()> {
    let frame = encode_frame(meta, data)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame from the stream.
///
/// Returns `Ok(None)` only when EOF lands exactly on a frame boundary (zero
/// bytes of the next frame were read); callers must treat that as a clean
/// close and not log an error.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<Frame>> {
    // First field read by hand so a boundary EOF is distinguishable from a
    // torn frame.
    let mut len_buf = [0u8; 4];
    let mut filled = 0;
    while filled < len_buf.len() {
        let n = reader.read(&mut len_buf[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(Error::Protocol {
                message: "connection closed inside frame header".into(),
            });
        }
        filled += n;
    }

    let meta_len = u32::from_be_bytes(len_buf) as usize;
    if meta_len > MAX_FRAME_META {
        return Err(Error::Protocol {
            message: format!("metadata length {} exceeds maximum {}", meta_len, MAX_FRAME_META),
        });
    }

    let mut meta_buf = vec![0u8; meta_len];
    read_field(reader, &mut meta_buf, "metadata").await?;
    let meta: ChunkMetadata = serde_json::from_slice(&meta_buf).map_err(|e| Error::Codec {
        message: format!("unmarshal metadata: {}", e),
    })?;

    let mut data_len_buf = [0u8; 8];
    read_field(reader, &mut data_len_buf, "data length").await?;
    let data_len = u64::from_be_bytes(data_len_buf) as usize;
    if data_len > MAX_FRAME_DATA {
        return Err(Error::Protocol {
            message: format!("data length {} exceeds maximum {}", data_len, MAX_FRAME_DATA),
        });
    }

    let mut data = vec![0u8; data_len];
    read_field(reader, &mut data, "data").await?;

    Ok(Some(Frame { meta, data }))
}

async fn read_field<R: AsyncRead + Unpin>(
    reader: &mut R,
    buf: &mut [u8],
    field: &str,
) -> Result<()> {
    reader.read_exact(buf).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::Protocol {
                message: format!("connection closed while reading frame {}", field),
            }
        } else {
            Error::Io(e)
        }
    })?;
    Ok(())
}
