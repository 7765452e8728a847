//! Fire-and-forget UDP sending over the packet format.
//!
//! This lane is intentionally unfinished: packets are sent once with no ACK
//! tracking. Reliability, when it lands, comes from erasure coding plus the
//! retry manager; the constants for that live in [`crate::constants`].

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use tokio::net::UdpSocket;

use crate::constants::{DATAGRAM_MAX_RETRIES, DATAGRAM_RETRANSMIT_TIMEOUT};
use crate::error::{Error, Result};
use crate::model::ChunkMetadata;
use crate::wire::packet::Packet;

/// Configuration for the datagram sender.
#[derive(Debug, Clone)]
pub struct DatagramSenderConfig {
    pub remote_addr: String,
    pub max_parallel_streams: usize,
    pub retransmit_timeout: Duration,
    pub max_retries: u32,
}

impl DatagramSenderConfig {
    pub fn new(remote_addr: impl Into<String>) -> Self {
        Self {
            remote_addr: remote_addr.into(),
            max_parallel_streams: 32,
            retransmit_timeout: DATAGRAM_RETRANSMIT_TIMEOUT,
            max_retries: DATAGRAM_MAX_RETRIES,
        }
    }
}

/// Sends chunks as DATA packets over UDP.
pub struct DatagramSender {
    socket: UdpSocket,
    seq: AtomicU32,
    bytes_sent: AtomicU64,
}

impl DatagramSender {
    /// Bind an ephemeral local socket and connect it to the remote address.
    pub async fn connect(cfg: &DatagramSenderConfig) -> Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket
            .connect(&cfg.remote_addr)
            .await
            .map_err(|e| Error::Transport {
                message: format!("connect udp {}: {}", cfg.remote_addr, e),
            })?;

        Ok(Self {
            socket,
            seq: AtomicU32::new(0),
            bytes_sent: AtomicU64::new(0),
        })
    }

    fn next_seq(&self) -> u32 {
        self.seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Send a single chunk payload as a DATA packet, fire-and-forget.
    pub async fn send_chunk(
        &self,
        session_id: [u8; 16],
        chunk_id: u64,
        payload: &[u8],
        priority: u8,
    ) -> Result<()> {
        let packet = Packet::data(session_id, chunk_id, self.next_seq(), priority, payload.to_vec());
        let raw = packet.encode()?;
        let n = self.socket.send(&raw).await?;
        self.bytes_sent.fetch_add(n as u64, Ordering::Relaxed);
        Ok(())
    }

    /// Total raw bytes handed to the socket so far.
    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }
}

/// Basic send priority for a chunk; lower is more urgent.
pub fn chunk_priority(meta: &ChunkMetadata) -> u8 {
    if meta.is_parity {
        4
    } else if meta.offset == 0 {
        2
    } else {
        3
    }
}
