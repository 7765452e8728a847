//! Receiver listener.
//!
//! Binds a TCP listener and services each accepted connection on its own
//! task. Bind failure is fatal; accept failures are logged and the loop
//! continues.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};

use haul_core::error::{Error, Result};
use haul_core::session::SessionStore;

use crate::assemble::ChunkSpool;
use crate::connection::handle_connection;

/// Configuration for the receiver process.
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    pub bind_addr: String,
    pub port: u16,
    pub output_dir: PathBuf,
    /// Scratch directory; defaults to `{output_dir}/temp`.
    pub temp_dir: Option<PathBuf>,
    pub sessions_dir: PathBuf,
}

/// Accepting server bound to a socket.
#[derive(Debug)]
pub struct Receiver {
    listener: TcpListener,
    store: Arc<SessionStore>,
    spool: Arc<ChunkSpool>,
}

impl Receiver {
    /// Bind the listener and prepare storage directories.
    pub async fn bind(cfg: &ReceiverConfig) -> Result<Self> {
        let store = Arc::new(SessionStore::open(&cfg.sessions_dir)?);
        let spool = Arc::new(ChunkSpool::new(&cfg.output_dir, cfg.temp_dir.clone())?);

        let addr = format!("{}:{}", cfg.bind_addr, cfg.port);
        let listener = TcpListener::bind(&addr).await.map_err(|e| Error::Transport {
            message: format!("listen on {}: {}", addr, e),
        })?;

        Ok(Self {
            listener,
            store,
            spool,
        })
    }

    /// Address the listener is bound to (useful with port 0).
    pub fn local_addr(&self) -> Result<std::net::SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept and serve connections until the process is stopped.
    pub async fn run(self) -> Result<()> {
        info!(addr = %self.local_addr()?, "receiver listening");

        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    info!(%peer, "connection accepted");
                    let store = Arc::clone(&self.store);
                    let spool = Arc::clone(&self.spool);
                    tokio::spawn(async move {
                        handle_connection(stream, peer, store, spool).await;
                    });
                }
                Err(e) => {
                    warn!(error = %e, "accept error");
                }
            }
        }
    }
}
