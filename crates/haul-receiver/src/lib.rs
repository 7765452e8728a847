//! haul receiver library: listener, per-connection pipeline, and assembly.

pub mod assemble;
pub mod cli;
pub mod connection;
pub mod server;

pub use assemble::ChunkSpool;
pub use cli::Cli;
pub use server::{Receiver, ReceiverConfig};
