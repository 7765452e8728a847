//! haul sender library: CLI definition and the per-file transfer driver.

pub mod cli;
pub mod transfer;

pub use cli::Cli;
pub use transfer::{TransferConfig, TransferOutcome, run_transfer};
