//! haul sender binary entry point.

use clap::Parser;
use tracing::{error, info};

use haul_sender::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_format = cli.log_format.into();
    if let Err(e) = haul_core::init_logging(cli.verbose, cli.log_file.as_deref(), log_format) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    info!(version = env!("CARGO_PKG_VERSION"), "haul-sender starting");

    let cfg = cli.transfer_config();
    match haul_sender::run_transfer(&cfg).await {
        Ok(outcome) => {
            info!(
                session_id = %outcome.session_id,
                chunks_sent = outcome.chunks_sent,
                chunks_skipped = outcome.chunks_skipped,
                bytes_sent = outcome.bytes_sent,
                "done"
            );
        }
        Err(e) => {
            error!(error = %e, "transfer failed");
            std::process::exit(1);
        }
    }
}
