//! haul receiver binary entry point.

use clap::Parser;
use tracing::{error, info};

use haul_receiver::{Cli, Receiver};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_format = cli.log_format.into();
    if let Err(e) = haul_core::init_logging(cli.verbose, cli.log_file.as_deref(), log_format) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    info!(version = env!("CARGO_PKG_VERSION"), "haul-receiver starting");

    let cfg = cli.receiver_config();
    let receiver = match Receiver::bind(&cfg).await {
        Ok(receiver) => receiver,
        Err(e) => {
            error!(error = %e, "failed to bind listener");
            std::process::exit(1);
        }
    };

    if let Err(e) = receiver.run().await {
        error!(error = %e, "receiver stopped");
        std::process::exit(1);
    }
}
