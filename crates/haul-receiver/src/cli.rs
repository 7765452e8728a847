//! Receiver CLI implementation.

use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};

use crate::server::ReceiverConfig;

/// Log output format for CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum CliLogFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// Structured JSON output.
    Json,
}

impl From<CliLogFormat> for haul_core::LogFormat {
    fn from(fmt: CliLogFormat) -> Self {
        match fmt {
            CliLogFormat::Text => haul_core::LogFormat::Text,
            CliLogFormat::Json => haul_core::LogFormat::Json,
        }
    }
}

/// haul receiver - accept chunk streams and assemble files.
#[derive(Debug, Parser)]
#[command(
    name = "haul-receiver",
    version,
    about = "haul receiver - accept chunk streams and assemble files"
)]
pub struct Cli {
    /// Address to listen on
    #[arg(short = 'b', long = "bind", default_value = "0.0.0.0")]
    pub bind_addr: String,

    /// Port to listen on
    #[arg(short = 'p', long = "port", default_value_t = 8080)]
    pub port: u16,

    /// Output directory for completed files
    #[arg(long = "output-dir", default_value = "received", value_name = "DIR")]
    pub output_dir: PathBuf,

    /// Scratch directory for chunk storage (default: {output-dir}/temp)
    #[arg(long = "temp-dir", value_name = "DIR")]
    pub temp_dir: Option<PathBuf>,

    /// Session state directory
    #[arg(long = "sessions-dir", default_value = "sessions", value_name = "DIR")]
    pub sessions_dir: PathBuf,

    /// Increase verbosity (can be repeated: -v, -vv, -vvv)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    /// Log to file instead of stderr
    #[arg(long = "log-file", value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Log output format
    #[arg(long = "log-format", default_value = "text")]
    pub log_format: CliLogFormat,
}

impl Cli {
    /// Build the server configuration from the parsed arguments.
    pub fn receiver_config(&self) -> ReceiverConfig {
        ReceiverConfig {
            bind_addr: self.bind_addr.clone(),
            port: self.port,
            output_dir: self.output_dir.clone(),
            temp_dir: self.temp_dir.clone(),
            sessions_dir: self.sessions_dir.clone(),
        }
    }
}
