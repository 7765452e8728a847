//! Sender CLI implementation.

use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};
use haul_core::chunker::ChunkerConfig;
use haul_core::constants::DEFAULT_CHUNK_SIZE;

use crate::transfer::TransferConfig;

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

/// haul sender - stream a file to a receiver as verified chunks.
#[derive(Debug, Parser)]
#[command(
    name = "haul-sender",
    version,
    about = "haul sender - stream a file to a receiver as verified chunks"
)]
pub struct Cli {
    /// Input file path
    #[arg(short = 'f', long = "file", value_name = "PATH")]
    pub file: PathBuf,

    /// Receiver address (host:port)
    #[arg(short = 'r', long = "receiver", value_name = "ADDR")]
    pub receiver: String,

    /// Target chunk size in bytes (clamped to the supported range)
    #[arg(long = "chunk-size", default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: u64,

    /// Pick the chunk size automatically (predictor service or heuristic)
    #[arg(long = "auto-chunk-size")]
    pub auto_chunk_size: bool,

    /// Session state directory
    #[arg(long = "sessions-dir", default_value = "sessions", value_name = "DIR")]
    pub sessions_dir: PathBuf,

    /// Resume an existing session instead of creating a new one
    #[arg(long = "resume", value_name = "SESSION_ID")]
    pub resume: Option<String>,

    /// Coordinator base URL (advisory; failures are ignored)
    #[arg(long = "coordinator", value_name = "URL")]
    pub coordinator: Option<String>,

    /// Chunk-size predictor URL (used with --auto-chunk-size)
    #[arg(long = "predictor", value_name = "URL")]
    pub predictor: Option<String>,

    /// Disable the progress bar
    #[arg(long = "no-progress")]
    pub no_progress: bool,

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
    /// Build the driver configuration from the parsed arguments.
    pub fn transfer_config(&self) -> TransferConfig {
        TransferConfig {
            file: self.file.clone(),
            receiver_addr: self.receiver.clone(),
            chunk_size: self.chunk_size,
            auto_chunk_size: self.auto_chunk_size,
            sessions_dir: self.sessions_dir.clone(),
            resume: self.resume.clone(),
            coordinator_url: self.coordinator.clone(),
            predictor_url: self.predictor.clone(),
            chunker: ChunkerConfig::default(),
            progress: !self.no_progress,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_args() {
        let cli = Cli::try_parse_from([
            "haul-sender",
            "--file",
            "/data/big.bin",
            "--receiver",
            "10.0.0.2:8080",
        ])
        .unwrap();

        assert_eq!(cli.file, PathBuf::from("/data/big.bin"));
        assert_eq!(cli.receiver, "10.0.0.2:8080");
        assert_eq!(cli.chunk_size, DEFAULT_CHUNK_SIZE);
        assert!(cli.resume.is_none());
        assert!(!cli.auto_chunk_size);
    }

    #[test]
    fn missing_receiver_is_an_error() {
        assert!(Cli::try_parse_from(["haul-sender", "--file", "/data/big.bin"]).is_err());
    }

    #[test]
    fn resume_and_verbosity() {
        let cli = Cli::try_parse_from([
            "haul-sender",
            "-f",
            "x.bin",
            "-r",
            "host:1",
            "--resume",
            "abc-123",
            "-vvv",
        ])
        .unwrap();

        assert_eq!(cli.resume.as_deref(), Some("abc-123"));
        assert_eq!(cli.verbose, 3);
    }

    #[test]
    fn config_carries_flags() {
        let cli = Cli::try_parse_from([
            "haul-sender",
            "-f",
            "x.bin",
            "-r",
            "host:1",
            "--chunk-size",
            "1048576",
            "--no-progress",
        ])
        .unwrap();

        let cfg = cli.transfer_config();
        assert_eq!(cfg.chunk_size, 1048576);
        assert!(!cfg.progress);
    }
}
