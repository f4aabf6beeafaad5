//! CLI for the DFM download file manager.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use dfm_core::config;
use dfm_core::DigestAlgorithm;
use std::path::PathBuf;

use commands::{run_checksum, run_config, run_save, SaveArgs};

/// Top-level CLI for the DFM download file manager.
#[derive(Debug, Parser)]
#[command(name = "dfm")]
#[command(about = "DFM: stream data to a file with a running digest", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

/// Digest algorithm selectable on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AlgorithmArg {
    Sha256,
    Sha512,
}

impl From<AlgorithmArg> for DigestAlgorithm {
    fn from(a: AlgorithmArg) -> Self {
        match a {
            AlgorithmArg::Sha256 => DigestAlgorithm::Sha256,
            AlgorithmArg::Sha512 => DigestAlgorithm::Sha512,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Stream stdin (or --input) into DEST via DEST.part, then print its digest.
    Save {
        /// Final destination path.
        dest: PathBuf,
        /// Read from this file instead of stdin.
        #[arg(long, value_name = "FILE")]
        input: Option<PathBuf>,
        /// Bytes per append.
        #[arg(long, default_value = "65536", value_name = "BYTES")]
        chunk_size: usize,
        /// Replace DEST if it already exists.
        #[arg(long)]
        overwrite: bool,
        /// Keep the partial .part file if the transfer fails.
        #[arg(long)]
        keep_on_cancel: bool,
        /// Digest algorithm (defaults to the configured one).
        #[arg(long, value_enum)]
        algorithm: Option<AlgorithmArg>,
    },

    /// Compute the digest of a file (e.g. to compare with a saved download).
    Checksum {
        /// Path to the file.
        path: PathBuf,
        #[arg(long, value_enum, default_value = "sha256")]
        algorithm: AlgorithmArg,
    },

    /// Print the effective configuration.
    Config,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Save {
                dest,
                input,
                chunk_size,
                overwrite,
                keep_on_cancel,
                algorithm,
            } => {
                let args = SaveArgs {
                    dest,
                    input,
                    chunk_size,
                    overwrite,
                    keep_on_cancel,
                    algorithm: algorithm.map(Into::into),
                };
                run_save(&cfg, args).await?;
            }
            CliCommand::Checksum { path, algorithm } => {
                run_checksum(&path, algorithm.into()).await?
            }
            CliCommand::Config => run_config(&cfg).await?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
