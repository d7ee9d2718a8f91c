//! Binary crate for the `noaa-etl` command-line tool.
//!
//! This crate focuses on:
//! - Parsing CLI arguments
//! - Logging setup
//! - Mapping run outcomes to exit codes

use std::process::ExitCode;

use clap::Parser;

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cmd = cli::Cli::parse();

    let mut logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    // Flags are applied after RUST_LOG so they win; per-module RUST_LOG directives still apply.
    if let Some(level) = cmd.log_level() {
        logger.filter_level(level);
    }
    logger.format_timestamp_secs().init();

    cmd.run().await
}
