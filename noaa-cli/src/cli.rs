use std::{path::PathBuf, process::ExitCode};

use anyhow::Context;
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use log::{LevelFilter, info};
use noaa_core::{
    CdoClient, Config, DataQuery, ObjectUploader, Overrides, Pipeline, RunOptions, RunOutcome,
    Settings, StorageKey, pipeline,
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "noaa-etl", version, about = "Extract NOAA CDO observations and load the raw JSON into object storage")]
pub struct Cli {
    /// Explicit .env file; otherwise searched upward from the working directory.
    #[arg(long, global = true)]
    pub env_file: Option<PathBuf>,

    /// More log output (-v debug, -vv trace). Overrides the global RUST_LOG level.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors. Overrides the global RUST_LOG level.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Probe, fetch the last days of observations and upload the raw JSON.
    Run {
        #[command(flatten)]
        query: QueryArgs,

        #[command(flatten)]
        store: StoreArgs,

        /// Skip the /datasets connectivity check.
        #[arg(long)]
        skip_probe: bool,

        /// Don't print the fetched JSON to stdout.
        #[arg(long)]
        no_print: bool,

        /// Exit non-zero when the fetch or the upload fails.
        #[arg(long)]
        strict: bool,
    },

    /// Check connectivity and credentials against the /datasets endpoint.
    Probe,

    /// Fetch observations and print them without uploading.
    Fetch {
        #[command(flatten)]
        query: QueryArgs,
    },

    /// Show the settings file path, optionally writing defaults to it.
    Config {
        /// Write a default settings file if none exists.
        #[arg(long)]
        init: bool,
    },
}

#[derive(Debug, Args, Default)]
pub struct QueryArgs {
    /// Dataset id, e.g. "GHCND".
    #[arg(long)]
    pub dataset: Option<String>,

    /// Location id, e.g. "CITY:US390029".
    #[arg(long)]
    pub location: Option<String>,

    /// Days before today to start the window at.
    #[arg(long)]
    pub days: Option<u32>,

    /// Maximum number of records (1-1000).
    #[arg(long)]
    pub limit: Option<u32>,

    /// Request timeout in seconds.
    #[arg(long)]
    pub timeout: Option<u64>,
}

#[derive(Debug, Args, Default)]
pub struct StoreArgs {
    /// Target S3 bucket.
    #[arg(long)]
    pub bucket: Option<String>,

    /// Key prefix inside the bucket.
    #[arg(long)]
    pub prefix: Option<String>,

    /// Write to this local directory instead of S3.
    #[arg(long, conflicts_with = "bucket")]
    pub local_dir: Option<PathBuf>,
}

impl Cli {
    /// Level forced by `-v`/`-q`. `None` leaves `RUST_LOG` (default `info`) in charge.
    pub fn log_level(&self) -> Option<LevelFilter> {
        match (self.quiet, self.verbose) {
            (true, _) => Some(LevelFilter::Warn),
            (false, 0) => None,
            (false, 1) => Some(LevelFilter::Debug),
            (false, _) => Some(LevelFilter::Trace),
        }
    }

    pub async fn run(self) -> anyhow::Result<ExitCode> {
        let env_file = self.env_file.as_deref();

        match self.command {
            Command::Run { query, store, skip_probe, no_print, strict } => {
                let config = Config::load(env_file, &overrides(query, store))
                    .context("Failed to load configuration")?;
                let today = Local::now().date_naive();

                let client = CdoClient::from_config(&config)?;
                let uploader = ObjectUploader::from_config(&config.store, config.api.timeout());
                let data_query = DataQuery::from_settings(&config.api, today);
                let key = StorageKey::for_date(&config.store.prefix, today);

                let report = Pipeline::new(&client, &uploader, RunOptions { probe: !skip_probe })
                    .run(&data_query, &key)
                    .await;

                if let (Some(data), false) = (report.outcome.data(), no_print) {
                    println!("{}", serde_json::to_string_pretty(data)?);
                }

                let code = match &report.outcome {
                    RunOutcome::Uploaded { receipt, .. } => {
                        info!(
                            "Run complete: {} ({} bytes, etag {})",
                            receipt.url,
                            receipt.bytes,
                            receipt.e_tag.as_deref().unwrap_or("-")
                        );
                        ExitCode::SUCCESS
                    }
                    RunOutcome::UploadFailed { .. } | RunOutcome::FetchFailed(_) if strict => {
                        ExitCode::FAILURE
                    }
                    _ => ExitCode::SUCCESS,
                };
                Ok(code)
            }
            Command::Probe => {
                let config = Config::load(env_file, &Overrides::default())
                    .context("Failed to load configuration")?;
                let client = CdoClient::from_config(&config)?;

                let body = pipeline::probe(&client).await?;
                println!("{}", serde_json::to_string_pretty(&body)?);
                Ok(ExitCode::SUCCESS)
            }
            Command::Fetch { query } => {
                let config = Config::load(env_file, &overrides(query, StoreArgs::default()))
                    .context("Failed to load configuration")?;
                let client = CdoClient::from_config(&config)?;
                let data_query = DataQuery::from_settings(&config.api, Local::now().date_naive());

                let data = client.data(&data_query).await.context("Failed to fetch data.")?;
                println!("{}", serde_json::to_string_pretty(&data)?);
                Ok(ExitCode::SUCCESS)
            }
            Command::Config { init } => {
                let path = Settings::config_file_path()?;
                if init && !path.exists() {
                    Settings::default().save_to(&path)?;
                    info!("Wrote default settings to {}", path.display());
                }
                println!("{}", path.display());
                Ok(ExitCode::SUCCESS)
            }
        }
    }
}

fn overrides(query: QueryArgs, store: StoreArgs) -> Overrides {
    Overrides {
        dataset_id: query.dataset,
        location_id: query.location,
        lookback_days: query.days,
        limit: query.limit,
        timeout_secs: query.timeout,
        bucket: store.bucket,
        prefix: store.prefix,
        local_dir: store.local_dir,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn run_flags_map_to_overrides() {
        let cli = Cli::parse_from([
            "noaa-etl", "run", "--location", "CITY:US360019", "--days", "3", "--bucket", "raw",
        ]);

        let Command::Run { query, store, skip_probe, .. } = cli.command else {
            panic!("expected run command");
        };
        assert!(!skip_probe);

        let o = overrides(query, store);
        assert_eq!(o.location_id.as_deref(), Some("CITY:US360019"));
        assert_eq!(o.lookback_days, Some(3));
        assert_eq!(o.bucket.as_deref(), Some("raw"));
        assert!(o.local_dir.is_none());
    }

    #[test]
    fn quiet_only_affects_logging_and_no_print_suppresses_output() {
        let cli = Cli::parse_from(["noaa-etl", "-q", "run"]);
        let Command::Run { no_print, .. } = cli.command else {
            panic!("expected run command");
        };
        assert!(!no_print);

        let cli = Cli::parse_from(["noaa-etl", "run", "--no-print"]);
        assert!(matches!(cli.command, Command::Run { no_print: true, .. }));

        let cli = Cli::parse_from(["noaa-etl", "config", "--init"]);
        assert!(matches!(cli.command, Command::Config { init: true }));
    }

    #[test]
    fn bucket_and_local_dir_conflict() {
        let res = Cli::try_parse_from([
            "noaa-etl", "run", "--bucket", "raw", "--local-dir", "/tmp/raw",
        ]);
        assert!(res.is_err());
    }

    #[test]
    fn verbosity_flags_force_log_level() {
        assert_eq!(Cli::parse_from(["noaa-etl", "probe"]).log_level(), None);
        assert_eq!(Cli::parse_from(["noaa-etl", "-v", "probe"]).log_level(), Some(LevelFilter::Debug));
        assert_eq!(Cli::parse_from(["noaa-etl", "-vv", "probe"]).log_level(), Some(LevelFilter::Trace));
        assert_eq!(Cli::parse_from(["noaa-etl", "--quiet", "probe"]).log_level(), Some(LevelFilter::Warn));
    }
}
