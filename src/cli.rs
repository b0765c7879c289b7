use std::convert::TryFrom;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::{ArgAction, Parser};

use crate::download::RunConfig;

#[derive(Parser, Debug, Clone)]
#[command(name = "memfetch", author, version, about = "Parallel downloader and organizer for Snapchat Memories exports", long_about = None)]
pub struct Cli {
    /// Path to the memories_history.json export
    #[arg(value_name = "manifest")]
    pub manifest: Option<PathBuf>,

    /// Output directory root
    #[arg(short, long, value_name = "dir", default_value = "Memories")]
    pub output: PathBuf,

    /// Number of parallel download workers
    #[arg(
        short = 'w',
        long = "workers",
        value_name = "int",
        default_value_t = 8
    )]
    pub workers: usize,

    /// First year covered by the folder skeleton
    #[arg(long = "year-from", value_name = "year", default_value_t = 2016)]
    pub year_from: i32,

    /// Last year covered by the folder skeleton (inclusive)
    #[arg(long = "year-to", value_name = "year", default_value_t = 2025)]
    pub year_to: i32,

    /// Per-request timeout in seconds (0 disables)
    #[arg(long = "timeout", value_name = "secs", default_value_t = 60)]
    pub timeout: u64,

    /// Measure connection speed, suggest a worker count, then exit
    #[arg(long = "speed-test", action = ArgAction::SetTrue)]
    pub speed_test: bool,

    /// Quiet mode
    #[arg(short = 'q', long = "quiet", action = ArgAction::SetTrue, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Verbose mode
    #[arg(short = 'v', long = "verbose", action = ArgAction::SetTrue)]
    pub verbose: bool,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}

impl TryFrom<Cli> for RunConfig {
    type Error = anyhow::Error;

    fn try_from(cli: Cli) -> Result<Self> {
        let manifest_path = cli
            .manifest
            .ok_or_else(|| anyhow!("a manifest path is required"))?;

        if cli.year_from > cli.year_to {
            return Err(anyhow!(
                "--year-from ({}) must not exceed --year-to ({})",
                cli.year_from,
                cli.year_to
            ));
        }

        let timeout = if cli.timeout == 0 {
            None
        } else {
            Some(Duration::from_secs(cli.timeout))
        };

        Ok(RunConfig {
            manifest_path,
            output_root: cli.output,
            workers: cli.workers.max(1),
            years: cli.year_from..=cli.year_to,
            timeout,
        })
    }
}
