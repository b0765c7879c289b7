mod cli;
mod dates;
mod download;
mod error;
mod index;
mod layout;
mod ledger;
mod manifest;
mod probe;
mod progress;

use anyhow::Result;
use cli::Cli;
use download::{DownloadOrchestrator, RunConfig};
use log::{debug, error};

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        error!("{err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logger(&cli);

    debug!("CLI arguments: {:?}", cli);

    if cli.speed_test {
        return probe::run().await;
    }

    let config: RunConfig = cli.try_into()?;
    let orchestrator = DownloadOrchestrator::new(config)?;
    let summary = orchestrator.run().await?;
    debug!(
        "run complete: {}/{} items processed in {}",
        summary.stats.processed,
        summary.total_items,
        progress::format_duration(summary.elapsed)
    );
    Ok(())
}

fn init_logger(cli: &Cli) {
    use env_logger::Env;
    use log::LevelFilter;

    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    let level = if cli.quiet {
        LevelFilter::Error
    } else if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    builder.filter_level(level);
    // keep logs quiet unless verbose
    if !cli.verbose {
        builder.format_timestamp_secs();
    }
    let _ = builder.try_init();
}
