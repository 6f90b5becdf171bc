mod cli;

use std::sync::Arc;

use boardbox::cleanup::Sweeper;
use boardbox::config::Config;
use boardbox::observability::{self, Metrics};
use boardbox::report::Reporter;
use boardbox::worker::{DiskUsage, Fs2DiskUsage};
use boardbox::{api, ledger};
use clap::Parser;
use cli::{Cli, Commands};
use tracing::info;

type AnyError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), AnyError> {
    observability::init_tracing();

    let cli = Cli::parse();
    let config = Config::load().map_err(|e| format!("Failed to load config: {}", e))?;

    match cli.command {
        Commands::Server(args) => api::run(config, args.address).await?,
        Commands::CleanOnce => clean_once(config).await?,
        Commands::Info => print_info(&config)?,
    }

    Ok(())
}

async fn clean_once(config: Config) -> Result<(), AnyError> {
    let store = ledger::open_store(&config.storage)?;
    let reporter = Reporter::new(&config.report)?;
    let sweeper = Sweeper::new(&config, store, reporter, Arc::new(Metrics::new()));

    let stats = sweeper.sweep_once(chrono::Utc::now()).await?;
    info!(?stats, "Cleanup sweep finished");
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

fn print_info(config: &Config) -> Result<(), AnyError> {
    let dir = &config.storage.download_dir;
    println!("boardbox v{}", env!("CARGO_PKG_VERSION"));
    println!("platform: {}/{}", std::env::consts::OS, std::env::consts::ARCH);
    println!("download dir: {}", dir.display());
    match Fs2DiskUsage.used_percent(dir) {
        Ok(rate) => println!("disk usage: {rate:.2}%"),
        Err(e) => println!("disk usage: unavailable ({e})"),
    }
    println!("\n# effective configuration\n{}", toml::to_string_pretty(config)?);
    Ok(())
}
