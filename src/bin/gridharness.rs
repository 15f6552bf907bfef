use anyhow::{Context, Result};
use clap::Parser;
use gridharness::cli::{GridHarnessCli, HarnessRunner};
use gridharness::config::HarnessConfig;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = GridHarnessCli::parse();

    // Initialize tracing
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt().with_max_level(level).init();

    info!("Starting gridharness v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&cli)?;
    let executor = HarnessRunner::executor_for(&config, cli.local)?;
    let runner = HarnessRunner::new(config, executor);

    runner.run(cli.command).await?;
    Ok(())
}

/// An explicit `--config` must exist; the default location is optional.
fn load_config(cli: &GridHarnessCli) -> Result<HarnessConfig> {
    if let Some(path) = &cli.config {
        return HarnessConfig::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()));
    }

    let path = HarnessConfig::default_path()?;
    if path.exists() {
        info!(path = %path.display(), "Using default configuration");
        Ok(HarnessConfig::load(&path)?)
    } else {
        Ok(HarnessConfig::default())
    }
}
