use anyhow::{Context, Result};
use tracing::{error, info, warn};

use dbvc::adapter::registry;
use dbvc::config::Config;
use dbvc::{MigrationRunner, RevisionParser};

fn main() -> Result<()> {
    let config = Config::load();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(config.log_level.clone())
        .init();

    info!("dbvc v{}", env!("CARGO_PKG_VERSION"));

    let mode = config.run_mode();
    info!("Starting migration in {:?} mode (base version {})", mode, config.base_version);

    let mut runner = build_runner(&config)?;
    info!("Reading revisions from {}", runner.revisions_dir().display());

    match runner.run(mode, config.base_version) {
        Ok(report) => {
            if report.applied.is_empty() {
                info!("No revisions applied. DB is at version {}", report.reached_version);
            } else {
                info!(
                    "Successfully applied {} revision(s): {:?}",
                    report.applied.len(),
                    report.applied
                );
            }
            if !report.skipped.is_empty() {
                warn!("Skipped bad revision(s): {:?}", report.skipped);
            }
            Ok(())
        }
        Err(e) => {
            error!("Cannot continue, {}: {}", e.kind(), e);
            std::process::exit(1);
        }
    }
}

fn build_runner(config: &Config) -> Result<MigrationRunner> {
    let factory = registry::factory(&config.adapter)?;
    let parser = RevisionParser::new(factory.extension)?;
    let adapter = (factory.connect)(&config.connection_params())
        .with_context(|| format!("Failed to connect with the {} adapter", config.adapter))?;

    let runner = MigrationRunner::new(adapter, &config.revisions_dir, parser)?
        .with_tracking_table(config.tracking_table.clone())?
        .with_assume_yes(config.yes);
    Ok(runner)
}
