//! Sawmill - carve embedded files out of raw images by header/footer
//! signature.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sawmill::cli::{self, Cli, Commands};
use sawmill::Config;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load(),
    };

    init_logging(&cli, &config)?;

    match &cli.command {
        Commands::Carve(args) => cli::run_carve(args, &config)?,
        Commands::Scan(args) => cli::run_scan(args, &config)?,
        Commands::Signatures(args) => cli::run_signatures(args, &config)?,
        Commands::Config(args) => cli::run_config(args, &config, cli.config.as_deref())?,
    }

    Ok(())
}

/// Logs go to stderr so reports on stdout stay machine-readable
fn init_logging(cli: &Cli, config: &Config) -> Result<()> {
    let level = if cli.verbose {
        "debug"
    } else {
        config.general.log_level.as_str()
    };
    let filter = EnvFilter::from_default_env().add_directive(format!("sawmill={level}").parse()?);

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(false).compact().with_writer(std::io::stderr))
            .with(filter)
            .init();
    }

    Ok(())
}
