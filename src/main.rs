//! Remedy CLI entry point.

use anyhow::Result;
use clap::Parser;

use remedy::cli::{self, Cli, Commands};
use remedy::infrastructure::config::ConfigLoader;
use remedy::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json = cli.json;

    if let Err(err) = run(cli).await {
        cli::handle_error(err, json);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };
    let _logger = LoggerImpl::init(&LogConfig::from(&config.logging))?;

    match cli.command {
        Commands::Route(args) => cli::commands::route::execute(args, &config, cli.json).await,
        Commands::Learned(args) => cli::commands::learned::execute(args, &config, cli.json).await,
        Commands::AntiPatterns(args) => {
            cli::commands::anti_patterns::execute(args, &config, cli.json).await
        }
        Commands::Mode(args) => cli::commands::mode::execute(args, &config, cli.json).await,
    }
}
