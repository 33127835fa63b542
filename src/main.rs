//! Constraint advisor CLI entry point.

use clap::Parser;

use constraint_advisor::cli::{commands, handle_error, Cli, Commands};
use constraint_advisor::infrastructure::config::ConfigLoader;
use constraint_advisor::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match ConfigLoader::load() {
        Ok(config) => config,
        Err(err) => handle_error(err, cli.json),
    };

    let _logger = match LoggerImpl::init(&LogConfig::from(&config.logging)) {
        Ok(logger) => logger,
        Err(err) => handle_error(err, cli.json),
    };

    let result = match cli.command {
        Commands::Init(args) => commands::init::execute(args, &config, cli.json).await,
        Commands::Session(args) => commands::session::execute(args, &config, cli.json).await,
        Commands::Rules(args) => commands::rules::execute(args, &config, cli.json),
    };

    if let Err(err) = result {
        handle_error(err, cli.json);
    }
}
