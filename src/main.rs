//! clinrefine CLI entry point.

use anyhow::Context;
use clap::Parser;

use clinrefine::cli::{Cli, Commands};
use clinrefine::infrastructure::config::ConfigLoader;
use clinrefine::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = run(&cli).await;

    if let Err(err) = result {
        clinrefine::cli::handle_error(err, cli.json);
    }
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    let mut config = ConfigLoader::load(cli.config.as_deref()).context("Failed to load configuration")?;
    cli.command.apply_overrides(&mut config);
    if let Some(level) = &cli.log_level {
        config.logging.level.clone_from(level);
    }
    ConfigLoader::validate(&config).context("Invalid configuration after applying command-line flags")?;

    let _logger = LoggerImpl::init(&LogConfig::from(&config.logging)).context("Failed to initialize logging")?;

    match &cli.command {
        Commands::Run(_) => clinrefine::cli::commands::run::execute(&config, cli.json).await,
        Commands::Eval(args) => clinrefine::cli::commands::eval::execute(args, &config, cli.json).await,
        Commands::Health(_) => clinrefine::cli::commands::health::execute(&config, cli.json).await,
    }
}
