use clap::Parser;
use tracing::error;

use confluence_watch::cli::commands;
use confluence_watch::cli::Cli;
use confluence_watch::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("confluence_watch=info".parse().unwrap()),
        )
        .with_target(true)
        .with_line_number(true)
        .init();

    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        confluence_watch::cli::Commands::Run => commands::run(&config).await,
        confluence_watch::cli::Commands::Status => commands::status(&config).await,
        confluence_watch::cli::Commands::ShowConfig => commands::show_config(&config),
        confluence_watch::cli::Commands::Watchlist => commands::watchlist(&config).await,
    };

    if let Err(e) = result {
        error!("command failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
