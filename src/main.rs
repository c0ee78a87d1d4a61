use anyhow::Result;
use clap::Parser;

mod cli;

use atendente::config::Config;
use cli::{Cli, Commands};

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;

    let log_level = if cli.verbose {
        "debug".to_string()
    } else {
        config.logging.level.clone()
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    match cli.command {
        Some(Commands::Ask(args)) => cli::ask::run(args, config).await,
        Some(Commands::Serve(args)) => cli::serve::run(args, config).await,
        None => {
            cli::serve::run(
                cli::serve::ServeArgs {
                    port: std::env::var("PORT").ok().and_then(|p| p.parse().ok()),
                },
                config,
            )
            .await
        }
    }
}
