use anyhow::Result;
use clap::Args;

use atendente::config::Config;
use atendente::server::Server;

#[derive(Args)]
pub struct ServeArgs {
    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "PORT")]
    pub port: Option<u16>,
}

pub async fn run(args: ServeArgs, mut config: Config) -> Result<()> {
    if let Some(port) = args.port {
        config.server.port = port;
    }

    Server::new(&config).run().await
}
