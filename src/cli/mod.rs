pub mod ask;
pub mod serve;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "atendente", version, about = "Assistente de atendimento e vendas para uma empresa de pagamentos")]
pub struct Cli {
    /// Path to the TOML config file (default: atendente.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP chat server (default)
    Serve(serve::ServeArgs),
    /// Ask a single question from the terminal
    Ask(ask::AskArgs),
}
