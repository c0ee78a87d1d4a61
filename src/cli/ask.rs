use anyhow::Result;
use clap::Args;

use atendente::agent::Agent;
use atendente::config::Config;

#[derive(Args)]
pub struct AskArgs {
    /// The question to send
    pub question: String,
}

pub async fn run(args: AskArgs, config: Config) -> Result<()> {
    let agent = Agent::new(&config)?;
    let mut session = agent.new_session();

    let resposta = agent.chat(&mut session, &args.question, None).await?;
    println!("{}", resposta);

    Ok(())
}
