//! circuitflow CLI entry point.

use anyhow::Result;
use clap::Parser;

use circuitflow::cli::commands;
use circuitflow::cli::{handle_error, AppContext, Cli, Commands};
use circuitflow::infrastructure::config::ConfigLoader;
use circuitflow::infrastructure::logging::LoggerImpl;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json_mode = cli.json;

    if let Err(err) = run(cli).await {
        handle_error(err, json_mode);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = ConfigLoader::load()?;
    let _logger = LoggerImpl::init(&config.logging)?;
    let actor = cli.actor();
    let json = cli.json;

    match cli.command {
        Commands::Init(args) => commands::init::execute(args, json).await,
        Commands::Circuit(args) => {
            let ctx = AppContext::open(&config, actor).await?;
            commands::circuit::execute(args, &ctx, json).await
        }
        Commands::Status(args) => {
            let ctx = AppContext::open(&config, actor).await?;
            commands::status::execute(args, &ctx, json).await
        }
        Commands::Step(args) => {
            let ctx = AppContext::open(&config, actor).await?;
            commands::step::execute(args, &ctx, json).await
        }
        Commands::Action(args) => {
            let ctx = AppContext::open(&config, actor).await?;
            commands::action::execute(args, &ctx, json).await
        }
        Commands::Document(args) => {
            let ctx = AppContext::open(&config, actor).await?;
            commands::document::execute(args, &ctx, json).await
        }
    }
}
