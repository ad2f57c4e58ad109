use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use wr_cli::{cmd_check, cmd_replay};
use wr_config::RulesConfig;
use wr_runtime::lifecycle::{Reactor, wait_for_signal};
use wr_runtime::tracing_init::init_tracing;

#[derive(Parser)]
#[command(name = "workrules", about = "Work item rules engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the rules engine server
    Run {
        /// Path to workrules.toml config file
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Validate a config file and print a summary
    Check {
        /// Path to workrules.toml config file
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Replay captured event envelopes through the engine offline
    Replay {
        /// Path to workrules.toml config file
        #[arg(short, long)]
        config: PathBuf,

        /// JSONL file of event envelopes
        #[arg(short, long)]
        events: PathBuf,

        /// JSONL seed file overriding the config's store seed
        #[arg(long)]
        seed: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => run_server(config).await?,
        Commands::Check { config } => cmd_check::run(config)?,
        Commands::Replay {
            config,
            events,
            seed,
        } => cmd_replay::run(config, events, seed)?,
    }

    Ok(())
}

async fn run_server(config: PathBuf) -> Result<()> {
    let config_path = config
        .canonicalize()
        .map_err(|e| anyhow::anyhow!("config path '{}': {e}", config.display()))?;
    let rules_config = RulesConfig::load(&config_path)?;
    let base_dir = config_path
        .parent()
        .expect("config path must have a parent directory");

    let _guard = init_tracing(&rules_config.logging, base_dir)?;

    let reactor = Reactor::start(rules_config, base_dir)
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    tracing::info!(domain = "sys", listen = %reactor.listen_addr(), "workrules reactor started");

    wait_for_signal(reactor.cancel_token()).await;
    reactor.shutdown();
    reactor.wait().await.map_err(|e| anyhow::anyhow!("{e}"))?;
    Ok(())
}
