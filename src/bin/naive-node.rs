#![forbid(unsafe_code)]
//! naivechain node: joins the topics, validates incoming blocks and optionally mines.

use clap::{Parser, Subcommand};
use naivechain::config::{load_config_from, DEFAULT_CONFIG_PATH};
use naivechain::crypto::KeyPair;
use naivechain::node::{join_tasks, Node, Topics};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(author, version, about = "naivechain node", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Software version number
    Version,
    /// Run the node until SIGINT
    Run {
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Version => {
            println!("naivechain {}", env!("CARGO_PKG_VERSION"));
            println!("This is a naive implementation, do not use it.");
            Ok(())
        }
        Commands::Run { config } => run(&config).await,
    }
}

async fn run(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = load_config_from(config_path)?;
    info!(
        "Starting naivechain node (network_id = {}, difficulty = {})",
        config.network.network_id, config.miner.difficulty
    );

    let keypair = match &config.miner.key_path {
        Some(path) => KeyPair::load_or_generate(Path::new(path))?,
        None => KeyPair::generate(),
    };

    let topics = Topics::new(config.network.topic_capacity)?;
    let mining = config.miner.enabled;
    let node = Node::new(config, keypair, topics).await?;
    let mut handles = node.start().await?;
    if mining {
        handles.push(node.spawn_miner());
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    node.stop().await?;
    join_tasks(handles).await;
    Ok(())
}
