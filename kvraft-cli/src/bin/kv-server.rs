//! kv-server - run one member of a kvraft cluster.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kvraft_cli::{init_tracing, LOG_LEVELS};
use kvraft_core::parse_cluster;
use kvraft_server::{KvNode, NodeConfig};
use std::path::{Path, PathBuf};

/// A replicated key-value server.
#[derive(Parser)]
#[command(name = "kv-server")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// ID of this server
    #[arg(long)]
    id: u64,

    /// Directory for the raft log and snapshots
    #[arg(short, long, default_value = "data")]
    data: PathBuf,

    /// Log level
    #[arg(short, long, visible_alias = "logging", default_value = "debug", value_parser = LOG_LEVELS)]
    log: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new cluster with the given members
    Bootstrap {
        /// Member list as id:host:port, repeated or comma separated
        #[arg(short, long, required = true, value_delimiter = ',')]
        cluster: Vec<String>,
    },

    /// Run the server until interrupted
    Start {
        /// Address to serve on, host:port
        #[arg(short, long)]
        address: String,
    },
}

fn node_config(id: u64, address: &str, data: &Path) -> Result<NodeConfig> {
    NodeConfig::builder()
        .node_id(id)
        .listen_addr(address)
        .data_dir(data)
        .build()
        .map_err(anyhow::Error::msg)
        .context("Invalid server configuration")
}

async fn bootstrap(cli: &Cli, cluster: &[String]) -> Result<()> {
    let members = parse_cluster(cluster)?;
    let address = members
        .get(&cli.id)
        .with_context(|| format!("Server {} is not in the cluster", cli.id))?
        .clone();

    let mut node = KvNode::start(node_config(cli.id, &address, &cli.data)?).await?;
    let result = node.bootstrap(members).await;
    node.shutdown().await?;
    result?;

    tracing::info!(id = cli.id, "bootstrap complete");
    Ok(())
}

async fn start(cli: &Cli, address: &str) -> Result<()> {
    let mut node = KvNode::start(node_config(cli.id, address, &cli.data)?).await?;

    tokio::select! {
        signal = shutdown_signal() => {
            signal?;
            tracing::info!("shutdown signal received");
        }
        _ = node.halted() => {
            tracing::error!(id = cli.id, "server halted after a fatal error");
        }
    }

    let halted = node.is_halted();
    node.shutdown().await?;
    anyhow::ensure!(!halted, "server {} halted after a fatal error", cli.id);
    Ok(())
}

async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result?,
            _ = terminate.recv() => {}
        }
    }

    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log)?;

    match &cli.command {
        Commands::Bootstrap { cluster } => bootstrap(&cli, cluster).await,
        Commands::Start { address } => start(&cli, address).await,
    }
}
