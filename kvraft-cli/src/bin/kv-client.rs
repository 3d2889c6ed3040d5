//! kv-client - issue one put or get against a kvraft cluster.

use anyhow::Result;
use clap::{Parser, Subcommand};
use kvraft_cli::init_tracing;
use kvraft_client::Client;
use kvraft_core::parse_cluster;
use std::io::Write;
use std::time::Duration;

/// A demo client for the key-value server.
#[derive(Parser)]
#[command(name = "kv-client")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// IDs and addresses of all servers, as id:host:port
    #[arg(short, long, required = true, value_delimiter = ',')]
    cluster: Vec<String>,

    /// Timeout for the operation, in seconds
    #[arg(short, long, default_value_t = 3)]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Set a key to a value
    Put {
        /// Key to set
        #[arg(short, long)]
        key: String,

        /// Value to store
        #[arg(short, long)]
        value: String,
    },

    /// Read the value of a key
    Get {
        /// Key to read
        #[arg(short, long)]
        key: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing("warn")?;

    let members = parse_cluster(&cli.cluster)?;
    let mut client = Client::connect(&members)?;
    let timeout = Duration::from_secs(cli.timeout);

    let output = match cli.command {
        Commands::Put { key, value } => client.put(&key, &value, timeout).await?,
        Commands::Get { key } => client.get(&key, timeout).await?,
    };

    let mut stdout = std::io::stdout().lock();
    write!(stdout, "{}", output)?;
    stdout.flush()?;
    Ok(())
}
