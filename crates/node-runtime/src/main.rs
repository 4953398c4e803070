//! Rumchain node process: loads a peer's persisted options, reloads its
//! groups, and idles until interrupted.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use node_runtime::Node;
use tracing::info;

/// Run a Rumchain node.
#[derive(Parser, Debug)]
#[command(name = "node-runtime")]
#[command(about = "Runs a Rumchain group-chain node")]
struct Args {
    /// Directory holding `<peername>_options.toml`.
    #[arg(short, long, default_value = "./data")]
    config_dir: PathBuf,

    /// This node's peer name; selects which options file to load.
    #[arg(short, long, default_value = "default")]
    peername: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    std::fs::create_dir_all(&args.config_dir)?;

    let node = Node::start(&args.config_dir, &args.peername).await?;
    info!(
        peername = %args.peername,
        groups = node.groups.group_ids().len(),
        "node started"
    );

    info!("node is running, press ctrl+c to stop");
    tokio::signal::ctrl_c().await?;
    info!("shutting down");

    Ok(())
}
