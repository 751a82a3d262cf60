use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use dbannounce::config::Config;
use dbannounce::node::{self, NodeSet, Role};
use dbannounce::{Announcer, Databases};

/// Serve the in-memory databases of a simulated network over TCP and print
/// where to find them.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// TCP port for the database server (overrides the config file)
    #[arg(short, long, env = "DBANNOUNCE_PORT")]
    port: Option<u16>,

    /// Only accept connections from loopback
    #[arg(long)]
    local_only: bool,

    /// Organisation name of the notary node
    #[arg(long, default_value = "Notary")]
    notary: String,

    /// Organisation name of a party node; repeat for more parties
    #[arg(long = "party")]
    parties: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if args.local_only {
        config.server.allow_others = false;
    }

    dbannounce::logging::init(&config.log).map_err(anyhow::Error::msg)?;

    let databases = Arc::new(Databases::new());
    let notary = node::provision(&databases, &args.notary, Role::Notary)?;
    let parties = args
        .parties
        .iter()
        .map(|org| node::provision(&databases, org, Role::Party))
        .collect::<Result<Vec<_>, _>>()?;
    let nodes = NodeSet::new(notary, parties);

    let announcer = Announcer::start(&nodes, &config.server, databases).await?;

    let release = announcer.release_handle();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("interrupt received"),
            Err(e) => warn!(error = %e, "cannot listen for interrupts, exiting"),
        }
        release.release();
    });

    announcer.block().await;
    announcer.stop().await;
    Ok(())
}
