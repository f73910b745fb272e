use std::env;
use std::path::PathBuf;
use std::time::Duration;

use btc_mirror::config::{MirrorConfig, Network};
use btc_mirror::mirror::BtcMirror;
use btc_mirror::net::rpc::RpcClient;
use btc_mirror::store::file::FileStore;
use btc_mirror::sync::{sync_chain, sync_once};
use clap::{Parser, Subcommand};
use colored::*;
use figlet_rs::FIGfont;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_STORE_PATH: &str = "./data/mirror.jsonl";

fn print_banner() {
    let rule = "═══════════════════════════════════════════════════════════════════════════════";
    println!("{}", rule.bright_magenta());
    let font = FIGfont::standard().ok();
    match font.as_ref().and_then(|font| font.convert("BTC Mirror")) {
        Some(figure) => println!("{}", figure.to_string().bright_cyan().bold()),
        None => println!("{}", "BTC Mirror".bright_cyan().bold()),
    }
    println!("{}", rule.bright_magenta());
    println!("{}", "Bitcoin header-chain mirror • payment verification".bright_yellow());
    println!("{}", rule.bright_magenta());
    println!();
}

#[derive(Parser, Debug)]
#[command(name = "btc-mirror")]
#[command(about = "Bitcoin header-chain mirror and payment verifier", long_about = None)]
struct Args {
    /// JSON config with the network and genesis anchor
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Network rules to enforce when no config file is given
    #[arg(short, long, value_enum, default_value_t = Network::Mainnet)]
    network: Network,

    /// Maximum number of headers per submission
    #[arg(long, default_value_t = 500)]
    batch_size: u32,

    /// Seconds to wait between polls once caught up
    #[arg(long, default_value_t = 30)]
    poll_secs: u64,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Follow the node and mirror its best chain (default)
    Sync {
        /// Relay a single batch and exit
        #[arg(long)]
        once: bool,
    },
    /// Print the mirrored tip and exit
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    print_banner();

    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = match &args.config {
        Some(path) => MirrorConfig::from_json_file(path)?,
        None => MirrorConfig::for_network(args.network),
    };

    let store_path =
        env::var("BTC_MIRROR_STORE").unwrap_or_else(|_| DEFAULT_STORE_PATH.to_string());
    let store = FileStore::new(store_path)?;
    info!(path = %store.path().display(), "opened commit log");
    let mirror = BtcMirror::open(config, store)?;
    info!(
        network = ?mirror.network(),
        anchor = mirror.genesis().height,
        tip = mirror.get_latest_block_height(),
        "mirror ready"
    );

    match args.command.unwrap_or(Command::Sync { once: false }) {
        Command::Status => {
            let tip = mirror.get_latest_block_height();
            println!("{} {}", "tip height:".bright_green(), tip);
            println!("{} {}", "tip hash:  ".bright_green(), mirror.get_block_hash(tip));
            println!("{} {}", "tip time:  ".bright_green(), mirror.get_latest_block_time());
        }
        Command::Sync { once } => {
            let url = env::var("BITCOIN_RPC_URL").map_err(|_| "BITCOIN_RPC_URL must be set")?;
            let client = RpcClient::new(&url)?;
            if once {
                let events = sync_once(&client, &mirror, args.batch_size).await?;
                info!(events = events.len(), tip = mirror.get_latest_block_height(), "batch done");
            } else {
                sync_chain(
                    &client,
                    &mirror,
                    args.batch_size,
                    Duration::from_secs(args.poll_secs),
                )
                .await?;
            }
        }
    }

    Ok(())
}
