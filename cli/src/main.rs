//! ChainMirror CLI — run the mirror and read what it has stored.
//!
//! # Commands
//! ```text
//! chainmirror run     --config chainmirror.yaml
//! chainmirror status
//! chainmirror blocks  --chain eth --limit 10
//! chainmirror block   --chain eth 19000000
//! chainmirror tx      --chain btc <txid>
//! chainmirror txs     --chain btc --limit 25
//! chainmirror address --chain eth 0xabc... --limit 25
//! chainmirror balance --chain btc bc1q...
//! chainmirror info
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{error, info};

use chainmirror_core::{BlockRef, ChainId, ChainMirror, SyncConfig, SyncScheduler};
use chainmirror_storage::Backend;

mod config;
mod logging;

use config::AppConfig;

#[derive(Parser)]
#[command(
    name = "chainmirror",
    about = "Multi-chain block and transaction mirror",
    long_about = "
ChainMirror keeps a local copy of recent blocks and transactions for EVM and
Blockbook-backed UTXO chains, following each chain through reorgs.

ENVIRONMENT VARIABLES:
  CHAINMIRROR_CONFIG         Path to the YAML config file
  CHAINMIRROR_DATABASE_URL   Overrides database_url from the config
  RUST_LOG                   Overrides the configured log filter
",
    version
)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, global = true, env = "CHAINMIRROR_CONFIG", default_value = "chainmirror.yaml")]
    config: PathBuf,

    /// Storage URL: `memory`, `sqlite:<path>`, or `postgres://...`
    #[arg(long, global = true, env = "CHAINMIRROR_DATABASE_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mirror every configured chain until Ctrl-C
    Run,

    /// Show the stored cursor of every configured chain
    Status,

    /// Newest mirrored blocks
    Blocks {
        #[arg(long)]
        chain: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// One block with its transactions
    Block {
        #[arg(long)]
        chain: String,
        /// Block height or hash
        at: String,
    },

    /// One transaction by hash
    Tx {
        #[arg(long)]
        chain: String,
        hash: String,
    },

    /// Newest mirrored transactions
    Txs {
        #[arg(long)]
        chain: String,
        #[arg(long, default_value_t = 25)]
        limit: usize,
    },

    /// Mirrored transactions sent or received by an address
    Address {
        #[arg(long)]
        chain: String,
        address: String,
        #[arg(long, default_value_t = 25)]
        limit: usize,
    },

    /// Live balance of an address, read from the chain
    Balance {
        #[arg(long)]
        chain: String,
        address: String,
    },

    /// Show defaults and compiled-in backends
    Info,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(cli: Cli) -> Result<ExitCode> {
    if let Commands::Info = cli.command {
        cmd_info();
        return Ok(ExitCode::SUCCESS);
    }

    let mut config = load_config(&cli)?;
    if let Some(url) = &cli.database_url {
        config.database_url = url.clone();
    }
    logging::init_tracing(&config.log);

    match cli.command {
        Commands::Run => return cmd_run(&config).await,
        Commands::Status => cmd_status(&config).await?,
        Commands::Blocks { chain, limit } => {
            let store = open_store(&config).await?.query_store();
            print_json(&store.latest_blocks(&chain.into(), limit).await?)?;
        }
        Commands::Block { chain, at } => {
            let store = open_store(&config).await?.query_store();
            let at = match at.parse::<BlockRef>() {
                Ok(at) => at,
                Err(never) => match never {},
            };
            let block = store
                .block(&chain.into(), &at)
                .await?
                .with_context(|| format!("block {at} is not mirrored"))?;
            print_json(&block)?;
        }
        Commands::Tx { chain, hash } => {
            let store = open_store(&config).await?.query_store();
            let tx = store
                .transaction(&chain.into(), &hash)
                .await?
                .with_context(|| format!("transaction {hash} is not mirrored"))?;
            print_json(&tx)?;
        }
        Commands::Txs { chain, limit } => {
            let store = open_store(&config).await?.query_store();
            print_json(&store.latest_transactions(&chain.into(), limit).await?)?;
        }
        Commands::Address { chain, address, limit } => {
            let store = open_store(&config).await?.query_store();
            print_json(&store.address_transactions(&chain.into(), &address, limit).await?)?;
        }
        Commands::Balance { chain, address } => {
            let adapter = config.chain(&chain)?.adapter()?;
            let balance = adapter.balance(&address).await?;
            print_json(&serde_json::json!({
                "chain": chain,
                "address": address,
                "balance": balance,
            }))?;
        }
        Commands::Info => cmd_info(),
    }
    Ok(ExitCode::SUCCESS)
}

/// A missing config file is fine for read commands that get `--database-url`.
fn load_config(cli: &Cli) -> Result<AppConfig> {
    if cli.config.exists() {
        return AppConfig::load(&cli.config);
    }
    let reads_only = matches!(
        cli.command,
        Commands::Blocks { .. }
            | Commands::Block { .. }
            | Commands::Tx { .. }
            | Commands::Txs { .. }
            | Commands::Address { .. }
    );
    if reads_only && cli.database_url.is_some() {
        return Ok(AppConfig::default());
    }
    anyhow::bail!("config file {} not found", cli.config.display())
}

async fn open_store(config: &AppConfig) -> Result<Backend> {
    chainmirror_storage::open(&config.database_url)
        .await
        .with_context(|| format!("opening storage {}", config.database_url))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn cmd_run(config: &AppConfig) -> Result<ExitCode> {
    if config.chains.is_empty() {
        anyhow::bail!("no chains configured");
    }
    let backend = open_store(config).await?;

    let mut mirror = ChainMirror::new();
    for chain in &config.chains {
        let adapter = chain
            .adapter()
            .with_context(|| format!("building adapter for chain '{}'", chain.id))?;
        info!(chain = %chain.id, kind = %chain.kind, url = %chain.rpc_url, "chain configured");
        mirror = mirror.add(SyncScheduler::new(chain.sync.clone(), adapter, backend.chain_store()));
    }

    let running = mirror.spawn();
    let stop = running.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, finishing in-flight blocks");
            stop.shutdown();
        }
    });

    let mut failed = false;
    for report in running.join().await {
        match report.result {
            Ok(()) => info!(chain = %report.chain, "chain stopped"),
            Err(e) => {
                failed = true;
                error!(chain = %report.chain, error = %e, "chain failed");
            }
        }
    }
    Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}

#[derive(Serialize)]
struct StatusLine {
    chain: ChainId,
    cursor: Option<u64>,
    hash: Option<String>,
    updated_at: Option<i64>,
}

async fn cmd_status(config: &AppConfig) -> Result<()> {
    let store = open_store(config).await?.chain_store();
    let mut lines = Vec::with_capacity(config.chains.len());
    for chain in &config.chains {
        let id = ChainId::from(chain.id.as_str());
        let cursor = store.cursor(&id).await?;
        lines.push(StatusLine {
            chain: id,
            cursor: cursor.as_ref().map(|c| c.height),
            hash: cursor.as_ref().map(|c| c.hash.clone()),
            updated_at: cursor.as_ref().map(|c| c.updated_at),
        });
    }
    print_json(&lines)
}

fn cmd_info() {
    let defaults = SyncConfig::default();
    println!("ChainMirror v{}", env!("CARGO_PKG_VERSION"));
    println!("  Default backfill depth: {} blocks", defaults.backfill_depth);
    println!("  Default tx cap per block: {}", defaults.max_transactions_per_block);
    println!("  Default max reorg depth: {} blocks", defaults.max_reorg_depth);
    println!("  Default poll interval: {} ms", defaults.poll_interval_ms);
    let mut backends = vec!["memory", "sqlite"];
    if cfg!(feature = "postgres") {
        backends.push("postgres");
    }
    println!("  Storage backends: {}", backends.join(", "));
    println!("  Chains: account (EVM JSON-RPC), utxo (Blockbook)");
}
