//! Shielded Pool Node CLI
//!
//! Run modes:
//!   shielded-pool-node serve     - Start the REST API over one pool
//!   shielded-pool-node inspect   - Print the persisted ledger summary
//!   shielded-pool-node config    - Print the effective configuration
//!
//! Configuration comes from `POOL_*` environment variables (and `.env`);
//! flags override them.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use shielded_pool_node::common::{self, NodeConfig, NodeError, StoreLocation};
use shielded_pool_node::api::{self, ApiOptions};
use shielded_pool_node::{open_store, CustodyBook, PoolService, RemoteVerifier};

#[derive(Parser)]
#[command(name = "shielded-pool-node")]
#[command(about = "Hosting node for a shielded asset pool")]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Commands,
}

/// Flags that override the environment
#[derive(Args)]
struct Overrides {
    /// Database file, or ":memory:"
    #[arg(long, global = true)]
    db_path: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit JSON log lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the API server
    Serve {
        /// Bind address (e.g., 127.0.0.1:8090)
        #[arg(short, long)]
        bind: Option<SocketAddr>,

        /// Proof verifier base URL
        #[arg(short, long)]
        verifier_url: Option<String>,

        /// Expose the custody credit endpoint (development only)
        #[arg(long)]
        dev_custody: bool,
    },

    /// Print the persisted ledger summary and exit
    Inspect,

    /// Print the effective configuration and exit
    Config,
}

impl Overrides {
    fn apply(&self, config: &mut NodeConfig) {
        if let Some(db_path) = &self.db_path {
            config.store = StoreLocation::parse(db_path);
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        if self.log_json {
            config.log_json = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let mut config = NodeConfig::from_env()?;
    cli.overrides.apply(&mut config);

    match cli.command {
        Commands::Serve {
            bind,
            verifier_url,
            dev_custody,
        } => {
            if let Some(bind) = bind {
                config.bind_addr = bind;
            }
            if let Some(url) = verifier_url {
                config.verifier_url = url;
            }
            if dev_custody {
                config.dev_custody = true;
            }
            common::init_from_config(&config)?;
            run_server(config).await?;
        }
        Commands::Inspect => {
            common::init_from_config(&config)?;
            inspect(&config).await?;
        }
        Commands::Config => config.print_summary(),
    }

    Ok(())
}

/// Open the pool from its store and serve it
async fn run_server(config: NodeConfig) -> Result<(), NodeError> {
    config.print_summary();

    let store = open_store(&config.store)?;
    let verifier = RemoteVerifier::new(
        &config.verifier_url,
        Duration::from_secs(config.verifier_timeout_secs),
        tokio::runtime::Handle::current(),
    )?;
    let custody = CustodyBook::new(config.custody_account);

    let service = PoolService::open(
        verifier,
        config.verification_keys.registry(),
        custody,
        store,
    )
    .await?;
    let summary = service.summary().await?;

    tracing::info!(
        target: "shielded_pool_node",
        root = %hex::encode(summary.root),
        next_index = summary.next_index,
        sequence = summary.sequence,
        bind = %config.bind_addr,
        "pool node starting"
    );

    let options = ApiOptions {
        dev_custody: config.dev_custody,
    };
    api::start_server(Arc::new(service), config.bind_addr, options).await?;
    Ok(())
}

/// Print what the store would restore
async fn inspect(config: &NodeConfig) -> Result<(), NodeError> {
    if let StoreLocation::Sqlite(path) = &config.store {
        if !path.exists() {
            println!("No ledger at {}", path.display());
            return Ok(());
        }
    }

    let store = open_store(&config.store)?;
    match store.load_snapshot().await? {
        Some(snapshot) => {
            println!("Root:        {}", hex::encode(snapshot.root));
            println!("Next index:  {}", snapshot.next_index);
            println!("Sequence:    {}", snapshot.sequence);
            println!("Tree nodes:  {}", snapshot.nodes.len());
            println!("Identifiers: {}", snapshot.identifiers.len());
            println!("Balances:    {}", store.load_balances().await?.len());
        }
        None => println!("Ledger is empty"),
    }
    Ok(())
}
