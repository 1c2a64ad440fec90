//! Lantern light client.
//!
//! Syncs the current sync committee from a bootstrap committee through a
//! set of untrusted provers, then prints every new verified execution head.

use anyhow::{Context, Result};
use clap::Parser;
use lantern_client::{
    BeaconApiClient, Client, ClientConfig, EndpointTable, GenesisData, HttpOptimisticProver,
    HttpSuperlightProver, LightProver, LightSync, Network, OptimisticProver, OptimisticSync,
    RetryPolicy, StrategyKind, SuperlightProver, SuperlightSync, SyncStrategy, SystemClock,
    DEFAULT_BATCH_SIZE, DEFAULT_TREE_DEGREE,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Multi-prover Ethereum light client
#[derive(Parser, Debug)]
#[command(name = "lantern")]
#[command(version)]
#[command(about = "Ethereum light client that trusts none of its provers")]
struct Cli {
    /// Enable verbose logging (can be repeated for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Beacon network
    #[arg(long, env = "LANTERN_NETWORK", value_enum, default_value = "mainnet")]
    network: Network,

    /// Sync strategy
    #[arg(long, env = "LANTERN_STRATEGY", value_enum, default_value = "optimistic")]
    strategy: StrategyKind,

    /// Bootstrap file with the trusted committee
    #[arg(long, env = "LANTERN_GENESIS")]
    genesis: PathBuf,

    /// Prover base URLs (comma-separated). Defaults to the network's provers
    /// for the chosen strategy.
    #[arg(long = "prover", env = "LANTERN_PROVERS", value_delimiter = ',')]
    provers: Vec<String>,

    /// Beacon API used for chain heads and blocks
    #[arg(long, env = "LANTERN_BEACON_API")]
    beacon_api: Option<String>,

    /// Use only the first N configured provers
    #[arg(short = 'n', long)]
    max_provers: Option<usize>,

    /// Updates or hashes fetched per prover request
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: u64,

    /// Arity of the provers' committee-hash trees
    #[arg(long, default_value_t = DEFAULT_TREE_DEGREE)]
    tree_degree: usize,

    /// Seconds between polls
    #[arg(long, default_value_t = 13)]
    poll_interval: u64,

    /// Treat a rejected chain head as an error
    #[arg(long)]
    strict: bool,

    /// Sync, print the next verified head and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let genesis = GenesisData::load(&cli.genesis)
        .with_context(|| format!("failed to load bootstrap {}", cli.genesis.display()))?;
    let config = ClientConfig::for_network(cli.network, genesis, cli.max_provers);
    let endpoints = EndpointTable::defaults();

    let beacon_url = match &cli.beacon_api {
        Some(url) => url.clone(),
        None => endpoints
            .beacon_api(cli.network)
            .context("no beacon API configured")?
            .to_string(),
    };
    let prover_urls = if cli.provers.is_empty() {
        endpoints.provers(cli.strategy, cli.network)?.to_vec()
    } else {
        cli.provers.clone()
    };
    let prover_urls = config.select(&prover_urls).to_vec();

    info!(
        network = %cli.network,
        strategy = %cli.strategy,
        provers = prover_urls.len(),
        genesis_period = config.genesis_period(),
        "starting lantern"
    );

    let strategy = build_strategy(&cli, &config, &prover_urls);
    let beacon = Arc::new(BeaconApiClient::new(beacon_url));
    let clock = Arc::new(SystemClock::new(config.chain.clone()));
    let client = Arc::new(
        Client::new(config, strategy, clock, beacon.clone(), beacon).with_strict(cli.strict),
    );

    if cli.once {
        client.sync().await?;
        let info = client
            .get_next_valid_execution_info(RetryPolicy::default())
            .await?;
        println!("{} {}", info.block_number, info.block_hash_hex());
        return Ok(());
    }

    let subscription = client.subscribe(Duration::from_secs(cli.poll_interval), |info| async move {
        println!("{} {}", info.block_number, info.block_hash_hex());
    });

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    subscription.stop().await;
    Ok(())
}

fn build_strategy(cli: &Cli, config: &ClientConfig, urls: &[String]) -> Box<dyn SyncStrategy> {
    let chain = config.chain.clone();
    match cli.strategy {
        StrategyKind::Light => {
            let provers = urls
                .iter()
                .map(|url| Arc::new(BeaconApiClient::new(url.as_str())) as Arc<dyn LightProver>)
                .collect();
            Box::new(LightSync::new(chain, provers).with_batch_size(cli.batch_size))
        }
        StrategyKind::Optimistic => {
            let provers = urls
                .iter()
                .map(|url| {
                    Arc::new(HttpOptimisticProver::new(url.as_str())) as Arc<dyn OptimisticProver>
                })
                .collect();
            Box::new(OptimisticSync::new(chain, provers).with_batch_size(cli.batch_size))
        }
        StrategyKind::Superlight => {
            let provers = urls
                .iter()
                .map(|url| {
                    Arc::new(HttpSuperlightProver::new(url.as_str())) as Arc<dyn SuperlightProver>
                })
                .collect();
            Box::new(SuperlightSync::with_degree(chain, provers, cli.tree_degree))
        }
    }
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => "info",
        1 => "info,lantern_client=debug,lantern_core=debug",
        2 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(env_filter)
        .init();
}
