use std::sync::Arc;

use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::watch;

use rotabot::api::router::create_router;
use rotabot::chain::EvmChainClient;
use rotabot::config::{AppConfig, LogFormat};
use rotabot::execution::{RotationScheduler, RotationStore};
use rotabot::models::{AccountPool, FundingAccount};
use rotabot::services::preflight::run_preflight;
use rotabot::OpsState;

#[derive(Parser, Debug)]
#[command(name = "rotabot", version, about = "Rotating-account contract action scheduler")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Run the rotation scheduler (default)
    Run,
    /// Verify chain, funding account, contract and worker balances, then exit
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(LogFormat::from_str(
        &std::env::var("LOG_FORMAT").unwrap_or_default(),
    ));

    let config = AppConfig::from_env()?;
    let funder = FundingAccount {
        address: config.admin_address(),
    };
    let pool = AccountPool::new(&config.worker_addresses(), &funder)?;

    tracing::info!(
        admin = %funder.address,
        workers = pool.len(),
        contract = %config.contract,
        "Configuration loaded"
    );

    let chain = EvmChainClient::connect(
        &config.rpc_url,
        config.expected_chain_id,
        &config.admin,
        &config.workers,
    )
    .await?;

    if let Some(Command::Check) = cli.command {
        run_preflight(&chain, &funder, &pool, config.contract).await?;
        tracing::info!("Preflight check passed");
        return Ok(());
    }

    let metrics_handle = rotabot::metrics::init_metrics()?;

    let rng = match config.rng_seed {
        Some(seed) => {
            tracing::info!(seed, "Using seeded RNG");
            StdRng::seed_from_u64(seed)
        }
        None => StdRng::from_os_rng(),
    };

    let mut scheduler = RotationScheduler::new(
        Arc::new(chain),
        pool.clone(),
        funder,
        config.scheduler_config(),
        rng,
    );
    if let Some(path) = &config.state_file {
        let store = RotationStore::new(path);
        let state = store.load(pool.len()).await?;
        scheduler = scheduler.with_state(state).with_store(store);
    }

    // --- Ops HTTP server ---
    if config.ops_enabled {
        let state = OpsState {
            status: scheduler.subscribe(),
            pause_flag: scheduler.pause_flag(),
            metrics_handle,
            api_token: config.api_token.clone(),
        };
        let addr = format!("{}:{}", config.host, config.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        tracing::info!("Ops server listening on {addr}");
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, create_router(state)).await {
                tracing::error!(error = %e, "Ops server stopped");
            }
        });
    } else {
        tracing::info!("Ops server disabled (OPS_ENABLED=false)");
    }

    // --- Shutdown on Ctrl-C, observed between cycles ---
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Ctrl-C received, finishing current cycle");
                shutdown_tx.send_replace(true);
                // Keep the sender alive until the scheduler has observed it.
                std::future::pending::<()>().await;
            }
            Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl-C"),
        }
    });

    let final_state = scheduler.run(shutdown_rx).await;
    tracing::info!(
        cycles_completed = final_state.cycles_completed,
        next_index = final_state.current_index,
        "Scheduler stopped"
    );

    Ok(())
}

fn init_tracing(format: LogFormat) {
    use tracing_subscriber::{fmt, EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(fmt::layer()).init(),
    }
}
