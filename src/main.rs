use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use evm_transfer_tracker::api::ApiServer;
use evm_transfer_tracker::blockchain::{
    BlockPoller, BlockProcessor, ChainClient, ChainContext, ReportedSender, RpcClient, SignerSet,
    TransferClassifier,
};
use evm_transfer_tracker::config::{AppConfig, ChainConfig};
use evm_transfer_tracker::database::Database;
use evm_transfer_tracker::logging::{init_logging, ErrorLogger, LogContext};
use evm_transfer_tracker::models::TrackedRegistry;
use evm_transfer_tracker::sink::{EventSink, TelegramNotifier};
use evm_transfer_tracker::TrackerError;
use serde_json::json;
use tokio::signal;
use tokio::task::JoinSet;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let config = AppConfig::load()?;
    init_logging(&config.logging)?;

    if let Err(e) = run(config).await {
        ErrorLogger::log_error(&e, Some(LogContext::new("tracker", "startup")));
        return Err(e.into());
    }
    Ok(())
}

async fn run(config: AppConfig) -> Result<(), TrackerError> {
    let context = LogContext::new("tracker", "startup")
        .with_metadata("chains", json!(config.chains.len()))
        .with_metadata("database", json!(config.database.path));
    context.info("Starting EVM transfer tracker");

    let database = Arc::new(Database::new(&config.database.path)?);
    let notifier = Arc::new(TelegramNotifier::from_config(&config.notification)?);
    let registry = Arc::new(TrackedRegistry::from_chains(&config.chains)?);

    let sink = config.chains.iter().fold(
        EventSink::new(database.clone(), notifier),
        |sink, chain| sink.with_symbol_overrides(&chain.name, chain.symbol_overrides()),
    );
    let sink = Arc::new(sink);

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_signal = Arc::clone(&shutdown);
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                log::info!("Received shutdown signal");
                shutdown_signal.store(true, Ordering::Relaxed);
            }
            Err(err) => {
                log::error!("Unable to listen for shutdown signal: {}", err);
            }
        }
    });

    // Dial every chain before polling any of them
    let mut pollers = Vec::with_capacity(config.chains.len());
    for chain in &config.chains {
        let poller = build_poller(&config, chain, &registry, &sink, &shutdown).await?;
        pollers.push(poller);
    }

    let api = if config.api.enabled {
        let server = ApiServer::new(database.clone(), &config.api.host, config.api.port);
        Some(tokio::spawn(async move {
            if let Err(e) = server.start().await {
                log::error!("API server stopped: {}", e);
            }
        }))
    } else {
        None
    };

    let mut tasks = JoinSet::new();
    for mut poller in pollers {
        tasks.spawn(async move {
            let chain = poller.chain().to_string();
            (chain, poller.run().await)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((chain, Ok(()))) => {
                LogContext::new("tracker", "poller_stopped")
                    .with_chain(&chain)
                    .info("Block poller stopped");
            }
            Ok((chain, Err(e))) => {
                ErrorLogger::log_error(
                    &TrackerError::Poller(e),
                    Some(LogContext::new("tracker", "poller_failed").with_chain(&chain)),
                );
            }
            Err(e) => log::error!("Block poller task panicked: {}", e),
        }
    }

    if let Some(handle) = api {
        handle.abort();
    }

    log::info!("All block pollers stopped, exiting");
    Ok(())
}

async fn build_poller(
    config: &AppConfig,
    chain: &ChainConfig,
    registry: &Arc<TrackedRegistry>,
    sink: &Arc<EventSink>,
    shutdown: &Arc<AtomicBool>,
) -> Result<BlockPoller, TrackerError> {
    let client = Arc::new(RpcClient::new_with_config(
        chain.rpc_url.clone(),
        config.rpc.timeout_seconds,
    )?);
    let chain_id = client.chain_id().await?;

    let (addresses, tokens) = registry
        .chain(&chain.name)
        .map(|t| (t.address_count(), t.token_count()))
        .unwrap_or_default();
    LogContext::new("tracker", "dial")
        .with_chain(&chain.name)
        .with_metadata("chain_id", json!(chain_id))
        .with_metadata("tracked_addresses", json!(addresses))
        .with_metadata("tracked_tokens", json!(tokens))
        .with_block_number(chain.start_block)
        .info(&format!("Connected to {} (chain id {})", chain.name, chain_id));

    let mut signers = SignerSet::standard();
    if chain.reported_sender_fallback {
        signers = signers.with_fallback(Arc::new(ReportedSender));
    }

    let client: Arc<dyn ChainClient> = client;
    let classifier = TransferClassifier::new(
        ChainContext {
            label: chain.name.clone(),
            chain_id,
            native_symbol: chain.native_symbol.clone(),
            token_decimals: chain.token_decimals(),
        },
        Arc::clone(registry),
        signers,
        Arc::clone(&client),
        Arc::clone(shutdown),
    )?;

    let processor = BlockProcessor::new(classifier, Arc::clone(sink), Arc::clone(shutdown));
    Ok(BlockPoller::new(
        client,
        processor,
        chain.start_block,
        Duration::from_secs(config.polling.not_found_delay_seconds),
        Arc::clone(shutdown),
    ))
}
