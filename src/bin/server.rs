use clap::Parser;
use evm_transfer_tracker::api::ApiServer;
use evm_transfer_tracker::config::AppConfig;
use evm_transfer_tracker::database::Database;
use evm_transfer_tracker::logging::init_logging;
use std::sync::Arc;

/// Serve stored tracking events over HTTP without polling any chain
#[derive(Parser)]
#[command(name = "tracker-server")]
#[command(about = "HTTP API over stored EVM transfer tracking events")]
#[command(version)]
struct Args {
    /// Database path; defaults to the configured one
    #[arg(long)]
    database: Option<String>,

    /// Server port; defaults to the configured one
    #[arg(long)]
    port: Option<u16>,

    /// Bind address; defaults to the configured one
    #[arg(long)]
    host: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    let mut config = AppConfig::load_from_file()?;
    config.apply_env_overrides()?;
    init_logging(&config.logging)?;

    let db_path = args.database.unwrap_or(config.database.path);
    let host = args.host.unwrap_or(config.api.host);
    let port = args.port.unwrap_or(config.api.port);

    let database = Database::new(&db_path)
        .map_err(|e| format!("Failed to open database at '{}': {}", db_path, e))?;

    let server = ApiServer::new(Arc::new(database), &host, port);
    if let Err(e) = server.start().await {
        log::error!("Server failed: {}", e);
        return Err(e.into());
    }

    Ok(())
}
