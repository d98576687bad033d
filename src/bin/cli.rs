use clap::Parser;
use evm_transfer_tracker::api::{Cli, CliHandler};
use evm_transfer_tracker::config::AppConfig;
use evm_transfer_tracker::database::Database;
use std::sync::Arc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // The CLI only needs the database path, so chain settings are not validated here
    let db_path = match cli.database.clone() {
        Some(path) => path,
        None => {
            let mut config = AppConfig::load_from_file().unwrap_or_default();
            if let Err(e) = config.apply_env_overrides() {
                log::warn!("Ignoring environment overrides: {}", e);
            }
            config.database.path
        }
    };

    let database = match Database::new(&db_path) {
        Ok(db) => Arc::new(db),
        Err(e) => {
            eprintln!("Failed to open database at '{}': {}", db_path, e);
            std::process::exit(1);
        }
    };

    let handler = CliHandler::new(database);
    if let Err(e) = handler.execute_command(&cli.command) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
