use clap::{Parser, Subcommand};
use std::sync::Arc;
use thiserror::Error;

use crate::config::AppConfig;
use crate::database::{Database, DbError, EventRow};

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),
    #[error("CLI operation failed: {0}")]
    Operation(String),
}

/// Maintenance commands for stored tracking events
#[derive(Parser, Debug)]
#[command(name = "tracker-cli")]
#[command(about = "Query and maintain stored EVM transfer tracking events")]
#[command(version)]
pub struct Cli {
    /// Database path; defaults to the configured one
    #[arg(long, global = true)]
    pub database: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// List stored events page by page
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 10)]
        page_size: u32,
    },
    /// Events matching a kind or a symbol
    Search {
        #[arg(long)]
        kind: Option<String>,
        #[arg(long)]
        symbol: Option<String>,
    },
    /// Delete every event of a transaction
    Delete {
        transaction_hash: String,
    },
    /// Number of stored events
    Status,
    /// Print a sample configuration file
    SampleConfig,
}

pub struct CliHandler {
    database: Arc<Database>,
}

impl CliHandler {
    pub fn new(database: Arc<Database>) -> Self {
        Self { database }
    }

    pub fn list(&self, page: u32, page_size: u32) -> Result<Vec<EventRow>, CliError> {
        if page == 0 || page_size == 0 {
            return Err(CliError::Operation("page and page size must be positive".to_string()));
        }
        Ok(self.database.list_events(page, page_size)?)
    }

    pub fn search(&self, kind: Option<&str>, symbol: Option<&str>) -> Result<Vec<EventRow>, CliError> {
        Ok(self.database.search_events(kind, symbol)?)
    }

    pub fn delete(&self, transaction_hash: &str) -> Result<usize, CliError> {
        Ok(self.database.delete_by_transaction_hash(transaction_hash)?)
    }

    pub fn status(&self) -> Result<u64, CliError> {
        Ok(self.database.event_count()?)
    }

    pub fn execute_command(&self, command: &Commands) -> Result<(), CliError> {
        match command {
            Commands::List { page, page_size } => {
                let rows = self.list(*page, *page_size)?;
                let total = self.status()?;
                print_rows(&rows);
                println!("Page {} ({} per page), {} events total", page, page_size, total);
            }
            Commands::Search { kind, symbol } => {
                let rows = self.search(kind.as_deref(), symbol.as_deref())?;
                if rows.is_empty() {
                    println!("No matching events");
                } else {
                    print_rows(&rows);
                }
            }
            Commands::Delete { transaction_hash } => match self.delete(transaction_hash) {
                Ok(deleted) => println!("Deleted {} event(s) for {}", deleted, transaction_hash),
                Err(CliError::Database(DbError::NotFound)) => {
                    println!("No events stored for {}", transaction_hash)
                }
                Err(e) => return Err(e),
            },
            Commands::Status => {
                println!("Stored events: {}", self.status()?);
            }
            Commands::SampleConfig => {
                let sample = AppConfig::generate_sample_config()
                    .map_err(|e| CliError::Operation(e.to_string()))?;
                println!("{}", sample);
            }
        }
        Ok(())
    }
}

fn print_rows(rows: &[EventRow]) {
    println!(
        "{:<6} {:<10} {:<7} {:<10} {:>24}  {:<66} {:<42} {:<42}",
        "ID", "CHAIN", "KIND", "SYMBOL", "AMOUNT", "TRANSACTION", "FROM", "TO"
    );
    for row in rows {
        println!(
            "{:<6} {:<10} {:<7} {:<10} {:>24}  {:<66} {:<42} {:<42}",
            row.id,
            row.chain,
            row.kind,
            row.symbol,
            row.amount,
            row.transaction_hash,
            row.from_address,
            row.to_address
        );
    }
}
