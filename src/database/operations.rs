use rusqlite::{params, params_from_iter, Connection, Row};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use thiserror::Error;
use crate::database::schema::initialize_schema;
use crate::logging::MetricsLogger;
use crate::models::TrackingEvent;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database connection failed: {0}")]
    Connection(#[from] rusqlite::Error),
    #[error("Database operation failed: {0}")]
    Operation(String),
    #[error("Tracking event not found")]
    NotFound,
}

/// SQLite-backed event store. Cloning shares the same connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

const EVENT_COLUMNS: &str =
    "id, transaction_hash, kind, from_address, to_address, chain, token_address, symbol, amount, created_at";

impl Database {
    /// Create a new database connection and initialize schema
    pub fn new(db_path: &str) -> Result<Self, DbError> {
        let conn = Connection::open(db_path)?;
        initialize_schema(&conn)?;

        Ok(Database {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory database for testing
    pub fn new_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;

        Ok(Database {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, DbError> {
        self.conn
            .lock()
            .map_err(|_| DbError::Operation("Failed to acquire lock".to_string()))
    }

    /// Append one tracking event
    pub fn insert_event(&self, event: &TrackingEvent) -> Result<i64, DbError> {
        let started = Instant::now();
        let conn = self.lock()?;

        conn.execute(
            "INSERT INTO tracking_events (transaction_hash, kind, from_address, to_address, chain, token_address, symbol, amount)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                event.transaction_hash,
                event.kind.as_str(),
                event.from,
                event.to,
                event.chain,
                event.token,
                event.symbol,
                event.amount,
            ],
        )?;
        let id = conn.last_insert_rowid();

        MetricsLogger::log_database_operation("INSERT", started.elapsed().as_millis() as u64, Some(1));
        Ok(id)
    }

    /// Get total number of stored events
    pub fn event_count(&self) -> Result<u64, DbError> {
        let conn = self.lock()?;

        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM tracking_events",
            [],
            |row| row.get(0),
        )?;

        Ok(count)
    }

    /// One page of events in insertion order; `page` is 1-based
    pub fn list_events(&self, page: u32, page_size: u32) -> Result<Vec<EventRow>, DbError> {
        if page == 0 || page_size == 0 {
            return Err(DbError::Operation(format!(
                "Invalid pagination: page={}, page_size={}",
                page, page_size
            )));
        }
        let offset = u64::from(page - 1) * u64::from(page_size);

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM tracking_events ORDER BY id LIMIT ?1 OFFSET ?2",
            EVENT_COLUMNS
        ))?;

        let rows = stmt.query_map(params![page_size, offset], EventRow::from_row)?;
        let mut events = Vec::new();
        for row in rows {
            events.push(row?);
        }

        Ok(events)
    }

    /// Events whose kind OR symbol match (case-insensitive). No filter returns everything.
    pub fn search_events(&self, kind: Option<&str>, symbol: Option<&str>) -> Result<Vec<EventRow>, DbError> {
        let mut clauses = Vec::new();
        let mut values: Vec<String> = Vec::new();

        if let Some(kind) = kind.map(str::trim).filter(|k| !k.is_empty()) {
            values.push(kind.to_lowercase());
            clauses.push(format!("lower(kind) = ?{}", values.len()));
        }
        if let Some(symbol) = symbol.map(str::trim).filter(|s| !s.is_empty()) {
            values.push(symbol.to_lowercase());
            clauses.push(format!("lower(symbol) = ?{}", values.len()));
        }

        let sql = if clauses.is_empty() {
            format!("SELECT {} FROM tracking_events ORDER BY id", EVENT_COLUMNS)
        } else {
            format!(
                "SELECT {} FROM tracking_events WHERE {} ORDER BY id",
                EVENT_COLUMNS,
                clauses.join(" OR ")
            )
        };

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), EventRow::from_row)?;

        let mut events = Vec::new();
        for row in rows {
            events.push(row?);
        }

        Ok(events)
    }

    /// Delete every event of a transaction; the hash is matched case-insensitively
    pub fn delete_by_transaction_hash(&self, transaction_hash: &str) -> Result<usize, DbError> {
        let started = Instant::now();
        let conn = self.lock()?;

        let rows_affected = conn.execute(
            "DELETE FROM tracking_events WHERE lower(transaction_hash) = lower(?1)",
            params![transaction_hash.trim()],
        )?;

        MetricsLogger::log_database_operation("DELETE", started.elapsed().as_millis() as u64, Some(rows_affected));

        if rows_affected == 0 {
            return Err(DbError::NotFound);
        }

        Ok(rows_affected)
    }
}

/// Represents a row from the tracking_events table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRow {
    pub id: i64,
    pub transaction_hash: String,
    pub kind: String,
    pub from_address: String,
    pub to_address: String,
    pub chain: String,
    pub token_address: String,
    pub symbol: String,
    pub amount: String,
    pub created_at: u64,
}

impl EventRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(EventRow {
            id: row.get(0)?,
            transaction_hash: row.get(1)?,
            kind: row.get(2)?,
            from_address: row.get(3)?,
            to_address: row.get(4)?,
            chain: row.get(5)?,
            token_address: row.get(6)?,
            symbol: row.get(7)?,
            amount: row.get(8)?,
            created_at: row.get(9)?,
        })
    }
}
