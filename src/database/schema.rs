use rusqlite::{Connection, Result};

/// Initialize the database schema with required tables
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    // Append-only log of detected transfers; no uniqueness on transaction_hash
    conn.execute(
        "CREATE TABLE IF NOT EXISTS tracking_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            transaction_hash TEXT NOT NULL,
            kind TEXT NOT NULL CHECK (kind IN ('native', 'erc20')),
            from_address TEXT NOT NULL,
            to_address TEXT NOT NULL,
            chain TEXT NOT NULL,
            token_address TEXT NOT NULL DEFAULT '',
            symbol TEXT NOT NULL,
            amount TEXT NOT NULL,
            created_at INTEGER DEFAULT (strftime('%s', 'now'))
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_tracking_events_hash ON tracking_events(transaction_hash)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_tracking_events_kind ON tracking_events(kind)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_tracking_events_symbol ON tracking_events(symbol)",
        [],
    )?;

    Ok(())
}
