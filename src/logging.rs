use log::Level;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::io::Write;
use std::time::Instant;

use crate::config::LoggingConfig;
use crate::error::{ErrorSeverity, TrackerError};

/// Structured log line: component, operation and sorted metadata rendered as one JSON object
pub struct LogContext {
    pub component: String,
    pub operation: String,
    pub metadata: BTreeMap<String, Value>,
}

impl LogContext {
    pub fn new(component: &str, operation: &str) -> Self {
        Self {
            component: component.to_string(),
            operation: operation.to_string(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    pub fn with_chain(self, chain: &str) -> Self {
        self.with_metadata("chain", json!(chain))
    }

    pub fn with_block_number(self, block_number: u64) -> Self {
        self.with_metadata("block_number", json!(block_number))
    }

    pub fn with_transaction_hash(self, tx_hash: &str) -> Self {
        self.with_metadata("transaction_hash", json!(tx_hash))
    }

    pub fn with_address(self, address: &str) -> Self {
        self.with_metadata("address", json!(address))
    }

    pub fn with_duration_ms(self, duration_ms: u64) -> Self {
        self.with_metadata("duration_ms", json!(duration_ms))
    }

    fn render(&self, level: Level, message: &str) -> String {
        let mut entry = Map::new();
        entry.insert(
            "timestamp".to_string(),
            json!(chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)),
        );
        entry.insert("level".to_string(), json!(level.as_str()));
        entry.insert("component".to_string(), json!(self.component));
        entry.insert("operation".to_string(), json!(self.operation));
        entry.insert("message".to_string(), json!(message));
        for (key, value) in &self.metadata {
            entry.entry(key.clone()).or_insert_with(|| value.clone());
        }
        Value::Object(entry).to_string()
    }

    fn emit(&self, level: Level, message: &str) {
        if log::log_enabled!(level) {
            log::log!(level, "{}", self.render(level, message));
        }
    }

    pub fn info(&self, message: &str) {
        self.emit(Level::Info, message);
    }

    pub fn warn(&self, message: &str) {
        self.emit(Level::Warn, message);
    }

    pub fn error(&self, message: &str) {
        self.emit(Level::Error, message);
    }

    pub fn debug(&self, message: &str) {
        self.emit(Level::Debug, message);
    }

    pub fn trace(&self, message: &str) {
        self.emit(Level::Trace, message);
    }
}

/// Wall-clock timer for one chain-client call
pub struct PerformanceMonitor {
    started: Instant,
    operation: String,
}

impl PerformanceMonitor {
    pub fn new(operation: &str) -> Self {
        Self {
            started: Instant::now(),
            operation: operation.to_string(),
        }
    }

    /// Logs the outcome and returns the elapsed milliseconds
    pub fn finish_with_result<T, E>(self, result: &Result<T, E>) -> u64
    where
        E: std::fmt::Display,
    {
        let duration = self.started.elapsed().as_millis() as u64;
        let context = LogContext::new("performance", &self.operation).with_duration_ms(duration);

        match result {
            Ok(_) => context.trace(&format!("Completed in {}ms", duration)),
            Err(e) => context
                .with_metadata("error", json!(e.to_string()))
                .debug(&format!("Failed after {}ms: {}", duration, e)),
        }

        duration
    }
}

pub struct ErrorLogger;

impl ErrorLogger {
    /// Log at a level derived from the error's severity
    pub fn log_error(error: &TrackerError, context: Option<LogContext>) {
        let severity = error.severity();
        let context = context
            .unwrap_or_else(|| LogContext::new("tracker", "error"))
            .with_metadata("severity", json!(format!("{:?}", severity)));

        let message = error.to_string();
        match severity {
            ErrorSeverity::Critical | ErrorSeverity::High => context.error(&message),
            ErrorSeverity::Medium => context.warn(&message),
            ErrorSeverity::Low => context.info(&message),
        }
    }
}

/// Counters and timings emitted as structured log lines
pub struct MetricsLogger;

impl MetricsLogger {
    pub fn log_block_processed(chain: &str, block_number: u64, event_count: u32, processing_time_ms: u64) {
        LogContext::new("metrics", "block_processed")
            .with_chain(chain)
            .with_block_number(block_number)
            .with_metadata("event_count", json!(event_count))
            .with_duration_ms(processing_time_ms)
            .info(&format!("Block {} processed with {} events", block_number, event_count));
    }

    pub fn log_event_dispatched(chain: &str, tx_hash: &str, kind: &str, persisted: bool, notified: bool) {
        let context = LogContext::new("metrics", "event_dispatched")
            .with_chain(chain)
            .with_transaction_hash(tx_hash)
            .with_metadata("kind", json!(kind))
            .with_metadata("persisted", json!(persisted))
            .with_metadata("notified", json!(notified));

        if persisted && notified {
            context.info(&format!("Dispatched {} transfer", kind));
        } else {
            context.warn(&format!("Dispatched {} transfer partially", kind));
        }
    }

    pub fn log_rpc_call(method: &str, duration_ms: u64, success: bool) {
        let context = LogContext::new("metrics", "rpc_call")
            .with_metadata("method", json!(method))
            .with_metadata("success", json!(success))
            .with_duration_ms(duration_ms);

        if success {
            context.debug(&format!("{} took {}ms", method, duration_ms));
        } else {
            context.warn(&format!("{} failed after {}ms", method, duration_ms));
        }
    }

    pub fn log_database_operation(operation: &str, duration_ms: u64, rows_affected: Option<usize>) {
        let mut context = LogContext::new("metrics", "database_operation")
            .with_metadata("statement", json!(operation))
            .with_duration_ms(duration_ms);
        if let Some(rows) = rows_affected {
            context = context.with_metadata("rows_affected", json!(rows));
        }
        context.debug(&format!("{} took {}ms", operation, duration_ms));
    }
}

/// Install the global logger.
///
/// `RUST_LOG` still wins over the configured level when set. Lines produced by
/// `LogContext` are already JSON; `pretty` re-indents them, `json` passes them through and
/// wraps plain `log!` lines into the same shape.
pub fn init_logging(config: &LoggingConfig) -> Result<(), log::SetLoggerError> {
    let pretty = config.format == "pretty";

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.level.as_str()))
        .format(move |buf, record| {
            let message = record.args().to_string();
            let structured = serde_json::from_str::<Value>(&message)
                .ok()
                .filter(Value::is_object);

            match (structured, pretty) {
                (Some(value), true) => writeln!(buf, "{}", serde_json::to_string_pretty(&value)?),
                (Some(value), false) => writeln!(buf, "{}", value),
                (None, true) => writeln!(
                    buf,
                    "{} {:<5} {}: {}",
                    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                    record.level(),
                    record.target(),
                    message
                ),
                (None, false) => writeln!(
                    buf,
                    "{}",
                    json!({
                        "timestamp": chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
                        "level": record.level().as_str(),
                        "target": record.target(),
                        "message": message,
                    })
                ),
            }
        })
        .try_init()?;

    log::debug!("Logging initialized at {} ({})", config.level, config.format);
    Ok(())
}
