pub mod telegram;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::database::{Database, DbError};
use crate::error::NotifyError;
use crate::logging::{LogContext, MetricsLogger};
use crate::models::TrackingEvent;

pub use telegram::TelegramNotifier;

/// Append-only persistence of tracking events
pub trait EventStore: Send + Sync {
    fn insert(&self, event: &TrackingEvent) -> Result<(), DbError>;
}

impl EventStore for Database {
    fn insert(&self, event: &TrackingEvent) -> Result<(), DbError> {
        self.insert_event(event).map(|_| ())
    }
}

/// Human-readable notification channel
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str) -> Result<(), NotifyError>;
}

/// What happened to one dispatched event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub persisted: bool,
    pub notified: bool,
}

/// Fans each event out to persistence and notification.
///
/// The two attempts are independent and neither is retried.
pub struct EventSink {
    store: Arc<dyn EventStore>,
    notifier: Arc<dyn Notifier>,
    /// chain -> lowercase token address -> display symbol
    symbol_overrides: HashMap<String, HashMap<String, String>>,
}

impl EventSink {
    pub fn new(store: Arc<dyn EventStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            notifier,
            symbol_overrides: HashMap::new(),
        }
    }

    pub fn with_symbol_overrides(mut self, chain: &str, overrides: HashMap<String, String>) -> Self {
        self.symbol_overrides.insert(chain.to_string(), overrides);
        self
    }

    pub async fn dispatch(&self, event: &TrackingEvent) -> DispatchOutcome {
        let context = || {
            LogContext::new("event_sink", "dispatch")
                .with_chain(&event.chain)
                .with_transaction_hash(&event.transaction_hash)
        };

        // Store writes block on SQLite, keep them off the runtime workers
        let stored = tokio::task::spawn_blocking({
            let store = Arc::clone(&self.store);
            let event = event.clone();
            move || store.insert(&event)
        })
        .await;

        let persisted = match stored {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                context().error(&format!("Failed to persist tracking event: {}", e));
                false
            }
            Err(e) => {
                context().error(&format!("Persistence task failed: {}", e));
                false
            }
        };

        let notified = match self.notifier.send(&self.compose_message(event)).await {
            Ok(()) => true,
            Err(e) => {
                context().warn(&format!("Failed to send notification: {}", e));
                false
            }
        };

        MetricsLogger::log_event_dispatched(
            &event.chain,
            &event.transaction_hash,
            event.kind.as_str(),
            persisted,
            notified,
        );

        DispatchOutcome { persisted, notified }
    }

    /// Symbol shown in notifications: configured override first, then the event's own
    pub fn display_symbol<'a>(&'a self, event: &'a TrackingEvent) -> &'a str {
        if event.is_native() {
            return &event.symbol;
        }
        self.symbol_overrides
            .get(&event.chain)
            .and_then(|tokens| tokens.get(&event.token))
            .map(String::as_str)
            .unwrap_or(&event.symbol)
    }

    pub fn compose_message(&self, event: &TrackingEvent) -> String {
        format!(
            "Chain: {}\nTransaction: {}\nTransferring {} {}\nFrom {} to {}",
            event.chain,
            event.transaction_hash,
            event.amount,
            self.display_symbol(event),
            display_address(&event.from),
            display_address(&event.to),
        )
    }
}

fn display_address(address: &str) -> &str {
    if address.is_empty() {
        "unknown"
    } else {
        address
    }
}
