pub mod api;
pub mod blockchain;
pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod models;
pub mod sink;

pub use blockchain::{BlockPoller, ChainClient, RpcClient};
pub use config::{AppConfig, ChainConfig, LoggingConfig};
pub use error::{Result, TrackerError};
pub use logging::{ErrorLogger, LogContext, MetricsLogger, PerformanceMonitor};
pub use sink::{EventSink, Notifier, TelegramNotifier};
