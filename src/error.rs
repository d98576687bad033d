use thiserror::Error;

/// Main error type for the transfer tracker
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    #[error("Database error: {0}")]
    Database(#[from] crate::database::DbError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Notification error: {0}")]
    Notification(#[from] NotifyError),

    #[error("Poller error: {0}")]
    Poller(#[from] crate::blockchain::PollerError),

    #[error("System error: {0}")]
    System(#[from] std::io::Error),
}

/// Chain client errors
#[derive(Error, Debug)]
pub enum RpcError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("RPC method error: code={code}, message={message}")]
    Method { code: i32, message: String },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Timeout after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Block not found: {block_number}")]
    BlockNotFound { block_number: u64 },

    #[error("Receipt not found for transaction {0}")]
    ReceiptNotFound(String),

    #[error("Connection failed: {0}")]
    Connection(String),
}

impl RpcError {
    /// The chain has not produced this block yet.
    pub fn is_block_not_found(&self) -> bool {
        matches!(self, RpcError::BlockNotFound { .. })
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Configuration parsing failed: {0}")]
    Parsing(String),

    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
}

/// Tracked registry errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("No tracking configuration for chain '{0}'")]
    UnknownChain(String),

    #[error("Chain '{0}' is configured more than once")]
    DuplicateChain(String),
}

/// Notification channel errors
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Notification rejected: status={status}, description={description}")]
    Rejected { status: u16, description: String },
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, TrackerError>;

/// Error severity levels for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Stops the process or a whole chain loop
    Critical,
    /// Affects a component but the process keeps running
    High,
    /// A single item was skipped
    Medium,
    /// Expected, informational
    Low,
}

impl TrackerError {
    /// Get the severity level of an error
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            TrackerError::Config(_) => ErrorSeverity::Critical,
            TrackerError::Registry(_) => ErrorSeverity::Critical,
            TrackerError::System(_) => ErrorSeverity::Critical,
            TrackerError::Poller(_) => ErrorSeverity::Critical,

            TrackerError::Database(crate::database::DbError::Connection(_)) => ErrorSeverity::High,
            TrackerError::Rpc(RpcError::Connection(_)) => ErrorSeverity::High,

            TrackerError::Rpc(RpcError::BlockNotFound { .. }) => ErrorSeverity::Low,
            TrackerError::Rpc(RpcError::Timeout { .. }) => ErrorSeverity::Medium,
            TrackerError::Notification(_) => ErrorSeverity::Medium,
            _ => ErrorSeverity::Medium,
        }
    }
}
