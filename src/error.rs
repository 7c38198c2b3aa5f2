use thiserror::Error;

/// Main error type for the presale bot
#[derive(Error, Debug)]
pub enum SnipeError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Missing credential for account {index}: {var} not set")]
    MissingCredential { index: usize, var: String },

    #[error("Invalid credential for account {index}: {reason}")]
    InvalidCredential { index: usize, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Remote (RPC / contract) errors
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Purchase submission failed: {0}")]
    Submission(String),

    #[error("Transaction confirmation failed: {0}")]
    Confirmation(String),

    #[error("Transaction {tx_hash} not confirmed after {elapsed_secs}s")]
    ConfirmationTimeout { tx_hash: String, elapsed_secs: u64 },

    #[error("Address parsing error: {0}")]
    AddressParsing(String),

    // Schedule persistence errors
    #[error("Persistence error: {0}")]
    Persistence(String),

    // Notification errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Notification failed: {0}")]
    Notification(String),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SnipeError {
    /// Whether the per-account retry loop should treat this as recoverable.
    ///
    /// Network failures, rejected submissions and confirmation problems are
    /// transient. Configuration and credential problems are not: retrying
    /// them only burns attempts.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SnipeError::Rpc(_)
                | SnipeError::Submission(_)
                | SnipeError::Confirmation(_)
                | SnipeError::ConfirmationTimeout { .. }
                | SnipeError::Http(_)
                | SnipeError::Io(_)
        )
    }
}

/// Result type alias for SnipeError
pub type Result<T> = std::result::Result<T, SnipeError>;
