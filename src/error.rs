//! Error types for mail-restyle.

use uuid::Uuid;

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Style store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing database is unreachable or rejected the operation.
    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Style not found: {id}")]
    NotFound { id: Uuid },

    /// Deleting the active style is refused — the caller must deactivate
    /// or activate a replacement first.
    #[error("Cannot delete the active style {id}")]
    DeleteActive { id: Uuid },
}

/// Style generation / application errors.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("LLM request failed: {0}")]
    RequestFailed(String),

    #[error("LLM call timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// The model returned something that doesn't parse as a JSON object,
    /// even after stripping a code fence.
    #[error("Unparseable model output: {reason}")]
    Format { reason: String },
}

/// Mail transport errors (inbound fetch + outbound send).
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Failed to fetch email {email_id}: {reason}")]
    Fetch { email_id: String, reason: String },

    #[error("Failed to send email to {to}: {reason}")]
    Send { to: String, reason: String },

    #[error("Invalid email address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;
