//! Application layer errors

use thiserror::Error;

/// General bot errors
#[derive(Error, Debug)]
pub enum BotError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Command execution errors
#[derive(Error, Debug)]
pub enum CommandError {
    /// Expected failure; the reason is shown to the sender
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for CommandError {
    fn from(err: StoreError) -> Self {
        CommandError::Internal(err.to_string())
    }
}

/// Record store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Vinebot not found: {0}")]
    ConversationNotFound(String),

    #[error("No edge from {from} to {to}")]
    EdgeNotFound { from: String, to: String },

    #[error("Invite not found: {0}")]
    InviteNotFound(String),

    #[error("Record already locked: {0}")]
    Locked(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Lock poisoned")]
    Poisoned,
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Parse error: {0}")]
    Parse(String),
}
