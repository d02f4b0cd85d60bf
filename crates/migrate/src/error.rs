//! Error types for the migration system
//!
//! Discovery failures abort before any planning happens. Ledger and planning
//! errors never leave a partial mutation behind. Action errors stop a run at
//! the failing unit and keep whatever earlier units already committed.

use std::path::PathBuf;
use thiserror::Error;

use crate::unit::Direction;

/// Result type alias for migration operations
pub type MigrateResult<T> = Result<T, MigrateError>;

/// Errors raised while loading migration units from a registry
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("duplicate migration name '{0}'")]
    DuplicateName(String),

    #[error("migration name '{0}' must start with a numeric sequence prefix")]
    InvalidName(String),

    #[error("migration '{name}' has no {direction} action")]
    MissingAction { name: String, direction: Direction },

    #[error("malformed migration source {}: {reason}", .path.display())]
    Malformed { path: PathBuf, reason: String },

    #[error("failed to read migrations from {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Error type for every migration operation
#[derive(Debug, Error)]
pub enum MigrateError {
    #[error("discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("migration '{name}' is already recorded in the ledger")]
    DuplicateRecord { name: String },

    #[error("migration '{name}' is not recorded in the ledger")]
    NotRecorded { name: String },

    #[error("applied migration '{name}' can no longer be discovered")]
    UnresolvedUnit { name: String },

    #[error("reverting is not allowed while out-of-order migrations are permitted")]
    OutOfOrderRevert,

    #[error("failed to {direction} migration '{name}': {source}")]
    Action {
        name: String,
        direction: Direction,
        #[source]
        source: anyhow::Error,
    },

    #[error("ledger storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
