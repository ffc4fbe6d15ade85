//! Error types for the pool analyzer.
//!
//! All fallible operations in this crate return [`Result<T>`], which uses
//! the [`Error`] enum for error variants.

use std::path::PathBuf;

/// Errors that can occur while loading input or analyzing pools.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// File system I/O error (configuration, lease, or output files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error (report or config rendering).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV report rendering error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A sort specification contained a character that selects no comparator.
    #[error("Unknown sort order: '{0}'")]
    UnknownSortKey(char),

    /// The requested IP version is neither 4 nor 6.
    #[error("Unknown IP version: {0}")]
    UnknownAddressFamily(String),

    /// An address literal could not be parsed in the active address family.
    #[error("Invalid IP address: {0}")]
    InvalidAddress(String),

    /// A CIDR prefix length exceeds the width of the address family.
    #[error("Invalid prefix length /{prefix} (maximum is /{max})")]
    InvalidPrefixLength { prefix: u32, max: u32 },

    /// A range whose first address is above its last address.
    #[error("Invalid range {first} - {last}: first address is above last address")]
    InvalidRange { first: String, last: String },

    /// Malformed statement in a dhcpd.conf or dhcpd.leases file.
    #[error("{}:{line}: {message}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// Invalid runtime configuration.
    ///
    /// Returned by [`Config::validate`](crate::Config::validate).
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// A specialized Result type for pool analysis operations.
pub type Result<T> = std::result::Result<T, Error>;
