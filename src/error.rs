//! Typed errors for the catalog library.
//!
//! Library modules return these so callers can tell recoverable conditions
//! (a missing asset, a single failed page) apart from structural ones (a
//! corrupt catalog, duplicate ids). The command layer wraps them in
//! `anyhow` with context.

use std::path::PathBuf;

use thiserror::Error;

/// A page fetch failed.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection, TLS, timeout or body-read failure.
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-success status.
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
}

/// Errors raised while loading, indexing or saving the catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog not found: {}", path.display())]
    Missing { path: PathBuf },

    #[error("failed to access catalog {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The persisted document is not a well-formed catalog.
    #[error("catalog {} is corrupt: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    /// Two records share an id.
    #[error("duplicate product id {0} in catalog")]
    DuplicateId(u64),

    #[error("failed to serialize catalog: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors raised while loading a rename mapping.
#[derive(Debug, Error)]
pub enum MappingError {
    #[error("failed to read mapping file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse mapping file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("mapping entry '{file}' has an invalid product id: {value}")]
    InvalidId { file: String, value: String },

    /// Two source files map to the same product.
    #[error("product {id} is mapped twice ('{first}' and '{second}')")]
    DuplicateTarget {
        id: u64,
        first: String,
        second: String,
    },

    #[error("invalid asset filename '{0}': must be a bare file name")]
    InvalidFilename(String),

    /// The source is already the canonical file of another product.
    #[error("'{file}' belongs to product {owner} and cannot be mapped to {id}")]
    CanonicalSource { file: String, owner: u64, id: u64 },
}

/// Errors raised by asset directory operations.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("failed to {op} '{file}': {source}")]
    Io {
        op: &'static str,
        file: String,
        #[source]
        source: std::io::Error,
    },

    /// The name would escape the asset directory.
    #[error("'{0}' is not a file name inside the asset directory")]
    OutsideDirectory(String),

    #[error("cannot rename '{from}' to '{to}': target already exists")]
    TargetExists { from: String, to: String },

    #[error("asset '{0}' not found")]
    NotFound(String),
}
