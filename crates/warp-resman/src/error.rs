//! Error types for the resource cache

use crate::payload::PayloadError;
use thiserror::Error;

/// Result type for resource cache operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while assigning or materializing resources
#[derive(Error, Debug)]
pub enum Error {
    /// The payload's hash hook failed; the registry was left untouched
    #[error("content hash computation failed: {0}")]
    HashComputation(#[source] PayloadError),

    /// The payload's handle hook failed; the resource stays usable and a
    /// later `handle()` call retries creation
    #[error("handle creation failed: {0}")]
    HandleCreation(#[source] PayloadError),

    /// The payload produced the reserved "unset" hash value
    #[error("payload produced the reserved unset content hash")]
    ReservedHash,

    /// Invalid cache configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
