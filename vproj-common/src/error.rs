//! Common error types for vproj

use std::path::PathBuf;
use thiserror::Error;

/// Common result type for vproj operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across vproj crates
#[derive(Error, Debug)]
pub enum Error {
    /// Config file could not be read
    #[error("Read {} failed: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file read but not valid
    #[error("Configuration error: {0}")]
    Config(String),
}
