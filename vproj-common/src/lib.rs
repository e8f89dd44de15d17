//! # Vector Projector Common Library
//!
//! Shared code for the vproj crates:
//! - Error types
//! - Log entries and the log broadcaster (observer for workflow progress)
//! - TOML configuration loading and setting resolution
//! - SSE helpers for streaming log entries

pub mod config;
pub mod error;
pub mod events;
pub mod sse;

pub use error::{Error, Result};
pub use events::{ListenerId, LogBroadcaster, LogEntry, LogLevel};
