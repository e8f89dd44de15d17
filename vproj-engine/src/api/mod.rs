//! HTTP API handlers for vproj-engine
//!
//! REST endpoints for running workflows and reading results, plus an SSE
//! stream of workflow log entries.

pub mod health;
pub mod sse;
pub mod workflows;

pub use health::health_routes;
pub use sse::log_stream;
pub use workflows::workflow_routes;
