//! Server-Sent Events stream of workflow log entries

use crate::AppState;
use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;
use vproj_common::sse::log_entry_sse_stream;

/// GET /logs
///
/// Streams every log entry from every run as it happens. Event name is the
/// entry type (`info`, `success`, `warning`, `error`, `debug`).
pub async fn log_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    log_entry_sse_stream(state.log_bus.channel())
}
