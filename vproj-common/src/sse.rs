//! Server-Sent Events (SSE) utilities
//!
//! Turns the log broadcaster's channel into an SSE response.

use crate::events::LogEntry;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

/// Stream log entries from `rx` as SSE events
///
/// Event name is the entry's level, data is the entry as JSON. Lagging clients
/// skip the entries they missed and keep streaming.
pub fn log_entry_sse_stream(
    mut rx: broadcast::Receiver<LogEntry>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("New SSE client connected to log stream");

    let stream = async_stream::stream! {
        yield Ok(Event::default()
            .event("ConnectionStatus")
            .data("connected"));

        loop {
            match rx.recv().await {
                Ok(entry) => match serde_json::to_string(&entry) {
                    Ok(json) => {
                        yield Ok(Event::default().event(entry.level.as_str()).data(json));
                    }
                    Err(e) => {
                        warn!("SSE: Failed to serialize log entry: {}", e);
                    }
                },
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "SSE: client lagged, entries dropped");
                }
                Err(RecvError::Closed) => {
                    debug!("SSE: log channel closed");
                    break;
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    )
}
