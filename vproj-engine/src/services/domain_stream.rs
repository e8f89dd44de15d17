//! Domain member stream client
//!
//! POSTs `{domain, model, instructionKey: "domain_list"}` and reads the
//! response body incrementally. Each `data:` line carries one JSON message:
//! - `{"chunk": "red, green, bl"}` - member text
//! - `{"error": "..."}` - the source failed; fatal for the run. Chunks read
//!   before it are still handed out first, lines after it are ignored.
//! - `"[DONE]"` - end of stream
//!
//! Lines that do not parse are logged and skipped. A body that ends without
//! the terminal marker is treated as a normal end of stream.

use super::event_lines::{data_payload, is_done_marker, LineBuffer};
use super::{DomainStream, DomainStreamSource, StreamChunk, StreamError};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::VecDeque;
use tracing::{debug, warn};

const DOMAIN_LIST_INSTRUCTION: &str = "domain_list";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StreamRequest<'a> {
    domain: &'a str,
    model: &'a str,
    instruction_key: &'static str,
}

/// Opens HTTP domain streams
pub struct HttpDomainStreamSource {
    http_client: reqwest::Client,
    endpoint: String,
}

impl HttpDomainStreamSource {
    pub fn new(http_client: reqwest::Client, endpoint: String) -> Self {
        Self {
            http_client,
            endpoint,
        }
    }
}

#[async_trait]
impl DomainStreamSource for HttpDomainStreamSource {
    async fn open(&self, domain: &str, model: &str) -> Result<Box<dyn DomainStream>, StreamError> {
        debug!(domain, model, "Opening domain stream");

        let response = self
            .http_client
            .post(&self.endpoint)
            .json(&StreamRequest {
                domain,
                model,
                instruction_key: DOMAIN_LIST_INSTRUCTION,
            })
            .send()
            .await
            .map_err(|e| StreamError::Connect(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StreamError::Connect(format!(
                "server responded {}",
                status.as_u16()
            )));
        }

        Ok(Box::new(HttpDomainStream::new(response)))
    }
}

/// Incremental reader over a streaming HTTP response
pub struct HttpDomainStream {
    response: reqwest::Response,
    lines: LineBuffer,
    pending: VecDeque<StreamChunk>,
    /// Remote error held back until earlier chunks are handed out
    failure: Option<StreamError>,
    finished: bool,
}

impl HttpDomainStream {
    fn new(response: reqwest::Response) -> Self {
        Self {
            response,
            lines: LineBuffer::new(),
            pending: VecDeque::new(),
            failure: None,
            finished: false,
        }
    }

    fn handle_line(&mut self, line: &str) {
        if self.finished {
            return;
        }
        let Some(payload) = data_payload(line) else {
            return;
        };
        if payload.is_empty() {
            return;
        }
        if is_done_marker(payload) {
            self.finish();
            return;
        }

        match serde_json::from_str::<Value>(payload) {
            Ok(Value::Object(message)) => {
                if let Some(error) = message.get("error") {
                    let text = error
                        .as_str()
                        .map(str::to_string)
                        .unwrap_or_else(|| error.to_string());
                    self.failure = Some(StreamError::Remote(text));
                    self.finished = true;
                    return;
                }
                match message.get("chunk").and_then(Value::as_str) {
                    Some(chunk) => self.pending.push_back(StreamChunk::Text(chunk.to_string())),
                    None => debug!("Stream message without chunk ignored"),
                }
            }
            Ok(other) => debug!(payload = %other, "Unexpected stream message ignored"),
            Err(e) => warn!(error = %e, "Unparseable stream line skipped"),
        }
    }

    fn finish(&mut self) {
        self.pending.push_back(StreamChunk::Done);
        self.finished = true;
    }
}

#[async_trait]
impl DomainStream for HttpDomainStream {
    async fn next_chunk(&mut self) -> Result<StreamChunk, StreamError> {
        loop {
            if let Some(chunk) = self.pending.pop_front() {
                return Ok(chunk);
            }
            if let Some(failure) = self.failure.take() {
                return Err(failure);
            }
            if self.finished {
                return Ok(StreamChunk::Done);
            }

            let bytes = self
                .response
                .chunk()
                .await
                .map_err(|e| StreamError::Transport(e.to_string()))?;

            match bytes {
                Some(bytes) => {
                    for line in self.lines.push(&bytes) {
                        self.handle_line(&line);
                    }
                }
                None => {
                    if let Some(line) = self.lines.finish() {
                        self.handle_line(&line);
                    }
                    if !self.finished {
                        self.finish();
                    }
                }
            }
        }
    }
}
