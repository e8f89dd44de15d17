//! Line-oriented event response format
//!
//! Remote services answer with text where result lines start with `data: ` and
//! a `[DONE]` payload marks the end:
//!
//! ```text
//! data: {"partial": true}
//! data: {"warmth": 7, "brightness": 3}
//! data: [DONE]
//! ```

use super::ServiceError;
use serde_json::Value;

pub const DATA_PREFIX: &str = "data:";
pub const DONE_MARKER: &str = "[DONE]";

/// Payload of a `data:` line, trimmed; `None` for any other line
pub fn data_payload(line: &str) -> Option<&str> {
    line.trim_start()
        .strip_prefix(DATA_PREFIX)
        .map(str::trim)
}

/// Whether a payload is the terminal marker, bare or as a JSON string
pub fn is_done_marker(payload: &str) -> bool {
    payload == DONE_MARKER || payload == "\"[DONE]\""
}

/// Last non-empty, non-terminal data payload in `body`
pub fn last_data_payload(body: &str) -> Option<&str> {
    body.lines()
        .filter_map(data_payload)
        .filter(|p| !p.is_empty() && !is_done_marker(p))
        .last()
}

/// Parse the last data payload of `body` as JSON
pub fn parse_last_data_json(body: &str) -> Result<Value, ServiceError> {
    let payload = last_data_payload(body)
        .ok_or_else(|| ServiceError::MalformedResponse("no data lines in response".to_string()))?;

    serde_json::from_str(payload)
        .map_err(|e| ServiceError::MalformedResponse(format!("invalid JSON payload: {}", e)))
}

/// Splits a byte stream into complete lines
///
/// Bytes after the last newline are held until more data arrives, so a line
/// (and any multi-byte character in it) is never decoded half-received.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes and return every line completed by them
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            lines.push(decode_line(&raw[..raw.len() - 1]));
        }
        lines
    }

    /// Remaining unterminated line, if any
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let raw = std::mem::take(&mut self.pending);
        Some(decode_line(&raw))
    }
}

fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_last_data_line_wins() {
        let body = "data: {\"a\": 1}\n\ndata: {\"b\": 2}\ndata: [DONE]\n";
        assert_eq!(parse_last_data_json(body).unwrap(), json!({"b": 2}));
    }

    #[test]
    fn test_ignores_non_data_lines() {
        let body = "event: message\n: comment\ndata:{\"x\":true}\nretry: 10\n";
        assert_eq!(parse_last_data_json(body).unwrap(), json!({"x": true}));
    }

    #[test]
    fn test_only_done_is_malformed() {
        let err = parse_last_data_json("data: [DONE]\n").unwrap_err();
        assert!(matches!(err, ServiceError::MalformedResponse(_)));
    }

    #[test]
    fn test_invalid_json_is_malformed() {
        let err = parse_last_data_json("data: {not json\n").unwrap_err();
        assert!(matches!(err, ServiceError::MalformedResponse(_)));
    }

    #[test]
    fn test_quoted_done_marker() {
        assert!(is_done_marker("\"[DONE]\""));
        assert!(is_done_marker("[DONE]"));
        assert!(!is_done_marker("DONE"));
    }

    #[test]
    fn test_line_buffer_across_pushes() {
        let mut buffer = LineBuffer::new();

        assert!(buffer.push(b"data: {\"chu").is_empty());
        assert_eq!(buffer.push(b"nk\": 1}\r\ndata: x\n"), vec!["data: {\"chunk\": 1}", "data: x"]);
        assert!(buffer.push(b"tail").is_empty());
        assert_eq!(buffer.finish().as_deref(), Some("tail"));
        assert_eq!(buffer.finish(), None);
    }

    #[test]
    fn test_line_buffer_split_multibyte_char() {
        let mut buffer = LineBuffer::new();
        let text = "data: café\n".as_bytes();
        let (head, tail) = text.split_at(10); // inside the two-byte 'é'

        assert!(buffer.push(head).is_empty());
        assert_eq!(buffer.push(tail), vec!["data: café"]);
    }
}
