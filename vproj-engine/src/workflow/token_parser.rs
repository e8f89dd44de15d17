//! Stream token parser
//!
//! Members arrive as comma-separated text split at arbitrary points. The
//! parser emits only tokens whose terminating separator has been seen and
//! carries the unterminated tail into the next chunk.

pub const MEMBER_SEPARATOR: char = ',';

#[derive(Debug, Default)]
pub struct TokenParser {
    partial: String,
}

impl TokenParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk; returns the tokens it completes (trimmed, non-empty)
    pub fn push(&mut self, chunk: &str) -> Vec<String> {
        self.partial.push_str(chunk);

        let Some(last_separator) = self.partial.rfind(MEMBER_SEPARATOR) else {
            return Vec::new();
        };

        let tail = self.partial.split_off(last_separator + MEMBER_SEPARATOR.len_utf8());
        let complete = std::mem::replace(&mut self.partial, tail);
        split_tokens(&complete)
    }

    /// End of stream: the buffered tail as a final token, if non-empty
    pub fn finish(&mut self) -> Option<String> {
        let tail = std::mem::take(&mut self.partial);
        let token = tail.trim();
        (!token.is_empty()).then(|| token.to_string())
    }

    /// Text carried over to the next chunk
    pub fn partial(&self) -> &str {
        &self.partial
    }
}

/// Tokens of a complete separator-joined string
pub fn split_tokens(text: &str) -> Vec<String> {
    text.split(MEMBER_SEPARATOR)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}
