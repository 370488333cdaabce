//! Chat completion stream parsing error definitions

use std::fmt;

/// Parse error types
#[derive(Debug)]
pub enum ParseError {
    /// An unterminated line grew beyond the carry-over limit
    BufferOverflow { size: usize, max: usize },
    /// Event payload is not valid JSON for a stream chunk
    PayloadDeserialize(serde_json::Error),
    /// Assembled function call could not be decoded
    FunctionCallDecode(serde_json::Error),
}

impl std::error::Error for ParseError {}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BufferOverflow { size, max } => {
                write!(f, "Line buffer overflow: {} bytes (max {})", size, max)
            }
            Self::PayloadDeserialize(e) => write!(f, "Payload deserialization failed: {}", e),
            Self::FunctionCallDecode(e) => write!(f, "Function call decoding failed: {}", e),
        }
    }
}

impl From<serde_json::Error> for ParseError {
    fn from(e: serde_json::Error) -> Self {
        Self::PayloadDeserialize(e)
    }
}

/// Parse result type
pub type ParseResult<T> = Result<T, ParseError>;
