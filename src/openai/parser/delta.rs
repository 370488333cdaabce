//! Delta parser
//!
//! Maps one event payload onto the single delta the assembler cares about.
//! A malformed payload never aborts the stream: it is logged, counted and
//! yields no delta.

use crate::openai::model::chunk::{FINISH_REASON_FUNCTION_CALL, StreamChunk};

use super::error::ParseResult;

/// Smallest unit of incremental content of a turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delta {
    /// Plain text fragment
    Content(String),
    /// Function name fragment
    FunctionName(String),
    /// Function arguments fragment
    FunctionArguments(String),
    /// Stream-end marker
    End { reason: String },
}

impl Delta {
    /// Whether this is the end marker of a function call
    pub fn ends_function_call(&self) -> bool {
        matches!(self, Self::End { reason } if reason == FINISH_REASON_FUNCTION_CALL)
    }
}

impl std::fmt::Display for Delta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Content(text) => write!(f, "Content({})", text),
            Self::FunctionName(name) => write!(f, "FunctionName({})", name),
            Self::FunctionArguments(args) => write!(f, "FunctionArguments({})", args),
            Self::End { reason } => write!(f, "End({})", reason),
        }
    }
}

/// Select the delta of a decoded chunk
///
/// Precedence when several fields are present:
/// 1. non-empty function name
/// 2. non-empty function arguments
/// 3. finish reason `function_call`
/// 4. non-empty content
pub fn select_delta(chunk: &StreamChunk) -> Option<Delta> {
    let choice = chunk.first_choice()?;
    let call = choice.delta.function_call.as_ref();

    if let Some(name) = call.and_then(|c| c.name.as_deref()).filter(|s| !s.is_empty()) {
        return Some(Delta::FunctionName(name.to_string()));
    }
    if let Some(args) = call.and_then(|c| c.arguments.as_deref()).filter(|s| !s.is_empty()) {
        return Some(Delta::FunctionArguments(args.to_string()));
    }
    if choice.finished_with_function_call() {
        return Some(Delta::End {
            reason: FINISH_REASON_FUNCTION_CALL.to_string(),
        });
    }
    choice
        .delta
        .content
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(|s| Delta::Content(s.to_string()))
}

/// Decode one payload into a delta, propagating JSON errors
pub fn parse_payload(payload: &str) -> ParseResult<Option<Delta>> {
    let chunk: StreamChunk = serde_json::from_str(payload)?;
    Ok(select_delta(&chunk))
}

/// Payload parser with failure diagnostics
#[derive(Debug, Default)]
pub struct DeltaParser {
    /// Payloads decoded successfully
    records_parsed: usize,
    /// Payloads that failed to decode
    records_failed: usize,
}

impl DeltaParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse one payload, swallowing malformed input
    pub fn parse(&mut self, payload: &str) -> Option<Delta> {
        match parse_payload(payload) {
            Ok(delta) => {
                self.records_parsed += 1;
                delta
            }
            Err(e) => {
                self.records_failed += 1;
                tracing::warn!(
                    error = %e,
                    payload = %payload,
                    failed = self.records_failed,
                    "Skipping malformed stream record"
                );
                None
            }
        }
    }

    /// Get number of payloads decoded
    pub fn records_parsed(&self) -> usize {
        self.records_parsed
    }

    /// Get number of payloads that failed to decode
    pub fn records_failed(&self) -> usize {
        self.records_failed
    }
}
