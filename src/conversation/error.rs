//! Conversation driver error definitions

use std::fmt;

use crate::openai::errors::ApiError;
use crate::openai::parser::ParseError;

/// Failures that abort the current turn
///
/// Malformed single frames never surface here, they are recovered inside the
/// stream decoder. An unknown function name and user cancellation are not
/// errors either.
#[derive(Debug)]
pub enum ChatError {
    /// Network failure opening or reading the chat stream
    Transport(String),
    /// Non-success response from the chat completions endpoint
    Api(ApiError),
    /// Stream could not be decoded (e.g. runaway unterminated line)
    Decode(ParseError),
    /// Function call marker present but the assembled call is not valid JSON
    MalformedFunctionCall(ParseError),
    /// Tool endpoint unreachable, failed or answered with something other than JSON
    ToolDispatch { endpoint: String, message: String },
    /// File upload to the tool server failed
    Upload(String),
    /// Too many consecutive tool round trips within one user turn
    ToolRoundLimit { limit: usize },
}

impl std::error::Error for ChatError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Decode(e) | Self::MalformedFunctionCall(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(msg) => write!(f, "Network error: {}", msg),
            Self::Api(e) => write!(f, "{}", e),
            Self::Decode(e) => write!(f, "Stream decoding failed: {}", e),
            Self::MalformedFunctionCall(e) => write!(f, "Malformed function call: {}", e),
            Self::ToolDispatch { endpoint, message } => {
                write!(f, "Tool dispatch to {} failed: {}", endpoint, message)
            }
            Self::Upload(msg) => write!(f, "Upload failed: {}", msg),
            Self::ToolRoundLimit { limit } => {
                write!(f, "Stopped after {} consecutive tool calls", limit)
            }
        }
    }
}

impl ChatError {
    /// Whether the failure happened on the tool side rather than the chat side
    pub fn is_tool_failure(&self) -> bool {
        matches!(self, Self::ToolDispatch { .. } | Self::Upload(_))
    }

    /// Message suited for end users
    pub fn user_message(&self) -> String {
        match self {
            Self::Api(e) => format!("API error: {}", e.user_message()),
            other => other.to_string(),
        }
    }
}

impl From<ApiError> for ChatError {
    fn from(e: ApiError) -> Self {
        Self::Api(e)
    }
}

impl From<ParseError> for ChatError {
    fn from(e: ParseError) -> Self {
        match e {
            ParseError::FunctionCallDecode(_) => Self::MalformedFunctionCall(e),
            other => Self::Decode(other),
        }
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

/// Chat result type
pub type ChatResult<T> = Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_mapping() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: ChatError = ParseError::FunctionCallDecode(json_err).into();
        assert!(matches!(err, ChatError::MalformedFunctionCall(_)));

        let err: ChatError = ParseError::BufferOverflow { size: 10, max: 5 }.into();
        assert!(matches!(err, ChatError::Decode(_)));
    }

    #[test]
    fn test_tool_failure_is_distinct_from_api_error() {
        let tool = ChatError::ToolDispatch {
            endpoint: "/repl".to_string(),
            message: "connection refused".to_string(),
        };
        assert!(tool.is_tool_failure());
        assert_eq!(tool.to_string(), "Tool dispatch to /repl failed: connection refused");

        let api: ChatError = ApiError::from_body(500, "oops").into();
        assert!(!api.is_tool_failure());
        assert!(api.user_message().starts_with("API error:"));
    }
}
