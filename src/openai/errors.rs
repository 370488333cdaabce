//! Chat completions API error decoding
//!
//! Turns a non-success response body into a structured error and a
//! user-facing explanation.

use serde::Deserialize;

/// Structured error returned by the chat completions endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// HTTP status code
    pub status: u16,
    /// Error message from the API (or the raw body when it is not JSON)
    pub message: String,
    /// Error type, e.g. `invalid_request_error`
    pub error_type: Option<String>,
    /// Offending request parameter
    pub param: Option<String>,
    /// Error code, e.g. `context_length_exceeded`
    pub code: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default, rename = "type")]
    error_type: Option<String>,
    #[serde(default)]
    param: Option<String>,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

impl ApiError {
    /// Decode an error response body
    ///
    /// Expected format: `{"error": {"message": "...", "type": "...", "param": ..., "code": ...}}`.
    /// Anything else keeps the raw body as message.
    pub fn from_body(status: u16, body: &str) -> Self {
        match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(envelope) => {
                let error = envelope.error;
                Self {
                    status,
                    message: error.message.unwrap_or_else(|| "Unknown error".to_string()),
                    error_type: error.error_type,
                    param: error.param,
                    code: error.code.and_then(|c| match c {
                        serde_json::Value::String(s) => Some(s),
                        serde_json::Value::Null => None,
                        other => Some(other.to_string()),
                    }),
                }
            }
            Err(_) => {
                let trimmed = body.trim();
                Self {
                    status,
                    message: if trimmed.is_empty() {
                        format!("HTTP {}", status)
                    } else {
                        trimmed.to_string()
                    },
                    error_type: None,
                    param: None,
                    code: None,
                }
            }
        }
    }

    /// Short explanation suited for end users
    pub fn user_message(&self) -> String {
        match self.code.as_deref() {
            Some("context_length_exceeded") => {
                "Model context limit reached. Start a new conversation or shorten the last message.".to_string()
            }
            Some("invalid_api_key") => "The configured API key was rejected.".to_string(),
            Some("insufficient_quota") => "The API account has run out of quota.".to_string(),
            Some("rate_limit_exceeded") => {
                "Rate limit exceeded. Please wait a moment before retrying.".to_string()
            }
            Some("model_not_found") => format!("Model unavailable: {}", self.message),
            _ => match self.status {
                429 => "Too many requests. Please slow down and try again.".to_string(),
                500..=599 => "The chat service is temporarily unavailable. Please try again later.".to_string(),
                _ => self.message.clone(),
            },
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "API error (status {}", self.status)?;
        if let Some(error_type) = &self.error_type {
            write!(f, ", type {}", error_type)?;
        }
        if let Some(param) = &self.param {
            write!(f, ", param {}", param)?;
        }
        if let Some(code) = &self.code {
            write!(f, ", code {}", code)?;
        }
        write!(f, "): {}", self.message)
    }
}
