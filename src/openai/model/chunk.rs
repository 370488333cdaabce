//! Streaming chunk payload
//!
//! One `data:` record of a chat completion stream. Only the fields the
//! assembler consumes are typed; everything else lands in `extra`.

use serde::Deserialize;

/// Finish reason announcing a complete function call
pub const FINISH_REASON_FUNCTION_CALL: &str = "function_call";

/// Chat completion stream chunk
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,

    /// Captures other unused fields to ensure deserialization compatibility
    #[serde(flatten)]
    #[allow(dead_code)]
    extra: serde_json::Map<String, serde_json::Value>,
}

impl StreamChunk {
    /// First choice, the only one a streamed chat turn produces
    pub fn first_choice(&self) -> Option<&ChunkChoice> {
        self.choices.first()
    }
}

/// One choice of a stream chunk
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: ChoiceDelta,

    #[serde(default)]
    pub finish_reason: Option<String>,
}

impl ChunkChoice {
    /// Whether the model finished the turn with a function call
    pub fn finished_with_function_call(&self) -> bool {
        self.finish_reason.as_deref() == Some(FINISH_REASON_FUNCTION_CALL)
    }
}

/// Incremental message content of a choice
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChoiceDelta {
    #[serde(default)]
    pub role: Option<String>,

    #[serde(default)]
    pub content: Option<String>,

    #[serde(default)]
    pub function_call: Option<FunctionCallDelta>,
}

/// Streamed fragment of a function call
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FunctionCallDelta {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub arguments: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_content_chunk() {
        let json = r#"{
            "id": "chatcmpl-1",
            "object": "chat.completion.chunk",
            "created": 1690000000,
            "model": "gpt-4-0613",
            "choices": [{"index": 0, "delta": {"content": "Hi"}, "finish_reason": null}]
        }"#;
        let chunk: StreamChunk = serde_json::from_str(json).unwrap();
        let choice = chunk.first_choice().unwrap();
        assert_eq!(choice.delta.content.as_deref(), Some("Hi"));
        assert!(!choice.finished_with_function_call());
    }

    #[test]
    fn test_deserialize_function_call_chunk() {
        let json = r#"{"choices":[{"delta":{"role":"assistant","content":null,"function_call":{"name":"repl_repl_post","arguments":""}}}]}"#;
        let chunk: StreamChunk = serde_json::from_str(json).unwrap();
        let call = chunk.first_choice().unwrap().delta.function_call.as_ref().unwrap();
        assert_eq!(call.name.as_deref(), Some("repl_repl_post"));
        assert_eq!(call.arguments.as_deref(), Some(""));
    }

    #[test]
    fn test_deserialize_finish_chunk_without_delta() {
        let json = r#"{"choices":[{"index":0,"finish_reason":"function_call"}]}"#;
        let chunk: StreamChunk = serde_json::from_str(json).unwrap();
        assert!(chunk.first_choice().unwrap().finished_with_function_call());
    }

    #[test]
    fn test_deserialize_without_choices() {
        let chunk: StreamChunk = serde_json::from_str(r#"{"id":"x"}"#).unwrap();
        assert!(chunk.first_choice().is_none());
    }
}
