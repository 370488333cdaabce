//! Chat completion request types

use serde::{Deserialize, Serialize};

use super::catalog::Model;
use super::message::Message;

/// Function description offered to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// JSON schema of the arguments object
    pub parameters: serde_json::Value,
}

/// Chat completion request body
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub functions: Option<Vec<FunctionDefinition>>,

    /// `"auto"` whenever functions are offered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_call: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    pub temperature: f32,
    pub stream: bool,
}

impl ChatCompletionRequest {
    /// Build a streaming request
    ///
    /// The function list is attached only for code interpreter models.
    pub fn new(
        model: Model,
        messages: Vec<Message>,
        functions: &[FunctionDefinition],
        temperature: f32,
        max_tokens: Option<u32>,
    ) -> Self {
        let offer_functions = model.is_code_interpreter() && !functions.is_empty();
        Self {
            model: model.api_name().to_string(),
            messages,
            functions: offer_functions.then(|| functions.to_vec()),
            function_call: offer_functions.then(|| "auto".to_string()),
            max_tokens,
            temperature,
            stream: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn repl_function() -> FunctionDefinition {
        FunctionDefinition {
            name: "repl_repl_post".to_string(),
            description: "Execute code".to_string(),
            parameters: json!({"type": "object", "properties": {}}),
        }
    }

    #[test]
    fn test_code_interpreter_request_offers_functions() {
        let request = ChatCompletionRequest::new(
            Model::Gpt4CodeInterpreter,
            vec![Message::user("hi")],
            &[repl_function()],
            0.8,
            None,
        );
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "gpt-4-0613");
        assert_eq!(json["function_call"], "auto");
        assert_eq!(json["functions"][0]["name"], "repl_repl_post");
        assert_eq!(json["stream"], true);
        assert!(json.get("max_tokens").is_none());
    }

    #[test]
    fn test_plain_model_request_omits_functions() {
        let request = ChatCompletionRequest::new(
            Model::Gpt4,
            vec![Message::user("hi")],
            &[repl_function()],
            0.5,
            Some(256),
        );
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("functions").is_none());
        assert!(json.get("function_call").is_none());
        assert_eq!(json["max_tokens"], 256);
    }
}
