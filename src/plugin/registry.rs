//! Tool function registry
//!
//! Maps the function names the model may call (OpenAPI operation ids) onto
//! tool server paths, and carries the function definitions offered to the
//! model.

use anyhow::Context;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::openai::model::FunctionDefinition;

pub const REPL_OPERATION_ID: &str = "repl_repl_post";
pub const COMMAND_OPERATION_ID: &str = "command_endpoint_command_post";

/// Operation id → endpoint path table plus function definitions
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    paths: HashMap<String, String>,
    functions: Vec<FunctionDefinition>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry for the bundled code execution server (`/repl`, `/command`)
    pub fn codesherpa() -> Self {
        let mut registry = Self::new();
        registry.register(
            "/repl",
            FunctionDefinition {
                name: REPL_OPERATION_ID.to_string(),
                description: "Execute code. This endpoint supports a REPL-like environment for Python only. \
                    Args: request (CodeExecutionRequest): The request object containing the code to execute. \
                    Returns: CodeExecutionResponse: The result of the code execution."
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "language": {"type": "string", "example": "python"},
                        "code": {"type": "string", "example": "print('Hello, World!')"}
                    },
                    "required": ["language", "code"]
                }),
            },
        );
        registry.register(
            "/command",
            FunctionDefinition {
                name: COMMAND_OPERATION_ID.to_string(),
                description: "Run commands. Args: command_request (CommandExecutionRequest): The request \
                    object containing the command to execute. Returns: CommandExecutionResponse: The result \
                    of the command execution."
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "command": {"type": "string", "example": "ls -la"}
                    },
                    "required": ["command"]
                }),
            },
        );
        registry
    }

    /// Add one function; a later registration for the same name replaces the earlier one
    pub fn register(&mut self, path: impl Into<String>, function: FunctionDefinition) {
        self.functions.retain(|f| f.name != function.name);
        self.paths.insert(function.name.clone(), path.into());
        self.functions.push(function);
    }

    /// Endpoint path for a function name
    pub fn resolve(&self, name: &str) -> Option<&str> {
        self.paths.get(name).map(String::as_str)
    }

    pub fn functions(&self) -> &[FunctionDefinition] {
        &self.functions
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Build a registry from an OpenAPI 3 JSON document
    ///
    /// Every POST operation with an `operationId` becomes one function. Its
    /// parameters are the JSON request body schema, with a top-level `$ref`
    /// into `components.schemas` resolved.
    pub fn from_openapi(document: &Value) -> anyhow::Result<Self> {
        let paths = document
            .get("paths")
            .and_then(Value::as_object)
            .context("OpenAPI document has no paths object")?;
        let schemas = document
            .pointer("/components/schemas")
            .and_then(Value::as_object);

        let mut registry = Self::new();
        for (path, item) in paths {
            let Some(operation) = item.get("post") else {
                continue;
            };
            let Some(operation_id) = operation.get("operationId").and_then(Value::as_str) else {
                tracing::debug!(path = %path, "Skipping operation without operationId");
                continue;
            };

            let description = operation
                .get("description")
                .or_else(|| operation.get("summary"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();

            let parameters = operation
                .pointer("/requestBody/content/application~1json/schema")
                .map(|schema| resolve_schema_ref(schema, schemas))
                .transpose()?
                .unwrap_or_else(|| json!({"type": "object", "properties": {}}));

            registry.register(
                path.clone(),
                FunctionDefinition {
                    name: operation_id.to_string(),
                    description,
                    parameters,
                },
            );
        }

        tracing::debug!("Loaded {} tool functions from OpenAPI document", registry.len());
        Ok(registry)
    }

    /// Load an OpenAPI 3 JSON document from disk
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read OpenAPI document: {}", path.display()))?;
        let document: Value = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse OpenAPI document: {}", path.display()))?;
        Self::from_openapi(&document)
    }
}

fn resolve_schema_ref(schema: &Value, schemas: Option<&Map<String, Value>>) -> anyhow::Result<Value> {
    let Some(reference) = schema.get("$ref").and_then(Value::as_str) else {
        return Ok(schema.clone());
    };
    let name = reference
        .strip_prefix("#/components/schemas/")
        .with_context(|| format!("Unsupported schema reference: {}", reference))?;
    schemas
        .and_then(|s| s.get(name))
        .cloned()
        .with_context(|| format!("Unresolved schema reference: {}", reference))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn openapi_document() -> Value {
        json!({
            "openapi": "3.0.2",
            "paths": {
                "/repl": {
                    "post": {
                        "operationId": "repl_repl_post",
                        "summary": "Execute code",
                        "requestBody": {
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/CodeExecutionRequest"}
                                }
                            }
                        }
                    }
                },
                "/upload": {
                    "post": {
                        "operationId": "upload_file_upload_post",
                        "requestBody": {
                            "content": {
                                "multipart/form-data": {"schema": {"type": "object"}}
                            }
                        }
                    }
                },
                "/static/{path}": {
                    "get": {"operationId": "static_get"}
                }
            },
            "components": {
                "schemas": {
                    "CodeExecutionRequest": {
                        "type": "object",
                        "properties": {"code": {"type": "string"}, "language": {"type": "string"}},
                        "required": ["code"]
                    }
                }
            }
        })
    }

    #[test]
    fn test_codesherpa_registry() {
        let registry = ToolRegistry::codesherpa();
        assert_eq!(registry.resolve(REPL_OPERATION_ID), Some("/repl"));
        assert_eq!(registry.resolve(COMMAND_OPERATION_ID), Some("/command"));
        assert_eq!(registry.resolve("nope"), None);
        assert_eq!(registry.functions().len(), 2);
        assert_eq!(registry.functions()[1].parameters["required"], json!(["command"]));
    }

    #[test]
    fn test_register_replaces_same_name() {
        let mut registry = ToolRegistry::codesherpa();
        registry.register(
            "/v2/repl",
            FunctionDefinition {
                name: REPL_OPERATION_ID.to_string(),
                description: String::new(),
                parameters: json!({}),
            },
        );
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.resolve(REPL_OPERATION_ID), Some("/v2/repl"));
    }

    #[test]
    fn test_from_openapi_resolves_refs() {
        let registry = ToolRegistry::from_openapi(&openapi_document()).unwrap();
        assert_eq!(registry.resolve("repl_repl_post"), Some("/repl"));
        assert_eq!(registry.resolve("static_get"), None);

        let repl = registry
            .functions()
            .iter()
            .find(|f| f.name == "repl_repl_post")
            .unwrap();
        assert_eq!(repl.description, "Execute code");
        assert_eq!(repl.parameters["required"], json!(["code"]));

        // multipart bodies carry no JSON schema
        let upload = registry
            .functions()
            .iter()
            .find(|f| f.name == "upload_file_upload_post")
            .unwrap();
        assert_eq!(upload.parameters, json!({"type": "object", "properties": {}}));
    }

    #[test]
    fn test_from_openapi_unresolved_ref() {
        let mut document = openapi_document();
        document["components"]["schemas"] = json!({});
        assert!(ToolRegistry::from_openapi(&document).is_err());
    }

    #[test]
    fn test_from_openapi_requires_paths() {
        assert!(ToolRegistry::from_openapi(&json!({"openapi": "3.0.2"})).is_err());
    }
}
