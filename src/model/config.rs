use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::openai::model::Model;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TlsBackend {
    #[default]
    Rustls,
    NativeTls,
}

/// Environment variable consulted when `apiKey` is not configured
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Chat client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Chat completions API base URL
    #[serde(default = "default_api_base")]
    pub api_base: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub model: Model,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Base URL of the tool execution server
    #[serde(default = "default_tool_server_url")]
    pub tool_server_url: String,

    /// OpenAPI document describing the tool server (JSON)
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openapi_path: Option<String>,

    /// Maximum tool round trips per user turn
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,

    /// Delay before a stop request clears itself
    #[serde(default = "default_cancel_reset_ms")]
    pub cancel_reset_ms: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,

    /// Upper bound for an unterminated stream line
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,

    /// Replaces the built-in system prompt
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    #[serde(default)]
    pub tls_backend: TlsBackend,

    /// HTTP proxy URL (optional)
    /// Supported formats: http://host:port, https://host:port, socks5://host:port
    #[serde(default)]
    pub proxy_url: Option<String>,

    #[serde(default)]
    pub proxy_username: Option<String>,

    #[serde(default)]
    pub proxy_password: Option<String>,

    /// Config file path (runtime metadata, not written to JSON)
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_temperature() -> f32 {
    0.8
}

fn default_tool_server_url() -> String {
    "http://localhost:3333".to_string()
}

fn default_max_tool_rounds() -> usize {
    8
}

fn default_cancel_reset_ms() -> u64 {
    1000
}

fn default_request_timeout_secs() -> u64 {
    720
}

fn default_tool_timeout_secs() -> u64 {
    120
}

fn default_max_line_bytes() -> usize {
    crate::openai::parser::splitter::DEFAULT_MAX_LINE_BYTES
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            api_key: None,
            model: Model::default(),
            temperature: default_temperature(),
            max_tokens: None,
            tool_server_url: default_tool_server_url(),
            openapi_path: None,
            max_tool_rounds: default_max_tool_rounds(),
            cancel_reset_ms: default_cancel_reset_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            tool_timeout_secs: default_tool_timeout_secs(),
            max_line_bytes: default_max_line_bytes(),
            system_prompt: None,
            tls_backend: TlsBackend::default(),
            proxy_url: None,
            proxy_username: None,
            proxy_password: None,
            config_path: None,
        }
    }
}

impl Config {
    /// Get default config file path
    pub fn default_config_path() -> &'static str {
        "config.json"
    }

    /// Load configuration from file, falling back to defaults when it does not exist
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            let mut config = Self::default();
            config.config_path = Some(path.to_path_buf());
            return Ok(config);
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.config_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Get config file path (if available)
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// API key from config, then from the environment
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty()))
    }

    /// Full URL of the chat completions endpoint
    pub fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.api_base.trim_end_matches('/'))
    }

    pub fn cancel_reset_window(&self) -> Duration {
        Duration::from_millis(self.cancel_reset_ms)
    }

    /// System prompt for a fresh conversation with `model`
    pub fn system_prompt_for(&self, model: Model) -> String {
        if let Some(prompt) = &self.system_prompt {
            return prompt.clone();
        }
        if model.is_code_interpreter() {
            crate::conversation::state::code_interpreter_prompt(&self.tool_server_url)
        } else {
            crate::conversation::state::PLAIN_SYSTEM_PROMPT.to_string()
        }
    }
}
