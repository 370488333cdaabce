//! Chat completions API provider
//!
//! Opens streaming chat completion requests and hands the raw body chunks to
//! the conversation driver. Non-success statuses are decoded into
//! [`ApiError`] and never retried.

use futures::StreamExt;
use reqwest::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};

use crate::conversation::backend::{ChatBackend, ChunkStream};
use crate::conversation::error::{ChatError, ChatResult};
use crate::http_client::HttpClientOptions;
use crate::model::config::Config;
use crate::openai::errors::ApiError;
use crate::openai::model::ChatCompletionRequest;

/// Chat completions API provider
pub struct OpenAiProvider {
    client: Client,
    url: String,
    api_key: Option<String>,
}

impl OpenAiProvider {
    pub fn new(client: Client, url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client,
            url: url.into(),
            api_key,
        }
    }

    /// Build a provider from the application config
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let client = HttpClientOptions::for_chat(config).build()?;
        let api_key = config.resolve_api_key();
        if api_key.is_none() {
            tracing::warn!("No API key configured, requests will be sent without authorization");
        }
        Ok(Self::new(client, config.chat_completions_url(), api_key))
    }

    /// Chat completions endpoint URL
    pub fn url(&self) -> &str {
        &self.url
    }

    fn build_headers(&self) -> ChatResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
        if let Some(key) = &self.api_key {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", key))
                .map_err(|e| ChatError::Transport(format!("Invalid API key header: {}", e)))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }
}

impl ChatBackend for OpenAiProvider {
    async fn open_stream(&self, request: &ChatCompletionRequest) -> ChatResult<ChunkStream> {
        let headers = self.build_headers()?;

        tracing::debug!(
            model = %request.model,
            messages = request.messages.len(),
            functions = request.functions.as_ref().map_or(0, |f| f.len()),
            "Opening chat completion stream"
        );

        let response = self
            .client
            .post(&self.url)
            .headers(headers)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = ApiError::from_body(status.as_u16(), &body);
            tracing::warn!(
                status = status.as_u16(),
                code = error.code.as_deref().unwrap_or("-"),
                "Chat completion request failed: {}",
                error.message
            );
            return Err(error.into());
        }

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(ChatError::from));
        Ok(Box::pin(stream))
    }
}
