//! Tool server HTTP client
//!
//! Dispatches function calls to the tool server and manages uploaded files.

use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::path::Path;

use crate::conversation::backend::ToolBackend;
use crate::conversation::error::{ChatError, ChatResult};
use crate::http_client::HttpClientOptions;
use crate::model::config::Config;

/// File stored on the tool server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// File name as referenced in the user message
    pub name: String,
    /// URL the tool server serves the file from
    pub url: String,
}

impl UploadedFile {
    /// Suffix appended to the next user message
    pub fn message_suffix(&self) -> String {
        format!("\n(Uploaded file: {})", self.name)
    }
}

#[derive(Deserialize)]
struct UploadResponse {
    url: String,
}

/// Tool server client
pub struct ToolServerClient {
    client: Client,
    base_url: String,
}

impl ToolServerClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Build a client from the application config
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let client = HttpClientOptions::for_tools(config).build()?;
        Ok(Self::new(client, &config.tool_server_url))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Upload a local file with a multipart POST to `/upload`
    pub async fn upload_file(&self, path: impl AsRef<Path>) -> ChatResult<UploadedFile> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ChatError::Upload(format!("Invalid file name: {}", path.display())))?
            .to_string();
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| ChatError::Upload(format!("Failed to read {}: {}", path.display(), e)))?;

        let mime = mime_guess::from_path(path).first_or_octet_stream();
        let part = Part::bytes(data)
            .file_name(name.clone())
            .mime_str(mime.essence_str())
            .map_err(|e| ChatError::Upload(e.to_string()))?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(self.url("/upload"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| ChatError::Upload(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Upload(format!("{} {}", status, body)));
        }

        let uploaded: UploadResponse = response
            .json()
            .await
            .map_err(|e| ChatError::Upload(format!("Invalid upload response: {}", e)))?;

        tracing::info!(file = %name, url = %uploaded.url, "File uploaded");
        Ok(UploadedFile {
            name,
            url: uploaded.url,
        })
    }

    /// Remove a previously uploaded file
    pub async fn delete_upload(&self, name: &str) -> ChatResult<()> {
        let url = format!(
            "{}?fileName={}",
            self.url("/delete-file"),
            urlencoding::encode(name)
        );
        let response = self
            .client
            .delete(url)
            .send()
            .await
            .map_err(|e| ChatError::Upload(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Upload(format!("Delete failed: {} {}", status, body)));
        }
        tracing::info!(file = %name, "Uploaded file deleted");
        Ok(())
    }
}

impl ToolBackend for ToolServerClient {
    async fn dispatch(&self, endpoint: &str, body: &str) -> ChatResult<serde_json::Value> {
        let dispatch_error = |message: String| ChatError::ToolDispatch {
            endpoint: endpoint.to_string(),
            message,
        };

        tracing::debug!(endpoint = %endpoint, body_len = body.len(), "Dispatching tool call");

        let response = self
            .client
            .post(self.url(endpoint))
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .send()
            .await
            .map_err(|e| dispatch_error(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| dispatch_error(e.to_string()))?;

        if !status.is_success() {
            return Err(dispatch_error(format!("{} {}", status, text)));
        }

        serde_json::from_str(&text)
            .map_err(|e| dispatch_error(format!("Response is not JSON: {}", e)))
    }
}
