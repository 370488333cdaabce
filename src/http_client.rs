//! HTTP Client builder module
//!
//! Both the chat stream and the tool server share the same proxy and TLS
//! settings but use different timeouts.

use reqwest::{Client, Proxy};
use std::time::Duration;

use crate::model::config::{Config, TlsBackend};

/// Proxy configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Proxy URL, supports http/https/socks5
    pub url: String,
    /// Proxy authentication username
    pub username: Option<String>,
    /// Proxy authentication password
    pub password: Option<String>,
}

impl ProxyConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: None,
            password: None,
        }
    }

    pub fn with_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Proxy settings from the application config, if a proxy URL is set
    pub fn from_config(config: &Config) -> Option<Self> {
        let url = config.proxy_url.as_deref().filter(|u| !u.trim().is_empty())?;
        let proxy = Self::new(url);
        Some(match (&config.proxy_username, &config.proxy_password) {
            (Some(username), Some(password)) => proxy.with_auth(username, password),
            _ => proxy,
        })
    }
}

/// Options for one reqwest client
#[derive(Debug, Clone)]
pub struct HttpClientOptions {
    /// Total request timeout, including reading the whole body
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub proxy: Option<ProxyConfig>,
    pub tls_backend: TlsBackend,
}

impl HttpClientOptions {
    /// Options for the long-lived chat stream
    pub fn for_chat(config: &Config) -> Self {
        Self {
            timeout: Duration::from_secs(config.request_timeout_secs),
            connect_timeout: Duration::from_secs(10),
            proxy: ProxyConfig::from_config(config),
            tls_backend: config.tls_backend,
        }
    }

    /// Options for the local tool server, which is never proxied
    pub fn for_tools(config: &Config) -> Self {
        Self {
            timeout: Duration::from_secs(config.tool_timeout_secs),
            connect_timeout: Duration::from_secs(5),
            proxy: None,
            tls_backend: config.tls_backend,
        }
    }

    /// Build the configured reqwest::Client
    pub fn build(&self) -> anyhow::Result<Client> {
        let mut builder = Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout);

        if self.tls_backend == TlsBackend::Rustls {
            builder = builder.use_rustls_tls();
        }

        if let Some(proxy_config) = &self.proxy {
            let mut proxy = Proxy::all(&proxy_config.url)?;
            if let (Some(username), Some(password)) = (&proxy_config.username, &proxy_config.password) {
                proxy = proxy.basic_auth(username, password);
            }
            builder = builder.proxy(proxy);
            tracing::debug!("HTTP Client using proxy: {}", proxy_config.url);
        }

        Ok(builder.build()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proxy_from_config() {
        let mut config = Config::default();
        assert!(ProxyConfig::from_config(&config).is_none());

        config.proxy_url = Some("socks5://127.0.0.1:1080".to_string());
        config.proxy_username = Some("user".to_string());
        config.proxy_password = Some("pass".to_string());
        let proxy = ProxyConfig::from_config(&config).unwrap();
        assert_eq!(proxy, ProxyConfig::new("socks5://127.0.0.1:1080").with_auth("user", "pass"));
    }

    #[test]
    fn test_blank_proxy_url_is_ignored() {
        let mut config = Config::default();
        config.proxy_url = Some("  ".to_string());
        assert!(ProxyConfig::from_config(&config).is_none());
    }

    #[test]
    fn test_tool_client_is_never_proxied() {
        let mut config = Config::default();
        config.proxy_url = Some("http://127.0.0.1:7890".to_string());
        assert!(HttpClientOptions::for_chat(&config).proxy.is_some());
        assert!(HttpClientOptions::for_tools(&config).proxy.is_none());
    }

    #[test]
    fn test_build_client() {
        let config = Config::default();
        assert!(HttpClientOptions::for_chat(&config).build().is_ok());
        assert!(HttpClientOptions::for_tools(&config).build().is_ok());
    }
}
