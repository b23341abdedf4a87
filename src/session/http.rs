//! HTTP session implementation
//!
//! A [`Session`] backed by a reqwest client: every navigation is a GET,
//! redirects are followed, and the final URL and body become the current page.
//! Screenshots are HTML snapshots of the current body.

use crate::config::SessionConfig;
use crate::session::{NavigationError, Session};
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client};
use std::path::Path;
use std::time::Duration;

/// Builds an HTTP client with the configured user agent and timeout
///
/// # Example
///
/// ```no_run
/// use listing_sweep::config::SessionConfig;
/// use listing_sweep::session::build_http_client;
///
/// let config = SessionConfig {
///     user_agent: "Mozilla/5.0 (X11; Linux x86_64)".to_string(),
///     timeout_secs: 30,
/// };
///
/// let client = build_http_client(&config).unwrap();
/// ```
pub fn build_http_client(config: &SessionConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Session over plain HTTP
pub struct HttpSession {
    client: Client,
    current_url: String,
    content: String,
}

impl HttpSession {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            current_url: String::new(),
            content: String::new(),
        }
    }

    /// Creates a session with a client built from `config`
    pub fn from_config(config: &SessionConfig) -> Result<Self, reqwest::Error> {
        Ok(Self::new(build_http_client(config)?))
    }
}

#[async_trait]
impl Session for HttpSession {
    async fn navigate(&mut self, url: &str) -> Result<(), NavigationError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            let message = if e.is_timeout() {
                "request timeout".to_string()
            } else if e.is_connect() {
                "connection refused".to_string()
            } else {
                e.to_string()
            };
            NavigationError::new(url, message)
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(NavigationError::new(url, format!("HTTP {}", status.as_u16())));
        }

        let final_url = response.url().to_string();
        let body = response
            .text()
            .await
            .map_err(|e| NavigationError::new(url, format!("failed to read body: {}", e)))?;

        tracing::trace!("Loaded {} ({} bytes)", final_url, body.len());
        self.current_url = final_url;
        self.content = body;
        Ok(())
    }

    async fn current_url(&mut self) -> String {
        self.current_url.clone()
    }

    async fn page_content(&mut self) -> String {
        self.content.clone()
    }

    async fn screenshot(&mut self, path: &Path) -> std::io::Result<()> {
        let snapshot = path.with_extension("html");
        if let Some(parent) = snapshot.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&snapshot, self.content.as_bytes()).await
    }
}
