//! Page session contract
//!
//! The crawl core drives a page through this narrow capability set only:
//! navigate, report the current URL and content, take a screenshot.
//! Browser process management is outside the crate; [`HttpSession`] is a
//! plain HTTP implementation for sites that render server-side.

mod http;

pub use http::{build_http_client, HttpSession};

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// A page load that did not complete
#[derive(Debug, Clone, Error)]
#[error("navigation to {url} failed: {message}")]
pub struct NavigationError {
    pub url: String,
    pub message: String,
}

impl NavigationError {
    pub fn new(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            message: message.into(),
        }
    }
}

/// A single page context, used sequentially for a whole run
#[async_trait]
pub trait Session: Send {
    /// Loads `url` and waits for the page to be ready
    async fn navigate(&mut self, url: &str) -> Result<(), NavigationError>;

    /// The URL currently loaded (after redirects); empty before any navigation
    async fn current_url(&mut self) -> String;

    /// The content of the current page
    async fn page_content(&mut self) -> String;

    /// Writes a capture of the current page to `path`
    async fn screenshot(&mut self, path: &Path) -> std::io::Result<()>;

    /// Scrolls one step, so lazily rendered content loads
    ///
    /// Sessions without a viewport ignore this.
    async fn scroll_step(&mut self) {}
}

/// Navigates with one immediate retry
///
/// The second failure is returned to the caller.
pub async fn navigate_with_retry(
    session: &mut dyn Session,
    url: &str,
) -> Result<(), NavigationError> {
    match session.navigate(url).await {
        Ok(()) => Ok(()),
        Err(first) => {
            tracing::warn!("{}; retrying once", first);
            session.navigate(url).await
        }
    }
}
