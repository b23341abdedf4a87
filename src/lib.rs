//! Listing-Sweep: a resumable listing crawler
//!
//! This crate walks paginated listing pages on a target site, opens each new
//! listing's detail page for enrichment, and accumulates a deduplicated result
//! set that survives interruptions and re-runs on the same day.
//!
//! Per-site field scraping lives behind the [`extract::Site`] contract; page
//! access lives behind [`session::Session`]. The crate core is the crawl
//! orchestration in [`crawler`].

pub mod config;
pub mod crawler;
pub mod extract;
pub mod filter;
pub mod output;
pub mod session;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Listing-Sweep operations
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Navigation error: {0}")]
    Navigation(#[from] session::NavigationError),

    #[error("Captcha detected at {url}")]
    CaptchaDetected { url: String },

    #[error("No location matched '{location}'")]
    LocationNotFound { location: String },

    #[error("Extraction error for field '{field}': {message}")]
    Extraction { field: String, message: String },

    #[error("Persistence error: {0}")]
    Persistence(#[from] storage::StorageError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SweepError {
    /// Returns true if this error must end the whole run
    ///
    /// Only persistence faults are fatal; item and URL level faults are
    /// isolated by the orchestrator.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Persistence(_))
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid CSS selector in config: {0}")]
    InvalidSelector(String),
}

/// Result type alias for Listing-Sweep operations
pub type Result<T> = std::result::Result<T, SweepError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Coordinator, CrawlReport, StopSignal};
pub use filter::{FilterSpec, LocationCandidate};
pub use state::{CrawlState, Listing};
