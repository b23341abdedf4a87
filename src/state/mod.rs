//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `Listing`: one collected item record, keyed by `href`
//! - `CrawlState`: seen hrefs plus ordered results for a run-day partition
//! - `dedup`: filtering of duplicates and committing of enriched listings
//! - `CrawlSession`: transient per-base-URL traversal state and progress markers

mod crawl_state;
pub mod dedup;
mod listing;
mod session_state;

// Re-export main types
pub use crawl_state::CrawlState;
pub use dedup::DedupOutcome;
pub use listing::Listing;
pub use session_state::{CrawlPhase, CrawlSession, PageTally, SessionCounters};
