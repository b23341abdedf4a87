//! Storage module for persisting crawl data
//!
//! This module handles:
//! - Run-day partitions and atomic JSON checkpoints of the crawl state
//! - Lookback over earlier days' checkpoints for dedup seeding
//! - The SQLite run journal (runs and per-base-URL outcomes)

mod checkpoint;
mod journal;
mod schema;
mod traits;

pub use checkpoint::{JsonCheckpoint, Partition};
pub use journal::SqliteJournal;
pub use traits::{CheckpointStore, RunJournal, StorageError, StorageResult};

use std::fmt;
use std::path::Path;

/// Opens the run journal at `path`
///
/// # Returns
///
/// * `Ok(SqliteJournal)` - Successfully opened journal
/// * `Err(StorageError)` - Failed to open or initialize the database
pub fn open_journal(path: &Path) -> StorageResult<SqliteJournal> {
    SqliteJournal::new(path)
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub partition: String,
    pub config_hash: String,
    pub status: RunStatus,
    pub items: usize,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}

/// How one base URL ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlOutcome {
    /// Page loop ran to exhaustion or the page limit
    Completed,

    /// Filter could not be applied (no location match); nothing crawled
    NotApplicable,

    /// Abandoned after a URL-level fault
    Failed,

    /// Stopped by an operator interrupt
    Interrupted,
}

impl UrlOutcome {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::NotApplicable => "not_applicable",
            Self::Failed => "failed",
            Self::Interrupted => "interrupted",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "completed" => Some(Self::Completed),
            "not_applicable" => Some(Self::NotApplicable),
            "failed" => Some(Self::Failed),
            "interrupted" => Some(Self::Interrupted),
            _ => None,
        }
    }
}

impl fmt::Display for UrlOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Completed => "completed",
            Self::NotApplicable => "not applicable",
            Self::Failed => "failed",
            Self::Interrupted => "interrupted",
        };
        f.write_str(label)
    }
}

/// Outcome and counters for one base URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlRecord {
    pub base_url: String,

    /// URL actually crawled after filter translation
    pub target_url: Option<String>,
    pub outcome: UrlOutcome,
    pub pages: u32,
    pub new_items: usize,
    pub duplicates: usize,
    pub captchas: usize,

    /// Enriched listings dropped by the posted-date bound
    pub filtered: usize,
    pub error: Option<String>,
}
