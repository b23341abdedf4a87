//! Storage traits and error types
//!
//! This module defines the trait interfaces for the checkpoint store and the
//! run journal, and their shared error type.

use crate::state::CrawlState;
use crate::storage::{RunRecord, RunStatus, UrlRecord};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Checkpoint is corrupt: {0}")]
    Corrupt(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        if e.is_io() {
            Self::Io(e.into())
        } else {
            Self::Serialization(e.to_string())
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Durable checkpoints for one run-day partition
///
/// A save either fully replaces the previous checkpoint or leaves it intact.
pub trait CheckpointStore: Send {
    /// Loads the last durable checkpoint
    ///
    /// A missing or empty checkpoint loads as an empty state.
    fn load(&self) -> StorageResult<CrawlState>;

    /// Writes the whole state, replacing the previous checkpoint atomically
    fn save(&mut self, state: &CrawlState) -> StorageResult<()>;

    /// Where the checkpoint lives
    fn location(&self) -> &Path;

    /// Human-readable name of the partition, recorded in the run journal
    fn label(&self) -> String;

    /// Hrefs recorded by this partition's checkpoints on the previous `days` days
    fn load_prior_hrefs(&self, days: u32) -> StorageResult<Vec<String>>;
}

/// Trait for run journal backends
///
/// The journal is a status record only; the crawl never depends on it.
pub trait RunJournal: Send {
    // ===== Run Management =====

    /// Creates a new run in the `running` state
    ///
    /// # Arguments
    ///
    /// * `partition` - Partition key the run writes to
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn start_run(&mut self, partition: &str, config_hash: &str) -> StorageResult<i64>;

    /// Sets the final status, item total and finish timestamp of a run
    fn finish_run(&mut self, run_id: i64, status: RunStatus, items: usize) -> StorageResult<()>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Most recent runs, newest first
    fn recent_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>>;

    // ===== Base URL outcomes =====

    /// Records how one base URL ended
    fn record_url(&mut self, run_id: i64, record: &UrlRecord) -> StorageResult<()>;

    /// Outcomes recorded for a run, in recording order
    fn url_records(&self, run_id: i64) -> StorageResult<Vec<UrlRecord>>;
}
