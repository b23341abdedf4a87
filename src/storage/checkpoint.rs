//! JSON checkpoints, one file per run-day partition
//!
//! Layout: `<output-dir>/<YYYY-MM-DD>/<site>_<filter signature>.json`.
//! Saves go to a temporary file in the same directory which then replaces
//! the checkpoint, so a crash mid-write leaves the previous one intact.

use crate::filter::FilterSpec;
use crate::state::{CrawlState, Listing};
use crate::storage::traits::{CheckpointStore, StorageError, StorageResult};
use chrono::{Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Scope of resume and dedup state: a day plus a crawl key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub date: NaiveDate,

    /// Site name and filter signature
    pub key: String,
}

impl Partition {
    pub fn new(date: NaiveDate, site: &str, filter: &FilterSpec) -> Self {
        let site: String = site
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        Self {
            date,
            key: format!("{}_{}", site, filter.signature()),
        }
    }

    /// Path of this partition's checkpoint under `root`
    pub fn path(&self, root: &Path) -> PathBuf {
        root.join(self.date.format("%Y-%m-%d").to_string())
            .join(format!("{}.json", self.key))
    }

    /// The same key `days` days earlier
    pub fn days_before(&self, days: u32) -> Option<Self> {
        Some(Self {
            date: self.date.checked_sub_days(Days::new(u64::from(days)))?,
            key: self.key.clone(),
        })
    }
}

impl std::fmt::Display for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.date.format("%Y-%m-%d"), self.key)
    }
}

#[derive(Serialize)]
struct CheckpointRef<'a> {
    partition: String,
    saved_at: String,
    seen: &'a BTreeSet<String>,
    results: &'a [Listing],
}

#[derive(Deserialize)]
struct CheckpointFile {
    #[serde(default)]
    seen: Vec<String>,
    #[serde(default)]
    results: Vec<Listing>,
}

/// Checkpoint store writing JSON files
pub struct JsonCheckpoint {
    root: PathBuf,
    partition: Partition,
    path: PathBuf,
}

impl JsonCheckpoint {
    pub fn new(root: impl Into<PathBuf>, partition: Partition) -> Self {
        let root = root.into();
        let path = partition.path(&root);
        Self {
            root,
            partition,
            path,
        }
    }

    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    fn read(path: &Path) -> StorageResult<Option<CheckpointFile>> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if content.trim().is_empty() {
            return Ok(None);
        }

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| StorageError::Corrupt(format!("{}: {}", path.display(), e)))
    }
}

impl CheckpointStore for JsonCheckpoint {
    fn load(&self) -> StorageResult<CrawlState> {
        match Self::read(&self.path)? {
            Some(file) => {
                let state = CrawlState::from_parts(file.seen, file.results);
                tracing::info!(
                    "Resuming {}: {} items, {} seen hrefs",
                    self.partition,
                    state.len(),
                    state.seen().len()
                );
                Ok(state)
            }
            None => {
                tracing::debug!("No checkpoint at {}, starting fresh", self.path.display());
                Ok(CrawlState::new())
            }
        }
    }

    fn save(&mut self, state: &CrawlState) -> StorageResult<()> {
        let dir = self
            .path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        std::fs::create_dir_all(&dir)?;

        let snapshot = CheckpointRef {
            partition: self.partition.to_string(),
            saved_at: Utc::now().to_rfc3339(),
            seen: state.seen(),
            results: state.results(),
        };

        let mut tmp = NamedTempFile::new_in(&dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer_pretty(&mut writer, &snapshot)?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| StorageError::Io(e.error))?;

        tracing::debug!(
            "Checkpointed {} items to {}",
            state.len(),
            self.path.display()
        );
        Ok(())
    }

    fn location(&self) -> &Path {
        &self.path
    }

    fn label(&self) -> String {
        self.partition.to_string()
    }

    fn load_prior_hrefs(&self, days: u32) -> StorageResult<Vec<String>> {
        let mut hrefs = Vec::new();

        for offset in 1..=days {
            let Some(earlier) = self.partition.days_before(offset) else {
                break;
            };
            let path = earlier.path(&self.root);
            match Self::read(&path) {
                Ok(Some(file)) => {
                    // only what that day collected; its seen set may hold older seeds
                    let before = hrefs.len();
                    hrefs.extend(file.results.into_iter().map(|l| l.href));
                    tracing::debug!(
                        "Seeded {} hrefs from {}",
                        hrefs.len() - before,
                        path.display()
                    );
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("Skipping earlier checkpoint {}: {}", path.display(), e),
            }
        }

        Ok(hrefs)
    }
}
