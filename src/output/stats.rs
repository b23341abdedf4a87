//! Statistics from the run journal
//!
//! This module provides functionality for extracting and displaying
//! recent runs and their per-base-URL outcomes.

use crate::storage::{RunJournal, RunRecord, StorageResult, UrlOutcome, UrlRecord};

/// One journaled run with its base-URL outcomes
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run: RunRecord,
    pub urls: Vec<UrlRecord>,
}

impl RunSummary {
    /// Number of base URLs that ended with `outcome`
    pub fn count(&self, outcome: UrlOutcome) -> usize {
        self.urls.iter().filter(|u| u.outcome == outcome).count()
    }

    pub fn duplicates(&self) -> usize {
        self.urls.iter().map(|u| u.duplicates).sum()
    }

    pub fn captchas(&self) -> usize {
        self.urls.iter().map(|u| u.captchas).sum()
    }
}

/// Journal statistics summary
#[derive(Debug, Clone)]
pub struct JournalStatistics {
    /// Most recent runs, newest first
    pub runs: Vec<RunSummary>,
}

impl JournalStatistics {
    /// Captchas across all loaded runs
    pub fn total_captchas(&self) -> usize {
        self.runs.iter().map(RunSummary::captchas).sum()
    }
}

/// Loads the most recent runs from the journal
///
/// # Arguments
///
/// * `journal` - The journal to query
/// * `limit` - Maximum number of runs
///
/// # Returns
///
/// * `Ok(JournalStatistics)` - Successfully loaded statistics
/// * `Err(StorageError)` - Failed to query the journal
pub fn load_statistics(journal: &dyn RunJournal, limit: usize) -> StorageResult<JournalStatistics> {
    let mut runs = Vec::new();
    for run in journal.recent_runs(limit)? {
        let urls = journal.url_records(run.id)?;
        runs.push(RunSummary { run, urls });
    }
    Ok(JournalStatistics { runs })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &JournalStatistics) {
    println!("=== Run Journal ===\n");

    if stats.runs.is_empty() {
        println!("No runs recorded yet.");
        return;
    }

    for summary in &stats.runs {
        let run = &summary.run;
        println!("Run {} [{}] {}", run.id, run.status, run.partition);
        println!(
            "  Started: {}  Finished: {}",
            run.started_at,
            run.finished_at.as_deref().unwrap_or("-")
        );
        println!(
            "  Items: {}  Duplicates: {}  Captchas: {}",
            run.items,
            summary.duplicates(),
            summary.captchas()
        );
        println!(
            "  Base URLs: {} completed, {} not applicable, {} failed, {} interrupted",
            summary.count(UrlOutcome::Completed),
            summary.count(UrlOutcome::NotApplicable),
            summary.count(UrlOutcome::Failed),
            summary.count(UrlOutcome::Interrupted)
        );
        for url in summary.urls.iter().filter(|u| u.error.is_some()) {
            println!(
                "    - {} ({}): {}",
                url.base_url,
                url.outcome,
                url.error.as_deref().unwrap_or_default()
            );
        }
        println!();
    }

    println!(
        "{} runs shown, {} captchas in total",
        stats.runs.len(),
        stats.total_captchas()
    );
}
