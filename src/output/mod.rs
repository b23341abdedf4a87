//! Output module for reporting crawl results
//!
//! This module handles:
//! - Printing the run report to the console
//! - Writing the markdown run summary
//! - Reading and printing run journal statistics

mod markdown;
pub mod stats;

pub use markdown::{format_markdown_summary, write_summary};
pub use stats::{load_statistics, print_statistics, JournalStatistics, RunSummary};

use crate::crawler::CrawlReport;
use crate::storage::UrlOutcome;

/// Prints the run report to stdout
///
/// Always includes the item total and the checkpoint location.
pub fn print_report(report: &CrawlReport) {
    println!("=== Crawl Report ===\n");
    println!("Site:       {}", report.site);
    println!("Partition:  {}", report.partition);
    println!("Status:     {}", report.status);
    println!("Elapsed:    {:.1}s", report.elapsed.as_secs_f64());
    println!();

    for url in &report.urls {
        let marker = match url.outcome {
            UrlOutcome::Completed => "ok",
            UrlOutcome::NotApplicable => "n/a",
            UrlOutcome::Failed => "FAIL",
            UrlOutcome::Interrupted => "stop",
        };
        println!(
            "  [{:>4}] {} - {} pages, {} new, {} duplicates, {} captchas",
            marker, url.base_url, url.pages, url.new_items, url.duplicates, url.captchas
        );
        if let Some(error) = &url.error {
            println!("         {}", error);
        }
    }
    if !report.urls.is_empty() {
        println!();
    }

    println!(
        "Total items: {} ({} new this run)",
        report.total_items, report.new_items
    );
    println!("Checkpoint:  {}", report.checkpoint_path.display());
}
