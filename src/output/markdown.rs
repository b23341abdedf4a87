//! Markdown summary generation
//!
//! This module renders a finished run as a human-readable markdown file,
//! written next to the partition's checkpoint.

use crate::crawler::CrawlReport;
use crate::storage::UrlOutcome;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Writes the markdown summary of a run
///
/// # Arguments
///
/// * `report` - The finished run
/// * `output_path` - Path where the markdown file should be written
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote markdown summary
/// * `Err(io::Error)` - Failed to write summary
pub fn write_summary(report: &CrawlReport, output_path: &Path) -> std::io::Result<()> {
    let markdown = format_markdown_summary(report);

    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a run report as markdown
pub fn format_markdown_summary(report: &CrawlReport) -> String {
    let mut md = String::new();

    md.push_str("# Listing Sweep Summary\n\n");

    // Run metadata
    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Site**: {}\n", report.site));
    md.push_str(&format!("- **Partition**: {}\n", report.partition));
    md.push_str(&format!("- **Status**: {}\n", report.status));
    md.push_str(&format!(
        "- **Duration**: {} seconds ({:.2} minutes)\n",
        report.elapsed.as_secs(),
        report.elapsed.as_secs_f64() / 60.0
    ));
    md.push_str(&format!(
        "- **Checkpoint**: `{}`\n\n",
        report.checkpoint_path.display()
    ));

    // Totals
    let duplicates: usize = report.urls.iter().map(|u| u.duplicates).sum();
    let captchas: usize = report.urls.iter().map(|u| u.captchas).sum();
    let filtered: usize = report.urls.iter().map(|u| u.filtered).sum();

    md.push_str("## Totals\n\n");
    md.push_str(&format!("- **Items in partition**: {}\n", report.total_items));
    md.push_str(&format!("- **New this run**: {}\n", report.new_items));
    md.push_str(&format!("- **Duplicates skipped**: {}\n", duplicates));
    md.push_str(&format!("- **Captchas**: {}\n", captchas));
    md.push_str(&format!("- **Dropped by posted date**: {}\n\n", filtered));

    // Per base URL
    if !report.urls.is_empty() {
        md.push_str("## Base URLs\n\n");
        md.push_str("| Base URL | Outcome | Pages | New | Duplicates | Captchas |\n");
        md.push_str("|----------|---------|-------|-----|------------|----------|\n");

        for url in &report.urls {
            md.push_str(&format!(
                "| {} | {} | {} | {} | {} | {} |\n",
                url.base_url, url.outcome, url.pages, url.new_items, url.duplicates, url.captchas
            ));
        }
        md.push('\n');
    }

    // Failures
    let problems: Vec<_> = report
        .urls
        .iter()
        .filter(|u| u.outcome != UrlOutcome::Completed)
        .filter_map(|u| u.error.as_ref().map(|e| (u, e)))
        .collect();
    if !problems.is_empty() {
        md.push_str("## Problems\n\n");
        for (url, error) in problems {
            md.push_str(&format!("- {} ({}): {}\n", url.base_url, url.outcome, error));
        }
        md.push('\n');
    }

    md
}
