//! Dedup and resume operations over a borrowed [`CrawlState`]
//!
//! Duplicates are discarded before any detail page is opened. An href only
//! becomes "seen" once its enriched listing is committed, so an item whose
//! detail pass failed is retried on the next run.

use crate::state::{CrawlState, Listing};
use std::collections::HashSet;

/// Result of filtering a freshly collected batch
#[derive(Debug, Default)]
pub struct DedupOutcome {
    /// Items never seen before, in collection order
    pub fresh: Vec<Listing>,

    /// Items dropped because their href was already seen (or repeated in the batch)
    pub duplicates: usize,
}

/// Splits a batch into new items and duplicates
///
/// Keeps the first occurrence of an href repeated within the same batch.
pub fn partition_new(state: &CrawlState, batch: Vec<Listing>) -> DedupOutcome {
    let mut outcome = DedupOutcome::default();
    let mut in_batch = HashSet::new();

    for listing in batch {
        if listing.href.is_empty() {
            continue;
        }
        if state.is_seen(&listing.href) || !in_batch.insert(listing.href.clone()) {
            outcome.duplicates += 1;
            continue;
        }
        outcome.fresh.push(listing);
    }

    outcome
}

/// Commits an enriched listing: appends it and marks its href seen
///
/// Returns false if the href was already committed.
pub fn commit(state: &mut CrawlState, listing: Listing) -> bool {
    let href = listing.href.clone();
    let inserted = state.insert(listing);
    if !inserted {
        tracing::debug!("Listing {} already committed, skipping", href);
    }
    inserted
}
