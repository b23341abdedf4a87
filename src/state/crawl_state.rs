use crate::state::Listing;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Accumulated state of one run-day partition
///
/// Holds the set of seen `href` keys (the resume cursor) and the ordered list
/// of persisted listings. Owned by the coordinator; the dedup operations and
/// the checkpoint store work on references to it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrawlState {
    #[serde(default)]
    seen: BTreeSet<String>,

    #[serde(default)]
    results: Vec<Listing>,

    /// Hrefs seeded from earlier partitions; consulted for dedup, never saved
    #[serde(skip)]
    prior: BTreeSet<String>,
}

impl CrawlState {
    /// Creates an empty state (first run of the day)
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a state from persisted parts
    ///
    /// Every result's href is folded into the seen set, and results with a
    /// repeated href are dropped so the uniqueness invariant holds even for a
    /// hand-edited checkpoint.
    pub fn from_parts(seen: impl IntoIterator<Item = String>, results: Vec<Listing>) -> Self {
        let mut state = Self {
            seen: seen.into_iter().collect(),
            results: Vec::with_capacity(results.len()),
            prior: BTreeSet::new(),
        };

        let mut kept = BTreeSet::new();
        for listing in results {
            if kept.insert(listing.href.clone()) {
                state.seen.insert(listing.href.clone());
                state.results.push(listing);
            }
        }

        state
    }

    /// Returns true if this href was already collected (or seeded)
    pub fn is_seen(&self, href: &str) -> bool {
        self.seen.contains(href) || self.prior.contains(href)
    }

    /// Marks hrefs from earlier partitions as seen without adding results
    ///
    /// Seeded hrefs only live for this run; they are not part of the
    /// partition's own seen set and so never reach its checkpoint.
    pub fn seed_seen(&mut self, hrefs: impl IntoIterator<Item = String>) {
        self.prior
            .extend(hrefs.into_iter().filter(|href| !self.seen.contains(href)));
    }

    /// Appends an enriched listing and marks its href as seen
    ///
    /// Returns false (and changes nothing) if the href is already present.
    pub(crate) fn insert(&mut self, listing: Listing) -> bool {
        if self.is_seen(&listing.href) {
            return false;
        }
        self.seen.insert(listing.href.clone());
        self.results.push(listing);
        true
    }

    /// Hrefs collected in this partition
    pub fn seen(&self) -> &BTreeSet<String> {
        &self.seen
    }

    pub fn results(&self) -> &[Listing] {
        &self.results
    }

    /// Number of collected listings
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
