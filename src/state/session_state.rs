//! Transient per-base-URL crawl session state
//!
//! A `CrawlSession` lives for one base-URL traversal and is discarded after.

use std::fmt;

/// Progress marker for the current base-URL traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlPhase {
    /// Opening the base URL
    Loading,

    /// Translating the filter into a target URL
    ResolvingFilter,

    /// Reading listing cards from the current page
    Collecting,

    /// Opening detail page `current` of `total`
    Enriching { current: usize, total: usize },

    /// Waiting between pages or base URLs
    CoolingDown,

    /// Traversal over (exhausted, page limit, failure or interrupt)
    Finished,
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loading => write!(f, "loading"),
            Self::ResolvingFilter => write!(f, "resolving filter"),
            Self::Collecting => write!(f, "collecting"),
            Self::Enriching { current, total } => write!(f, "enriching {}/{}", current, total),
            Self::CoolingDown => write!(f, "cooling down"),
            Self::Finished => write!(f, "finished"),
        }
    }
}

/// Per-page counters
///
/// `duplicates + new_items + over_limit == cards_seen` for every page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageTally {
    /// Cards observed on the listing page
    pub cards_seen: usize,

    /// Cards dropped because their href was already seen
    pub duplicates: usize,

    /// Cards accepted for enrichment
    pub new_items: usize,

    /// Cards past the per-page cap or without a usable href
    pub over_limit: usize,
}

impl PageTally {
    /// Builds a tally, attributing whatever remains to `over_limit`
    pub fn new(cards_seen: usize, duplicates: usize, new_items: usize) -> Self {
        let accounted = duplicates + new_items;
        // Extractors may report fewer cards than they produced; trust the items.
        let cards_seen = cards_seen.max(accounted);
        Self {
            cards_seen,
            duplicates,
            new_items,
            over_limit: cards_seen - accounted,
        }
    }
}

/// Running counters for one base URL
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionCounters {
    pub pages: u32,
    pub cards_seen: usize,
    pub duplicates: usize,
    pub collected: usize,
    pub captchas: usize,
    pub detail_failures: usize,
    pub filtered: usize,
}

impl SessionCounters {
    pub fn add_page(&mut self, tally: &PageTally) {
        self.pages += 1;
        self.cards_seen += tally.cards_seen;
        self.duplicates += tally.duplicates;
    }
}

/// State of one base-URL traversal
#[derive(Debug, Clone)]
pub struct CrawlSession {
    /// Base URL as configured
    pub base_url: String,

    /// URL after filter translation (None until resolved)
    pub target_url: Option<String>,

    /// Zero-based index of the current listing page
    pub page_index: u32,

    /// URL of the listing page being processed, used for recovery
    pub listing_url: Option<String>,

    phase: CrawlPhase,

    pub counters: SessionCounters,
}

impl CrawlSession {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            target_url: None,
            page_index: 0,
            listing_url: None,
            phase: CrawlPhase::Loading,
            counters: SessionCounters::default(),
        }
    }

    pub fn phase(&self) -> CrawlPhase {
        self.phase
    }

    /// Moves to a new phase, logging the change
    pub fn set_phase(&mut self, phase: CrawlPhase) {
        if self.phase != phase {
            tracing::debug!(
                "[{} p{}] {} -> {}",
                self.base_url,
                self.page_index + 1,
                self.phase,
                phase
            );
            self.phase = phase;
        }
    }
}
