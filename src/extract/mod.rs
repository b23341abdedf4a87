//! Extraction contracts consumed by the crawl core
//!
//! This module is responsible for:
//! - The [`ListExtractor`] / [`DetailExtractor`] / [`LocationPicker`] traits
//!   every site implements
//! - The [`Site`] bundle the orchestrator is given (the core never branches
//!   on site identity)
//! - Per-field helpers that default a missing field instead of failing the item
//! - [`SelectorSite`], a CSS-selector driven implementation configured from TOML

mod fields;
mod selectors;

pub use fields::{
    clean_image_urls, field_or_default, parse_posted_date, resolve_href, MapPoint,
};
pub use selectors::SelectorSite;

use crate::filter::{LocationCandidate, QueryParams};
use crate::session::Session;
use crate::state::Listing;
use crate::Result;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::Path;

/// Cards read from one listing page
#[derive(Debug, Clone, Default)]
pub struct ListingBatch {
    /// New listings, at most `max_items` of them, in page order
    pub items: Vec<Listing>,

    /// Every card observed on the page
    pub cards_seen: usize,

    /// Cards skipped because their href was already seen
    pub duplicates: usize,
}

/// Context handed to a detail extractor
#[derive(Debug, Clone, Copy)]
pub struct DetailContext<'a> {
    /// Listing page the item came from
    pub listing_url: &'a str,

    /// Where captcha captures go
    pub screenshot_dir: &'a Path,

    /// Scroll steps before reading the page
    pub scroll_steps: u32,
}

/// Reads listing cards from the current listing page
#[async_trait]
pub trait ListExtractor: Send + Sync {
    /// Collects up to `max_items` listings whose href is not in `seen`
    ///
    /// Deduplication is by href comparison only.
    async fn collect(
        &self,
        session: &mut dyn Session,
        seen: &BTreeSet<String>,
        max_items: usize,
        scroll_steps: u32,
    ) -> Result<ListingBatch>;

    /// Absolute URL behind the page's "next page" control, if there is one
    async fn next_page_url(&self, session: &mut dyn Session) -> Option<String>;

    /// Returns true once the current page shows at least one listing card
    ///
    /// Polled before `collect` while the list renders.
    async fn cards_rendered(&self, _session: &mut dyn Session) -> bool {
        true
    }
}

/// Fills a listing's enrichment fields from its (already loaded) detail page
#[async_trait]
pub trait DetailExtractor: Send + Sync {
    /// Returns the listing with every available field filled in
    ///
    /// Missing fields keep their defaults. A challenge page is reported as
    /// [`crate::SweepError::CaptchaDetected`], never as an empty listing.
    async fn enrich(
        &self,
        session: &mut dyn Session,
        listing: Listing,
        context: &DetailContext<'_>,
    ) -> Result<Listing>;
}

/// Location search and picker access
#[async_trait]
pub trait LocationPicker: Send + Sync {
    /// Runs the site's search action for `location`
    ///
    /// Returns the URL the search landed on, or None if it produced nothing.
    async fn search_location(
        &self,
        session: &mut dyn Session,
        base_url: &str,
        location: &str,
    ) -> Result<Option<String>>;

    /// Entries of the location picker on the current page
    async fn location_candidates(&self, session: &mut dyn Session)
        -> Result<Vec<LocationCandidate>>;
}

/// Everything the orchestrator needs from one target site
pub trait Site: ListExtractor + DetailExtractor + LocationPicker {
    fn name(&self) -> &str;

    /// Query-parameter names for filter fields
    fn query_params(&self) -> &QueryParams;

    /// Returns true if `url` is a listing URL not scoped to a location
    fn is_generic_url(&self, url: &str) -> bool;

    /// Marker whose presence in the URL or early content means a challenge page
    fn captcha_marker(&self) -> &str {
        "captcha"
    }
}
