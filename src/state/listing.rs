//! Listing record accumulated by the crawl

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One item record, keyed by its canonical `href`
///
/// Created by a list extractor with the enrichment fields empty, then filled
/// in once by a detail extractor. Missing fields stay at their default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Listing {
    /// Canonical URL of the listing, the deduplication key
    pub href: String,
    pub title: String,
    pub price: String,
    pub price_per_area: String,
    pub area: String,
    pub location: String,
    pub description: String,
    pub thumbnail: String,
    pub posted_date: String,
    pub agent_name: String,
    pub agent_phone: String,
    pub images: Vec<String>,
    pub specs: BTreeMap<String, String>,
    pub config: BTreeMap<String, String>,
    /// Decimal coordinates, "lat,lng"
    pub map_coords: String,
    pub map_link: String,
    /// Degrees/minutes/seconds rendering of the coordinates
    pub map_dms: String,
}

impl Listing {
    /// Creates a listing with only its key set
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            ..Self::default()
        }
    }

    /// Returns true if the detail pass filled in anything beyond the card fields
    pub fn is_enriched(&self) -> bool {
        !self.description.is_empty()
            || !self.agent_phone.is_empty()
            || !self.images.is_empty()
            || !self.specs.is_empty()
            || !self.map_coords.is_empty()
    }
}
