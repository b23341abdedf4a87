//! Filter translation
//!
//! This module is responsible for:
//! - The structured [`FilterSpec`] for one crawl run
//! - Mapping filter fields onto a site's query-parameter names
//! - Resolving a generic base URL to a location-scoped one (search action,
//!   then fuzzy matching against the location picker)
//! - The filter signature that keys run-day partitions

mod location;
mod normalize;

pub use location::{best_match, score_location, LocationCandidate, LocationMatch, MATCH_THRESHOLD};
pub use normalize::{normalize_location, strip_diacritics};

use crate::extract::Site;
use crate::session::Session;
use crate::{Result, SweepError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use url::Url;

/// Room-count selector, passed to the site unchanged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Rooms {
    /// A single count, e.g. `3`
    Count(u32),

    /// A pre-joined multi-value selector, e.g. `"1,2"`
    Codes(String),
}

impl Rooms {
    fn is_unset(&self) -> bool {
        match self {
            Self::Count(n) => *n == 0,
            Self::Codes(s) => s.trim().is_empty(),
        }
    }
}

impl fmt::Display for Rooms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count(n) => write!(f, "{}", n),
            Self::Codes(s) => write!(f, "{}", s),
        }
    }
}

/// Structured filter for one crawl run
///
/// Price, area and direction treat zero as "not specified". Frontage, road
/// and balcony direction codes are sent whenever present, zero included,
/// because zero means "any" to the site.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FilterSpec {
    pub location: Option<String>,
    pub price_from: Option<f64>,
    pub price_to: Option<f64>,
    pub area_from: Option<f64>,
    pub area_to: Option<f64>,
    pub direction: Option<u8>,
    pub frontage: Option<u8>,
    pub road: Option<u8>,
    pub rooms: Option<Rooms>,
    pub balcony_direction: Option<u8>,
    pub max_pages: Option<u32>,
    pub max_items_per_page: Option<usize>,

    /// Listings posted before this date are dropped after enrichment
    pub posted_date_from: Option<NaiveDate>,
}

impl FilterSpec {
    /// The requested location, if one is set and non-blank
    pub fn location(&self) -> Option<&str> {
        self.location
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
    }

    /// Query pairs for every specified field, in parameter-table order
    pub fn query_pairs<'a>(&self, params: &'a QueryParams) -> Vec<(&'a str, String)> {
        let mut pairs = Vec::new();

        let bounds = [
            (&params.price_from, self.price_from),
            (&params.price_to, self.price_to),
            (&params.area_from, self.area_from),
            (&params.area_to, self.area_to),
        ];
        for (name, value) in bounds {
            if let Some(v) = value.filter(|v| *v > 0.0) {
                pairs.push((name.as_str(), v.to_string()));
            }
        }

        if let Some(direction) = self.direction.filter(|d| *d != 0) {
            pairs.push((params.direction.as_str(), direction.to_string()));
        }
        if let Some(frontage) = self.frontage {
            pairs.push((params.frontage.as_str(), frontage.to_string()));
        }
        if let Some(road) = self.road {
            pairs.push((params.road.as_str(), road.to_string()));
        }
        if let Some(rooms) = self.rooms.as_ref().filter(|r| !r.is_unset()) {
            pairs.push((params.rooms.as_str(), rooms.to_string()));
        }
        if let Some(balcony) = self.balcony_direction {
            pairs.push((params.balcony_direction.as_str(), balcony.to_string()));
        }

        pairs
    }

    /// Short stable hash of the fields that define the crawl scope
    ///
    /// Page and item limits are excluded, so changing them keeps resuming
    /// the same partition.
    pub fn signature(&self) -> String {
        let scope = FilterSpec {
            max_pages: None,
            max_items_per_page: None,
            ..self.clone()
        };
        let encoded = serde_json::to_string(&scope).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(encoded.as_bytes());
        hex::encode(hasher.finalize())[..12].to_string()
    }
}

/// A site's query-parameter name for each filter field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct QueryParams {
    pub price_from: String,
    pub price_to: String,
    pub area_from: String,
    pub area_to: String,
    pub direction: String,
    pub frontage: String,
    pub road: String,
    pub rooms: String,
    pub balcony_direction: String,
}

impl Default for QueryParams {
    fn default() -> Self {
        Self {
            price_from: "gtn".to_string(),
            price_to: "gcn".to_string(),
            area_from: "dtnn".to_string(),
            area_to: "dtln".to_string(),
            direction: "h".to_string(),
            frontage: "frontage".to_string(),
            road: "road".to_string(),
            rooms: "rs".to_string(),
            balcony_direction: "bcdir".to_string(),
        }
    }
}

/// Merges the filter's query pairs into `base`
///
/// Existing parameters keep their position and value unless a filter field
/// overrides them; new parameters are appended. Returns `base` unchanged
/// when the filter specifies nothing.
///
/// # Examples
///
/// ```
/// use listing_sweep::filter::{apply_query, FilterSpec, QueryParams};
///
/// let filter = FilterSpec {
///     price_from: Some(2.0),
///     frontage: Some(0),
///     ..Default::default()
/// };
/// let url = apply_query("https://example.com/ban?sort=new&gtn=1", &filter, &QueryParams::default()).unwrap();
/// assert_eq!(url, "https://example.com/ban?sort=new&gtn=2&frontage=0");
/// ```
pub fn apply_query(
    base: &str,
    filter: &FilterSpec,
    params: &QueryParams,
) -> std::result::Result<String, url::ParseError> {
    let mut url = Url::parse(base)?;
    let pairs = filter.query_pairs(params);
    if pairs.is_empty() {
        return Ok(base.to_string());
    }

    let mut merged: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    for (name, value) in pairs {
        let first = merged.iter().position(|(k, _)| k == name);
        merged.retain(|(k, _)| k != name);
        let at = first.unwrap_or(merged.len());
        merged.insert(at, (name.to_string(), value));
    }

    url.query_pairs_mut().clear().extend_pairs(merged);
    Ok(url.to_string())
}

/// Translates a base URL and filter into the listing URL to crawl
///
/// When a location is requested and `base_url` is generic, the site's search
/// action runs first; if that still lands on a generic URL the location
/// picker is fuzzy-matched. No confident match yields
/// [`SweepError::LocationNotFound`], which skips this base URL only.
pub async fn resolve_target(
    session: &mut dyn Session,
    site: &dyn Site,
    base_url: &str,
    filter: &FilterSpec,
) -> Result<String> {
    let mut scoped = base_url.to_string();

    if let Some(location) = filter.location() {
        if site.is_generic_url(base_url) {
            let not_found = || SweepError::LocationNotFound {
                location: location.to_string(),
            };

            let searched = site
                .search_location(session, base_url, location)
                .await?
                .ok_or_else(not_found)?;
            tracing::debug!("Search for '{}' landed on {}", location, searched);

            scoped = if site.is_generic_url(&searched) {
                let candidates = site.location_candidates(session).await?;
                tracing::debug!(
                    "Search result is still generic, matching {} picker entries",
                    candidates.len()
                );
                best_match(location, &candidates)
                    .map(|m| m.url)
                    .ok_or_else(not_found)?
            } else {
                searched
            };
        }
    }

    Ok(apply_query(&scoped, filter, site.query_params())?)
}
