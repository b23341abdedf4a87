//! Per-field extraction helpers
//!
//! Every field is extracted on its own: a missing or malformed field falls
//! back to its default without affecting the rest of the listing.

use crate::Result;
use chrono::NaiveDate;
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;
use url::Url;

/// Unwraps a field result, defaulting (and logging) on failure
pub fn field_or_default<T: Default>(field: &str, result: Result<T>) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            tracing::trace!("Field '{}' unavailable: {}", field, e);
            T::default()
        }
    }
}

/// Resolves a link against the page URL
///
/// Returns None for empty, fragment-only, `javascript:`, `mailto:`, `tel:`
/// and `data:` links, and for anything that is not http(s) after resolution.
pub fn resolve_href(href: &str, base: Option<&Url>) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    let resolved = match base {
        Some(base) => base.join(href).ok()?,
        None => Url::parse(href).ok()?,
    };

    match resolved.scheme() {
        "http" | "https" => Some(resolved.to_string()),
        _ => None,
    }
}

/// Drops placeholder and inline images, keeping first occurrences in order
pub fn clean_image_urls<I, S>(urls: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    urls.into_iter()
        .map(|u| u.as_ref().trim().to_string())
        .filter(|u| !u.is_empty() && !u.contains("no-photo") && !u.starts_with("data:image"))
        .filter(|u| seen.insert(u.clone()))
        .collect()
}

fn date_pattern() -> &'static Regex {
    static DATE: OnceLock<Regex> = OnceLock::new();
    DATE.get_or_init(|| {
        Regex::new(r"(\d{4}-\d{1,2}-\d{1,2}|\d{1,2}[/-]\d{1,2}[/-]\d{4})")
            .expect("date pattern is valid")
    })
}

/// Parses the first date found in a posted-date label
///
/// Accepts `dd/mm/yyyy`, `dd-mm-yyyy` and `yyyy-mm-dd`, with any surrounding
/// text or trailing time ignored.
///
/// # Examples
///
/// ```
/// use listing_sweep::extract::parse_posted_date;
/// use chrono::NaiveDate;
///
/// assert_eq!(parse_posted_date("Ngày đăng: 05/03/2024 14:20"), NaiveDate::from_ymd_opt(2024, 3, 5));
/// assert_eq!(parse_posted_date("hôm nay"), None);
/// ```
pub fn parse_posted_date(text: &str) -> Option<NaiveDate> {
    let token = date_pattern().find(text)?.as_str();
    ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y"]
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(token, format).ok())
}

fn map_patterns() -> &'static [Regex; 3] {
    static PATTERNS: OnceLock<[Regex; 3]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            Regex::new(r"!3d(-?[0-9.]+)!4d(-?[0-9.]+)").expect("embed pattern is valid"),
            Regex::new(r"[?&](?:q|ll|center)=(-?[0-9.]+),\s*(-?[0-9.]+)")
                .expect("query pattern is valid"),
            Regex::new(r"daddr=(-?[0-9.]+)\+(-?[0-9.]+)").expect("directions pattern is valid"),
        ]
    })
}

/// A validated latitude/longitude pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapPoint {
    pub lat: f64,
    pub lng: f64,
}

impl MapPoint {
    /// Returns None when either coordinate is out of range
    pub fn new(lat: f64, lng: f64) -> Option<Self> {
        if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng) {
            Some(Self { lat, lng })
        } else {
            None
        }
    }

    /// Reads coordinates out of an embedded map URL
    pub fn from_map_link(link: &str) -> Option<Self> {
        map_patterns().iter().find_map(|pattern| {
            let caps = pattern.captures(link)?;
            let lat = caps.get(1)?.as_str().parse().ok()?;
            let lng = caps.get(2)?.as_str().parse().ok()?;
            Self::new(lat, lng)
        })
    }

    /// Decimal coordinates as `"lat,lng"`
    pub fn coords(&self) -> String {
        format!("{},{}", self.lat, self.lng)
    }

    pub fn link(&self) -> String {
        format!("https://www.google.com/maps?q={},{}", self.lat, self.lng)
    }

    /// Degrees/minutes/seconds, e.g. `21°01'42.3"N 105°51'15.6"E`
    pub fn dms(&self) -> String {
        format!(
            "{} {}",
            dms_component(self.lat, 'N', 'S'),
            dms_component(self.lng, 'E', 'W')
        )
    }
}

fn dms_component(value: f64, positive: char, negative: char) -> String {
    let hemisphere = if value < 0.0 { negative } else { positive };
    // tenths of an arc-second, so rounding carries into minutes and degrees
    let tenths = (value.abs() * 36_000.0).round() as u64;
    let degrees = tenths / 36_000;
    let minutes = (tenths % 36_000) / 600;
    let seconds = (tenths % 600) as f64 / 10.0;
    format!(
        "{}°{:02}'{:04.1}\"{}",
        degrees, minutes, seconds, hemisphere
    )
}
