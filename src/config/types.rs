use crate::filter::{FilterSpec, QueryParams};
use serde::Deserialize;

/// Main configuration structure for Listing-Sweep
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub cooldown: CooldownConfig,
    #[serde(default)]
    pub session: SessionConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub filter: FilterSpec,
    pub site: SiteConfig,
}

impl Config {
    /// Page ceiling for each base URL; the filter value wins when set
    pub fn max_pages(&self) -> u32 {
        self.filter.max_pages.unwrap_or(self.crawler.max_pages)
    }

    /// Per-page item cap; the filter value wins when set
    pub fn max_items_per_page(&self) -> usize {
        self.filter
            .max_items_per_page
            .unwrap_or(self.crawler.max_items_per_page)
    }
}

/// Crawl loop limits and polling
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Maximum listing pages visited per base URL
    pub max_pages: u32,

    /// Maximum cards taken from one listing page
    pub max_items_per_page: usize,

    /// Scroll steps on a listing page before collecting
    #[serde(default)]
    pub list_scroll_steps: u32,

    /// Scroll steps on a detail page before enriching
    #[serde(default)]
    pub detail_scroll_steps: u32,

    /// Attempts when waiting for a list to render or a URL to change
    #[serde(default = "default_poll_attempts")]
    pub poll_attempts: u32,

    /// Interval between polling attempts (milliseconds)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_poll_attempts() -> u32 {
    20
}

fn default_poll_interval_ms() -> u64 {
    300
}

/// Randomized pause bounds, in milliseconds
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CooldownConfig {
    /// Short pause before each detail page
    pub item_min_ms: u64,
    pub item_max_ms: u64,

    /// Long pause between listing pages and between base URLs
    pub page_min_ms: u64,
    pub page_max_ms: u64,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            item_min_ms: 1_000,
            item_max_ms: 3_000,
            page_min_ms: 10_000,
            page_max_ms: 10_000,
        }
    }
}

/// Page session settings
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SessionConfig {
    pub user_agent: String,

    /// Page-load timeout (seconds)
    pub timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("listing-sweep/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_secs: 30,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Root directory for run-day checkpoint partitions
    pub output_dir: String,

    /// Directory for captcha captures
    pub screenshot_dir: String,

    /// Path to the SQLite run journal
    pub journal_path: String,

    /// Number of previous days whose hrefs also count as seen
    #[serde(default)]
    pub lookback_days: u32,
}

/// Description of the target site
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SiteConfig {
    pub name: String,

    /// Listing URLs crawled in order
    pub base_urls: Vec<String>,

    /// URL fragments marking a listing URL that is not scoped to a location
    #[serde(default)]
    pub generic_patterns: Vec<String>,

    /// Search URL template; `{query}` is replaced by the encoded location
    #[serde(default)]
    pub search_url: Option<String>,

    /// Marker looked for in the URL and early page content
    #[serde(default = "default_captcha_marker")]
    pub captcha_marker: String,

    #[serde(default)]
    pub params: QueryParams,

    pub list: ListSelectors,

    #[serde(default)]
    pub detail: DetailSelectors,

    #[serde(default)]
    pub picker: PickerSelectors,
}

fn default_captcha_marker() -> String {
    "captcha".to_string()
}

/// CSS selectors for listing pages
///
/// Field selectors are evaluated inside each card.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ListSelectors {
    pub card: String,

    /// Link inside the card carrying the listing href
    #[serde(default = "default_link_selector")]
    pub link: String,

    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub price_per_area: Option<String>,
    #[serde(default)]
    pub area: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub posted_date: Option<String>,

    /// Next-page control; pagination ends when it is absent
    #[serde(default)]
    pub next_page: Option<String>,
}

fn default_link_selector() -> String {
    "a".to_string()
}

/// CSS selectors for detail pages
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DetailSelectors {
    pub title: Option<String>,
    pub price: Option<String>,
    pub area: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub posted_date: Option<String>,
    pub agent_name: Option<String>,
    pub agent_phone: Option<String>,
    pub images: Option<String>,

    /// Rows of the specifications table, each with a key and a value cell
    pub spec_row: Option<String>,
    pub spec_key: Option<String>,
    pub spec_value: Option<String>,

    /// Rows of the project/config table
    pub config_row: Option<String>,
    pub config_key: Option<String>,
    pub config_value: Option<String>,

    /// Embedded map element whose `src` carries coordinates
    pub map_frame: Option<String>,
}

/// CSS selectors for the location picker
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PickerSelectors {
    /// Anchor elements, one per location entry
    pub entry: Option<String>,
}
