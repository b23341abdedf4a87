use crate::config::types::{
    Config, CooldownConfig, CrawlerConfig, DetailSelectors, ListSelectors, OutputConfig,
    PickerSelectors, SiteConfig,
};
use crate::filter::FilterSpec;
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_cooldown_config(&config.cooldown)?;
    validate_output_config(&config.output)?;
    validate_filter(&config.filter)?;
    validate_site_config(&config.site)?;
    Ok(())
}

/// Validates crawler limits
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_pages < 1 {
        return Err(ConfigError::Validation(
            "max-pages must be >= 1, got 0".to_string(),
        ));
    }

    if config.max_items_per_page < 1 {
        return Err(ConfigError::Validation(
            "max-items-per-page must be >= 1, got 0".to_string(),
        ));
    }

    if config.poll_attempts < 1 {
        return Err(ConfigError::Validation(
            "poll-attempts must be >= 1, got 0".to_string(),
        ));
    }

    Ok(())
}

/// Validates that every pause range is ordered
fn validate_cooldown_config(config: &CooldownConfig) -> Result<(), ConfigError> {
    validate_range("item cooldown", config.item_min_ms, config.item_max_ms)?;
    validate_range("page cooldown", config.page_min_ms, config.page_max_ms)?;
    Ok(())
}

fn validate_range(name: &str, min: u64, max: u64) -> Result<(), ConfigError> {
    if min > max {
        return Err(ConfigError::Validation(format!(
            "{} minimum ({}ms) exceeds maximum ({}ms)",
            name, min, max
        )));
    }
    Ok(())
}

/// Validates output paths
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("output-dir", &config.output_dir),
        ("screenshot-dir", &config.screenshot_dir),
        ("journal-path", &config.journal_path),
    ] {
        if value.trim().is_empty() {
            return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
        }
    }
    Ok(())
}

/// Validates filter bounds and limits
fn validate_filter(filter: &FilterSpec) -> Result<(), ConfigError> {
    if let (Some(from), Some(to)) = (filter.price_from, filter.price_to) {
        if from > 0.0 && to > 0.0 && from > to {
            return Err(ConfigError::Validation(format!(
                "price-from ({}) exceeds price-to ({})",
                from, to
            )));
        }
    }

    if let (Some(from), Some(to)) = (filter.area_from, filter.area_to) {
        if from > 0.0 && to > 0.0 && from > to {
            return Err(ConfigError::Validation(format!(
                "area-from ({}) exceeds area-to ({})",
                from, to
            )));
        }
    }

    if filter.max_pages == Some(0) {
        return Err(ConfigError::Validation(
            "filter max-pages must be >= 1".to_string(),
        ));
    }

    if filter.max_items_per_page == Some(0) {
        return Err(ConfigError::Validation(
            "filter max-items-per-page must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates the site description
fn validate_site_config(site: &SiteConfig) -> Result<(), ConfigError> {
    if site.name.trim().is_empty() {
        return Err(ConfigError::Validation(
            "site name cannot be empty".to_string(),
        ));
    }

    if site.base_urls.is_empty() {
        return Err(ConfigError::Validation(format!(
            "site '{}' must have at least one base URL",
            site.name
        )));
    }

    for base in &site.base_urls {
        validate_http_url(base)?;
    }

    validate_generic_patterns(&site.generic_patterns)?;

    if let Some(template) = &site.search_url {
        if !template.contains("{query}") {
            return Err(ConfigError::Validation(format!(
                "search-url '{}' must contain a {{query}} placeholder",
                template
            )));
        }
        validate_http_url(&template.replace("{query}", "q"))?;
    }

    if site.captcha_marker.is_empty() {
        return Err(ConfigError::Validation(
            "captcha-marker cannot be empty".to_string(),
        ));
    }

    validate_list_selectors(&site.list)?;
    validate_detail_selectors(&site.detail)?;
    validate_picker_selectors(&site.picker)?;
    Ok(())
}

/// Rejects blank generic-URL patterns, which would match every URL
fn validate_generic_patterns(patterns: &[String]) -> Result<(), ConfigError> {
    if patterns.iter().any(|pattern| pattern.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "generic-patterns cannot contain an empty pattern".to_string(),
        ));
    }
    Ok(())
}

fn validate_http_url(raw: &str) -> Result<(), ConfigError> {
    let url = Url::parse(raw)
        .map_err(|e| ConfigError::InvalidUrl(format!("'{}': {}", raw, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "'{}' must use http or https",
            raw
        )));
    }

    Ok(())
}

fn validate_list_selectors(list: &ListSelectors) -> Result<(), ConfigError> {
    validate_selector(&list.card)?;
    validate_selector(&list.link)?;
    for selector in [
        &list.title,
        &list.price,
        &list.price_per_area,
        &list.area,
        &list.location,
        &list.thumbnail,
        &list.posted_date,
        &list.next_page,
    ]
    .into_iter()
    .flatten()
    {
        validate_selector(selector)?;
    }
    Ok(())
}

fn validate_detail_selectors(detail: &DetailSelectors) -> Result<(), ConfigError> {
    for selector in [
        &detail.title,
        &detail.price,
        &detail.area,
        &detail.location,
        &detail.description,
        &detail.posted_date,
        &detail.agent_name,
        &detail.agent_phone,
        &detail.images,
        &detail.spec_row,
        &detail.spec_key,
        &detail.spec_value,
        &detail.config_row,
        &detail.config_key,
        &detail.config_value,
        &detail.map_frame,
    ]
    .into_iter()
    .flatten()
    {
        validate_selector(selector)?;
    }
    Ok(())
}

fn validate_picker_selectors(picker: &PickerSelectors) -> Result<(), ConfigError> {
    if let Some(entry) = &picker.entry {
        validate_selector(entry)?;
    }
    Ok(())
}

/// Checks that a CSS selector parses
fn validate_selector(selector: &str) -> Result<(), ConfigError> {
    scraper::Selector::parse(selector)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidSelector(format!("'{}': {:?}", selector, e)))
}
