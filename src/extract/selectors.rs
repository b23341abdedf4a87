//! CSS-selector driven site implementation
//!
//! All selectors come from the `[site.*]` configuration sections and are
//! compiled once. HTML is parsed inside synchronous helpers only, so no
//! parsed document is ever held across an await point.

use crate::config::{DetailSelectors, ListSelectors, SiteConfig};
use crate::crawler::detect_captcha;
use crate::extract::fields::{
    clean_image_urls, field_or_default, resolve_href, MapPoint,
};
use crate::extract::{
    DetailContext, DetailExtractor, ListExtractor, ListingBatch, LocationPicker, Site,
};
use crate::filter::{LocationCandidate, QueryParams};
use crate::session::{navigate_with_retry, Session};
use crate::state::Listing;
use crate::{ConfigError, Result, SweepError};
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::collections::{BTreeMap, BTreeSet};
use url::Url;

fn compile(selector: &str) -> std::result::Result<Selector, ConfigError> {
    Selector::parse(selector)
        .map_err(|e| ConfigError::InvalidSelector(format!("'{}': {:?}", selector, e)))
}

fn compile_opt(selector: &Option<String>) -> std::result::Result<Option<Selector>, ConfigError> {
    selector.as_deref().map(compile).transpose()
}

struct ListPlan {
    card: Selector,
    link: Selector,
    title: Option<Selector>,
    price: Option<Selector>,
    price_per_area: Option<Selector>,
    area: Option<Selector>,
    location: Option<Selector>,
    thumbnail: Option<Selector>,
    posted_date: Option<Selector>,
    next_page: Option<Selector>,
}

impl ListPlan {
    fn compile(list: &ListSelectors) -> std::result::Result<Self, ConfigError> {
        Ok(Self {
            card: compile(&list.card)?,
            link: compile(&list.link)?,
            title: compile_opt(&list.title)?,
            price: compile_opt(&list.price)?,
            price_per_area: compile_opt(&list.price_per_area)?,
            area: compile_opt(&list.area)?,
            location: compile_opt(&list.location)?,
            thumbnail: compile_opt(&list.thumbnail)?,
            posted_date: compile_opt(&list.posted_date)?,
            next_page: compile_opt(&list.next_page)?,
        })
    }
}

struct DetailPlan {
    title: Option<Selector>,
    price: Option<Selector>,
    area: Option<Selector>,
    location: Option<Selector>,
    description: Option<Selector>,
    posted_date: Option<Selector>,
    agent_name: Option<Selector>,
    agent_phone: Option<Selector>,
    images: Option<Selector>,
    spec_row: Option<Selector>,
    spec_key: Option<Selector>,
    spec_value: Option<Selector>,
    config_row: Option<Selector>,
    config_key: Option<Selector>,
    config_value: Option<Selector>,
    map_frame: Option<Selector>,
}

impl DetailPlan {
    fn compile(detail: &DetailSelectors) -> std::result::Result<Self, ConfigError> {
        Ok(Self {
            title: compile_opt(&detail.title)?,
            price: compile_opt(&detail.price)?,
            area: compile_opt(&detail.area)?,
            location: compile_opt(&detail.location)?,
            description: compile_opt(&detail.description)?,
            posted_date: compile_opt(&detail.posted_date)?,
            agent_name: compile_opt(&detail.agent_name)?,
            agent_phone: compile_opt(&detail.agent_phone)?,
            images: compile_opt(&detail.images)?,
            spec_row: compile_opt(&detail.spec_row)?,
            spec_key: compile_opt(&detail.spec_key)?,
            spec_value: compile_opt(&detail.spec_value)?,
            config_row: compile_opt(&detail.config_row)?,
            config_key: compile_opt(&detail.config_key)?,
            config_value: compile_opt(&detail.config_value)?,
            map_frame: compile_opt(&detail.map_frame)?,
        })
    }
}

/// A site described entirely by configuration
pub struct SelectorSite {
    name: String,
    generic_patterns: Vec<String>,
    search_url: Option<String>,
    captcha_marker: String,
    params: QueryParams,
    list: ListPlan,
    detail: DetailPlan,
    picker: Option<Selector>,
}

impl SelectorSite {
    /// Compiles every configured selector
    ///
    /// # Arguments
    ///
    /// * `site` - Site description (selectors, URL patterns, parameter names)
    pub fn from_config(site: &SiteConfig) -> std::result::Result<Self, ConfigError> {
        Ok(Self {
            name: site.name.clone(),
            generic_patterns: site.generic_patterns.clone(),
            search_url: site.search_url.clone(),
            captcha_marker: site.captcha_marker.clone(),
            params: site.params.clone(),
            list: ListPlan::compile(&site.list)?,
            detail: DetailPlan::compile(&site.detail)?,
            picker: compile_opt(&site.picker.entry)?,
        })
    }

    fn parse_cards(
        &self,
        content: &str,
        base: Option<&Url>,
        seen: &BTreeSet<String>,
        max_items: usize,
    ) -> ListingBatch {
        let document = Html::parse_document(content);
        let mut batch = ListingBatch::default();

        for card in document.select(&self.list.card) {
            batch.cards_seen += 1;

            let Some(href) = card
                .select(&self.list.link)
                .next()
                .and_then(|link| link.value().attr("href"))
                .and_then(|href| resolve_href(href, base))
            else {
                tracing::debug!("Card {} has no usable link", batch.cards_seen);
                continue;
            };

            if seen.contains(&href) {
                batch.duplicates += 1;
                continue;
            }
            if batch.items.len() >= max_items {
                continue;
            }

            let plan = &self.list;
            let mut listing = Listing::new(href);
            listing.title = field_or_default("title", text_in(card, plan.title.as_ref(), "title"));
            listing.price = field_or_default("price", text_in(card, plan.price.as_ref(), "price"));
            listing.price_per_area = field_or_default(
                "price_per_area",
                text_in(card, plan.price_per_area.as_ref(), "price_per_area"),
            );
            listing.area = field_or_default("area", text_in(card, plan.area.as_ref(), "area"));
            listing.location = field_or_default(
                "location",
                text_in(card, plan.location.as_ref(), "location"),
            );
            listing.thumbnail = field_or_default(
                "thumbnail",
                image_in(card, plan.thumbnail.as_ref(), base),
            );
            listing.posted_date = field_or_default(
                "posted_date",
                text_in(card, plan.posted_date.as_ref(), "posted_date"),
            );
            batch.items.push(listing);
        }

        batch
    }

    fn parse_detail(&self, mut listing: Listing, content: &str, base: Option<&Url>) -> Listing {
        let document = Html::parse_document(content);
        let root = document.root_element();
        let plan = &self.detail;

        // card values win; the detail page only fills gaps
        fill_if_empty(&mut listing.title, text_in(root, plan.title.as_ref(), "title"));
        fill_if_empty(&mut listing.price, text_in(root, plan.price.as_ref(), "price"));
        fill_if_empty(&mut listing.area, text_in(root, plan.area.as_ref(), "area"));
        fill_if_empty(
            &mut listing.location,
            text_in(root, plan.location.as_ref(), "location"),
        );

        if let Ok(posted) = text_in(root, plan.posted_date.as_ref(), "posted_date") {
            listing.posted_date = posted;
        }

        listing.description = field_or_default(
            "description",
            text_in(root, plan.description.as_ref(), "description"),
        );
        listing.agent_name = field_or_default(
            "agent_name",
            text_in(root, plan.agent_name.as_ref(), "agent_name"),
        );
        listing.agent_phone = field_or_default("agent_phone", phone_in(root, plan.agent_phone.as_ref()));
        listing.images = field_or_default("images", images_in(root, plan.images.as_ref(), base));
        listing.specs = field_or_default(
            "specs",
            table_in(root, plan.spec_row.as_ref(), plan.spec_key.as_ref(), plan.spec_value.as_ref()),
        );
        listing.config = field_or_default(
            "config",
            table_in(
                root,
                plan.config_row.as_ref(),
                plan.config_key.as_ref(),
                plan.config_value.as_ref(),
            ),
        );

        if let Ok(src) = map_source_in(root, plan.map_frame.as_ref()) {
            match MapPoint::from_map_link(&src) {
                Some(point) => {
                    listing.map_coords = point.coords();
                    listing.map_link = point.link();
                    listing.map_dms = point.dms();
                }
                None => listing.map_link = src,
            }
        }

        listing
    }
}

fn missing(field: &str, message: &str) -> SweepError {
    SweepError::Extraction {
        field: field.to_string(),
        message: message.to_string(),
    }
}

fn count_matches(content: &str, selector: &Selector) -> usize {
    Html::parse_document(content).select(selector).count()
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

fn first<'a>(
    scope: ElementRef<'a>,
    selector: Option<&Selector>,
    field: &str,
) -> Result<ElementRef<'a>> {
    let selector = selector.ok_or_else(|| missing(field, "no selector configured"))?;
    scope
        .select(selector)
        .next()
        .ok_or_else(|| missing(field, "no matching element"))
}

fn text_in(scope: ElementRef<'_>, selector: Option<&Selector>, field: &str) -> Result<String> {
    let text = element_text(first(scope, selector, field)?);
    if text.is_empty() {
        return Err(missing(field, "element is empty"));
    }
    Ok(text)
}

fn fill_if_empty(slot: &mut String, value: Result<String>) {
    if slot.is_empty() {
        if let Ok(value) = value {
            *slot = value;
        }
    }
}

fn image_source(element: ElementRef<'_>) -> Option<&str> {
    let value = element.value();
    value
        .attr("data-src")
        .or_else(|| value.attr("src"))
        .filter(|src| !src.trim().is_empty())
}

fn image_in(scope: ElementRef<'_>, selector: Option<&Selector>, base: Option<&Url>) -> Result<String> {
    let element = first(scope, selector, "thumbnail")?;
    image_source(element)
        .and_then(|src| resolve_href(src, base))
        .and_then(|src| clean_image_urls([src]).into_iter().next())
        .ok_or_else(|| missing("thumbnail", "no usable image source"))
}

fn images_in(scope: ElementRef<'_>, selector: Option<&Selector>, base: Option<&Url>) -> Result<Vec<String>> {
    let selector = selector.ok_or_else(|| missing("images", "no selector configured"))?;
    let sources = scope
        .select(selector)
        .filter_map(image_source)
        .filter_map(|src| resolve_href(src, base));
    Ok(clean_image_urls(sources))
}

fn phone_in(scope: ElementRef<'_>, selector: Option<&Selector>) -> Result<String> {
    let element = first(scope, selector, "agent_phone")?;
    let value = element.value();
    let from_attr = value
        .attr("data-phone")
        .or_else(|| value.attr("href").and_then(|h| h.strip_prefix("tel:")))
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty());

    match from_attr {
        Some(phone) => Ok(phone),
        None => {
            let text = element_text(element);
            if text.is_empty() {
                Err(missing("agent_phone", "element is empty"))
            } else {
                Ok(text)
            }
        }
    }
}

fn table_in(
    scope: ElementRef<'_>,
    row: Option<&Selector>,
    key: Option<&Selector>,
    value: Option<&Selector>,
) -> Result<BTreeMap<String, String>> {
    let (Some(row), Some(key), Some(value)) = (row, key, value) else {
        return Err(missing("table", "row/key/value selectors not all configured"));
    };

    let mut table = BTreeMap::new();
    for entry in scope.select(row) {
        let k = entry.select(key).next().map(element_text).unwrap_or_default();
        let v = entry.select(value).next().map(element_text).unwrap_or_default();
        let k = k.trim_end_matches(':').trim().to_string();
        if !k.is_empty() {
            table.insert(k, v);
        }
    }
    Ok(table)
}

fn map_source_in(scope: ElementRef<'_>, selector: Option<&Selector>) -> Result<String> {
    let element = first(scope, selector, "map")?;
    let value = element.value();
    value
        .attr("src")
        .or_else(|| value.attr("data-src"))
        .or_else(|| value.attr("href"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| missing("map", "map element has no source"))
}

fn candidates_in(content: &str, entry: &Selector, base: Option<&Url>) -> Vec<LocationCandidate> {
    let document = Html::parse_document(content);
    document
        .select(entry)
        .filter_map(|element| {
            let url = element.value().attr("href").and_then(|h| resolve_href(h, base))?;
            let text = element_text(element);
            (!text.is_empty()).then(|| LocationCandidate::new(text, url))
        })
        .collect()
}

fn next_link_in(content: &str, next: &Selector, base: Option<&Url>) -> Option<String> {
    let document = Html::parse_document(content);
    let found = document
        .select(next)
        .filter_map(|element| element.value().attr("href"))
        .find_map(|href| resolve_href(href, base));
    found
}

async fn page_base(session: &mut dyn Session) -> Option<Url> {
    Url::parse(&session.current_url().await).ok()
}

#[async_trait]
impl ListExtractor for SelectorSite {
    async fn collect(
        &self,
        session: &mut dyn Session,
        seen: &BTreeSet<String>,
        max_items: usize,
        scroll_steps: u32,
    ) -> Result<ListingBatch> {
        for _ in 0..scroll_steps {
            session.scroll_step().await;
        }

        let content = session.page_content().await;
        let base = page_base(session).await;
        let batch = self.parse_cards(&content, base.as_ref(), seen, max_items);

        tracing::debug!(
            "Collected {} new of {} cards ({} duplicates)",
            batch.items.len(),
            batch.cards_seen,
            batch.duplicates
        );
        Ok(batch)
    }

    async fn next_page_url(&self, session: &mut dyn Session) -> Option<String> {
        let next = self.list.next_page.as_ref()?;
        let content = session.page_content().await;
        let base = page_base(session).await;
        next_link_in(&content, next, base.as_ref())
    }

    async fn cards_rendered(&self, session: &mut dyn Session) -> bool {
        count_matches(&session.page_content().await, &self.list.card) > 0
    }
}

#[async_trait]
impl DetailExtractor for SelectorSite {
    async fn enrich(
        &self,
        session: &mut dyn Session,
        listing: Listing,
        context: &DetailContext<'_>,
    ) -> Result<Listing> {
        for _ in 0..context.scroll_steps {
            session.scroll_step().await;
        }

        let url = session.current_url().await;
        let content = session.page_content().await;
        if detect_captcha(&url, &content, &self.captcha_marker) {
            return Err(SweepError::CaptchaDetected { url });
        }

        let base = Url::parse(&url).ok();
        Ok(self.parse_detail(listing, &content, base.as_ref()))
    }
}

#[async_trait]
impl LocationPicker for SelectorSite {
    async fn search_location(
        &self,
        session: &mut dyn Session,
        base_url: &str,
        location: &str,
    ) -> Result<Option<String>> {
        let target = match &self.search_url {
            Some(template) => {
                let query: String = url::form_urlencoded::byte_serialize(location.as_bytes()).collect();
                template.replace("{query}", &query)
            }
            None => base_url.to_string(),
        };

        navigate_with_retry(session, &target).await?;
        let landed = session.current_url().await;
        Ok((!landed.is_empty()).then_some(landed))
    }

    async fn location_candidates(
        &self,
        session: &mut dyn Session,
    ) -> Result<Vec<LocationCandidate>> {
        let Some(entry) = self.picker.as_ref() else {
            return Ok(Vec::new());
        };
        let content = session.page_content().await;
        let base = page_base(session).await;
        Ok(candidates_in(&content, entry, base.as_ref()))
    }
}

impl Site for SelectorSite {
    fn name(&self) -> &str {
        &self.name
    }

    fn query_params(&self) -> &QueryParams {
        &self.params
    }

    fn is_generic_url(&self, url: &str) -> bool {
        self.generic_patterns.iter().any(|pattern| url.contains(pattern.as_str()))
    }

    fn captcha_marker(&self) -> &str {
        &self.captcha_marker
    }
}
