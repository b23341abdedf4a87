//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the main crawl loop, which:
//! - Loads the partition's checkpoint and seeds the dedup set
//! - Walks each base URL: filter resolution, page loop, checkpoint
//! - Isolates item-level and URL-level faults
//! - Handles interrupts by going straight to the final checkpoint

use crate::config::Config;
use crate::crawler::pagination::{PageCursor, Paginator};
use crate::crawler::recovery::{capture_path, detect_captcha, recover_from_captcha};
use crate::crawler::scheduler::{CooldownScheduler, PauseKind, Sleeper};
use crate::crawler::StopSignal;
use crate::extract::{parse_posted_date, DetailContext, SelectorSite, Site};
use crate::filter::resolve_target;
use crate::output::write_summary;
use crate::session::{navigate_with_retry, HttpSession, Session};
use crate::state::{dedup, CrawlPhase, CrawlSession, CrawlState, Listing, PageTally};
use crate::storage::{
    open_journal, CheckpointStore, JsonCheckpoint, Partition, RunJournal, RunStatus, UrlOutcome,
    UrlRecord,
};
use crate::{Result, SweepError};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// What a finished (or interrupted) run produced
#[derive(Debug, Clone)]
pub struct CrawlReport {
    pub site: String,
    pub partition: String,
    pub status: RunStatus,

    /// Listings in the partition after this run
    pub total_items: usize,

    /// Listings committed by this run
    pub new_items: usize,
    pub checkpoint_path: PathBuf,

    /// One record per base URL attempted, in configuration order
    pub urls: Vec<UrlRecord>,
    pub elapsed: Duration,
}

impl CrawlReport {
    pub fn interrupted(&self) -> bool {
        self.status == RunStatus::Interrupted
    }
}

/// Main crawler coordinator structure
///
/// Owns the session for the whole run and drives it strictly sequentially.
pub struct Coordinator {
    config: Config,
    site: Box<dyn Site>,
    session: Box<dyn Session>,
    store: Box<dyn CheckpointStore>,
    journal: Option<Box<dyn RunJournal>>,
    config_hash: String,
    scheduler: CooldownScheduler,
    paginator: Paginator,
    stop: StopSignal,
    state: CrawlState,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The validated configuration
    /// * `site` - Extractors for the target site
    /// * `session` - The page session used for the whole run
    /// * `store` - Checkpoint store of the run-day partition
    pub fn new(
        config: Config,
        site: Box<dyn Site>,
        session: Box<dyn Session>,
        store: Box<dyn CheckpointStore>,
    ) -> Self {
        let poll_interval = Duration::from_millis(config.crawler.poll_interval_ms);
        let scheduler = CooldownScheduler::new(config.cooldown.clone(), poll_interval);
        let paginator = Paginator::new(config.crawler.poll_attempts);

        Self {
            config,
            site,
            session,
            store,
            journal: None,
            config_hash: String::new(),
            scheduler,
            paginator,
            stop: StopSignal::new(),
            state: CrawlState::new(),
        }
    }

    /// Records runs and per-URL outcomes in `journal`
    pub fn with_journal(mut self, journal: Box<dyn RunJournal>, config_hash: &str) -> Self {
        self.journal = Some(journal);
        self.config_hash = config_hash.to_string();
        self
    }

    /// Observes `stop` between steps and during pauses
    pub fn with_stop(mut self, stop: StopSignal) -> Self {
        self.scheduler = self.scheduler.with_stop(stop.clone());
        self.stop = stop;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.scheduler = self.scheduler.with_sleeper(sleeper);
        self
    }

    /// The accumulated state (as of the last step)
    pub fn state(&self) -> &CrawlState {
        &self.state
    }

    pub fn checkpoint_path(&self) -> &Path {
        self.store.location()
    }

    /// Runs the main crawl loop
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlReport)` - Every base URL was attempted, or the run was interrupted
    /// * `Err(SweepError)` - A persistence fault ended the run
    pub async fn run(&mut self) -> Result<CrawlReport> {
        let started = Instant::now();
        let partition = self.store.label();
        tracing::info!("Starting crawl of {} into {}", self.site.name(), partition);

        self.state = self.store.load()?;
        let items_before = self.state.len();
        self.seed_lookback();

        let run_id = self.start_journal_run(&partition);
        let base_urls = self.config.site.base_urls.clone();
        let mut urls = Vec::with_capacity(base_urls.len());
        let mut fatal = None;

        for (i, base_url) in base_urls.iter().enumerate() {
            if self.stop.is_stopped() {
                break;
            }
            if i > 0 && !self.scheduler.pause(PauseKind::BaseUrl).await {
                break;
            }

            tracing::info!("[{}/{}] Crawling {}", i + 1, base_urls.len(), base_url);
            let mut session = CrawlSession::new(base_url.as_str());
            let result = self.crawl_base_url(&mut session).await;
            session.set_phase(CrawlPhase::Finished);

            let record = match result {
                Ok(()) if self.stop.is_stopped() => {
                    url_record(&session, UrlOutcome::Interrupted, None)
                }
                Ok(()) => url_record(&session, UrlOutcome::Completed, None),
                Err(SweepError::LocationNotFound { location }) => {
                    tracing::warn!("No location matched '{}' for {}, skipping", location, base_url);
                    url_record(
                        &session,
                        UrlOutcome::NotApplicable,
                        Some(format!("no location matched '{}'", location)),
                    )
                }
                Err(e) if e.is_fatal() => {
                    let record = url_record(&session, UrlOutcome::Failed, Some(e.to_string()));
                    fatal = Some(e);
                    record
                }
                Err(e) => {
                    if matches!(e, SweepError::CaptchaDetected { .. }) {
                        session.counters.captchas += 1;
                    }
                    tracing::error!("Abandoning {}: {}", base_url, e);
                    url_record(&session, UrlOutcome::Failed, Some(e.to_string()))
                }
            };

            tracing::info!(
                "{}: {} ({} pages, {} new, {} duplicates)",
                base_url,
                record.outcome,
                record.pages,
                record.new_items,
                record.duplicates
            );
            self.record_journal_url(run_id, &record);
            urls.push(record);

            if fatal.is_some() {
                break;
            }
        }

        if self.stop.is_stopped() {
            tracing::info!("Stop requested, writing final checkpoint");
        }
        let saved = self.store.save(&self.state).map_err(SweepError::from);

        let status = if fatal.is_some() || saved.is_err() {
            RunStatus::Failed
        } else if self.stop.is_stopped() {
            RunStatus::Interrupted
        } else {
            RunStatus::Completed
        };
        self.finish_journal_run(run_id, status);

        if let Some(e) = fatal.or(saved.err()) {
            tracing::error!(
                "Run failed with {} items accumulated (last durable checkpoint: {}): {}",
                self.state.len(),
                self.store.location().display(),
                e
            );
            return Err(e);
        }

        let report = CrawlReport {
            site: self.site.name().to_string(),
            partition,
            status,
            total_items: self.state.len(),
            new_items: self.state.len().saturating_sub(items_before),
            checkpoint_path: self.store.location().to_path_buf(),
            urls,
            elapsed: started.elapsed(),
        };

        tracing::info!(
            "Crawl {}: {} items ({} new) in {:?}, checkpoint {}",
            report.status,
            report.total_items,
            report.new_items,
            report.elapsed,
            report.checkpoint_path.display()
        );

        Ok(report)
    }

    /// Filter resolution and the page loop for one base URL
    async fn crawl_base_url(&mut self, session: &mut CrawlSession) -> Result<()> {
        let base_url = session.base_url.clone();

        session.set_phase(CrawlPhase::Loading);
        navigate_with_retry(self.session.as_mut(), &base_url).await?;
        self.guard_listing(&base_url).await?;

        session.set_phase(CrawlPhase::ResolvingFilter);
        let target = resolve_target(
            self.session.as_mut(),
            self.site.as_ref(),
            &base_url,
            &self.config.filter,
        )
        .await?;
        if self.session.current_url().await != target {
            tracing::debug!("Filtered listing URL: {}", target);
            navigate_with_retry(self.session.as_mut(), &target).await?;
            self.guard_listing(&target).await?;
        }
        session.target_url = Some(target);

        let max_pages = self.config.max_pages();
        let mut cursor = PageCursor::start();

        while let PageCursor::OnPage(index) = cursor {
            if index >= max_pages || self.stop.is_stopped() {
                break;
            }

            session.page_index = index;
            let listing_url = self.session.current_url().await;
            session.listing_url = Some(listing_url.clone());

            self.process_page(session).await?;
            self.store.save(&self.state)?;
            tracing::info!(
                "[{} p{}] checkpointed, {} items in partition",
                base_url,
                index + 1,
                self.state.len()
            );

            if self.stop.is_stopped() || index + 1 >= max_pages {
                break;
            }

            session.set_phase(CrawlPhase::CoolingDown);
            if self.session.current_url().await != listing_url {
                navigate_with_retry(self.session.as_mut(), &listing_url).await?;
            }
            cursor = self
                .paginator
                .advance(cursor, self.session.as_mut(), self.site.as_ref(), &self.scheduler)
                .await?;
        }

        Ok(())
    }

    /// Collects one listing page and enriches its new items
    async fn process_page(&mut self, session: &mut CrawlSession) -> Result<()> {
        session.set_phase(CrawlPhase::Collecting);
        self.paginator
            .wait_for_render(self.session.as_mut(), self.site.as_ref(), &self.scheduler)
            .await;
        let batch = self
            .site
            .collect(
                self.session.as_mut(),
                self.state.seen(),
                self.config.max_items_per_page(),
                self.config.crawler.list_scroll_steps,
            )
            .await?;

        let outcome = dedup::partition_new(&self.state, batch.items);
        let tally = PageTally::new(
            batch.cards_seen,
            batch.duplicates + outcome.duplicates,
            outcome.fresh.len(),
        );
        session.counters.add_page(&tally);
        tracing::info!(
            "[{} p{}] {} cards, {} duplicates, {} new",
            session.base_url,
            session.page_index + 1,
            tally.cards_seen,
            tally.duplicates,
            tally.new_items
        );

        let total = outcome.fresh.len();
        for (n, listing) in outcome.fresh.into_iter().enumerate() {
            if self.stop.is_stopped() {
                break;
            }
            session.set_phase(CrawlPhase::Enriching {
                current: n + 1,
                total,
            });
            if !self.scheduler.pause(PauseKind::Item).await {
                break;
            }
            self.process_item(session, listing).await?;
        }

        Ok(())
    }

    /// Opens one detail page and commits the enriched listing
    ///
    /// Only URL-level and fatal errors are returned; item faults are counted.
    async fn process_item(&mut self, session: &mut CrawlSession, listing: Listing) -> Result<()> {
        let href = listing.href.clone();
        let listing_url = session.listing_url.clone().unwrap_or_default();

        if let Err(e) = navigate_with_retry(self.session.as_mut(), &href).await {
            session.counters.detail_failures += 1;
            tracing::warn!("Skipping {}: {}", href, e);
            return Ok(());
        }

        let url = self.session.current_url().await;
        let content = self.session.page_content().await;
        if detect_captcha(&url, &content, self.site.captcha_marker()) {
            return self.recover(session, &href, &listing_url).await;
        }

        let context = DetailContext {
            listing_url: &listing_url,
            screenshot_dir: Path::new(&self.config.output.screenshot_dir),
            scroll_steps: self.config.crawler.detail_scroll_steps,
        };

        match self.site.enrich(self.session.as_mut(), listing, &context).await {
            Ok(enriched) => {
                if self.posted_too_early(&enriched) {
                    session.counters.filtered += 1;
                    tracing::debug!("Skipping {}: posted {}", href, enriched.posted_date);
                } else if dedup::commit(&mut self.state, enriched) {
                    session.counters.collected += 1;
                    tracing::debug!("Collected {}", href);
                }
                Ok(())
            }
            Err(SweepError::CaptchaDetected { .. }) => {
                self.recover(session, &href, &listing_url).await
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                session.counters.detail_failures += 1;
                tracing::warn!("Skipping {}: {}", href, e);
                Ok(())
            }
        }
    }

    async fn recover(
        &mut self,
        session: &mut CrawlSession,
        href: &str,
        listing_url: &str,
    ) -> Result<()> {
        session.counters.captchas += 1;
        tracing::warn!("Captcha while opening {}, item left for a later run", href);
        let dir = PathBuf::from(&self.config.output.screenshot_dir);
        recover_from_captcha(self.session.as_mut(), &dir, href, listing_url).await?;
        Ok(())
    }

    /// Fails the base URL if the listing page is a challenge page
    async fn guard_listing(&mut self, requested: &str) -> Result<()> {
        let url = self.session.current_url().await;
        let content = self.session.page_content().await;
        if !detect_captcha(&url, &content, self.site.captcha_marker()) {
            return Ok(());
        }

        let path = capture_path(
            Path::new(&self.config.output.screenshot_dir),
            "listing",
            requested,
        );
        if let Err(e) = self.session.screenshot(&path).await {
            tracing::warn!("Could not save captcha capture {}: {}", path.display(), e);
        }
        Err(SweepError::CaptchaDetected { url })
    }

    fn posted_too_early(&self, listing: &Listing) -> bool {
        let Some(bound) = self.config.filter.posted_date_from else {
            return false;
        };
        parse_posted_date(&listing.posted_date).is_some_and(|date| date < bound)
    }

    fn seed_lookback(&mut self) {
        let days = self.config.output.lookback_days;
        if days == 0 {
            return;
        }
        match self.store.load_prior_hrefs(days) {
            Ok(hrefs) => {
                let count = hrefs.len();
                self.state.seed_seen(hrefs);
                tracing::info!("Seeded {} hrefs from the previous {} days", count, days);
            }
            Err(e) => tracing::warn!("Could not read earlier checkpoints: {}", e),
        }
    }

    // ===== Run journal =====
    // Journal failures never affect the crawl.

    fn start_journal_run(&mut self, partition: &str) -> Option<i64> {
        let journal = self.journal.as_mut()?;
        match journal.start_run(partition, &self.config_hash) {
            Ok(id) => {
                tracing::debug!("Journal run {}", id);
                Some(id)
            }
            Err(e) => {
                tracing::warn!("Run journal unavailable: {}", e);
                None
            }
        }
    }

    fn record_journal_url(&mut self, run_id: Option<i64>, record: &UrlRecord) {
        let (Some(journal), Some(run_id)) = (self.journal.as_mut(), run_id) else {
            return;
        };
        if let Err(e) = journal.record_url(run_id, record) {
            tracing::warn!("Could not journal outcome of {}: {}", record.base_url, e);
        }
    }

    fn finish_journal_run(&mut self, run_id: Option<i64>, status: RunStatus) {
        let (Some(journal), Some(run_id)) = (self.journal.as_mut(), run_id) else {
            return;
        };
        if let Err(e) = journal.finish_run(run_id, status, self.state.len()) {
            tracing::warn!("Could not finish journal run {}: {}", run_id, e);
        }
    }
}

/// Runs a complete crawl with the HTTP session and the configured selector site
///
/// This function:
/// 1. Opens today's partition checkpoint and the run journal
/// 2. Runs the coordinator until every base URL is done or `stop` is requested
/// 3. Writes the markdown run summary next to the checkpoint
///
/// # Arguments
///
/// * `config` - The validated configuration
/// * `config_hash` - Hash of the configuration file, recorded in the journal
/// * `stop` - Stop signal, usually wired to Ctrl-C
///
/// # Example
///
/// ```no_run
/// use listing_sweep::config::load_config_with_hash;
/// use listing_sweep::crawler::{run_crawl, StopSignal};
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (config, hash) = load_config_with_hash(Path::new("sweep.toml"))?;
/// let report = run_crawl(config, &hash, StopSignal::new()).await?;
/// println!("{} items in {}", report.total_items, report.checkpoint_path.display());
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(config: Config, config_hash: &str, stop: StopSignal) -> Result<CrawlReport> {
    let session = HttpSession::from_config(&config.session)?;
    let site = SelectorSite::from_config(&config.site)?;
    let partition = Partition::new(Utc::now().date_naive(), &config.site.name, &config.filter);
    let store = JsonCheckpoint::new(&config.output.output_dir, partition);

    let journal = match open_journal(Path::new(&config.output.journal_path)) {
        Ok(journal) => Some(journal),
        Err(e) => {
            tracing::warn!("Run journal disabled: {}", e);
            None
        }
    };

    let mut coordinator =
        Coordinator::new(config, Box::new(site), Box::new(session), Box::new(store)).with_stop(stop);
    if let Some(journal) = journal {
        coordinator = coordinator.with_journal(Box::new(journal), config_hash);
    }

    let report = coordinator.run().await?;

    let summary_path = report.checkpoint_path.with_extension("md");
    match write_summary(&report, &summary_path) {
        Ok(()) => tracing::info!("Summary written to {}", summary_path.display()),
        Err(e) => tracing::warn!("Could not write summary {}: {}", summary_path.display(), e),
    }

    Ok(report)
}

fn url_record(session: &CrawlSession, outcome: UrlOutcome, error: Option<String>) -> UrlRecord {
    UrlRecord {
        base_url: session.base_url.clone(),
        target_url: session.target_url.clone(),
        outcome,
        pages: session.counters.pages,
        new_items: session.counters.collected,
        duplicates: session.counters.duplicates,
        captchas: session.counters.captchas,
        filtered: session.counters.filtered,
        error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        CooldownConfig, CrawlerConfig, ListSelectors, OutputConfig, SessionConfig, SiteConfig,
    };
    use crate::crawler::RecordingSleeper;
    use crate::extract::{
        DetailExtractor, ListExtractor, ListingBatch, LocationPicker,
    };
    use crate::filter::{FilterSpec, LocationCandidate, QueryParams};
    use crate::session::NavigationError;
    use crate::storage::{SqliteJournal, StorageError, StorageResult};
    use async_trait::async_trait;
    use std::collections::{BTreeSet, HashMap, HashSet};
    use std::sync::Mutex;

    fn create_test_config(base_urls: &[&str]) -> Config {
        Config {
            crawler: CrawlerConfig {
                max_pages: 5,
                max_items_per_page: 20,
                list_scroll_steps: 0,
                detail_scroll_steps: 0,
                poll_attempts: 3,
                poll_interval_ms: 1,
            },
            cooldown: CooldownConfig::default(),
            session: SessionConfig::default(),
            output: OutputConfig {
                output_dir: "out".to_string(),
                screenshot_dir: "shots".to_string(),
                journal_path: "journal.db".to_string(),
                lookback_days: 0,
            },
            filter: FilterSpec::default(),
            site: SiteConfig {
                name: "fake".to_string(),
                base_urls: base_urls.iter().map(|u| u.to_string()).collect(),
                generic_patterns: vec!["/all".to_string()],
                search_url: None,
                captcha_marker: "captcha".to_string(),
                params: QueryParams::default(),
                list: ListSelectors {
                    card: ".card".to_string(),
                    link: "a".to_string(),
                    title: None,
                    price: None,
                    price_per_area: None,
                    area: None,
                    location: None,
                    thumbnail: None,
                    posted_date: None,
                    next_page: None,
                },
                detail: Default::default(),
                picker: Default::default(),
            },
        }
    }

    /// Session over a fixed set of known URLs
    struct FakeSession {
        url: String,
        unreachable: HashSet<String>,
    }

    impl FakeSession {
        fn new() -> Self {
            Self {
                url: String::new(),
                unreachable: HashSet::new(),
            }
        }
    }

    #[async_trait]
    impl Session for FakeSession {
        async fn navigate(&mut self, url: &str) -> std::result::Result<(), NavigationError> {
            if self.unreachable.contains(url) {
                return Err(NavigationError::new(url, "connection refused"));
            }
            self.url = url.to_string();
            Ok(())
        }

        async fn current_url(&mut self) -> String {
            self.url.clone()
        }

        async fn page_content(&mut self) -> String {
            String::new()
        }

        async fn screenshot(&mut self, _path: &Path) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Listing pages keyed by URL: item hrefs plus an optional next page
    #[derive(Default)]
    struct FakeSite {
        pages: HashMap<String, (Vec<String>, Option<String>)>,
        captcha_items: HashSet<String>,
        posted: HashMap<String, String>,
    }

    impl FakeSite {
        fn page(mut self, url: &str, items: &[&str], next: Option<&str>) -> Self {
            self.pages.insert(
                url.to_string(),
                (
                    items.iter().map(|i| i.to_string()).collect(),
                    next.map(str::to_string),
                ),
            );
            self
        }
    }

    #[async_trait]
    impl ListExtractor for FakeSite {
        async fn collect(
            &self,
            session: &mut dyn Session,
            seen: &BTreeSet<String>,
            max_items: usize,
            _scroll_steps: u32,
        ) -> Result<ListingBatch> {
            let url = session.current_url().await;
            let mut batch = ListingBatch::default();
            if let Some((items, _)) = self.pages.get(&url) {
                for href in items {
                    batch.cards_seen += 1;
                    if seen.contains(href) {
                        batch.duplicates += 1;
                    } else if batch.items.len() < max_items {
                        batch.items.push(Listing::new(href.as_str()));
                    }
                }
            }
            Ok(batch)
        }

        async fn next_page_url(&self, session: &mut dyn Session) -> Option<String> {
            let url = session.current_url().await;
            self.pages.get(&url).and_then(|(_, next)| next.clone())
        }
    }

    #[async_trait]
    impl DetailExtractor for FakeSite {
        async fn enrich(
            &self,
            session: &mut dyn Session,
            mut listing: Listing,
            _context: &DetailContext<'_>,
        ) -> Result<Listing> {
            if self.captcha_items.contains(&listing.href) {
                return Err(SweepError::CaptchaDetected {
                    url: session.current_url().await,
                });
            }
            listing.description = format!("details of {}", listing.href);
            if let Some(posted) = self.posted.get(&listing.href) {
                listing.posted_date = posted.clone();
            }
            Ok(listing)
        }
    }

    #[async_trait]
    impl LocationPicker for FakeSite {
        async fn search_location(
            &self,
            session: &mut dyn Session,
            _base_url: &str,
            _location: &str,
        ) -> Result<Option<String>> {
            Ok(Some(session.current_url().await))
        }

        async fn location_candidates(
            &self,
            _session: &mut dyn Session,
        ) -> Result<Vec<LocationCandidate>> {
            Ok(vec![LocationCandidate::new(
                "Quận Ba Đình",
                "https://site.test/ba-dinh",
            )])
        }
    }

    impl Site for FakeSite {
        fn name(&self) -> &str {
            "fake"
        }

        fn query_params(&self) -> &QueryParams {
            static PARAMS: std::sync::OnceLock<QueryParams> = std::sync::OnceLock::new();
            PARAMS.get_or_init(QueryParams::default)
        }

        fn is_generic_url(&self, url: &str) -> bool {
            url.contains("/all")
        }
    }

    /// In-memory checkpoint store that can be told to fail
    #[derive(Clone, Default)]
    struct MemoryStore {
        saved: Arc<Mutex<Vec<CrawlState>>>,
        fail_saves: bool,
    }

    impl MemoryStore {
        fn last(&self) -> Option<CrawlState> {
            self.saved.lock().unwrap().last().cloned()
        }

        fn save_count(&self) -> usize {
            self.saved.lock().unwrap().len()
        }
    }

    impl CheckpointStore for MemoryStore {
        fn load(&self) -> StorageResult<CrawlState> {
            Ok(self.last().unwrap_or_default())
        }

        fn save(&mut self, state: &CrawlState) -> StorageResult<()> {
            if self.fail_saves {
                return Err(StorageError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "disk full",
                )));
            }
            self.saved.lock().unwrap().push(state.clone());
            Ok(())
        }

        fn location(&self) -> &Path {
            Path::new("memory.json")
        }

        fn label(&self) -> String {
            "2024-05-01/fake".to_string()
        }

        fn load_prior_hrefs(&self, _days: u32) -> StorageResult<Vec<String>> {
            Ok(vec!["https://site.test/old".to_string()])
        }
    }

    fn coordinator(
        config: Config,
        site: FakeSite,
        session: FakeSession,
        store: MemoryStore,
    ) -> (Coordinator, Arc<RecordingSleeper>) {
        let sleeper = Arc::new(RecordingSleeper::new());
        let coordinator = Coordinator::new(config, Box::new(site), Box::new(session), Box::new(store))
            .with_sleeper(sleeper.clone());
        (coordinator, sleeper)
    }

    fn hrefs(state: &CrawlState) -> Vec<&str> {
        state.results().iter().map(|l| l.href.as_str()).collect()
    }

    #[tokio::test]
    async fn test_walks_pages_and_commits_in_order() {
        let site = FakeSite::default()
            .page("https://site.test/list", &["https://site.test/a", "https://site.test/b"], Some("https://site.test/list?p=2"))
            .page("https://site.test/list?p=2", &["https://site.test/c"], None);
        let store = MemoryStore::default();
        let (mut coordinator, sleeper) = coordinator(
            create_test_config(&["https://site.test/list"]),
            site,
            FakeSession::new(),
            store.clone(),
        );

        let report = coordinator.run().await.unwrap();

        assert_eq!(report.status, RunStatus::Completed);
        assert_eq!(report.total_items, 3);
        assert_eq!(report.new_items, 3);
        assert_eq!(report.urls.len(), 1);
        assert_eq!(report.urls[0].outcome, UrlOutcome::Completed);
        assert_eq!(report.urls[0].pages, 2);
        assert_eq!(
            hrefs(coordinator.state()),
            vec!["https://site.test/a", "https://site.test/b", "https://site.test/c"]
        );
        assert!(coordinator.state().results().iter().all(Listing::is_enriched));

        // one checkpoint per page plus the final one
        assert_eq!(store.save_count(), 3);
        assert_eq!(sleeper.count(PauseKind::Item), 3);
        assert_eq!(sleeper.count(PauseKind::Page), 1);
    }

    #[tokio::test]
    async fn test_captcha_item_is_skipped_and_left_unseen() {
        let mut site = FakeSite::default().page(
            "https://site.test/list",
            &["https://site.test/a", "https://site.test/b", "https://site.test/c"],
            None,
        );
        site.captcha_items.insert("https://site.test/b".to_string());
        let (mut coordinator, sleeper) = coordinator(
            create_test_config(&["https://site.test/list"]),
            site,
            FakeSession::new(),
            MemoryStore::default(),
        );

        let report = coordinator.run().await.unwrap();

        assert_eq!(
            hrefs(coordinator.state()),
            vec!["https://site.test/a", "https://site.test/c"]
        );
        assert!(!coordinator.state().is_seen("https://site.test/b"));
        assert_eq!(report.urls[0].captchas, 1);
        assert_eq!(report.urls[0].outcome, UrlOutcome::Completed);
        assert_eq!(sleeper.count(PauseKind::Item), 3);
    }

    #[tokio::test]
    async fn test_unreachable_detail_page_is_item_level() {
        let site = FakeSite::default().page(
            "https://site.test/list",
            &["https://site.test/a", "https://site.test/b"],
            None,
        );
        let mut session = FakeSession::new();
        session.unreachable.insert("https://site.test/a".to_string());
        let (mut coordinator, _) = coordinator(
            create_test_config(&["https://site.test/list"]),
            site,
            session,
            MemoryStore::default(),
        );

        let report = coordinator.run().await.unwrap();

        assert_eq!(hrefs(coordinator.state()), vec!["https://site.test/b"]);
        assert_eq!(report.urls[0].outcome, UrlOutcome::Completed);
    }

    #[tokio::test]
    async fn test_unreachable_base_url_is_isolated() {
        let site = FakeSite::default().page("https://site.test/two", &["https://site.test/x"], None);
        let mut session = FakeSession::new();
        session.unreachable.insert("https://site.test/one".to_string());
        let (mut coordinator, sleeper) = coordinator(
            create_test_config(&["https://site.test/one", "https://site.test/two"]),
            site,
            session,
            MemoryStore::default(),
        );

        let report = coordinator.run().await.unwrap();

        assert_eq!(report.urls[0].outcome, UrlOutcome::Failed);
        assert!(report.urls[0].error.is_some());
        assert_eq!(report.urls[1].outcome, UrlOutcome::Completed);
        assert_eq!(report.total_items, 1);
        assert_eq!(sleeper.count(PauseKind::BaseUrl), 1);
    }

    #[tokio::test]
    async fn test_unmatched_location_is_not_applicable() {
        let site = FakeSite::default()
            .page("https://site.test/all", &["https://site.test/a"], None)
            .page("https://site.test/list", &["https://site.test/b"], None);
        let mut config = create_test_config(&["https://site.test/all", "https://site.test/list"]);
        config.filter.location = Some("Sơn Trà".to_string());
        let (mut coordinator, _) =
            coordinator(config, site, FakeSession::new(), MemoryStore::default());

        let report = coordinator.run().await.unwrap();

        assert_eq!(report.urls[0].outcome, UrlOutcome::NotApplicable);
        assert_eq!(report.urls[0].pages, 0);
        assert_eq!(report.urls[1].outcome, UrlOutcome::Completed);
        assert_eq!(hrefs(coordinator.state()), vec!["https://site.test/b"]);
    }

    #[tokio::test]
    async fn test_page_ceiling_on_endless_chain() {
        let mut site = FakeSite::default();
        for i in 0..10 {
            let url = format!("https://site.test/list?p={}", i);
            let next = format!("https://site.test/list?p={}", i + 1);
            let item = format!("https://site.test/item{}", i);
            site = site.page(&url, &[item.as_str()], Some(next.as_str()));
        }
        let mut config = create_test_config(&["https://site.test/list?p=0"]);
        config.filter.max_pages = Some(3);
        let (mut coordinator, sleeper) =
            coordinator(config, site, FakeSession::new(), MemoryStore::default());

        let report = coordinator.run().await.unwrap();

        assert_eq!(report.urls[0].pages, 3);
        assert_eq!(report.total_items, 3);
        assert_eq!(sleeper.count(PauseKind::Page), 2);
    }

    #[tokio::test]
    async fn test_rerun_counts_duplicates_only() {
        let site = || {
            FakeSite::default().page(
                "https://site.test/list",
                &["https://site.test/a", "https://site.test/b"],
                None,
            )
        };
        let store = MemoryStore::default();

        let (mut first, _) = coordinator(
            create_test_config(&["https://site.test/list"]),
            site(),
            FakeSession::new(),
            store.clone(),
        );
        first.run().await.unwrap();

        let (mut second, sleeper) = coordinator(
            create_test_config(&["https://site.test/list"]),
            site(),
            FakeSession::new(),
            store.clone(),
        );
        let report = second.run().await.unwrap();

        assert_eq!(report.new_items, 0);
        assert_eq!(report.total_items, 2);
        assert_eq!(report.urls[0].duplicates, 2);
        assert_eq!(sleeper.count(PauseKind::Item), 0);
        assert_eq!(store.last().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_posted_date_bound_drops_without_marking_seen() {
        let mut site = FakeSite::default().page(
            "https://site.test/list",
            &["https://site.test/old", "https://site.test/new"],
            None,
        );
        site.posted.insert("https://site.test/old".to_string(), "28/04/2024".to_string());
        site.posted.insert("https://site.test/new".to_string(), "02/05/2024".to_string());
        let mut config = create_test_config(&["https://site.test/list"]);
        config.filter.posted_date_from = chrono::NaiveDate::from_ymd_opt(2024, 5, 1);
        let (mut coordinator, _) =
            coordinator(config, site, FakeSession::new(), MemoryStore::default());

        let report = coordinator.run().await.unwrap();

        assert_eq!(hrefs(coordinator.state()), vec!["https://site.test/new"]);
        assert!(!coordinator.state().is_seen("https://site.test/old"));
        assert_eq!(report.urls[0].filtered, 1);
    }

    #[tokio::test]
    async fn test_lookback_seeds_seen_hrefs() {
        let site = FakeSite::default().page(
            "https://site.test/list",
            &["https://site.test/old", "https://site.test/new"],
            None,
        );
        let mut config = create_test_config(&["https://site.test/list"]);
        config.output.lookback_days = 2;
        let store = MemoryStore::default();
        let (mut coordinator, _) = coordinator(config, site, FakeSession::new(), store.clone());

        let report = coordinator.run().await.unwrap();

        assert_eq!(hrefs(coordinator.state()), vec!["https://site.test/new"]);
        assert_eq!(report.urls[0].duplicates, 1);

        // seeded hrefs stay out of this partition's checkpoint
        let saved = store.last().unwrap();
        assert!(!saved.seen().contains("https://site.test/old"));
        assert!(saved.seen().contains("https://site.test/new"));
    }

    #[tokio::test]
    async fn test_stop_before_run_still_checkpoints() {
        let site = FakeSite::default().page("https://site.test/list", &["https://site.test/a"], None);
        let store = MemoryStore::default();
        let stop = StopSignal::new();
        stop.request_stop();
        let (coordinator, _) = coordinator(
            create_test_config(&["https://site.test/list"]),
            site,
            FakeSession::new(),
            store.clone(),
        );
        let mut coordinator = coordinator.with_stop(stop);

        let report = coordinator.run().await.unwrap();

        assert!(report.interrupted());
        assert!(report.urls.is_empty());
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn test_persistence_failure_is_fatal() {
        let site = FakeSite::default()
            .page("https://site.test/one", &["https://site.test/a"], None)
            .page("https://site.test/two", &["https://site.test/b"], None);
        let store = MemoryStore {
            fail_saves: true,
            ..Default::default()
        };
        let journal = SqliteJournal::new_in_memory().unwrap();
        let (coordinator, _) = coordinator(
            create_test_config(&["https://site.test/one", "https://site.test/two"]),
            site,
            FakeSession::new(),
            store,
        );
        let mut coordinator = coordinator.with_journal(Box::new(journal), "abc123");

        let err = coordinator.run().await.unwrap_err();

        assert!(err.is_fatal());
        // the first URL's page was collected before the failed save and is kept in memory
        assert_eq!(coordinator.state().len(), 1);
    }

    #[tokio::test]
    async fn test_journal_records_run_and_outcomes() {
        let site = FakeSite::default().page("https://site.test/list", &["https://site.test/a"], None);
        let journal = SqliteJournal::new_in_memory().unwrap();
        let (coordinator, _) = coordinator(
            create_test_config(&["https://site.test/list"]),
            site,
            FakeSession::new(),
            MemoryStore::default(),
        );
        let mut coordinator = coordinator.with_journal(Box::new(journal), "abc123");

        coordinator.run().await.unwrap();

        let journal = coordinator.journal.as_ref().unwrap();
        let runs = journal.recent_runs(5).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].status, RunStatus::Completed);
        assert_eq!(runs[0].items, 1);
        assert_eq!(runs[0].config_hash, "abc123");
        let outcomes = journal.url_records(runs[0].id).unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].new_items, 1);
    }
}
