//! Integration tests for the crawler
//!
//! These tests use wiremock to serve listing and detail pages and run the
//! full stack (HTTP session, selector site, JSON checkpoints, coordinator)
//! end-to-end. Pauses are recorded instead of slept.

use async_trait::async_trait;
use chrono::NaiveDate;
use listing_sweep::config::{parse_config, Config};
use listing_sweep::crawler::{Coordinator, PauseKind, RecordingSleeper, Sleeper, StopSignal};
use listing_sweep::extract::SelectorSite;
use listing_sweep::session::HttpSession;
use listing_sweep::storage::{
    CheckpointStore, JsonCheckpoint, Partition, RunJournal, RunStatus, SqliteJournal, UrlOutcome,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Builds a configuration pointing at the mock server
fn create_test_config(server: &str, dir: &Path, base_paths: &[&str], filter: &str) -> Config {
    let base_urls: Vec<String> = base_paths
        .iter()
        .map(|p| format!("\"{}{}\"", server, p))
        .collect();

    let toml = format!(
        r#"
[crawler]
max-pages = 5
max-items-per-page = 20
poll-attempts = 3
poll-interval-ms = 1

[cooldown]
item-min-ms = 1
item-max-ms = 2
page-min-ms = 5
page-max-ms = 5

[output]
output-dir = "{out}"
screenshot-dir = "{shots}"
journal-path = "{journal}"

[filter]
{filter}

[site]
name = "mock"
base-urls = [{base_urls}]
generic-patterns = ["/nha-dat-ban"]

[site.list]
card = "div.card"
title = "h3"
price = "span.price"
next-page = "a.next"

[site.detail]
description = "div.desc"
agent-phone = "a.phone"

[site.picker]
entry = "ul.locations a"
"#,
        out = dir.join("out").display(),
        shots = dir.join("shots").display(),
        journal = dir.join("journal.db").display(),
        filter = filter,
        base_urls = base_urls.join(", "),
    );

    parse_config(&toml).expect("test config should be valid")
}

fn partition(config: &Config) -> Partition {
    Partition::new(
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
        &config.site.name,
        &config.filter,
    )
}

fn create_coordinator(config: &Config, sleeper: Arc<dyn Sleeper>) -> Coordinator {
    let site = SelectorSite::from_config(&config.site).unwrap();
    let session = HttpSession::from_config(&config.session).unwrap();
    let store = JsonCheckpoint::new(&config.output.output_dir, partition(config));
    Coordinator::new(config.clone(), Box::new(site), Box::new(session), Box::new(store))
        .with_sleeper(sleeper)
}

fn load_checkpoint(config: &Config) -> listing_sweep::CrawlState {
    JsonCheckpoint::new(&config.output.output_dir, partition(config))
        .load()
        .unwrap()
}

fn listing_page(items: &[&str], next: Option<&str>) -> String {
    let cards: String = items
        .iter()
        .map(|item| {
            format!(
                r#"<div class="card"><a href="/tin/{item}"><h3>Listing {item}</h3></a><span class="price">3 tỷ</span></div>"#
            )
        })
        .collect();
    let next = next
        .map(|n| format!(r#"<a class="next" href="{}">Next</a>"#, n))
        .unwrap_or_default();
    format!("<html><body>{}{}</body></html>", cards, next)
}

fn detail_page(item: &str) -> String {
    format!(
        r#"<html><body><h1>Listing {item}</h1><div class="desc">Details of {item}</div><a class="phone" href="tel:0912345678">0912 345 678</a></body></html>"#
    )
}

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body)
        .insert_header("content-type", "text/html; charset=utf-8")
}

async fn mount_listing(server: &MockServer, at: &str, items: &[&str], next: Option<&str>) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(html(listing_page(items, next)))
        .mount(server)
        .await;
}

async fn mount_detail(server: &MockServer, item: &str, expected_hits: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/tin/{}", item)))
        .respond_with(html(detail_page(item)))
        .expect(expected_hits)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_crawl_two_pages() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_listing(&server, "/ban", &["a", "b"], Some("/ban/p2")).await;
    mount_listing(&server, "/ban/p2", &["c"], None).await;
    for item in ["a", "b", "c"] {
        mount_detail(&server, item, 1).await;
    }

    let config = create_test_config(&server.uri(), dir.path(), &["/ban"], "");
    let sleeper = Arc::new(RecordingSleeper::new());
    let journal = SqliteJournal::new(&dir.path().join("journal.db")).unwrap();
    let mut coordinator =
        create_coordinator(&config, sleeper.clone()).with_journal(Box::new(journal), "hash");

    let report = coordinator.run().await.unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.total_items, 3);
    assert_eq!(report.urls[0].pages, 2);
    assert_eq!(sleeper.count(PauseKind::Item), 3);
    assert_eq!(sleeper.count(PauseKind::Page), 1);
    assert_eq!(sleeper.count(PauseKind::BaseUrl), 0);

    let state = load_checkpoint(&config);
    let hrefs: Vec<_> = state.results().iter().map(|l| l.href.clone()).collect();
    assert_eq!(
        hrefs,
        vec![
            format!("{}/tin/a", server.uri()),
            format!("{}/tin/b", server.uri()),
            format!("{}/tin/c", server.uri()),
        ]
    );
    let first = &state.results()[0];
    assert_eq!(first.title, "Listing a");
    assert_eq!(first.price, "3 tỷ");
    assert_eq!(first.description, "Details of a");
    assert_eq!(first.agent_phone, "0912345678");

    let journal = SqliteJournal::new(&dir.path().join("journal.db")).unwrap();
    let runs = journal.recent_runs(1).unwrap();
    assert_eq!(runs[0].status, RunStatus::Completed);
    assert_eq!(runs[0].items, 3);
}

#[tokio::test]
async fn test_page_ceiling_on_endless_next_chain() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    for n in 1..=10 {
        let at = format!("/ban/p{}", n);
        let next = format!("/ban/p{}", n + 1);
        let item = format!("item{}", n);
        mount_listing(&server, &at, &[item.as_str()], Some(next.as_str())).await;
    }
    Mock::given(method("GET"))
        .and(path_regex(r"^/tin/"))
        .respond_with(html(detail_page("any")))
        .expect(3)
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), dir.path(), &["/ban/p1"], "max-pages = 3");
    let sleeper = Arc::new(RecordingSleeper::new());
    let mut coordinator = create_coordinator(&config, sleeper.clone());

    let report = coordinator.run().await.unwrap();

    assert_eq!(report.urls[0].pages, 3);
    assert_eq!(report.total_items, 3);
    assert_eq!(sleeper.count(PauseKind::Page), 2);
    assert_eq!(sleeper.count(PauseKind::Item), 3);
}

#[tokio::test]
async fn test_captcha_on_one_item_skips_only_that_item() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_listing(&server, "/ban", &["a", "b", "c"], None).await;
    mount_detail(&server, "a", 1).await;
    mount_detail(&server, "c", 1).await;
    Mock::given(method("GET"))
        .and(path("/tin/b"))
        .respond_with(html(
            r#"<html><body><div class="g-recaptcha">Verify you are human</div></body></html>"#
                .to_string(),
        ))
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), dir.path(), &["/ban"], "");
    let sleeper = Arc::new(RecordingSleeper::new());
    let mut coordinator = create_coordinator(&config, sleeper.clone());

    let report = coordinator.run().await.unwrap();

    assert_eq!(report.total_items, 2);
    assert_eq!(report.urls[0].captchas, 1);
    assert_eq!(report.urls[0].outcome, UrlOutcome::Completed);
    assert_eq!(sleeper.count(PauseKind::Item), 3);

    let state = load_checkpoint(&config);
    assert!(!state.is_seen(&format!("{}/tin/b", server.uri())));
    assert!(state.is_seen(&format!("{}/tin/c", server.uri())));

    let captures: Vec<_> = std::fs::read_dir(dir.path().join("shots"))
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(captures.len(), 1);
    assert!(captures[0].starts_with("captcha_detail_"));
    assert!(captures[0].contains("tin_b"));
}

#[tokio::test]
async fn test_rerun_same_day_resumes_without_refetching() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_listing(&server, "/ban", &["a", "b", "c"], None).await;
    for item in ["a", "b", "c"] {
        // each detail page is opened by the first run only
        mount_detail(&server, item, 1).await;
    }

    let config = create_test_config(&server.uri(), dir.path(), &["/ban"], "");

    let first = create_coordinator(&config, Arc::new(RecordingSleeper::new()))
        .run()
        .await
        .unwrap();
    assert_eq!(first.new_items, 3);

    let sleeper = Arc::new(RecordingSleeper::new());
    let second = create_coordinator(&config, sleeper.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(second.new_items, 0);
    assert_eq!(second.total_items, 3);
    assert_eq!(second.urls[0].duplicates, 3);
    assert_eq!(sleeper.count(PauseKind::Item), 0);
    assert_eq!(load_checkpoint(&config).len(), 3);
}

#[tokio::test]
async fn test_unmatched_location_skips_only_that_base_url() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/nha-dat-ban"))
        .respond_with(html(
            r#"<html><body><ul class="locations">
                <li><a href="/nha-dat-ban-ba-dinh">Ba Đình (1.204)</a></li>
                <li><a href="/nha-dat-ban-tay-ho">Tây Hồ (830)</a></li>
            </ul></body></html>"#
                .to_string(),
        ))
        .mount(&server)
        .await;
    mount_listing(&server, "/ban-can-ho-son-tra", &["x"], None).await;
    mount_detail(&server, "x", 1).await;

    let config = create_test_config(
        &server.uri(),
        dir.path(),
        &["/nha-dat-ban", "/ban-can-ho-son-tra"],
        r#"location = "Sơn Trà""#,
    );
    let sleeper = Arc::new(RecordingSleeper::new());
    let mut coordinator = create_coordinator(&config, sleeper.clone());

    let report = coordinator.run().await.unwrap();

    assert_eq!(report.urls.len(), 2);
    assert_eq!(report.urls[0].outcome, UrlOutcome::NotApplicable);
    assert_eq!(report.urls[0].pages, 0);
    assert_eq!(report.urls[1].outcome, UrlOutcome::Completed);
    assert_eq!(report.total_items, 1);
    assert_eq!(sleeper.count(PauseKind::BaseUrl), 1);
}

#[tokio::test]
async fn test_location_resolved_from_picker() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/nha-dat-ban"))
        .respond_with(html(
            r#"<html><body><ul class="locations">
                <li><a href="/nha-dat-ban-ba-dinh">Ba Đình (1.204)</a></li>
                <li><a href="/nha-dat-ban-tay-ho">Tây Hồ (830)</a></li>
            </ul></body></html>"#
                .to_string(),
        ))
        .mount(&server)
        .await;
    mount_listing(&server, "/nha-dat-ban-tay-ho", &["t1"], None).await;
    mount_detail(&server, "t1", 1).await;

    let config = create_test_config(
        &server.uri(),
        dir.path(),
        &["/nha-dat-ban"],
        "location = \"tay ho\"\nprice-from = 2",
    );
    let mut coordinator = create_coordinator(&config, Arc::new(RecordingSleeper::new()));

    let report = coordinator.run().await.unwrap();

    assert_eq!(report.urls[0].outcome, UrlOutcome::Completed);
    assert_eq!(
        report.urls[0].target_url.as_deref(),
        Some(format!("{}/nha-dat-ban-tay-ho?gtn=2", server.uri()).as_str())
    );
    assert_eq!(report.total_items, 1);
}

#[tokio::test]
async fn test_captcha_on_listing_page_fails_base_url() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/blocked"))
        .respond_with(html(
            "<html><body><form id=\"captcha-form\"></form></body></html>".to_string(),
        ))
        .mount(&server)
        .await;
    mount_listing(&server, "/ban", &["a"], None).await;
    mount_detail(&server, "a", 1).await;

    let config = create_test_config(&server.uri(), dir.path(), &["/blocked", "/ban"], "");
    let mut coordinator = create_coordinator(&config, Arc::new(RecordingSleeper::new()));

    let report = coordinator.run().await.unwrap();

    assert_eq!(report.urls[0].outcome, UrlOutcome::Failed);
    assert_eq!(report.urls[0].captchas, 1);
    assert_eq!(report.urls[1].outcome, UrlOutcome::Completed);
    assert_eq!(report.total_items, 1);
}

/// Records pauses and requests a stop at the first inter-page pause
struct StopAtPageBoundary {
    stop: StopSignal,
    inner: RecordingSleeper,
}

#[async_trait]
impl Sleeper for StopAtPageBoundary {
    async fn sleep(&self, kind: PauseKind, duration: Duration) {
        self.inner.sleep(kind, duration).await;
        if kind == PauseKind::Page {
            self.stop.request_stop();
        }
    }
}

#[tokio::test]
async fn test_interrupt_keeps_only_checkpointed_pages() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_listing(&server, "/ban", &["a", "b"], Some("/ban/p2")).await;
    mount_listing(&server, "/ban/p2", &["c", "d"], None).await;
    mount_detail(&server, "a", 1).await;
    mount_detail(&server, "b", 1).await;
    mount_detail(&server, "c", 0).await;
    mount_detail(&server, "d", 0).await;

    let config = create_test_config(&server.uri(), dir.path(), &["/ban", "/ban/p2"], "");
    let stop = StopSignal::new();
    let sleeper = Arc::new(StopAtPageBoundary {
        stop: stop.clone(),
        inner: RecordingSleeper::new(),
    });
    let mut coordinator = create_coordinator(&config, sleeper.clone()).with_stop(stop);

    let report = coordinator.run().await.unwrap();

    assert!(report.interrupted());
    assert_eq!(report.urls.len(), 1);
    assert_eq!(report.urls[0].outcome, UrlOutcome::Interrupted);
    assert_eq!(sleeper.inner.count(PauseKind::BaseUrl), 0);

    let state = load_checkpoint(&config);
    assert_eq!(state.len(), 2);
    assert!(!state.is_seen(&format!("{}/tin/c", server.uri())));
}
