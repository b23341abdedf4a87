//! Crawler module: the crawl core
//!
//! This module contains the crawl orchestration, including:
//! - The coordinator that walks base URLs, pages and items
//! - Pagination over "next page" controls
//! - Cooldown pacing between items, pages and base URLs
//! - Captcha detection and per-item recovery
//! - The operator stop signal

mod coordinator;
mod pagination;
mod recovery;
mod scheduler;
mod stop;

pub use coordinator::{run_crawl, Coordinator, CrawlReport};
pub use pagination::{PageCursor, Paginator};
pub use recovery::{capture_path, detect_captcha, recover_from_captcha, CAPTCHA_SCAN_CHARS};
pub use scheduler::{CooldownScheduler, PauseKind, RecordingSleeper, Sleeper, TokioSleeper};
pub use stop::StopSignal;
