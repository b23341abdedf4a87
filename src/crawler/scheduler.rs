//! Cooldown scheduler
//!
//! This module handles:
//! - Jittered pauses between detail pages (short) and between listing pages
//!   and base URLs (long)
//! - Fixed polling waits
//! - Cutting a pause short when a stop is requested
//!
//! Pauses run whether or not the preceding step found anything, keeping the
//! request cadence uniform.

use crate::config::CooldownConfig;
use crate::crawler::StopSignal;
use async_trait::async_trait;
use rand::Rng;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What a pause separates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PauseKind {
    /// Before opening a detail page
    Item,

    /// Between finishing one listing page and starting the next
    Page,

    /// Between finishing one base URL and starting the next
    BaseUrl,

    /// One polling interval while waiting for the page to change
    Poll,
}

/// Source of time passing
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, kind: PauseKind, duration: Duration);
}

/// Sleeps on the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, _kind: PauseKind, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Records pauses instead of waiting
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    pauses: Mutex<Vec<(PauseKind, Duration)>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every pause taken so far, in order
    pub fn pauses(&self) -> Vec<(PauseKind, Duration)> {
        self.pauses.lock().map(|p| p.clone()).unwrap_or_default()
    }

    /// Number of pauses of one kind
    pub fn count(&self, kind: PauseKind) -> usize {
        self.pauses().iter().filter(|(k, _)| *k == kind).count()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, kind: PauseKind, duration: Duration) {
        if let Ok(mut pauses) = self.pauses.lock() {
            pauses.push((kind, duration));
        }
        tokio::task::yield_now().await;
    }
}

/// Paces the crawl
pub struct CooldownScheduler {
    config: CooldownConfig,
    poll_interval: Duration,
    sleeper: Arc<dyn Sleeper>,
    stop: StopSignal,
}

impl CooldownScheduler {
    /// Creates a scheduler sleeping on the tokio timer
    ///
    /// # Arguments
    ///
    /// * `config` - Pause bounds
    /// * `poll_interval` - Length of one polling wait
    pub fn new(config: CooldownConfig, poll_interval: Duration) -> Self {
        Self {
            config,
            poll_interval,
            sleeper: Arc::new(TokioSleeper),
            stop: StopSignal::new(),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_stop(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    /// Picks the length of a pause of `kind`
    pub fn duration_for(&self, kind: PauseKind) -> Duration {
        match kind {
            PauseKind::Item => jitter(self.config.item_min_ms, self.config.item_max_ms),
            PauseKind::Page | PauseKind::BaseUrl => {
                jitter(self.config.page_min_ms, self.config.page_max_ms)
            }
            PauseKind::Poll => self.poll_interval,
        }
    }

    /// Pauses, returning false if a stop was requested before or during the wait
    pub async fn pause(&self, kind: PauseKind) -> bool {
        if self.stop.is_stopped() {
            return false;
        }

        let duration = self.duration_for(kind);
        if kind != PauseKind::Poll {
            tracing::debug!("Cooling down for {:?} ({:?})", duration, kind);
        }

        tokio::select! {
            _ = self.sleeper.sleep(kind, duration) => !self.stop.is_stopped(),
            _ = self.stop.stopped() => {
                tracing::debug!("Pause cut short by stop request");
                false
            }
        }
    }
}

/// Uniform random duration in `[min_ms, max_ms]`
fn jitter(min_ms: u64, max_ms: u64) -> Duration {
    if min_ms >= max_ms {
        return Duration::from_millis(min_ms);
    }
    Duration::from_millis(rand::thread_rng().gen_range(min_ms..=max_ms))
}
