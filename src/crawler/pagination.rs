//! Pagination controller
//!
//! `OnPage(0)` → `OnPage(1)` → … → `Exhausted`. The page ceiling is enforced
//! by the orchestrator, not here. The long inter-page cooldown is taken here,
//! once per transition, between finding the next-page control and following it.
//! Render and URL-change waits poll through the scheduler, so a stop cuts them short.

use crate::crawler::scheduler::{CooldownScheduler, PauseKind};
use crate::extract::ListExtractor;
use crate::session::{navigate_with_retry, Session};
use crate::Result;

/// Position in a listing's page chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageCursor {
    /// On listing page `index` (zero-based)
    OnPage(u32),

    /// No further page
    Exhausted,
}

impl PageCursor {
    pub fn start() -> Self {
        Self::OnPage(0)
    }

    pub fn index(&self) -> Option<u32> {
        match self {
            Self::OnPage(index) => Some(*index),
            Self::Exhausted => None,
        }
    }
}

/// Moves the session from one listing page to the next
#[derive(Debug, Clone)]
pub struct Paginator {
    poll_attempts: u32,
}

impl Paginator {
    pub fn new(poll_attempts: u32) -> Self {
        Self {
            poll_attempts: poll_attempts.max(1),
        }
    }

    /// Follows the "next page" control
    ///
    /// The session must be on the current listing page. Returns `Exhausted`
    /// when there is no control, when a stop cuts the cooldown short, or when
    /// the current URL has not changed after `poll_attempts` polls. A failed
    /// navigation is returned as an error.
    pub async fn advance<E>(
        &self,
        cursor: PageCursor,
        session: &mut dyn Session,
        extractor: &E,
        scheduler: &CooldownScheduler,
    ) -> Result<PageCursor>
    where
        E: ListExtractor + ?Sized,
    {
        let PageCursor::OnPage(index) = cursor else {
            return Ok(PageCursor::Exhausted);
        };

        let Some(next) = extractor.next_page_url(session).await else {
            tracing::debug!("No next-page control after page {}", index + 1);
            return Ok(PageCursor::Exhausted);
        };

        let previous = session.current_url().await;
        if next == previous {
            tracing::debug!("Next-page control points at the current page");
            return Ok(PageCursor::Exhausted);
        }

        if !scheduler.pause(PauseKind::Page).await {
            return Ok(PageCursor::Exhausted);
        }

        navigate_with_retry(session, &next).await?;

        for attempt in 0..self.poll_attempts {
            if session.current_url().await != previous {
                return Ok(PageCursor::OnPage(index + 1));
            }
            if attempt + 1 < self.poll_attempts && !scheduler.pause(PauseKind::Poll).await {
                break;
            }
        }

        tracing::debug!("URL did not change after {} polls", self.poll_attempts);
        Ok(PageCursor::Exhausted)
    }

    /// Polls until the listing page shows cards
    ///
    /// Returns false if no card appeared within `poll_attempts` checks or a
    /// stop was requested; the caller still collects whatever is there.
    pub async fn wait_for_render<E>(
        &self,
        session: &mut dyn Session,
        extractor: &E,
        scheduler: &CooldownScheduler,
    ) -> bool
    where
        E: ListExtractor + ?Sized,
    {
        for attempt in 0..self.poll_attempts {
            if extractor.cards_rendered(session).await {
                return true;
            }
            if attempt + 1 < self.poll_attempts && !scheduler.pause(PauseKind::Poll).await {
                return false;
            }
        }

        tracing::debug!("No cards rendered after {} polls", self.poll_attempts);
        false
    }
}
