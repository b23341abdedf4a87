//! Captcha detection and per-item recovery

use crate::session::{navigate_with_retry, NavigationError, Session};
use std::path::{Path, PathBuf};

/// Characters of page content scanned for the captcha marker
pub const CAPTCHA_SCAN_CHARS: usize = 3000;

/// Returns true if the marker appears in the URL or in the early page content
///
/// Case-insensitive.
pub fn detect_captcha(url: &str, content: &str, marker: &str) -> bool {
    let marker = marker.to_lowercase();
    if marker.is_empty() {
        return false;
    }
    if url.to_lowercase().contains(&marker) {
        return true;
    }
    let head: String = content.chars().take(CAPTCHA_SCAN_CHARS).collect();
    head.to_lowercase().contains(&marker)
}

/// Capture path for a challenge met while opening `href`
///
/// `captcha_<scope>_<href with unsafe characters replaced>.png`
pub fn capture_path(dir: &Path, scope: &str, href: &str) -> PathBuf {
    let key: String = href
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .take(150)
        .collect();
    dir.join(format!("captcha_{}_{}.png", scope, key))
}

/// Captures the challenge page and returns to the listing page
///
/// A failed capture is logged; failing to get back to the listing page is
/// returned, since the page loop cannot continue without it.
pub async fn recover_from_captcha(
    session: &mut dyn Session,
    screenshot_dir: &Path,
    href: &str,
    listing_url: &str,
) -> Result<(), NavigationError> {
    let path = capture_path(screenshot_dir, "detail", href);
    match session.screenshot(&path).await {
        Ok(()) => tracing::info!("Saved captcha capture to {}", path.display()),
        Err(e) => tracing::warn!("Could not save captcha capture {}: {}", path.display(), e),
    }

    navigate_with_retry(session, listing_url).await
}
