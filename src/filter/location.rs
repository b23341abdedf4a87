//! Fuzzy matching of a requested location against a site's location picker

use crate::filter::normalize::{normalize_location, tokenize};
use serde::{Deserialize, Serialize};

/// Minimum score for a candidate to be accepted
pub const MATCH_THRESHOLD: u32 = 50;

/// One entry scraped from a site's location picker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationCandidate {
    /// Display text, possibly with a trailing count like "(120)"
    pub text: String,

    /// URL the entry links to
    pub url: String,
}

impl LocationCandidate {
    pub fn new(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            url: url.into(),
        }
    }
}

/// The accepted candidate and its score
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationMatch {
    pub url: String,
    pub text: String,
    pub score: u32,
}

/// Scores a candidate label against a requested location
///
/// | Relation | Score |
/// |----------|-------|
/// | identical after normalization | 100 |
/// | same word set, different order | 95 |
/// | `n >= 2` words in common | 80 + 5 × (n − 2) |
/// | one word in common | 20 |
/// | nothing in common | 0 |
///
/// # Examples
///
/// ```
/// use listing_sweep::filter::score_location;
///
/// assert_eq!(score_location("Quận Ba Đình", "Quận Ba Đình (52)"), 100);
/// assert_eq!(score_location("Ba Đình Quận", "Quận Ba Đình"), 95);
/// assert_eq!(score_location("Ba Đình", "Quận Ba Đình"), 80);
/// assert_eq!(score_location("Hà Nội", "Hải Phòng"), 0);
/// ```
pub fn score_location(requested: &str, candidate: &str) -> u32 {
    let requested = normalize_location(requested);
    let candidate = normalize_location(candidate);
    score_normalized(&requested, &candidate)
}

fn score_normalized(requested: &str, candidate: &str) -> u32 {
    if requested == candidate {
        return 100;
    }

    let requested_words = tokenize(requested);
    let candidate_words = tokenize(candidate);
    if requested_words == candidate_words {
        return 95;
    }

    let common = requested_words.intersection(&candidate_words).count() as u32;
    match common {
        0 => 0,
        1 => 20,
        n => 80 + 5 * (n - 2),
    }
}

/// Picks the best-scoring candidate for `requested`
///
/// The first candidate wins a tie. Returns None when the best score is
/// below [`MATCH_THRESHOLD`] or there are no candidates.
pub fn best_match(requested: &str, candidates: &[LocationCandidate]) -> Option<LocationMatch> {
    let requested_norm = normalize_location(requested);
    let mut best: Option<(u32, &LocationCandidate)> = None;

    for candidate in candidates {
        let score = score_normalized(&requested_norm, &normalize_location(&candidate.text));
        tracing::trace!("Location candidate '{}' scored {}", candidate.text, score);

        let better = match best {
            Some((best_score, _)) => score > best_score,
            None => true,
        };
        if better {
            best = Some((score, candidate));
        }
    }

    match best {
        Some((score, candidate)) if score >= MATCH_THRESHOLD => {
            tracing::debug!(
                "Location '{}' matched '{}' (score {}) -> {}",
                requested,
                candidate.text,
                score,
                candidate.url
            );
            Some(LocationMatch {
                url: candidate.url.clone(),
                text: candidate.text.clone(),
                score,
            })
        }
        Some((score, candidate)) => {
            tracing::debug!(
                "Best location candidate for '{}' was '{}' with score {}, below threshold",
                requested,
                candidate.text,
                score
            );
            None
        }
        None => None,
    }
}
