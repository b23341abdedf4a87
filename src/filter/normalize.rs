use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

fn count_suffix() -> &'static Regex {
    static COUNT_SUFFIX: OnceLock<Regex> = OnceLock::new();
    COUNT_SUFFIX.get_or_init(|| {
        Regex::new(r"\s*\(\s*[\d.,]+\s*\)\s*$").expect("count suffix pattern is valid")
    })
}

/// Normalizes a location label for comparison
///
/// Applies, in order:
/// 1. Removal of a trailing parenthesized count such as "(120)"
/// 2. Lower-casing
/// 3. Removal of diacritics (including the stroked "đ")
/// 4. Whitespace collapsing and trimming
///
/// # Examples
///
/// ```
/// use listing_sweep::filter::normalize_location;
///
/// assert_eq!(normalize_location("Hà Nội (1.204)"), "ha noi");
/// assert_eq!(normalize_location("  Quận   Đống Đa "), "quan dong da");
/// ```
pub fn normalize_location(text: &str) -> String {
    let without_count = count_suffix().replace(text, "");
    let folded = strip_diacritics(&without_count.to_lowercase());
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Removes combining marks after canonical decomposition
///
/// "đ"/"Đ" have no decomposition and are mapped explicitly.
pub fn strip_diacritics(text: &str) -> String {
    text.nfd()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| match c {
            'đ' => 'd',
            'Đ' => 'D',
            other => other,
        })
        .collect()
}

/// Splits normalized text into its set of words
pub fn tokenize(normalized: &str) -> BTreeSet<&str> {
    normalized.split_whitespace().collect()
}
