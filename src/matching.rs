//! Text heuristics for locating ad cards in the host page.
//!
//! The ad library renders one card per ad, each carrying a localized
//! "see details" button and a "Library ID: <digits>" label. These helpers
//! are the pure half of the scanner: they decide whether a piece of text
//! marks a detail button, extract library ids, and classify whether an
//! element's text belongs to a single target ad.

use std::sync::LazyLock;

use regex::Regex;

/// Button/link phrases that anchor an ad card, in the locales the ad
/// library has been observed in (English and Italian).
pub const DETAIL_PHRASES: [&str; 4] = [
    "See ad details",
    "See summary details",
    "Vedi i dettagli di riepilogo",
    "Vedi dettagli dell'inserzione",
];

static LIBRARY_ID_EN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Library ID:\s+(\d+)").expect("valid regex"));
static LIBRARY_ID_IT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"ID libreria:\s+(\d+)").expect("valid regex"));
static SRC_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"src=["']([^"']+)["']"#).expect("valid regex"));

/// True when an element's visible text marks it as a card's detail button.
pub fn is_detail_button_text(text: &str) -> bool {
    let text = text.trim();
    DETAIL_PHRASES.iter().any(|phrase| text.contains(phrase))
}

/// All library ids appearing in `text`. The English label is tried first;
/// the Italian label only counts when no English label is present, which
/// matches how the page renders (one locale per view).
pub fn library_ids(text: &str) -> Vec<String> {
    let english: Vec<String> = LIBRARY_ID_EN
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .collect();
    if !english.is_empty() {
        return english;
    }
    LIBRARY_ID_IT
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// First library id in `text`, if any.
pub fn find_library_id(text: &str) -> Option<String> {
    library_ids(text).into_iter().next()
}

/// How an element's text relates to the ad being processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeMatch {
    /// Exactly one library id and it is the target ad.
    Target,
    /// Exactly one library id but it names a different ad.
    Foreign,
    /// More than one library id; the element spans several cards.
    Ambiguous,
    /// No library id at all.
    None,
}

/// Classify an element's text against a target ad id. `Foreign` and
/// `Ambiguous` scopes abort media lookups so a nested ad's media is never
/// attributed to the wrong card.
pub fn classify_scope(text: &str, target_id: &str) -> ScopeMatch {
    let ids = library_ids(text);
    match ids.as_slice() {
        [] => ScopeMatch::None,
        [only] if only == target_id => ScopeMatch::Target,
        [_] => ScopeMatch::Foreign,
        _ => ScopeMatch::Ambiguous,
    }
}

/// Last-resort media URL extraction: pull the first `src` attribute out of
/// raw markup. Used when DOM property access yields nothing.
pub fn src_from_markup(markup: &str) -> Option<String> {
    SRC_ATTR
        .captures(markup)
        .map(|caps| caps[1].to_string())
}
