//! Fallback query construction.
//!
//! When no result scores well, the first result's title usually still names
//! the product. Stripping storefront names, pack counts and dosage-form words
//! leaves a brand + product core that re-queries better than the original.

use std::sync::LazyLock;

use regex::Regex;

use super::SearchCandidate;
use super::scoring::{DOSAGE_FORMS, JUNK_WORDS, RETAIL_DOMAINS};

/// Appended to the cleaned title to steer the re-query to label pages.
pub const FALLBACK_SUFFIX: &str = "supplement facts ingredients";

const MIN_CLEAN_LEN: usize = 3;

/// Mentions of a storefront domain, e.g. `Amazon.com:` or `www.iherb.com`.
static RETAILER_MENTION: LazyLock<Regex> = LazyLock::new(|| {
    let names: Vec<String> = RETAIL_DOMAINS.iter().map(|d| regex::escape(d)).collect();
    Regex::new(&format!(r"(?i)\b(?:www\.)?(?:{})\b", names.join("|"))).expect("valid retailer regex")
});

/// Counts such as `120 Capsules`, `60ct` or `2 pack`.
static COUNT_PHRASE: LazyLock<Regex> = LazyLock::new(|| {
    let units: Vec<&str> = ["count", "ct", "pack", "pk", "servings", "serving"]
        .into_iter()
        .chain(DOSAGE_FORMS.iter().copied())
        .collect();
    Regex::new(&format!(r"(?i)\b\d+\s*-?\s*(?:{})\b", units.join("|"))).expect("valid count regex")
});

static NOISE_WORD: LazyLock<Regex> = LazyLock::new(|| {
    let words: Vec<&str> = JUNK_WORDS.iter().chain(DOSAGE_FORMS.iter()).copied().collect();
    Regex::new(&format!(r"(?i)\b(?:{})\b", words.join("|"))).expect("valid junk regex")
});

static NON_ALNUM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^A-Za-z0-9]+").expect("valid separator regex"));

/// Strip storefront mentions, counts, junk words and punctuation from a title.
pub fn clean_title(title: &str) -> String {
    let text = RETAILER_MENTION.replace_all(title, " ");
    let text = COUNT_PHRASE.replace_all(&text, " ");
    let text = NOISE_WORD.replace_all(&text, " ");
    let text = NON_ALNUM.replace_all(&text, " ");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Build a re-query from the first candidate's title.
///
/// Returns `None` when there are no candidates or the cleaned title is
/// shorter than 3 characters.
pub fn build_fallback_query(candidates: &[SearchCandidate]) -> Option<String> {
    let first = candidates.first()?;
    let cleaned = clean_title(&first.title);
    if cleaned.chars().count() < MIN_CLEAN_LEN {
        return None;
    }
    Some(format!("{cleaned} {FALLBACK_SUFFIX}"))
}
