//! Search-result quality scoring.
//!
//! Each candidate earns points for signs of authoritative label data:
//!
//! | Signal                                                    | Points |
//! |-----------------------------------------------------------|--------|
//! | `ingredients`, `supplement facts` or `nutrition facts`    | 30     |
//! | a dosage such as `500 mg` or `5000IU`                     | 40     |
//! | a known retail domain, or the brand word in the domain    | 30     |
//!
//! The result-set score is the best candidate's score, capped at 100.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use super::SearchCandidate;

pub const MAX_SCORE: u8 = 100;

const KEYWORD_POINTS: u8 = 30;
const DOSAGE_POINTS: u8 = 40;
const DOMAIN_POINTS: u8 = 30;

const KEYWORDS: &[&str] = &["ingredients", "supplement facts", "nutrition facts"];

/// Retail and supplement storefronts that publish label panels.
pub(crate) const RETAIL_DOMAINS: &[&str] = &[
    "amazon.com",
    "amazon.ca",
    "amazon.co.uk",
    "iherb.com",
    "vitacost.com",
    "walmart.com",
    "walmart.ca",
    "target.com",
    "gnc.com",
    "vitaminshoppe.com",
    "bodybuilding.com",
    "well.ca",
    "costco.com",
    "costco.ca",
    "cvs.com",
    "walgreens.com",
    "luckyvitamin.com",
    "pureformulas.com",
    "swansonvitamins.com",
    "shoppersdrugmart.ca",
];

/// Title words that carry no brand or product identity.
pub(crate) const JUNK_WORDS: &[&str] = &[
    "pack", "packs", "count", "ct", "lot", "exp", "expiry", "expires", "expiration", "bottle", "bottles", "new",
    "sale", "best", "seller", "free", "shipping", "value", "size", "serving", "servings", "supply", "day", "days",
    "iu", "mg", "mcg", "g",
];

/// Dosage-form words.
pub(crate) const DOSAGE_FORMS: &[&str] = &[
    "capsule", "capsules", "caps", "vcaps", "vegcaps", "tablet", "tablets", "tabs", "softgel", "softgels",
    "gummy", "gummies", "powder", "liquid", "drops", "lozenge", "lozenges", "chewable", "chewables", "veggie",
    "vegetarian",
];

static DOSAGE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\d+\s?(mg|g|mcg|iu)").expect("valid dosage regex"));

static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Za-z0-9]+").expect("valid word regex"));

/// Lowercased host of `link` without a leading `www.`.
pub(crate) fn link_domain(link: &str) -> Option<String> {
    let url = Url::parse(link).ok()?;
    let host = url.host_str()?.to_ascii_lowercase();
    Some(host.strip_prefix("www.").map(str::to_string).unwrap_or(host))
}

fn is_retail_domain(domain: &str) -> bool {
    RETAIL_DOMAINS
        .iter()
        .any(|retail| domain == *retail || domain.ends_with(&format!(".{retail}")))
}

fn is_noise_word(word: &str) -> bool {
    JUNK_WORDS.contains(&word) || DOSAGE_FORMS.contains(&word)
}

/// First title word that survives junk and dosage-form stripping and is longer than 3 chars.
fn first_clean_word(title: &str) -> Option<String> {
    WORD.find_iter(title)
        .map(|m| m.as_str().to_lowercase())
        .find(|w| w.len() > 3 && !is_noise_word(w))
}

/// Score one candidate in `[0, 100]`.
pub fn score_candidate(candidate: &SearchCandidate) -> u8 {
    let text = format!("{} {}", candidate.title, candidate.snippet);
    let lower = text.to_lowercase();
    let mut score = 0u8;

    if KEYWORDS.iter().any(|k| lower.contains(k)) {
        score += KEYWORD_POINTS;
    }

    if DOSAGE_PATTERN.is_match(&text) {
        score += DOSAGE_POINTS;
    }

    if let Some(domain) = link_domain(&candidate.link) {
        let brand_match = || first_clean_word(&candidate.title).is_some_and(|w| domain.contains(&w));
        if is_retail_domain(&domain) || brand_match() {
            score += DOMAIN_POINTS;
        }
    }

    score.min(MAX_SCORE)
}

/// Score a result set: the best candidate's score, or 0 when empty.
pub fn score_results(candidates: &[SearchCandidate]) -> u8 {
    candidates.iter().map(score_candidate).max().unwrap_or(0)
}
