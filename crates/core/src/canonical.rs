//! Canonicalization of ingredient and dosage-form tokens.
//!
//! Reduces noisy free-text tokens (OCR output, product-database form names)
//! to a deduplicated canonical sequence for matching against the reference
//! taxonomy.
//!
//! ### Algorithm
//! 1. Lowercase, replace runs of non-`[a-z0-9]` with a space, trim.
//! 2. If the whole token (joined with `_`) is a rewrite key, expand it;
//!    otherwise split on whitespace and rewrite each sub-token.
//! 3. Keep tokens longer than one character that are not purely numeric,
//!    first occurrence wins.
//! 4. A second pass drops stopwords and bare dosages (`500mg`, `10iu`, ...)
//!    that the expansion may have produced.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

/// Raw token → canonical replacement(s).
///
/// Every replacement is a fixed point: it is never itself a key, so running
/// the canonicalizer twice yields the same sequence.
const REWRITES: &[(&str, &[&str])] = &[
    ("aerial_parts", &["whole", "plant"]),
    ("whole_plant", &["whole", "plant"]),
    ("whole_herb", &["whole", "plant"]),
    ("standardized", &["std"]),
    ("standardised", &["std"]),
    ("stdz", &["std"]),
    ("ext", &["extract"]),
    ("extr", &["extract"]),
    ("extracts", &["extract"]),
    ("capsules", &["capsule"]),
    ("caps", &["capsule"]),
    ("cap", &["capsule"]),
    ("vcaps", &["vegetable", "capsule"]),
    ("vegcap", &["vegetable", "capsule"]),
    ("vegcaps", &["vegetable", "capsule"]),
    ("veggie", &["vegetable"]),
    ("veg", &["vegetable"]),
    ("softgels", &["softgel"]),
    ("soft_gel", &["softgel"]),
    ("gelcaps", &["softgel"]),
    ("tablets", &["tablet"]),
    ("tabs", &["tablet"]),
    ("tab", &["tablet"]),
    ("chewables", &["chewable"]),
    ("gummies", &["gummy"]),
    ("lozenges", &["lozenge"]),
    ("powdered", &["powder"]),
    ("pwd", &["powder"]),
    ("liq", &["liquid"]),
    ("tinct", &["tincture"]),
    ("leaves", &["leaf"]),
    ("lf", &["leaf"]),
    ("roots", &["root"]),
    ("rt", &["root"]),
    ("rhizomes", &["rhizome"]),
    ("seeds", &["seed"]),
    ("fruits", &["fruit"]),
    ("berries", &["berry"]),
    ("flowers", &["flower"]),
    ("flowering_tops", &["flower", "top"]),
    ("barks", &["bark"]),
    ("stems", &["stem"]),
    ("dry", &["dried"]),
    ("hcl", &["hydrochloride"]),
    ("vit", &["vitamin"]),
];

/// Tokens removed in the cleanup pass. `amp` is left behind by `&amp;`.
const NOISE_TOKENS: &[&str] = &["and", "amp"];

static REWRITE_MAP: LazyLock<HashMap<&'static str, &'static [&'static str]>> =
    LazyLock::new(|| REWRITES.iter().copied().collect());

static DOSAGE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(mg|mcg|g|iu|ml|cfu)$").expect("valid dosage regex"));

static NON_ALNUM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("valid separator regex"));

/// Lowercase and reduce to space-separated `[a-z0-9]+` words.
fn normalize(token: &str) -> String {
    NON_ALNUM.replace_all(&token.to_lowercase(), " ").trim().to_string()
}

fn is_valid_token(token: &str) -> bool {
    token.len() > 1 && !token.chars().all(|c| c.is_ascii_digit())
}

/// Order-preserving, first-occurrence-wins collector.
#[derive(Default)]
struct TokenSet {
    seen: HashSet<String>,
    out: Vec<String>,
}

impl TokenSet {
    fn push(&mut self, token: &str) {
        if token.is_empty() || !is_valid_token(token) || self.seen.contains(token) {
            return;
        }
        self.seen.insert(token.to_string());
        self.out.push(token.to_string());
    }

    fn into_vec(self) -> Vec<String> {
        self.out
    }
}

/// Expand one normalized token through the rewrite table.
fn rewrite(normalized: &str) -> Vec<&str> {
    let joined = normalized.replace(' ', "_");
    if let Some(expansion) = REWRITE_MAP.get(joined.as_str()) {
        return expansion.to_vec();
    }

    normalized
        .split_whitespace()
        .flat_map(|sub| match REWRITE_MAP.get(sub) {
            Some(expansion) => expansion.to_vec(),
            None => vec![sub],
        })
        .collect()
}

/// Canonicalize dosage-form and ingredient tokens.
///
/// Output is deduplicated, order-preserving and idempotent.
pub fn canonicalize_form_tokens<S: AsRef<str>>(tokens: &[S]) -> Vec<String> {
    let mut first = TokenSet::default();
    for token in tokens {
        let normalized = normalize(token.as_ref());
        for rewritten in rewrite(&normalized) {
            first.push(rewritten);
        }
    }

    let mut cleaned = TokenSet::default();
    for token in first.into_vec() {
        if NOISE_TOKENS.contains(&token.as_str()) || DOSAGE_TOKEN.is_match(&token) {
            continue;
        }
        cleaned.push(&token);
    }
    cleaned.into_vec()
}

/// Canonicalize a single free-text ingredient name.
pub fn canonicalize_name(name: &str) -> Vec<String> {
    canonicalize_form_tokens(&[name])
}
