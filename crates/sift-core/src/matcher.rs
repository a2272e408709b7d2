//! Keyword and company matching.
//!
//! Whitelist matching is loose (word-set containment), blacklist matching is
//! an exact phrase, company matching is an exact case-insensitive string
//! compare. All three fall back differently and must not share logic.

use crate::normalize::{compress, normalize, NormalizedText};
use crate::types::NormalizeMode;

// =============================================================================
// Keyword
// =============================================================================

/// A keyword rule prepared once at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyword {
    normalized: String,
    words: Vec<String>,
    compressed: String,
}

impl Keyword {
    /// Prepare a keyword. Returns `None` when nothing survives normalization.
    pub fn new(raw: &str, mode: NormalizeMode) -> Option<Self> {
        let normalized = normalize(raw, mode);
        if normalized.is_empty() {
            return None;
        }
        let words = normalized.split(' ').map(str::to_owned).collect();
        let compressed = compress(&normalized);
        Some(Self {
            normalized,
            words,
            compressed,
        })
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.normalized
    }

    #[inline]
    pub fn is_phrase(&self) -> bool {
        self.words.len() > 1
    }

    /// Every keyword word appears somewhere in the title, in any order.
    /// Phrases also match on the compressed form.
    pub fn matches_whitelist(&self, title: &NormalizedText) -> bool {
        if self.words.iter().all(|w| title.contains_word(w)) {
            return true;
        }
        self.is_phrase() && self.matches_compressed(title)
    }

    /// Single words match whole words only. Phrases match the exact word
    /// sequence, or the compressed form.
    pub fn matches_blacklist(&self, title: &NormalizedText) -> bool {
        if !self.is_phrase() {
            return title.contains_word(&self.normalized);
        }

        let title_words: Vec<&str> = title.words().collect();
        let n = self.words.len();
        if title_words.len() >= n
            && title_words
                .windows(n)
                .any(|window| window.iter().zip(&self.words).all(|(a, b)| *a == b.as_str()))
        {
            return true;
        }

        self.matches_compressed(title)
    }

    #[inline]
    fn matches_compressed(&self, title: &NormalizedText) -> bool {
        title.compressed().contains(self.compressed.as_str())
    }
}

impl std::fmt::Display for Keyword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.normalized)
    }
}

// =============================================================================
// Free-standing matchers
// =============================================================================

/// Whitelist test for a raw keyword against an already-normalized title.
/// The keyword is normalized with the title's mode.
pub fn matches_whitelist(keyword: &str, title: &NormalizedText) -> bool {
    Keyword::new(keyword, title.mode()).is_some_and(|k| k.matches_whitelist(title))
}

/// Blacklist test for a raw keyword against an already-normalized title.
pub fn matches_blacklist(keyword: &str, title: &NormalizedText) -> bool {
    Keyword::new(keyword, title.mode()).is_some_and(|k| k.matches_blacklist(title))
}

/// Exact, case-insensitive, whole-string company compare after trimming.
/// "Acme" does not match "Acme Corp".
pub fn matches_company<S: AsRef<str>>(company: &str, companies: &[S]) -> bool {
    let company = company.trim().to_lowercase();
    if company.is_empty() {
        return false;
    }
    companies
        .iter()
        .any(|name| name.as_ref().trim().to_lowercase() == company)
}

// =============================================================================
// Regex escaping
// =============================================================================

const REGEX_META: &[char] = &[
    '.', '*', '+', '?', '^', '$', '{', '}', '(', ')', '|', '[', ']', '\\',
];

/// Escape every regular-expression metacharacter so `s` matches literally.
pub fn escape_regex(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        if REGEX_META.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Boundary-anchored alternation `\b(a|b|...)\b` over escaped company names,
/// for adapters that test one combined pattern instead of comparing each
/// name. Returns `None` for an empty list (the pattern must then never
/// match, so callers skip the test).
pub fn company_alternation<S: AsRef<str>>(companies: &[S]) -> Option<String> {
    let escaped: Vec<String> = companies
        .iter()
        .map(|name| name.as_ref().trim())
        .filter(|name| !name.is_empty())
        .map(escape_regex)
        .collect();

    if escaped.is_empty() {
        return None;
    }

    Some(format!("\\b({})\\b", escaped.join("|")))
}
