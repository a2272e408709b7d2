//! Text normalization into the canonical matching form.
//!
//! Lower-case, map every character outside the mode's class to a separator,
//! collapse separator runs to one space, trim. Pure and idempotent.

use crate::types::NormalizeMode;

/// Normalize `text` into a plain string.
pub fn normalize(text: &str, mode: NormalizeMode) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;

    for c in text.chars().flat_map(char::to_lowercase) {
        if mode.keeps(c) {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(c);
        } else {
            pending_space = true;
        }
    }

    out
}

/// Remove all whitespace (the "compressed" form).
#[inline]
pub fn compress(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Normalized text together with its compressed form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedText {
    text: String,
    compressed: String,
    mode: NormalizeMode,
}

impl NormalizedText {
    pub fn new(raw: &str, mode: NormalizeMode) -> Self {
        let text = normalize(raw, mode);
        let compressed = compress(&text);
        Self { text, compressed, mode }
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    #[inline]
    pub fn compressed(&self) -> &str {
        &self.compressed
    }

    #[inline]
    pub fn mode(&self) -> NormalizeMode {
        self.mode
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.text.split_whitespace()
    }

    pub fn contains_word(&self, word: &str) -> bool {
        self.words().any(|w| w == word)
    }
}

impl std::fmt::Display for NormalizedText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_alpha() {
        assert_eq!(normalize("Senior  Backend-Engineer (L5)", NormalizeMode::AlphaOnly), "senior backend engineer l");
        assert_eq!(normalize("  ", NormalizeMode::AlphaOnly), "");
        assert_eq!(normalize("C++ / C#", NormalizeMode::AlphaOnly), "c c");
    }

    #[test]
    fn test_normalize_alnum_keeps_digits() {
        assert_eq!(normalize("Web3 Engineer II", NormalizeMode::Alnum), "web3 engineer ii");
        assert_eq!(normalize("Web3 Engineer II", NormalizeMode::AlphaOnly), "web engineer ii");
    }

    #[test]
    fn test_normalize_non_ascii_becomes_separator() {
        assert_eq!(normalize("Café—Manager", NormalizeMode::AlphaOnly), "caf manager");
    }

    #[test]
    fn test_normalize_idempotent() {
        let samples = [
            "Sr. Machine-Learning Engineer",
            "  AI/ML   Research ",
            "İstanbul Office 24/7",
            "",
            "already normalized",
            "Ünïcödé ÄÖÜ ß",
            "12345",
            "2024",
            "--Lead--",
            "  ...x...  ",
            "a1b22c333",
            "L5 SDE-2 (2024)",
        ];
        for mode in [NormalizeMode::Alnum, NormalizeMode::AlphaOnly] {
            for s in samples {
                let once = normalize(s, mode);
                assert_eq!(normalize(&once, mode), once, "not idempotent for {:?}", s);
            }
        }
    }

    #[test]
    fn test_normalize_digit_runs() {
        assert_eq!(normalize("12345", NormalizeMode::AlphaOnly), "");
        assert_eq!(normalize("12345", NormalizeMode::Alnum), "12345");
        assert_eq!(normalize("a1b22c333", NormalizeMode::AlphaOnly), "a b c");
        assert_eq!(normalize("a1b22c333", NormalizeMode::Alnum), "a1b22c333");
        assert_eq!(normalize("L5 SDE-2 (2024)", NormalizeMode::AlphaOnly), "l sde");
        assert_eq!(normalize("L5 SDE-2 (2024)", NormalizeMode::Alnum), "l5 sde 2 2024");
        assert_eq!(normalize("--Lead--", NormalizeMode::AlphaOnly), "lead");
        assert_eq!(normalize("  ...x...  ", NormalizeMode::Alnum), "x");
    }

    #[test]
    fn test_normalized_text_views() {
        let text = NormalizedText::new("Backend Engineer", NormalizeMode::AlphaOnly);
        assert_eq!(text.as_str(), "backend engineer");
        assert_eq!(text.compressed(), "backendengineer");
        assert!(text.contains_word("engineer"));
        assert!(!text.contains_word("engine"));
        assert_eq!(NormalizedText::new("", NormalizeMode::Alnum).words().count(), 0);
    }
}
