//! Rule sets and their construction from raw settings.
//!
//! A `RuleSet` is built once from a flat key-value settings snapshot and is
//! never mutated afterwards; a settings change produces a new one.

use serde_json::Value;

use crate::error::FilterError;
use crate::matcher::Keyword;
use crate::site::SiteProfile;
use crate::types::{CardState, NormalizeMode};

/// Flat key-value settings as returned by the rule store.
pub type RawSettings = serde_json::Map<String, Value>;

/// Immutable filtering rules for one site.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    mode: NormalizeMode,
    whitelist: Vec<Keyword>,
    blacklist: Vec<Keyword>,
    companies: Vec<String>,
    hide: CardState,
}

impl RuleSet {
    /// Empty rules: nothing is ever hidden.
    pub fn empty(mode: NormalizeMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Build rules from a settings snapshot.
    ///
    /// Missing keys default to an empty list / `false`. Values of the wrong
    /// type and rules that are empty after normalization are discarded with a
    /// warning. Toggles the site cannot read are never enabled.
    pub fn from_settings(settings: &RawSettings, profile: &SiteProfile) -> Self {
        let mode = profile.mode;
        let keys = &profile.keys;

        let whitelist = keyword_list(settings, keys.whitelist.as_deref(), mode);
        let blacklist = keyword_list(settings, keys.blacklist.as_deref(), mode);
        let companies = company_list(settings, keys.companies.as_deref());

        let mut hide = CardState::empty();
        for flag in profile.capabilities.iter() {
            if let Some(key) = keys.toggle(flag) {
                hide.set(flag, read_bool(settings, key));
            }
        }

        Self {
            mode,
            whitelist,
            blacklist,
            companies,
            hide,
        }
    }

    pub fn builder(mode: NormalizeMode) -> RuleSetBuilder {
        RuleSetBuilder {
            rules: Self::empty(mode),
        }
    }

    #[inline]
    pub fn mode(&self) -> NormalizeMode {
        self.mode
    }

    #[inline]
    pub fn whitelist(&self) -> &[Keyword] {
        &self.whitelist
    }

    #[inline]
    pub fn blacklist(&self) -> &[Keyword] {
        &self.blacklist
    }

    /// Blacklisted company names, trimmed and lower-cased.
    #[inline]
    pub fn companies(&self) -> &[String] {
        &self.companies
    }

    /// Card states that hide a card.
    #[inline]
    pub fn hidden_states(&self) -> CardState {
        self.hide
    }

    pub fn hide_saved(&self) -> bool {
        self.hide.contains(CardState::SAVED)
    }

    pub fn hide_promoted(&self) -> bool {
        self.hide.contains(CardState::PROMOTED)
    }

    pub fn hide_dismissed(&self) -> bool {
        self.hide.contains(CardState::DISMISSED)
    }

    pub fn hide_applied(&self) -> bool {
        self.hide.contains(CardState::APPLIED)
    }

    /// True when no rule can hide anything.
    pub fn is_empty(&self) -> bool {
        self.whitelist.is_empty()
            && self.blacklist.is_empty()
            && self.companies.is_empty()
            && self.hide.is_empty()
    }
}

/// Incremental construction, mostly for adapters and tests that do not go
/// through a settings snapshot.
#[derive(Debug, Clone)]
pub struct RuleSetBuilder {
    rules: RuleSet,
}

impl RuleSetBuilder {
    pub fn whitelist<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mode = self.rules.mode;
        self.rules
            .whitelist
            .extend(keywords.into_iter().filter_map(|k| Keyword::new(k.as_ref(), mode)));
        self
    }

    pub fn blacklist<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mode = self.rules.mode;
        self.rules
            .blacklist
            .extend(keywords.into_iter().filter_map(|k| Keyword::new(k.as_ref(), mode)));
        self
    }

    pub fn companies<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.rules.companies.extend(
            names
                .into_iter()
                .map(|n| n.as_ref().trim().to_lowercase())
                .filter(|n| !n.is_empty()),
        );
        self
    }

    pub fn hide(mut self, states: CardState) -> Self {
        self.rules.hide |= states;
        self
    }

    pub fn build(self) -> RuleSet {
        self.rules
    }
}

/// Split comma-separated rule text the way the settings editor stores it:
/// trim each entry, drop empties.
pub fn split_rule_text(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_owned)
        .collect()
}

fn string_list<'a>(settings: &'a RawSettings, key: Option<&str>) -> Vec<&'a str> {
    let Some(key) = key else {
        return Vec::new();
    };
    match settings.get(key) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.as_str()),
                other => {
                    let err = FilterError::MalformedRule {
                        key: key.to_string(),
                        reason: format!("expected a string, found {other}"),
                    };
                    log::warn!("{err}");
                    None
                }
            })
            .collect(),
        Some(other) => {
            let err = FilterError::MalformedRule {
                key: key.to_string(),
                reason: format!("expected a list, found {other}"),
            };
            log::warn!("{err}");
            Vec::new()
        }
    }
}

fn keyword_list(settings: &RawSettings, key: Option<&str>, mode: NormalizeMode) -> Vec<Keyword> {
    string_list(settings, key)
        .into_iter()
        .filter_map(|raw| {
            let keyword = Keyword::new(raw, mode);
            if keyword.is_none() {
                log::debug!(
                    "{}",
                    FilterError::MalformedRule {
                        key: key.unwrap_or_default().to_string(),
                        reason: format!("'{raw}' is empty after normalization"),
                    }
                );
            }
            keyword
        })
        .collect()
}

fn company_list(settings: &RawSettings, key: Option<&str>) -> Vec<String> {
    string_list(settings, key)
        .into_iter()
        .map(|name| name.trim().to_lowercase())
        .filter(|name| !name.is_empty())
        .collect()
}

fn read_bool(settings: &RawSettings, key: &str) -> bool {
    match settings.get(key) {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(other) => {
            log::warn!("setting '{key}' is not a boolean ({other}), treating as false");
            false
        }
    }
}
