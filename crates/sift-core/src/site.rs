//! Per-site capability profiles.
//!
//! A profile carries everything site-specific the engine needs: settings key
//! names, which card states the site exposes, the normalization mode, when a
//! mutation batch warrants a rescan, and how to restore a shown card. DOM
//! selectors stay in the site adapter.

use crate::types::{CardState, NormalizeMode, ShowStyle};

/// Which mutation batches trigger a filter pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MutationPolicy {
    /// Any child-list change (nodes added or removed).
    #[default]
    AnyChildList,
    /// Only batches that added nodes.
    AddedNodesOnly,
}

/// Settings key names for one site. `None` means the site has no such setting.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SettingsKeys {
    pub whitelist: Option<String>,
    pub blacklist: Option<String>,
    pub companies: Option<String>,
    pub hide_saved: Option<String>,
    pub hide_promoted: Option<String>,
    pub hide_dismissed: Option<String>,
    pub hide_applied: Option<String>,
}

impl SettingsKeys {
    /// `<prefix>_blacklistedKeywords`, `<prefix>_blacklistedCompanies` and one
    /// `<prefix>_hide*` toggle per capability.
    pub fn prefixed(prefix: &str, capabilities: CardState) -> Self {
        let toggle = |flag: CardState, name: &str| {
            capabilities
                .contains(flag)
                .then(|| format!("{prefix}_{name}"))
        };
        Self {
            whitelist: None,
            blacklist: Some(format!("{prefix}_blacklistedKeywords")),
            companies: Some(format!("{prefix}_blacklistedCompanies")),
            hide_saved: toggle(CardState::SAVED, "hideSaved"),
            hide_promoted: toggle(CardState::PROMOTED, "hidePromoted"),
            hide_dismissed: toggle(CardState::DISMISSED, "hideDismissed"),
            hide_applied: toggle(CardState::APPLIED, "hideApplied"),
        }
    }

    /// Toggle key for a single state flag.
    pub fn toggle(&self, flag: CardState) -> Option<&str> {
        let key = match flag {
            f if f == CardState::SAVED => &self.hide_saved,
            f if f == CardState::PROMOTED => &self.hide_promoted,
            f if f == CardState::DISMISSED => &self.hide_dismissed,
            f if f == CardState::APPLIED => &self.hide_applied,
            _ => return None,
        };
        key.as_deref()
    }

    /// All configured keys, lists first.
    pub fn all(&self) -> Vec<String> {
        [
            &self.whitelist,
            &self.blacklist,
            &self.companies,
            &self.hide_saved,
            &self.hide_promoted,
            &self.hide_dismissed,
            &self.hide_applied,
        ]
        .into_iter()
        .flatten()
        .cloned()
        .collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.all().iter().any(|k| k == key)
    }
}

/// Capability profile for one recruiting site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteProfile {
    pub id: String,
    /// Host suffixes this profile applies to.
    pub hosts: Vec<String>,
    /// Path fragment a page URL must contain before filtering starts.
    pub path_gate: Option<String>,
    pub keys: SettingsKeys,
    pub capabilities: CardState,
    pub mode: NormalizeMode,
    pub mutation_policy: MutationPolicy,
    pub show_style: ShowStyle,
}

impl SiteProfile {
    /// Known site ids, in lookup order.
    pub const BUILTIN: &'static [&'static str] = &["linkedin", "naukri", "indeed", "glassdoor", "foundit"];

    /// LinkedIn keeps its legacy unprefixed key names.
    pub fn linkedin() -> Self {
        Self {
            id: "linkedin".to_string(),
            hosts: vec!["linkedin.com".to_string()],
            path_gate: Some("/jobs/search/".to_string()),
            keys: SettingsKeys {
                whitelist: Some("whitelistKeywords".to_string()),
                blacklist: Some("titleKeywords".to_string()),
                companies: Some("companyNames".to_string()),
                hide_saved: None,
                hide_promoted: Some("hidePromoted".to_string()),
                hide_dismissed: Some("hideDismissed".to_string()),
                hide_applied: Some("hideApplied".to_string()),
            },
            capabilities: CardState::PROMOTED | CardState::DISMISSED | CardState::APPLIED,
            mode: NormalizeMode::Alnum,
            mutation_policy: MutationPolicy::AnyChildList,
            show_style: ShowStyle::Block,
        }
    }

    pub fn naukri() -> Self {
        Self::prefixed("naukri", "naukri.com", CardState::SAVED | CardState::PROMOTED, MutationPolicy::AnyChildList)
    }

    pub fn indeed() -> Self {
        Self::prefixed("indeed", "indeed.com", CardState::SAVED, MutationPolicy::AnyChildList)
    }

    pub fn glassdoor() -> Self {
        Self::prefixed("glassdoor", "glassdoor.com", CardState::SAVED, MutationPolicy::AddedNodesOnly)
    }

    pub fn foundit() -> Self {
        Self::prefixed("foundit", "foundit.in", CardState::SAVED, MutationPolicy::AddedNodesOnly)
    }

    fn prefixed(id: &str, host: &str, capabilities: CardState, mutation_policy: MutationPolicy) -> Self {
        Self {
            id: id.to_string(),
            hosts: vec![host.to_string()],
            path_gate: None,
            keys: SettingsKeys::prefixed(id, capabilities),
            capabilities,
            mode: NormalizeMode::AlphaOnly,
            mutation_policy,
            show_style: ShowStyle::Unset,
        }
    }

    /// Look up a built-in profile by id.
    pub fn builtin(id: &str) -> Option<Self> {
        match id {
            "linkedin" => Some(Self::linkedin()),
            "naukri" => Some(Self::naukri()),
            "indeed" => Some(Self::indeed()),
            "glassdoor" => Some(Self::glassdoor()),
            "foundit" => Some(Self::foundit()),
            _ => None,
        }
    }

    /// Pick the built-in profile whose host matches `url`.
    pub fn for_url(url: &str) -> Option<Self> {
        let host = url_host(url)?;
        Self::BUILTIN
            .iter()
            .filter_map(|id| Self::builtin(id))
            .find(|profile| profile.matches_host(host))
    }

    pub fn matches_host(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        self.hosts.iter().any(|suffix| {
            host == *suffix
                || host
                    .strip_suffix(suffix.as_str())
                    .is_some_and(|rest| rest.ends_with('.'))
        })
    }

    /// Whether filtering should run on this page.
    pub fn applies_to(&self, url: &str) -> bool {
        match url_host(url) {
            Some(host) if self.matches_host(host) => {}
            _ => return false,
        }
        match &self.path_gate {
            Some(gate) => url.contains(gate.as_str()),
            None => true,
        }
    }

    /// Settings keys the engine loads for this site.
    pub fn settings_keys(&self) -> Vec<String> {
        self.keys.all()
    }

    pub fn supports(&self, flag: CardState) -> bool {
        self.capabilities.contains(flag)
    }
}

/// Host part of an absolute URL, without userinfo or port.
fn url_host(url: &str) -> Option<&str> {
    let (_, rest) = url.split_once("://")?;
    let authority = rest.split(['/', '?', '#']).next()?;
    let host = authority.rsplit('@').next()?;
    let host = host.split(':').next()?;
    (!host.is_empty()).then_some(host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixed_keys() {
        let naukri = SiteProfile::naukri();
        assert_eq!(
            naukri.settings_keys(),
            vec![
                "naukri_blacklistedKeywords",
                "naukri_blacklistedCompanies",
                "naukri_hideSaved",
                "naukri_hidePromoted",
            ]
        );
        assert!(naukri.keys.whitelist.is_none());
        assert_eq!(naukri.keys.toggle(CardState::PROMOTED), Some("naukri_hidePromoted"));
        assert_eq!(naukri.keys.toggle(CardState::APPLIED), None);
    }

    #[test]
    fn test_linkedin_legacy_keys() {
        let linkedin = SiteProfile::linkedin();
        assert!(linkedin.keys.contains("titleKeywords"));
        assert!(linkedin.keys.contains("whitelistKeywords"));
        assert!(!linkedin.keys.contains("hideSaved"));
        assert!(!linkedin.supports(CardState::SAVED));
        assert_eq!(linkedin.mode, NormalizeMode::Alnum);
    }

    #[test]
    fn test_for_url() {
        let profile = SiteProfile::for_url("https://www.glassdoor.com/Job/index.htm").unwrap();
        assert_eq!(profile.id, "glassdoor");
        assert_eq!(profile.mutation_policy, MutationPolicy::AddedNodesOnly);
        assert_eq!(SiteProfile::for_url("https://www.foundit.in/srp/results").unwrap().id, "foundit");
        assert!(SiteProfile::for_url("https://notlinkedin.com/jobs/search/").is_none());
        assert!(SiteProfile::for_url("not a url").is_none());
    }

    #[test]
    fn test_path_gate() {
        let linkedin = SiteProfile::linkedin();
        assert!(linkedin.applies_to("https://www.linkedin.com/jobs/search/?keywords=rust"));
        assert!(!linkedin.applies_to("https://www.linkedin.com/feed/"));
        assert!(!linkedin.applies_to("https://example.com/jobs/search/"));
        assert!(SiteProfile::indeed().applies_to("https://in.indeed.com/jobs?q=rust"));
    }

    #[test]
    fn test_url_host() {
        assert_eq!(url_host("https://user@www.naukri.com:443/x"), Some("www.naukri.com"));
        assert_eq!(url_host("https://indeed.com"), Some("indeed.com"));
        assert_eq!(url_host("https:///path"), None);
    }
}
