//! Shared type definitions for the filtering engine.

// =============================================================================
// Card State Flags
// =============================================================================

bitflags::bitflags! {
    /// Boolean card states a site can expose.
    ///
    /// Used both for the state of a single card and for the capability set of
    /// a site (which states its adapter can read at all).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CardState: u8 {
        /// User bookmarked the job
        const SAVED = 1 << 0;
        /// Sponsored / ad slot
        const PROMOTED = 1 << 1;
        /// User dismissed the job ("We won't show you this job again")
        const DISMISSED = 1 << 2;
        /// User already applied
        const APPLIED = 1 << 3;
    }
}

impl CardState {
    /// Build from individual booleans, in flag order.
    pub fn from_flags(saved: bool, promoted: bool, dismissed: bool, applied: bool) -> Self {
        let mut state = Self::empty();
        state.set(Self::SAVED, saved);
        state.set(Self::PROMOTED, promoted);
        state.set(Self::DISMISSED, dismissed);
        state.set(Self::APPLIED, applied);
        state
    }
}

// =============================================================================
// Normalization Mode
// =============================================================================

/// Character class kept by the normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NormalizeMode {
    /// Keep `[a-z0-9]`.
    Alnum,
    /// Keep `[a-z]` only; digits become separators.
    #[default]
    AlphaOnly,
}

impl NormalizeMode {
    #[inline]
    pub fn keeps(self, c: char) -> bool {
        match self {
            Self::Alnum => c.is_ascii_lowercase() || c.is_ascii_digit(),
            Self::AlphaOnly => c.is_ascii_lowercase(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Alnum => "alnum",
            Self::AlphaOnly => "alpha",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "alnum" => Some(Self::Alnum),
            "alpha" | "alpha-only" => Some(Self::AlphaOnly),
            _ => None,
        }
    }
}

// =============================================================================
// Visibility
// =============================================================================

/// The only page mutation the engine performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Visibility {
    Shown,
    Hidden,
}

/// What "shown" means for a site's cards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ShowStyle {
    /// `display: ''` (restore the stylesheet default)
    #[default]
    Unset,
    /// `display: block`
    Block,
}

impl Visibility {
    /// CSS `display` value to write for this visibility.
    pub fn display_value(self, style: ShowStyle) -> &'static str {
        match (self, style) {
            (Self::Hidden, _) => "none",
            (Self::Shown, ShowStyle::Unset) => "",
            (Self::Shown, ShowStyle::Block) => "block",
        }
    }
}

// =============================================================================
// Verdict
// =============================================================================

/// Rule that decided to hide a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum HideReason {
    /// Company is on the blacklist
    Company = 1,
    /// Whitelist is active and the title matched none of it
    NotWhitelisted = 2,
    /// Title matched a blacklisted keyword
    Keyword = 3,
    Saved = 4,
    Promoted = 5,
    Dismissed = 6,
    Applied = 7,
}

impl HideReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Company => "company",
            Self::NotWhitelisted => "not-whitelisted",
            Self::Keyword => "keyword",
            Self::Saved => "saved",
            Self::Promoted => "promoted",
            Self::Dismissed => "dismissed",
            Self::Applied => "applied",
        }
    }

    /// Reason for a single state flag.
    pub fn from_state(flag: CardState) -> Option<Self> {
        match flag {
            f if f == CardState::SAVED => Some(Self::Saved),
            f if f == CardState::PROMOTED => Some(Self::Promoted),
            f if f == CardState::DISMISSED => Some(Self::Dismissed),
            f if f == CardState::APPLIED => Some(Self::Applied),
            _ => None,
        }
    }
}

/// Outcome of evaluating one card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    Show,
    Hide(HideReason),
}

impl Verdict {
    #[inline]
    pub fn should_hide(self) -> bool {
        matches!(self, Self::Hide(_))
    }

    pub fn reason(self) -> Option<HideReason> {
        match self {
            Self::Show => None,
            Self::Hide(reason) => Some(reason),
        }
    }

    pub fn visibility(self) -> Visibility {
        match self {
            Self::Show => Visibility::Shown,
            Self::Hide(_) => Visibility::Hidden,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_state_from_flags() {
        let state = CardState::from_flags(true, false, false, true);
        assert!(state.contains(CardState::SAVED));
        assert!(state.contains(CardState::APPLIED));
        assert!(!state.contains(CardState::PROMOTED));
    }

    #[test]
    fn test_state_iteration_follows_declaration_order() {
        let flags: Vec<_> = CardState::all().iter().collect();
        assert_eq!(
            flags,
            vec![CardState::SAVED, CardState::PROMOTED, CardState::DISMISSED, CardState::APPLIED]
        );
    }

    #[test]
    fn test_display_value() {
        assert_eq!(Visibility::Hidden.display_value(ShowStyle::Block), "none");
        assert_eq!(Visibility::Shown.display_value(ShowStyle::Block), "block");
        assert_eq!(Visibility::Shown.display_value(ShowStyle::Unset), "");
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!(NormalizeMode::parse("alnum"), Some(NormalizeMode::Alnum));
        assert_eq!(NormalizeMode::parse("alpha"), Some(NormalizeMode::AlphaOnly));
        assert_eq!(NormalizeMode::parse("digits"), None);
    }
}
