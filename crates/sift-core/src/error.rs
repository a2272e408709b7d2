//! Error taxonomy for the filtering subsystem.
//!
//! None of these are fatal to the host page. Each call site recovers locally
//! (skip the card, fail open, retry, discard the rule) and logs the error.

/// A card element the site adapter could not find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardField {
    Title,
    Company,
}

impl std::fmt::Display for CardField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Title => f.write_str("title"),
            Self::Company => f.write_str("company"),
        }
    }
}

/// Error type for rule loading, card reading and observer binding.
#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("card is missing its {0} element")]
    MissingField(CardField),
    #[error("rule store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("card container not found after {attempts} attempts")]
    ObserverTargetMissing { attempts: u32 },
    #[error("malformed rule in '{key}': {reason}")]
    MalformedRule { key: String, reason: String },
    #[error("invalid config: {0}")]
    InvalidConfig(#[from] serde_json::Error),
    #[error("unknown site: {0}")]
    UnknownSite(String),
}

impl FilterError {
    /// True for errors that only mean "this element is not a job card".
    pub fn is_missing_field(&self) -> bool {
        matches!(self, Self::MissingField(_))
    }
}
