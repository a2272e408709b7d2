//! Card records and the card-reader capability a site adapter provides.

use std::rc::Rc;

use crate::error::FilterError;
use crate::types::{CardState, Visibility};

/// Fields extracted from one card for one scan pass.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CardRecord {
    pub title: String,
    pub company: String,
    pub state: CardState,
}

impl CardRecord {
    pub fn new(title: impl Into<String>, company: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            company: company.into(),
            state: CardState::empty(),
        }
    }

    pub fn with_state(mut self, state: CardState) -> Self {
        self.state |= state;
        self
    }

    #[inline]
    pub fn is_saved(&self) -> bool {
        self.state.contains(CardState::SAVED)
    }

    #[inline]
    pub fn is_promoted(&self) -> bool {
        self.state.contains(CardState::PROMOTED)
    }

    #[inline]
    pub fn is_dismissed(&self) -> bool {
        self.state.contains(CardState::DISMISSED)
    }

    #[inline]
    pub fn is_applied(&self) -> bool {
        self.state.contains(CardState::APPLIED)
    }
}

/// Site adapter view of the page's cards.
///
/// `Card` is the opaque handle to a card's visual element. Implementations
/// only read the page, apart from `set_visibility`.
pub trait CardReader {
    type Card: Clone;

    /// Every element currently matching the card selector, in page order.
    fn cards(&self) -> Vec<Self::Card>;

    /// Extract fields. `Err(MissingField)` marks an element that is not a job
    /// card (ad slot, nudge card) and must be left untouched.
    fn read(&self, card: &Self::Card) -> Result<CardRecord, FilterError>;

    /// Toggle the card's display style.
    fn set_visibility(&self, card: &Self::Card, visibility: Visibility);

    /// Current state of the card's save toggle, if it has one.
    fn save_state(&self, card: &Self::Card) -> Option<bool>;
}

impl<T: CardReader> CardReader for Rc<T> {
    type Card = T::Card;

    fn cards(&self) -> Vec<Self::Card> {
        (**self).cards()
    }

    fn read(&self, card: &Self::Card) -> Result<CardRecord, FilterError> {
        (**self).read(card)
    }

    fn set_visibility(&self, card: &Self::Card, visibility: Visibility) {
        (**self).set_visibility(card, visibility)
    }

    fn save_state(&self, card: &Self::Card) -> Option<bool> {
        (**self).save_state(card)
    }
}
