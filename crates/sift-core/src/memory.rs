//! In-memory page: a card list plus a simulated card container.
//!
//! Handles are slot indices and stay stable when cards are removed. Used by
//! the CLI to run passes over cards loaded from JSON and by tests to drive
//! sessions without a browser.

use std::cell::{Cell, RefCell};

use crate::card::{CardReader, CardRecord};
use crate::error::{CardField, FilterError};
use crate::types::{CardState, Visibility};
use crate::watcher::{ContainerSource, MutationBatch};

/// One element matched by the card selector.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MemoryCard {
    pub title: Option<String>,
    pub company: Option<String>,
    pub state: CardState,
}

impl MemoryCard {
    pub fn job(title: &str, company: &str) -> Self {
        Self {
            title: Some(title.to_string()),
            company: Some(company.to_string()),
            state: CardState::empty(),
        }
    }

    /// An element lacking `field`; `text` fills the other one.
    pub fn missing(field: CardField, text: &str) -> Self {
        match field {
            CardField::Title => Self {
                company: Some(text.to_string()),
                ..Self::default()
            },
            CardField::Company => Self {
                title: Some(text.to_string()),
                ..Self::default()
            },
        }
    }

    pub fn with_state(mut self, state: CardState) -> Self {
        self.state |= state;
        self
    }
}

#[derive(Debug)]
struct Slot {
    card: MemoryCard,
    visibility: Option<Visibility>,
}

/// Which container an observer is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryContainer {
    List,
    Body,
}

#[derive(Debug, Default)]
struct ContainerState {
    missing_lookups: u32,
    locate_calls: u32,
    fallback: bool,
    observe_calls: u32,
    next_observer: u32,
    observers: Vec<(u32, MemoryContainer)>,
}

/// Card list with recorded visibility writes.
#[derive(Debug)]
pub struct MemoryPage {
    slots: RefCell<Vec<Option<Slot>>>,
    container: RefCell<ContainerState>,
    present: Cell<bool>,
}

impl MemoryPage {
    pub fn new(cards: Vec<MemoryCard>) -> Self {
        Self {
            slots: RefCell::new(
                cards
                    .into_iter()
                    .map(|card| Some(Slot { card, visibility: None }))
                    .collect(),
            ),
            container: RefCell::new(ContainerState::default()),
            present: Cell::new(true),
        }
    }

    /// Append a card, returning the handle and the mutation it causes.
    pub fn push(&self, card: MemoryCard) -> (usize, MutationBatch) {
        let mut slots = self.slots.borrow_mut();
        slots.push(Some(Slot { card, visibility: None }));
        (slots.len() - 1, MutationBatch::added(1))
    }

    pub fn remove(&self, handle: usize) -> MutationBatch {
        match self.slots.borrow_mut().get_mut(handle).and_then(Option::take) {
            Some(_) => MutationBatch::removed(1),
            None => MutationBatch::default(),
        }
    }

    /// Flip a card's save toggle, as the host page does after a click.
    pub fn set_saved(&self, handle: usize, saved: bool) {
        if let Some(Some(slot)) = self.slots.borrow_mut().get_mut(handle) {
            slot.card.state.set(CardState::SAVED, saved);
        }
    }

    /// Last visibility written to a card; `None` if never touched.
    pub fn visibility(&self, handle: usize) -> Option<Visibility> {
        self.slots
            .borrow()
            .get(handle)
            .and_then(|slot| slot.as_ref())
            .and_then(|slot| slot.visibility)
    }

    pub fn hidden_indices(&self) -> Vec<usize> {
        self.slots
            .borrow()
            .iter()
            .enumerate()
            .filter(|(_, slot)| matches!(slot, Some(Slot { visibility: Some(Visibility::Hidden), .. })))
            .map(|(i, _)| i)
            .collect()
    }

    pub fn card(&self, handle: usize) -> Option<MemoryCard> {
        self.slots
            .borrow()
            .get(handle)
            .and_then(|slot| slot.as_ref())
            .map(|slot| slot.card.clone())
    }

    // -- container simulation --

    pub fn set_container_present(&self, present: bool) {
        self.present.set(present);
        self.container.borrow_mut().missing_lookups = 0;
    }

    /// The container appears on the lookup after `misses` failed ones.
    pub fn set_container_after(&self, misses: u32) {
        self.present.set(true);
        self.container.borrow_mut().missing_lookups = misses;
    }

    pub fn set_fallback_present(&self, present: bool) {
        self.container.borrow_mut().fallback = present;
    }

    pub fn locate_calls(&self) -> u32 {
        self.container.borrow().locate_calls
    }

    pub fn observe_calls(&self) -> u32 {
        self.container.borrow().observe_calls
    }

    pub fn active_observers(&self) -> usize {
        self.container.borrow().observers.len()
    }

    pub fn observed_container(&self) -> Option<MemoryContainer> {
        self.container.borrow().observers.last().map(|(_, c)| *c)
    }
}

impl CardReader for MemoryPage {
    type Card = usize;

    fn cards(&self) -> Vec<usize> {
        self.slots
            .borrow()
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|_| i))
            .collect()
    }

    fn read(&self, handle: &usize) -> Result<CardRecord, FilterError> {
        let slots = self.slots.borrow();
        let card = match slots.get(*handle) {
            Some(Some(slot)) => &slot.card,
            _ => return Err(FilterError::MissingField(CardField::Title)),
        };
        let title = card.title.as_ref().ok_or(FilterError::MissingField(CardField::Title))?;
        let company = card.company.as_ref().ok_or(FilterError::MissingField(CardField::Company))?;
        Ok(CardRecord::new(title.trim(), company.trim()).with_state(card.state))
    }

    fn set_visibility(&self, handle: &usize, visibility: Visibility) {
        if let Some(Some(slot)) = self.slots.borrow_mut().get_mut(*handle) {
            slot.visibility = Some(visibility);
        }
    }

    fn save_state(&self, handle: &usize) -> Option<bool> {
        self.slots
            .borrow()
            .get(*handle)
            .and_then(|slot| slot.as_ref())
            .map(|slot| slot.card.state.contains(CardState::SAVED))
    }
}

impl ContainerSource for MemoryPage {
    type Container = MemoryContainer;
    type Observer = u32;

    fn locate(&self) -> Option<MemoryContainer> {
        let mut state = self.container.borrow_mut();
        state.locate_calls += 1;
        if !self.present.get() {
            return None;
        }
        if state.missing_lookups > 0 {
            state.missing_lookups -= 1;
            return None;
        }
        Some(MemoryContainer::List)
    }

    fn fallback(&self) -> Option<MemoryContainer> {
        self.container.borrow().fallback.then_some(MemoryContainer::Body)
    }

    fn observe(&self, container: &MemoryContainer) -> u32 {
        let mut state = self.container.borrow_mut();
        state.observe_calls += 1;
        state.next_observer += 1;
        let id = state.next_observer;
        state.observers.push((id, *container));
        id
    }

    fn disconnect(&self, observer: u32) {
        self.container.borrow_mut().observers.retain(|(id, _)| *id != observer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_survive_removal() {
        let page = MemoryPage::new(vec![MemoryCard::job("A", "x"), MemoryCard::job("B", "y")]);
        assert_eq!(page.remove(0), MutationBatch::removed(1));
        assert_eq!(page.remove(0), MutationBatch::default());
        assert_eq!(page.cards(), vec![1]);
        assert_eq!(page.read(&1).unwrap().title, "B");
        let (handle, batch) = page.push(MemoryCard::job("C", "z"));
        assert_eq!((handle, batch), (2, MutationBatch::added(1)));
    }

    #[test]
    fn test_read_missing_fields() {
        let page = MemoryPage::new(vec![
            MemoryCard::missing(CardField::Title, "Acme"),
            MemoryCard::missing(CardField::Company, "Engineer"),
        ]);
        assert!(matches!(page.read(&0), Err(FilterError::MissingField(CardField::Title))));
        assert!(matches!(page.read(&1), Err(FilterError::MissingField(CardField::Company))));
    }

    #[test]
    fn test_save_state() {
        let page = MemoryPage::new(vec![MemoryCard::job("A", "x")]);
        assert_eq!(page.save_state(&0), Some(false));
        page.set_saved(0, true);
        assert_eq!(page.save_state(&0), Some(true));
        assert!(page.read(&0).unwrap().is_saved());
        assert_eq!(page.save_state(&9), None);
    }
}
