//! Filter engine
//!
//! Applies a rule set to each card with a fixed precedence chain and writes
//! the resulting visibility. A pass only reads the page and writes display
//! styles, so running it again (or with new rules) fully overrides the
//! previous pass.

use crate::card::{CardReader, CardRecord};
use crate::matcher::matches_company;
use crate::normalize::NormalizedText;
use crate::rules::RuleSet;
use crate::types::{HideReason, Verdict, Visibility};

/// Decide whether one card is hidden. The first rule that hides wins:
///
/// 1. blacklisted company
/// 2. active whitelist that the title does not match
/// 3. blacklisted title keyword
/// 4. enabled state toggle (saved, promoted, dismissed, applied)
pub fn evaluate_card(card: &CardRecord, rules: &RuleSet) -> Verdict {
    if !rules.companies().is_empty() && matches_company(&card.company, rules.companies()) {
        return Verdict::Hide(HideReason::Company);
    }

    if !rules.whitelist().is_empty() || !rules.blacklist().is_empty() {
        let title = NormalizedText::new(&card.title, rules.mode());

        if !rules.whitelist().is_empty()
            && !rules.whitelist().iter().any(|k| k.matches_whitelist(&title))
        {
            return Verdict::Hide(HideReason::NotWhitelisted);
        }

        if rules.blacklist().iter().any(|k| k.matches_blacklist(&title)) {
            return Verdict::Hide(HideReason::Keyword);
        }
    }

    let flagged = card.state & rules.hidden_states();
    match flagged.iter().next().and_then(HideReason::from_state) {
        Some(reason) => Verdict::Hide(reason),
        None => Verdict::Show,
    }
}

/// Counts from one filter pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub scanned: usize,
    pub skipped: usize,
    pub shown: usize,
    pub hidden: usize,
}

impl PassSummary {
    fn record(&mut self, verdict: Verdict) {
        match verdict {
            Verdict::Show => self.shown += 1,
            Verdict::Hide(_) => self.hidden += 1,
        }
    }
}

/// Owns the current rule set and runs passes with it.
#[derive(Debug, Default)]
pub struct FilterEngine {
    rules: RuleSet,
}

impl FilterEngine {
    pub fn new(rules: RuleSet) -> Self {
        Self { rules }
    }

    #[inline]
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Swap in a new rule set, returning the old one.
    pub fn replace_rules(&mut self, rules: RuleSet) -> RuleSet {
        std::mem::replace(&mut self.rules, rules)
    }

    pub fn evaluate(&self, card: &CardRecord) -> Verdict {
        evaluate_card(card, &self.rules)
    }

    /// Evaluate every card currently on the page and set its visibility.
    /// Cards the reader cannot read are skipped and left as they are.
    pub fn run_filter_pass<R: CardReader>(&self, reader: &R) -> PassSummary {
        let mut summary = PassSummary::default();

        for card in reader.cards() {
            summary.scanned += 1;
            let record = match reader.read(&card) {
                Ok(record) => record,
                Err(e) => {
                    log::debug!("skipping card: {e}");
                    summary.skipped += 1;
                    continue;
                }
            };

            let verdict = self.evaluate(&record);
            if let Some(reason) = verdict.reason() {
                log::debug!("hiding '{}' ({})", record.title, reason.as_str());
            }
            reader.set_visibility(&card, verdict.visibility());
            summary.record(verdict);
        }

        log::debug!(
            "filter pass: {} scanned, {} hidden, {} shown, {} skipped",
            summary.scanned,
            summary.hidden,
            summary.shown,
            summary.skipped
        );
        summary
    }

    /// Low-latency path after a save click settles: hide the card if its
    /// toggle now reads "saved" and hiding saved jobs is enabled.
    pub fn apply_save_toggle<R: CardReader>(&self, reader: &R, card: &R::Card) -> bool {
        if !self.rules.hide_saved() {
            return false;
        }
        if reader.save_state(card) == Some(true) {
            reader.set_visibility(card, Visibility::Hidden);
            return true;
        }
        false
    }
}
