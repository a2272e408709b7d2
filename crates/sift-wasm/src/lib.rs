//! WebAssembly bindings for JobSift
//!
//! The content script owns the DOM (selectors, the MutationObserver, click
//! listeners) and calls into this module for every decision: which settings
//! to load, whether a change set is relevant, and whether a card is hidden.

use std::cell::RefCell;

use sift_core::{
    company_alternation,
    config::{DEFAULT_RETRY_DELAY_MS, DEFAULT_SETTLE_DELAY_MS},
    normalize, CardRecord, CardState, ChangeSet, FilterEngine, FilterError, MutationBatch,
    NormalizeMode, RawSettings, RuleSet, SiteProfile, Verdict, Visibility,
};
use wasm_bindgen::prelude::*;

mod logging;

pub use logging::init_logging;

struct FilterState {
    profile: SiteProfile,
    engine: FilterEngine,
}

thread_local! {
    static FILTER_STATE: RefCell<Option<FilterState>> = const { RefCell::new(None) };
}

fn with_state<T>(f: impl FnOnce(&FilterState) -> T) -> Option<T> {
    FILTER_STATE.with(|state| state.borrow().as_ref().map(f))
}

fn to_js_error(e: FilterError) -> JsValue {
    JsValue::from_str(&e.to_string())
}

// =============================================================================
// Setup
// =============================================================================

fn init_site(site_id: &str) -> Result<(), FilterError> {
    let profile = SiteProfile::builtin(site_id).ok_or_else(|| FilterError::UnknownSite(site_id.to_string()))?;
    let engine = FilterEngine::new(RuleSet::empty(profile.mode));
    log::debug!("initialized for '{site_id}'");
    FILTER_STATE.with(|state| *state.borrow_mut() = Some(FilterState { profile, engine }));
    Ok(())
}

/// Select the site profile. Re-initializing resets the rules to empty.
#[wasm_bindgen]
pub fn init(site_id: &str) -> Result<(), JsValue> {
    init_site(site_id).map_err(to_js_error)
}

#[wasm_bindgen]
pub fn is_initialized() -> bool {
    with_state(|_| ()).is_some()
}

/// Built-in site id for a page URL.
#[wasm_bindgen]
pub fn site_for_url(url: &str) -> Option<String> {
    SiteProfile::for_url(url).map(|profile| profile.id)
}

/// Whether filtering should run on `url` (host match plus path gate).
#[wasm_bindgen]
pub fn applies_to(url: &str) -> bool {
    with_state(|state| state.profile.applies_to(url)).unwrap_or(false)
}

fn current_keys() -> Vec<String> {
    with_state(|state| state.profile.settings_keys()).unwrap_or_default()
}

/// Keys to request from the settings store.
#[wasm_bindgen]
pub fn settings_keys() -> js_sys::Array {
    current_keys().into_iter().map(JsValue::from).collect()
}

// =============================================================================
// Rules
// =============================================================================

/// Replace the rules from a settings snapshot. A missing or unreadable
/// snapshot fails open: the site runs with empty rules and shows every card.
fn apply_settings(json: Option<&str>) -> Result<usize, FilterError> {
    let settings = match json {
        Some(json) => serde_json::from_str::<RawSettings>(json).map_err(FilterError::from),
        None => Err(FilterError::StoreUnavailable("no settings snapshot".to_string())),
    };
    FILTER_STATE.with(|state| {
        let mut state = state.borrow_mut();
        let state = state
            .as_mut()
            .ok_or_else(|| FilterError::UnknownSite("not initialized".to_string()))?;
        let rules = match settings {
            Ok(settings) => RuleSet::from_settings(&settings, &state.profile),
            Err(e) => {
                log::warn!("{e}; filtering '{}' with empty rules", state.profile.id);
                RuleSet::empty(state.profile.mode)
            }
        };
        let count = rules.whitelist().len() + rules.blacklist().len() + rules.companies().len();
        state.engine.replace_rules(rules);
        Ok(count)
    })
}

/// Replace the rule set with a settings snapshot (the object returned by the
/// store's `get`). Returns the number of list rules loaded. `null`,
/// `undefined` or a value that does not serialize loads empty rules.
#[wasm_bindgen]
pub fn load_settings(settings: JsValue) -> Result<u32, JsValue> {
    let json = if settings.is_null() || settings.is_undefined() {
        None
    } else {
        js_sys::JSON::stringify(&settings).ok().and_then(|s| s.as_string())
    };
    apply_settings(json.as_deref()).map(|count| count as u32).map_err(to_js_error)
}

fn relevant_change(keys: &[String]) -> bool {
    let change: ChangeSet = keys.iter().cloned().collect();
    change.touches(&current_keys())
}

/// Whether a change notification (array of changed keys) needs a reload.
#[wasm_bindgen]
pub fn is_relevant_change(keys: js_sys::Array) -> bool {
    let keys: Vec<String> = keys.iter().filter_map(|k| k.as_string()).collect();
    relevant_change(&keys)
}

/// Whether saved-job hiding is on; the save-click listener is a no-op otherwise.
#[wasm_bindgen]
pub fn hide_saved() -> bool {
    with_state(|state| state.engine.rules().hide_saved()).unwrap_or(false)
}

/// Combined company pattern `\b(a|b)\b` for adapters that match with a regex.
#[wasm_bindgen]
pub fn company_pattern() -> Option<String> {
    with_state(|state| company_alternation(state.engine.rules().companies())).flatten()
}

// =============================================================================
// Evaluation
// =============================================================================

fn evaluate(title: &str, company: &str, state: CardState) -> Verdict {
    let record = CardRecord::new(title.trim(), company.trim()).with_state(state);
    with_state(|s| s.engine.evaluate(&record)).unwrap_or(Verdict::Show)
}

/// Evaluate one card. Returns `{ hide, reason, display }`.
#[wasm_bindgen]
pub fn evaluate_card(
    title: &str,
    company: &str,
    saved: bool,
    promoted: bool,
    dismissed: bool,
    applied: bool,
) -> JsValue {
    let verdict = evaluate(title, company, CardState::from_flags(saved, promoted, dismissed, applied));

    let result = js_sys::Object::new();
    let _ = js_sys::Reflect::set(&result, &"hide".into(), &JsValue::from(verdict.should_hide()));
    let reason = verdict.reason().map_or(JsValue::NULL, |r| JsValue::from_str(r.as_str()));
    let _ = js_sys::Reflect::set(&result, &"reason".into(), &reason);
    let _ = js_sys::Reflect::set(&result, &"display".into(), &JsValue::from_str(display_for(verdict.visibility())));
    result.into()
}

#[wasm_bindgen]
pub fn should_hide(title: &str, company: &str, saved: bool, promoted: bool, dismissed: bool, applied: bool) -> bool {
    evaluate(title, company, CardState::from_flags(saved, promoted, dismissed, applied)).should_hide()
}

fn display_for(visibility: Visibility) -> &'static str {
    let style = with_state(|state| state.profile.show_style).unwrap_or_default();
    visibility.display_value(style)
}

/// CSS `display` value to write for a card.
#[wasm_bindgen]
pub fn show_display(hidden: bool) -> String {
    let visibility = if hidden { Visibility::Hidden } else { Visibility::Shown };
    display_for(visibility).to_string()
}

/// Whether a mutation batch warrants a new filter pass on this site.
#[wasm_bindgen]
pub fn should_rescan(added_nodes: u32, removed_nodes: u32) -> bool {
    let batch = MutationBatch {
        added_nodes: added_nodes as usize,
        removed_nodes: removed_nodes as usize,
    };
    with_state(|state| state.profile.mutation_policy.accepts(&batch)).unwrap_or(false)
}

#[wasm_bindgen]
pub fn normalize_text(text: &str, alnum: bool) -> String {
    let mode = if alnum { NormalizeMode::Alnum } else { NormalizeMode::AlphaOnly };
    normalize(text, mode)
}

// =============================================================================
// Timing
// =============================================================================

/// Delay between a save click and re-reading the toggle.
#[wasm_bindgen]
pub fn settle_delay_ms() -> u32 {
    DEFAULT_SETTLE_DELAY_MS as u32
}

/// Delay before retrying a missing card container.
#[wasm_bindgen]
pub fn retry_delay_ms() -> u32 {
    DEFAULT_RETRY_DELAY_MS as u32
}
