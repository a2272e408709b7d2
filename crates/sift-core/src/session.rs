//! Filter session
//!
//! One session per page. It owns the current rule set, the container
//! observer and the pending save-click timers, and drives them from a single
//! cooperative event loop: page events, settings change notifications and the
//! nearest timer deadline.

use tokio::sync::{broadcast, mpsc};
use tokio::time::{self, Instant};

use crate::card::CardReader;
use crate::config::SessionConfig;
use crate::engine::{FilterEngine, PassSummary};
use crate::rules::RuleSet;
use crate::site::SiteProfile;
use crate::store::{load_rules, RuleStore};
use crate::watcher::{ChangeWatcher, ContainerSource, MutationBatch};

/// Events the host page feeds into a session.
#[derive(Debug, Clone)]
pub enum PageEvent<C> {
    /// Child-list mutations under the observed container.
    Mutation(MutationBatch),
    /// Capture-phase click on a card's save control.
    SaveClicked(C),
    /// SPA navigation (hash change, history pop) to a new URL.
    Navigated(String),
    Shutdown,
}

#[derive(Debug)]
struct PendingSave<C> {
    due: Instant,
    card: C,
}

pub struct FilterSession<S, R, W>
where
    S: RuleStore,
    R: CardReader,
    W: ContainerSource,
{
    profile: SiteProfile,
    config: SessionConfig,
    store: S,
    reader: R,
    engine: FilterEngine,
    watcher: ChangeWatcher<W>,
    pending_saves: Vec<PendingSave<R::Card>>,
    pass_due: Option<Instant>,
    bind_due: Option<Instant>,
    active: bool,
}

impl<S, R, W> FilterSession<S, R, W>
where
    S: RuleStore,
    R: CardReader,
    W: ContainerSource,
{
    pub fn new(profile: SiteProfile, config: SessionConfig, store: S, reader: R, source: W) -> Self {
        let watcher = ChangeWatcher::new(source, profile.mutation_policy, config.retry.clone());
        let engine = FilterEngine::new(RuleSet::empty(profile.mode));
        Self {
            profile,
            config,
            store,
            reader,
            engine,
            watcher,
            pending_saves: Vec::new(),
            pass_due: None,
            bind_due: None,
            active: true,
        }
    }

    #[inline]
    pub fn profile(&self) -> &SiteProfile {
        &self.profile
    }

    #[inline]
    pub fn rules(&self) -> &RuleSet {
        self.engine.rules()
    }

    #[inline]
    pub fn reader(&self) -> &R {
        &self.reader
    }

    #[inline]
    pub fn watcher(&self) -> &ChangeWatcher<W> {
        &self.watcher
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Load rules, run the first pass and start observing.
    pub async fn start(&mut self) -> PassSummary {
        self.reload().await
    }

    /// Reload the full rule set and rebind the observer. Inactive sessions
    /// (page gate closed) only swap the rules.
    ///
    /// Only the rule load is awaited. A missing container is retried from
    /// the session's timer, so events keep flowing meanwhile.
    pub async fn reload(&mut self) -> PassSummary {
        let rules = load_rules(&self.store, &self.profile).await;
        self.engine.replace_rules(rules);
        if !self.active {
            return PassSummary::default();
        }

        self.watcher.unbind();
        let summary = self.run_filter_pass();
        self.step_bind(Instant::now());
        summary
    }

    fn step_bind(&mut self, now: Instant) {
        self.bind_due = self.watcher.poll_bind().map(|delay| now + delay);
    }

    pub fn run_filter_pass(&mut self) -> PassSummary {
        self.pass_due = None;
        self.engine.run_filter_pass(&self.reader)
    }

    /// Run (or schedule, when debouncing) a pass for a qualifying batch.
    pub fn on_mutation(&mut self, batch: MutationBatch, now: Instant) -> Option<PassSummary> {
        if !self.active || !self.watcher.observe_batch(&batch) {
            return None;
        }
        match self.config.debounce() {
            Some(window) => {
                self.pass_due = Some(now + window);
                None
            }
            None => Some(self.run_filter_pass()),
        }
    }

    /// Start the settle timer for a save click when saved jobs are hidden.
    pub fn on_save_clicked(&mut self, card: R::Card, now: Instant) {
        if !self.active || !self.engine.rules().hide_saved() {
            return;
        }
        self.pending_saves.push(PendingSave {
            due: now + self.config.settle_delay(),
            card,
        });
    }

    /// Apply the page gate for a new URL.
    pub async fn on_navigation(&mut self, url: &str) -> Option<PassSummary> {
        if !self.profile.applies_to(url) {
            if self.active {
                log::debug!("'{}' filtering paused on {url}", self.profile.id);
                self.dispose();
            }
            self.active = false;
            return None;
        }
        self.active = true;
        Some(self.reload().await)
    }

    /// Earliest pending timer.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending_saves
            .iter()
            .map(|p| p.due)
            .chain(self.pass_due)
            .chain(self.bind_due)
            .min()
    }

    /// Fire every timer due at `now`. Returns the number of cards hidden by
    /// settled save clicks.
    pub fn fire_due(&mut self, now: Instant) -> usize {
        let (due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending_saves)
            .into_iter()
            .partition(|p| p.due <= now);
        self.pending_saves = pending;

        let hidden = due
            .iter()
            .filter(|p| self.engine.apply_save_toggle(&self.reader, &p.card))
            .count();

        if self.bind_due.is_some_and(|d| d <= now) {
            self.step_bind(now);
            // cards added while nothing was observing
            if self.watcher.is_bound() {
                self.pass_due = Some(now);
            }
        }

        if self.pass_due.is_some_and(|d| d <= now) {
            self.run_filter_pass();
        }
        hidden
    }

    pub async fn handle_event(&mut self, event: PageEvent<R::Card>) {
        let now = Instant::now();
        match event {
            PageEvent::Mutation(batch) => {
                self.on_mutation(batch, now);
            }
            PageEvent::SaveClicked(card) => self.on_save_clicked(card, now),
            PageEvent::Navigated(url) => {
                self.on_navigation(&url).await;
            }
            PageEvent::Shutdown => self.dispose(),
        }
    }

    /// Disconnect the observer and drop pending timers.
    pub fn dispose(&mut self) {
        self.watcher.unbind();
        self.pending_saves.clear();
        self.pass_due = None;
        self.bind_due = None;
    }

    /// Run until the event channel closes or a `Shutdown` arrives, then
    /// dispose and hand the session back.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<PageEvent<R::Card>>) -> Self {
        let mut changes = self.store.subscribe();
        let mut store_open = true;
        let keys = self.profile.settings_keys();

        self.start().await;

        loop {
            let deadline = self.next_deadline();
            tokio::select! {
                event = events.recv() => match event {
                    None | Some(PageEvent::Shutdown) => break,
                    Some(event) => self.handle_event(event).await,
                },
                change = changes.recv(), if store_open => match change {
                    Ok(change) => {
                        if change.touches(&keys) {
                            log::debug!("'{}' settings changed, reloading", self.profile.id);
                            self.reload().await;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        log::warn!("missed {missed} settings changes, reloading");
                        self.reload().await;
                    }
                    Err(broadcast::error::RecvError::Closed) => store_open = false,
                },
                _ = time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.fire_due(Instant::now());
                }
            }
        }

        self.dispose();
        self
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::error::CardField;
    use crate::memory::{MemoryCard, MemoryContainer, MemoryPage};
    use crate::rules::RawSettings;
    use crate::store::MemoryStore;
    use crate::types::Visibility;
    use crate::watcher::{Binding, RetryPolicy};

    type TestSession = FilterSession<Arc<MemoryStore>, Rc<MemoryPage>, Rc<MemoryPage>>;

    fn settings(value: serde_json::Value) -> RawSettings {
        value.as_object().cloned().unwrap_or_default()
    }

    fn session(profile: SiteProfile, store: &Arc<MemoryStore>, page: &Rc<MemoryPage>, config: SessionConfig) -> TestSession {
        FilterSession::new(profile, config, Arc::clone(store), Rc::clone(page), Rc::clone(page))
    }

    fn jobs() -> Vec<MemoryCard> {
        vec![
            MemoryCard::job("Inside Sales Executive", "Acme"),
            MemoryCard::job("Backend Engineer", "Soul AI"),
            MemoryCard::job("Frontend Engineer", "Soul AI Private Ltd"),
            MemoryCard::missing(CardField::Company, "Sales Nudge"),
        ]
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_filters_and_binds() {
        let store = Arc::new(MemoryStore::new(settings(json!({
            "naukri_blacklistedKeywords": ["sales"],
            "naukri_blacklistedCompanies": ["soul ai"],
        }))));
        let page = Rc::new(MemoryPage::new(jobs()));
        let mut session = session(SiteProfile::naukri(), &store, &page, SessionConfig::default());

        let summary = session.start().await;
        assert_eq!(summary, PassSummary { scanned: 4, skipped: 1, shown: 1, hidden: 2 });
        assert_eq!(page.hidden_indices(), vec![0, 1]);
        assert_eq!(page.visibility(3), None);
        assert_eq!(page.active_observers(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload_replaces_rules_and_rebinds_once() {
        let store = Arc::new(MemoryStore::default());
        let page = Rc::new(MemoryPage::new(jobs()));
        let mut session = session(SiteProfile::naukri(), &store, &page, SessionConfig::default());

        session.start().await;
        assert!(page.hidden_indices().is_empty());

        store.set(settings(json!({ "naukri_blacklistedKeywords": ["sales"] })));
        session.reload().await;
        assert_eq!(page.hidden_indices(), vec![0]);

        store.set(settings(json!({ "naukri_blacklistedKeywords": ["engineer"] })));
        session.reload().await;
        assert_eq!(page.hidden_indices(), vec![1, 2]);
        assert_eq!(page.visibility(0), Some(Visibility::Shown));
        assert_eq!(page.active_observers(), 1);
        assert_eq!(page.observe_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mutation_policy_gates_passes() {
        let store = Arc::new(MemoryStore::new(settings(json!({
            "glassdoor_blacklistedKeywords": ["sales"],
        }))));
        let page = Rc::new(MemoryPage::new(Vec::new()));
        let mut session = session(SiteProfile::glassdoor(), &store, &page, SessionConfig::default());
        session.start().await;

        let (handle, batch) = page.push(MemoryCard::job("Sales Lead", "x"));
        let summary = session.on_mutation(batch, Instant::now()).unwrap();
        assert_eq!(summary.hidden, 1);
        assert_eq!(page.visibility(handle), Some(Visibility::Hidden));

        // glassdoor ignores removal-only batches
        let batch = page.remove(handle);
        assert!(session.on_mutation(batch, Instant::now()).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_coalesces_mutations() {
        let store = Arc::new(MemoryStore::new(settings(json!({
            "indeed_blacklistedKeywords": ["sales"],
        }))));
        let page = Rc::new(MemoryPage::new(Vec::new()));
        let config = SessionConfig {
            debounce_ms: Some(100),
            ..SessionConfig::default()
        };
        let mut session = session(SiteProfile::indeed(), &store, &page, config);
        session.start().await;

        let start = Instant::now();
        let (a, batch) = page.push(MemoryCard::job("Sales One", "x"));
        assert!(session.on_mutation(batch, start).is_none());
        let (b, batch) = page.push(MemoryCard::job("Sales Two", "x"));
        assert!(session.on_mutation(batch, start + Duration::from_millis(50)).is_none());

        assert_eq!(session.next_deadline(), Some(start + Duration::from_millis(150)));
        session.fire_due(start + Duration::from_millis(120));
        assert_eq!(page.visibility(a), None);

        session.fire_due(start + Duration::from_millis(150));
        assert_eq!(page.hidden_indices(), vec![a, b]);
        assert_eq!(session.next_deadline(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_save_click_ignored_when_not_hiding_saved() {
        let store = Arc::new(MemoryStore::default());
        let page = Rc::new(MemoryPage::new(jobs()));
        let mut session = session(SiteProfile::indeed(), &store, &page, SessionConfig::default());
        session.start().await;

        session.on_save_clicked(1, Instant::now());
        assert_eq!(session.next_deadline(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_save_click_last_state_wins() {
        let store = Arc::new(MemoryStore::new(settings(json!({ "foundit_hideSaved": true }))));
        let page = Rc::new(MemoryPage::new(jobs()));
        let mut session = session(SiteProfile::foundit(), &store, &page, SessionConfig::default());
        session.start().await;

        let now = Instant::now();
        session.on_save_clicked(1, now);
        page.set_saved(1, true);
        session.on_save_clicked(1, now + Duration::from_millis(100));
        page.set_saved(1, false);

        assert_eq!(session.fire_due(now + Duration::from_millis(700)), 0);
        assert_eq!(session.next_deadline(), None);
        assert_eq!(page.visibility(1), Some(Visibility::Shown));
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigation_gate() {
        let store = Arc::new(MemoryStore::new(settings(json!({ "titleKeywords": ["sales"] }))));
        let page = Rc::new(MemoryPage::new(jobs()));
        let mut session = session(SiteProfile::linkedin(), &store, &page, SessionConfig::default());

        assert!(session.on_navigation("https://www.linkedin.com/feed/").await.is_none());
        assert!(!session.is_active());
        assert_eq!(page.active_observers(), 0);
        let (_, batch) = page.push(MemoryCard::job("Sales", "x"));
        assert!(session.on_mutation(batch, Instant::now()).is_none());

        let summary = session
            .on_navigation("https://www.linkedin.com/jobs/search/?keywords=rust")
            .await
            .unwrap();
        assert_eq!(summary.hidden, 2);
        assert!(session.is_active());
        assert_eq!(page.active_observers(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_hides_saved_card_after_settle_delay() {
        let store = Arc::new(MemoryStore::new(settings(json!({ "indeed_hideSaved": true }))));
        let page = Rc::new(MemoryPage::new(jobs()));
        let session = session(SiteProfile::indeed(), &store, &page, SessionConfig::default());
        let (tx, rx) = mpsc::unbounded_channel();

        let driver = async {
            tokio::task::yield_now().await;
            tx.send(PageEvent::SaveClicked(2)).unwrap();
            // the host page flips the toggle shortly after the click
            time::sleep(Duration::from_millis(200)).await;
            page.set_saved(2, true);

            time::sleep(Duration::from_millis(399)).await;
            assert_eq!(page.visibility(2), Some(Visibility::Shown));

            time::sleep(Duration::from_millis(2)).await;
            assert_eq!(page.visibility(2), Some(Visibility::Hidden));
            assert_eq!(page.observe_calls(), 1);
            tx.send(PageEvent::Shutdown).unwrap();
        };

        let (session, ()) = tokio::join!(session.run(rx), driver);
        assert_eq!(page.active_observers(), 0);
        assert!(!session.watcher().is_bound());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_reloads_only_on_relevant_changes() {
        let store = Arc::new(MemoryStore::default());
        let page = Rc::new(MemoryPage::new(jobs()));
        let session = session(SiteProfile::naukri(), &store, &page, SessionConfig::default());
        let (tx, rx) = mpsc::unbounded_channel();

        let driver = async {
            tokio::task::yield_now().await;
            store.set(settings(json!({ "indeed_blacklistedKeywords": ["engineer"] })));
            time::sleep(Duration::from_millis(10)).await;
            assert!(page.hidden_indices().is_empty());
            assert_eq!(page.observe_calls(), 1);

            store.set(settings(json!({ "naukri_blacklistedKeywords": ["engineer"] })));
            time::sleep(Duration::from_millis(10)).await;
            assert_eq!(page.hidden_indices(), vec![1, 2]);
            assert_eq!(page.observe_calls(), 2);
            assert_eq!(page.active_observers(), 1);

            let (handle, batch) = page.push(MemoryCard::job("Staff Engineer", "y"));
            tx.send(PageEvent::Mutation(batch)).unwrap();
            time::sleep(Duration::from_millis(10)).await;
            assert_eq!(page.visibility(handle), Some(Visibility::Hidden));
            drop(tx);
        };

        let (session, ()) = tokio::join!(session.run(rx), driver);
        assert_eq!(session.rules().blacklist().len(), 1);
        assert_eq!(page.active_observers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_container_is_retried_from_timer() {
        let store = Arc::new(MemoryStore::new(settings(json!({ "indeed_blacklistedKeywords": ["sales"] }))));
        let page = Rc::new(MemoryPage::new(jobs()));
        page.set_container_present(false);
        let config = SessionConfig {
            retry: RetryPolicy::fixed(500, 3),
            ..SessionConfig::default()
        };
        let mut session = session(SiteProfile::indeed(), &store, &page, config);

        let start = Instant::now();
        let summary = session.start().await;
        assert_eq!(summary.hidden, 1);
        assert!(!session.watcher().is_bound());
        assert_eq!(page.locate_calls(), 1);
        assert_eq!(session.next_deadline(), Some(start + Duration::from_millis(500)));

        // the list grows while nothing is observing it
        let (handle, _) = page.push(MemoryCard::job("Sales Lead", "x"));
        session.fire_due(start + Duration::from_millis(500));
        assert_eq!(page.locate_calls(), 2);
        assert!(!session.watcher().is_bound());
        assert_eq!(page.visibility(handle), None);

        page.set_container_present(true);
        session.fire_due(start + Duration::from_millis(1_000));
        assert!(session.watcher().is_bound());
        assert_eq!(page.visibility(handle), Some(Visibility::Hidden));
        assert_eq!(session.next_deadline(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_save_click_settles_while_container_missing() {
        let store = Arc::new(MemoryStore::new(settings(json!({ "indeed_hideSaved": true }))));
        let page = Rc::new(MemoryPage::new(jobs()));
        page.set_container_present(false);
        let session = session(SiteProfile::indeed(), &store, &page, SessionConfig::default());
        let (tx, rx) = mpsc::unbounded_channel();

        let driver = async {
            tokio::task::yield_now().await;
            tx.send(PageEvent::SaveClicked(0)).unwrap();
            time::sleep(Duration::from_millis(200)).await;
            page.set_saved(0, true);

            time::sleep(Duration::from_millis(401)).await;
            assert_eq!(page.visibility(0), Some(Visibility::Hidden));
            // one retry ran at 500ms without holding up the click
            assert_eq!(page.locate_calls(), 2);
            tx.send(PageEvent::Shutdown).unwrap();
        };

        let (session, ()) = tokio::join!(session.run(rx), driver);
        assert!(!session.watcher().is_bound());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_batches_move_to_container() {
        let store = Arc::new(MemoryStore::new(settings(json!({ "glassdoor_blacklistedKeywords": ["sales"] }))));
        let page = Rc::new(MemoryPage::new(Vec::new()));
        page.set_container_present(false);
        page.set_fallback_present(true);
        let config = SessionConfig {
            retry: RetryPolicy::fixed(500, 1),
            ..SessionConfig::default()
        };
        let mut session = session(SiteProfile::glassdoor(), &store, &page, config);

        session.start().await;
        assert_eq!(session.watcher().binding(), Binding::Fallback);
        assert_eq!(session.next_deadline(), None);

        page.set_container_present(true);
        let (handle, batch) = page.push(MemoryCard::job("Sales Lead", "x"));
        assert_eq!(session.on_mutation(batch, Instant::now()).map(|s| s.hidden), Some(1));
        assert_eq!(session.watcher().binding(), Binding::Target);
        assert_eq!(page.observed_container(), Some(MemoryContainer::List));
        assert_eq!(page.visibility(handle), Some(Visibility::Hidden));
    }
}
