//! Change watcher
//!
//! Owns the structural-mutation observer on the card container. Acquiring the
//! container (which may not exist yet on a freshly loaded SPA page) is a
//! separate step with a bounded retry policy; binding always disconnects the
//! previous observer first so reloads never stack observers.

use std::rc::Rc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::FilterError;
use crate::site::MutationPolicy;

// =============================================================================
// Mutations
// =============================================================================

/// Summary of one batch of child-list mutations under the container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MutationBatch {
    pub added_nodes: usize,
    pub removed_nodes: usize,
}

impl MutationBatch {
    pub fn added(n: usize) -> Self {
        Self { added_nodes: n, removed_nodes: 0 }
    }

    pub fn removed(n: usize) -> Self {
        Self { added_nodes: 0, removed_nodes: n }
    }
}

impl MutationPolicy {
    /// Whether `batch` warrants a new filter pass.
    pub fn accepts(self, batch: &MutationBatch) -> bool {
        match self {
            Self::AnyChildList => batch.added_nodes > 0 || batch.removed_nodes > 0,
            Self::AddedNodesOnly => batch.added_nodes > 0,
        }
    }
}

// =============================================================================
// Retry Policy
// =============================================================================

/// Back-off schedule for locating the card container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub initial_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: u64,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: crate::config::DEFAULT_RETRY_DELAY_MS,
            multiplier: 1.5,
            max_delay_ms: 4_000,
            max_attempts: 20,
        }
    }
}

impl RetryPolicy {
    /// Fixed delay, no growth.
    pub fn fixed(delay_ms: u64, max_attempts: u32) -> Self {
        Self {
            initial_delay_ms: delay_ms,
            multiplier: 1.0,
            max_delay_ms: delay_ms,
            max_attempts,
        }
    }

    /// Delay to wait after failed attempt number `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(attempt.min(i32::MAX as u32) as i32);
        let ms = (self.initial_delay_ms as f64 * factor).min(self.max_delay_ms as f64);
        Duration::from_millis(ms as u64)
    }

    #[inline]
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

// =============================================================================
// Container Source
// =============================================================================

/// Page capability for locating and observing the card container.
pub trait ContainerSource {
    type Container;
    type Observer;

    /// The smallest stable ancestor of the card list, if present yet.
    fn locate(&self) -> Option<Self::Container>;

    /// Broader container to observe when `locate` never succeeds.
    fn fallback(&self) -> Option<Self::Container> {
        None
    }

    /// Start a subtree child-list observer on `container`.
    fn observe(&self, container: &Self::Container) -> Self::Observer;

    fn disconnect(&self, observer: Self::Observer);
}

impl<T: ContainerSource> ContainerSource for Rc<T> {
    type Container = T::Container;
    type Observer = T::Observer;

    fn locate(&self) -> Option<Self::Container> {
        (**self).locate()
    }

    fn fallback(&self) -> Option<Self::Container> {
        (**self).fallback()
    }

    fn observe(&self, container: &Self::Container) -> Self::Observer {
        (**self).observe(container)
    }

    fn disconnect(&self, observer: Self::Observer) {
        (**self).disconnect(observer)
    }
}

// =============================================================================
// Change Watcher
// =============================================================================

/// What the live observer is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Binding {
    #[default]
    Unbound,
    /// The card container itself.
    Target,
    /// A broader container, held only until the target appears.
    Fallback,
}

/// At most one live observer, plus the rescan policy for its batches.
pub struct ChangeWatcher<S: ContainerSource> {
    source: S,
    observer: Option<S::Observer>,
    binding: Binding,
    failed: u32,
    policy: MutationPolicy,
    retry: RetryPolicy,
}

impl<S: ContainerSource> ChangeWatcher<S> {
    pub fn new(source: S, policy: MutationPolicy, retry: RetryPolicy) -> Self {
        Self {
            source,
            observer: None,
            binding: Binding::Unbound,
            failed: 0,
            policy,
            retry,
        }
    }

    #[inline]
    pub fn source(&self) -> &S {
        &self.source
    }

    #[inline]
    pub fn binding(&self) -> Binding {
        self.binding
    }

    #[inline]
    pub fn is_bound(&self) -> bool {
        self.observer.is_some()
    }

    /// Bind now if the container exists, without waiting.
    pub fn try_bind(&mut self) -> Result<(), FilterError> {
        match self.source.locate() {
            Some(container) => {
                self.attach(&container);
                Ok(())
            }
            None => Err(FilterError::ObserverTargetMissing { attempts: 1 }),
        }
    }

    /// One non-blocking acquisition step. Returns the delay before the next
    /// step, or `None` once an observer is live.
    ///
    /// When the retry budget runs out the watcher moves to the source's
    /// fallback container, where `observe_batch` keeps looking for the
    /// target. Without a fallback it keeps retrying at the capped delay.
    pub fn poll_bind(&mut self) -> Option<Duration> {
        if self.binding == Binding::Target {
            return None;
        }
        if let Some(container) = self.source.locate() {
            if self.failed > 0 {
                log::debug!("card container found after {} attempts", self.failed + 1);
            }
            self.attach(&container);
            return None;
        }
        if self.binding == Binding::Fallback {
            return None;
        }

        let attempt = self.failed;
        self.failed = self.failed.saturating_add(1);
        if self.failed < self.retry.attempts() {
            return Some(self.retry.delay(attempt));
        }

        let missing = FilterError::ObserverTargetMissing { attempts: self.failed };
        match self.source.fallback() {
            Some(container) => {
                log::warn!("{missing}; observing fallback container");
                self.attach_to(&container, Binding::Fallback);
                None
            }
            None => {
                if self.failed == self.retry.attempts() {
                    log::warn!("{missing}; still retrying");
                }
                Some(self.retry.delay(attempt))
            }
        }
    }

    /// Wait for the container with the retry policy and bind to it, falling
    /// back to the source's broader container when it never shows up.
    #[cfg(feature = "runtime")]
    pub async fn bind(&mut self) -> Result<(), FilterError> {
        self.failed = 0;
        let attempts = self.retry.attempts();
        loop {
            match self.poll_bind() {
                None => return Ok(()),
                Some(_) if self.failed >= attempts => {
                    return Err(FilterError::ObserverTargetMissing { attempts })
                }
                Some(delay) => tokio::time::sleep(delay).await,
            }
        }
    }

    /// Replace any live observer with one on the card container.
    pub fn attach(&mut self, container: &S::Container) {
        self.attach_to(container, Binding::Target);
    }

    fn attach_to(&mut self, container: &S::Container, binding: Binding) {
        self.unbind();
        self.observer = Some(self.source.observe(container));
        self.binding = binding;
    }

    pub fn unbind(&mut self) {
        if let Some(observer) = self.observer.take() {
            self.source.disconnect(observer);
        }
        self.binding = Binding::Unbound;
        self.failed = 0;
    }

    /// Whether a batch from the live observer should trigger a pass.
    pub fn should_rescan(&self, batch: &MutationBatch) -> bool {
        self.is_bound() && self.policy.accepts(batch)
    }

    /// Handle a batch from the live observer. On the fallback container,
    /// added nodes may be the card container itself; move the observer there
    /// once it resolves.
    pub fn observe_batch(&mut self, batch: &MutationBatch) -> bool {
        if self.binding == Binding::Fallback && batch.added_nodes > 0 {
            if let Some(container) = self.source.locate() {
                log::debug!("card container appeared, leaving fallback");
                self.attach(&container);
                return true;
            }
        }
        self.should_rescan(batch)
    }
}

impl<S: ContainerSource> Drop for ChangeWatcher<S> {
    fn drop(&mut self) {
        self.unbind();
    }
}
