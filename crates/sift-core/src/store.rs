//! Rule store adapter
//!
//! The settings store itself (key-value persistence with change
//! notifications) lives outside this crate. The engine only needs a one-shot
//! async `load` and a stream of change sets.

use crate::rules::RawSettings;

/// Keys touched by one settings write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    keys: Vec<String>,
}

impl ChangeSet {
    pub fn new(keys: Vec<String>) -> Self {
        Self { keys }
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Whether any changed key is one of `relevant`.
    pub fn touches<S: AsRef<str>>(&self, relevant: &[S]) -> bool {
        self.keys
            .iter()
            .any(|k| relevant.iter().any(|r| r.as_ref() == k))
    }
}

impl<S: Into<String>> FromIterator<S> for ChangeSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(Into::into).collect())
    }
}

impl From<&RawSettings> for ChangeSet {
    fn from(settings: &RawSettings) -> Self {
        settings.keys().cloned().collect()
    }
}

#[cfg(feature = "runtime")]
pub use runtime::*;

#[cfg(feature = "runtime")]
mod runtime {
    use std::future::Future;
    use std::sync::Arc;

    use parking_lot::Mutex;
    use tokio::sync::broadcast;

    use super::ChangeSet;
    use crate::error::FilterError;
    use crate::rules::{RawSettings, RuleSet};
    use crate::site::SiteProfile;

    /// Async settings source with change notifications.
    pub trait RuleStore {
        /// Fetch the requested keys. Missing keys are simply absent.
        fn load(&self, keys: &[String]) -> impl Future<Output = Result<RawSettings, FilterError>>;

        /// Subscribe to change sets. May carry keys of other sites.
        fn subscribe(&self) -> broadcast::Receiver<ChangeSet>;
    }

    impl<T: RuleStore> RuleStore for Arc<T> {
        fn load(&self, keys: &[String]) -> impl Future<Output = Result<RawSettings, FilterError>> {
            (**self).load(keys)
        }

        fn subscribe(&self) -> broadcast::Receiver<ChangeSet> {
            (**self).subscribe()
        }
    }

    /// Load the full rule set for `profile`, failing open to empty rules when
    /// the store is unavailable.
    pub async fn load_rules<S: RuleStore>(store: &S, profile: &SiteProfile) -> RuleSet {
        match store.load(&profile.settings_keys()).await {
            Ok(settings) => RuleSet::from_settings(&settings, profile),
            Err(e) => {
                log::warn!("{e}; filtering '{}' with empty rules", profile.id);
                RuleSet::empty(profile.mode)
            }
        }
    }

    const CHANGE_CAPACITY: usize = 64;

    /// In-process settings store.
    pub struct MemoryStore {
        data: Mutex<RawSettings>,
        changes: broadcast::Sender<ChangeSet>,
    }

    impl Default for MemoryStore {
        fn default() -> Self {
            Self::new(RawSettings::new())
        }
    }

    impl MemoryStore {
        pub fn new(settings: RawSettings) -> Self {
            let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
            Self {
                data: Mutex::new(settings),
                changes,
            }
        }

        /// Merge `updates` and notify subscribers with the written keys.
        pub fn set(&self, updates: RawSettings) {
            let change = ChangeSet::from(&updates);
            self.data.lock().extend(updates);
            // no subscribers is fine
            let _ = self.changes.send(change);
        }

        pub fn remove(&self, keys: &[&str]) {
            {
                let mut data = self.data.lock();
                for key in keys {
                    data.remove(*key);
                }
            }
            let _ = self.changes.send(keys.iter().copied().collect());
        }

        pub fn snapshot(&self) -> RawSettings {
            self.data.lock().clone()
        }
    }

    impl RuleStore for MemoryStore {
        async fn load(&self, keys: &[String]) -> Result<RawSettings, FilterError> {
            let data = self.data.lock();
            Ok(keys
                .iter()
                .filter_map(|k| data.get(k).map(|v| (k.clone(), v.clone())))
                .collect())
        }

        fn subscribe(&self) -> broadcast::Receiver<ChangeSet> {
            self.changes.subscribe()
        }
    }
}
