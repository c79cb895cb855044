//! Atomic holder for the single active `Settings` snapshot.

use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwapOption;

use crate::settings::Settings;

/// Holds at most one `Settings` snapshot at a time, published atomically.
/// Readers on the request path call [`SettingsStore::get`] once and treat
/// the returned `Arc<Settings>` as immutable for the lifetime of the
/// request — no further synchronization is needed beyond the buckets'
/// own internal locking.
#[derive(Default)]
pub struct SettingsStore {
    current: ArcSwapOption<Settings>,
}

impl SettingsStore {
    pub fn new() -> Self {
        SettingsStore {
            current: ArcSwapOption::from(None),
        }
    }

    /// Atomically replaces the active snapshot.
    pub fn install(&self, settings: Settings) {
        self.current.store(Some(Arc::new(settings)));
    }

    /// Returns the current snapshot, or `None` if none is installed or it
    /// has been removed/expired.
    pub fn get(&self) -> Option<Arc<Settings>> {
        self.current.load_full()
    }

    /// Clears the snapshot. Behaviorally equivalent to "no settings".
    pub fn remove(&self) {
        self.current.store(None);
    }

    /// If the active snapshot is older than its TTL, clears it.
    pub fn check_expiry(&self) {
        let expired = self
            .current
            .load()
            .as_deref()
            .map(|s| s.is_expired(Instant::now()))
            .unwrap_or(false);
        if expired {
            self.remove();
        }
    }

    pub fn has_default(&self) -> bool {
        self.current.load().is_some()
    }
}
