//! Impression history: who displayed what, when.
//!
//! The store persists per-campaign display timestamps; the manager layers the
//! session counters and trigger-fire counters that the frequency-cap
//! evaluation needs. Reads and writes are expected off the host's main
//! thread, but the only ordering requirement is read-after-write consistency
//! with the backing store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Append-only timestamp log keyed by campaign id.
///
/// Contract: the list returned by `read` is monotonically non-decreasing and
/// grows only through `write` during normal operation. Callers compute their
/// own time-window filters.
pub trait ImpressionStore: Send + Sync {
    fn read(&self, campaign_id: &str) -> Vec<i64>;
    fn write(&self, campaign_id: &str, timestamp: i64);
    fn clear(&self, campaign_id: &str);
}

/// Default store for tests and hosts without a persistence layer.
#[derive(Debug, Default)]
pub struct InMemoryImpressionStore {
    records: Mutex<HashMap<String, Vec<i64>>>,
}

impl InMemoryImpressionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ImpressionStore for InMemoryImpressionStore {
    fn read(&self, campaign_id: &str) -> Vec<i64> {
        lock(&self.records)
            .get(campaign_id)
            .cloned()
            .unwrap_or_default()
    }

    fn write(&self, campaign_id: &str, timestamp: i64) {
        lock(&self.records)
            .entry(campaign_id.to_string())
            .or_default()
            .push(timestamp);
    }

    fn clear(&self, campaign_id: &str) {
        lock(&self.records).remove(campaign_id);
    }
}

/// Session-aware view over an [`ImpressionStore`], plus the trigger-fire
/// counters consumed by the `OnEvery`/`OnExactly` limits.
pub struct ImpressionManager {
    store: Arc<dyn ImpressionStore>,
    session_impressions: Mutex<HashMap<String, Vec<i64>>>,
    trigger_fires: Mutex<HashMap<String, u64>>,
}

impl ImpressionManager {
    pub fn new(store: Arc<dyn ImpressionStore>) -> Self {
        Self {
            store,
            session_impressions: Mutex::new(HashMap::new()),
            trigger_fires: Mutex::new(HashMap::new()),
        }
    }

    /// Records a display of `campaign_id` right now, in both the session view
    /// and the persistent store.
    pub fn record_impression(&self, campaign_id: &str) {
        let timestamp = crate::now_ms();
        lock(&self.session_impressions)
            .entry(campaign_id.to_string())
            .or_default()
            .push(timestamp);
        self.store.write(campaign_id, timestamp);
    }

    pub fn per_session(&self, campaign_id: &str) -> usize {
        lock(&self.session_impressions)
            .get(campaign_id)
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn total(&self, campaign_id: &str) -> usize {
        self.store.read(campaign_id).len()
    }

    /// Impressions at or after `since` (epoch millis).
    pub fn impressions_since(&self, campaign_id: &str, since: i64) -> usize {
        self.store
            .read(campaign_id)
            .iter()
            .filter(|&&ts| ts >= since)
            .count()
    }

    /// Bumps the matching-trigger-fire counter and returns the new count.
    pub fn record_trigger_fire(&self, campaign_id: &str) -> u64 {
        let mut fires = lock(&self.trigger_fires);
        let count = fires.entry(campaign_id.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    pub fn trigger_fires(&self, campaign_id: &str) -> u64 {
        lock(&self.trigger_fires)
            .get(campaign_id)
            .copied()
            .unwrap_or(0)
    }

    /// Starts a fresh session: per-session counters reset, persistent history
    /// stays.
    pub fn start_session(&self) {
        lock(&self.session_impressions).clear();
    }

    /// Forgets everything about one campaign.
    pub fn clear(&self, campaign_id: &str) {
        self.store.clear(campaign_id);
        lock(&self.session_impressions).remove(campaign_id);
        lock(&self.trigger_fires).remove(campaign_id);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> ImpressionManager {
        ImpressionManager::new(Arc::new(InMemoryImpressionStore::new()))
    }

    #[test]
    fn store_appends_and_clears() {
        let store = InMemoryImpressionStore::new();
        store.write("c1", 100);
        store.write("c1", 200);
        store.write("c2", 300);
        assert_eq!(store.read("c1"), vec![100, 200]);
        store.clear("c1");
        assert!(store.read("c1").is_empty());
        assert_eq!(store.read("c2"), vec![300]);
    }

    #[test]
    fn session_counts_reset_but_history_stays() {
        let manager = manager();
        manager.record_impression("c1");
        manager.record_impression("c1");
        assert_eq!(manager.per_session("c1"), 2);
        assert_eq!(manager.total("c1"), 2);

        manager.start_session();
        assert_eq!(manager.per_session("c1"), 0);
        assert_eq!(manager.total("c1"), 2);
    }

    #[test]
    fn window_counting_filters_old_impressions() {
        let store = Arc::new(InMemoryImpressionStore::new());
        let now = crate::now_ms();
        store.write("c1", now - 120_000);
        store.write("c1", now - 10_000);
        store.write("c1", now);

        let manager = ImpressionManager::new(store);
        assert_eq!(manager.impressions_since("c1", now - 60_000), 2);
        assert_eq!(manager.impressions_since("c1", now - 300_000), 3);
    }

    #[test]
    fn trigger_fires_count_independently_of_impressions() {
        let manager = manager();
        assert_eq!(manager.trigger_fires("c1"), 0);
        assert_eq!(manager.record_trigger_fire("c1"), 1);
        assert_eq!(manager.record_trigger_fire("c1"), 2);
        assert_eq!(manager.total("c1"), 0);

        manager.clear("c1");
        assert_eq!(manager.trigger_fires("c1"), 0);
    }
}
