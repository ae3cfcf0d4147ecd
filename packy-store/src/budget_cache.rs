//! Latest budget snapshot with freshness tracking.

use std::time::Duration;

use packy_core::{BudgetSnapshot, SharedClock};
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

/// Default freshness window.
pub const DEFAULT_FRESHNESS: Duration = Duration::from_secs(5 * 60);

const EVENT_CAPACITY: usize = 16;

/// Cached snapshot plus bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct CacheEntry {
    /// Latest snapshot, zeroed until the first update.
    snapshot: BudgetSnapshot,
    /// Whether any update has happened.
    loaded: bool,
    /// Epoch milliseconds of the last update. Zero means never or invalidated.
    last_fetch_ms: i64,
}

/// Holds the latest snapshot and tells subscribers when it changes.
pub struct BudgetCache {
    entry: RwLock<CacheEntry>,
    freshness: Duration,
    clock: SharedClock,
    events: broadcast::Sender<BudgetSnapshot>,
}

impl BudgetCache {
    /// Creates an empty cache with the default freshness window.
    pub fn new(clock: SharedClock) -> Self {
        Self::with_freshness(clock, DEFAULT_FRESHNESS)
    }

    /// Creates an empty cache with a custom freshness window.
    pub fn with_freshness(clock: SharedClock, freshness: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            entry: RwLock::new(CacheEntry::default()),
            freshness,
            clock,
            events,
        }
    }

    /// Latest snapshot. Zeroed if nothing has been loaded.
    pub async fn current_data(&self) -> BudgetSnapshot {
        self.entry.read().await.snapshot
    }

    /// Whether any update has happened.
    pub async fn is_data_loaded(&self) -> bool {
        self.entry.read().await.loaded
    }

    /// True while the last update is younger than the freshness window.
    pub async fn is_cache_valid(&self) -> bool {
        let last = self.entry.read().await.last_fetch_ms;
        if last == 0 {
            return false;
        }
        let window = i64::try_from(self.freshness.as_millis()).unwrap_or(i64::MAX);
        self.clock.now_millis() - last < window
    }

    /// Time since the last update, if there was one and it was not
    /// invalidated.
    pub async fn cache_age(&self) -> Option<Duration> {
        let last = self.entry.read().await.last_fetch_ms;
        if last == 0 {
            return None;
        }
        let age = self.clock.now_millis().saturating_sub(last).max(0);
        Some(Duration::from_millis(u64::try_from(age).unwrap_or(0)))
    }

    /// Marks the cache stale. The snapshot and loaded flag are kept.
    pub async fn invalidate_cache(&self) {
        self.entry.write().await.last_fetch_ms = 0;
        debug!("Budget cache invalidated");
    }

    /// Replaces the snapshot, marks it loaded and fresh, and notifies
    /// subscribers.
    pub async fn update_data(&self, snapshot: BudgetSnapshot) {
        {
            let mut entry = self.entry.write().await;
            *entry = CacheEntry {
                snapshot,
                loaded: true,
                last_fetch_ms: self.clock.now_millis(),
            };
        }
        debug!(severity = %snapshot.severity(), "Budget cache updated");
        let _ = self.events.send(snapshot);
    }

    /// Subscribes to snapshot updates.
    pub fn subscribe(&self) -> broadcast::Receiver<BudgetSnapshot> {
        self.events.subscribe()
    }
}

impl std::fmt::Debug for BudgetCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BudgetCache")
            .field("freshness", &self.freshness)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration as ChronoDuration};
    use packy_core::{BudgetPeriod, ManualClock};
    use std::sync::Arc;

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        ))
    }

    fn sample() -> BudgetSnapshot {
        BudgetSnapshot::new(BudgetPeriod::new(25.0, 100.0), BudgetPeriod::new(10.0, 0.0), true)
    }

    #[tokio::test]
    async fn test_empty_cache() {
        let cache = BudgetCache::new(clock());
        assert!(!cache.is_data_loaded().await);
        assert!(!cache.is_cache_valid().await);
        assert_eq!(cache.cache_age().await, None);
        assert_eq!(cache.current_data().await, BudgetSnapshot::default());
    }

    #[tokio::test]
    async fn test_update_then_invalidate() {
        let cache = BudgetCache::new(clock());

        cache.update_data(sample()).await;
        assert!(cache.is_cache_valid().await);
        assert!(cache.is_data_loaded().await);

        cache.invalidate_cache().await;
        assert!(!cache.is_cache_valid().await);
        // Invalidation only resets the timestamp.
        assert!(cache.is_data_loaded().await);
        assert_eq!(cache.current_data().await, sample());

        cache.update_data(sample()).await;
        assert!(cache.is_cache_valid().await);
    }

    #[tokio::test]
    async fn test_freshness_window_boundary() {
        let clock = clock();
        let cache = BudgetCache::new(clock.clone());
        cache.update_data(sample()).await;

        clock.advance(ChronoDuration::milliseconds(299_999));
        assert!(cache.is_cache_valid().await);
        assert_eq!(cache.cache_age().await, Some(Duration::from_millis(299_999)));

        clock.advance(ChronoDuration::milliseconds(1));
        assert!(!cache.is_cache_valid().await);
    }

    #[tokio::test]
    async fn test_update_notifies_with_snapshot() {
        let cache = BudgetCache::new(clock());
        let mut rx = cache.subscribe();

        cache.update_data(sample()).await;
        assert_eq!(rx.recv().await.unwrap(), sample());
    }

    #[tokio::test]
    async fn test_custom_freshness() {
        let clock = clock();
        let cache = BudgetCache::with_freshness(clock.clone(), Duration::from_secs(10));
        cache.update_data(sample()).await;

        clock.advance(ChronoDuration::seconds(10));
        assert!(!cache.is_cache_valid().await);
    }
}
