//! Coalesced hit counting.
//!
//! Redirects bump an in-memory counter per key; a background task writes
//! the accumulated counts with one [`RouteStore::add_hits`] call per
//! interval and once more on shutdown.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

use super::{RouteStore, StoreError};

struct PendingHits {
    target: String,
    count: u64,
}

/// Counts redirects in memory and persists them in batches.
///
/// Memory use is bounded by the number of distinct keys hit between two
/// flushes, not by request volume.
#[derive(Clone)]
pub struct HitRecorder {
    store: RouteStore,
    pending: Arc<DashMap<String, PendingHits>>,
}

impl HitRecorder {
    pub fn new(store: RouteStore) -> Self {
        Self {
            store,
            pending: Arc::new(DashMap::new()),
        }
    }

    /// Count one redirect. Never touches the store.
    pub fn record(&self, key: &str, target: &str) {
        if let Some(mut hits) = self.pending.get_mut(key) {
            hits.count += 1;
            return;
        }
        self.pending
            .entry(key.to_string())
            .or_insert_with(|| PendingHits {
                target: target.to_string(),
                count: 0,
            })
            .count += 1;
    }

    /// Keys with hits not yet written.
    pub fn pending_keys(&self) -> usize {
        self.pending.len()
    }

    /// Write every pending count in one batch and return how many hits
    /// were written. Blocking.
    ///
    /// Counts are advisory: if the write fails they are dropped.
    pub fn flush(&self) -> Result<u64, StoreError> {
        let keys: Vec<String> = self.pending.iter().map(|entry| entry.key().clone()).collect();
        let drained: Vec<(String, String, u64)> = keys
            .into_iter()
            .filter_map(|key| self.pending.remove(&key))
            .map(|(key, hits)| (key, hits.target, hits.count))
            .collect();
        if drained.is_empty() {
            return Ok(0);
        }

        let keys = drained.len();
        let total: u64 = drained.iter().map(|(_, _, count)| count).sum();
        match self.store.add_hits(drained) {
            Ok(report) => {
                tracing::debug!(keys = keys, hits = total, transactions = report.transactions, "Hit counts flushed");
                Ok(total)
            }
            Err(e) => {
                tracing::warn!(keys = keys, hits = total, error = %e, "Dropping hit counts after failed flush");
                Err(e)
            }
        }
    }

    /// Flush every `interval` until `shutdown` fires, then flush once more.
    pub async fn run(self, interval: Duration, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => self.flush_blocking().await,
                _ = shutdown.recv() => break,
            }
        }

        self.flush_blocking().await;
        tracing::debug!("Hit flusher stopped");
    }

    async fn flush_blocking(&self) {
        let recorder = self.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || recorder.flush()).await {
            tracing::warn!(error = %e, "Hit flush task failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Shutdown;
    use crate::store::{RouteRecord, StoreLocation};

    fn recorder() -> (HitRecorder, RouteStore) {
        let store = RouteStore::open(&StoreLocation::Memory).unwrap();
        (HitRecorder::new(store.clone()), store)
    }

    #[test]
    fn test_hits_coalesce_per_key() {
        let (hits, store) = recorder();
        store.put(&RouteRecord::new("a", "https://example.com/a")).unwrap();

        for _ in 0..3000 {
            hits.record("a", "https://example.com/a");
        }
        hits.record("b", "https://example.com/b");

        assert_eq!(hits.pending_keys(), 2);
        assert_eq!(store.get("a").unwrap().hit_count, 0);

        assert_eq!(hits.flush().unwrap(), 3001);
        assert_eq!(hits.pending_keys(), 0);
        assert_eq!(store.get("a").unwrap().hit_count, 3000);
        assert_eq!(store.get("b").unwrap().hit_count, 1);

        assert_eq!(hits.flush().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_run_flushes_on_shutdown() {
        let (hits, store) = recorder();
        let shutdown = Shutdown::new();
        let task = tokio::spawn(hits.clone().run(Duration::from_secs(3600), shutdown.subscribe()));

        for _ in 0..10 {
            hits.record("a", "https://example.com/a");
        }
        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(5), task).await.unwrap().unwrap();

        assert_eq!(store.get("a").unwrap().hit_count, 10);
        assert_eq!(hits.pending_keys(), 0);
    }

    #[tokio::test]
    async fn test_run_flushes_periodically() {
        let (hits, store) = recorder();
        let shutdown = Shutdown::new();
        let _task = tokio::spawn(hits.clone().run(Duration::from_millis(20), shutdown.subscribe()));

        hits.record("a", "https://example.com/a");

        let mut count = 0;
        for _ in 0..100 {
            count = store.get("a").map(|r| r.hit_count).unwrap_or(0);
            if count == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(count, 1);
    }
}
