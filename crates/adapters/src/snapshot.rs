//! Short-TTL cache for live performance snapshots, keyed by the
//! provider-native campaign id. Bounds polling pressure on the external
//! API: repeated reads within the TTL never reach the transport.

use dashmap::DashMap;
use pulse_core::campaign::LivePerformance;
use std::time::{Duration, Instant};

struct Entry {
    snapshot: LivePerformance,
    fetched_at: Instant,
}

pub struct SnapshotCache {
    store: DashMap<String, Entry>,
    ttl: Duration,
}

impl SnapshotCache {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            store: DashMap::new(),
            ttl: Duration::from_secs(ttl_secs),
        }
    }

    pub fn get(&self, provider_id: &str) -> Option<LivePerformance> {
        let entry = self.store.get(provider_id)?;
        if entry.fetched_at.elapsed() > self.ttl {
            drop(entry);
            self.store.remove(provider_id);
            return None;
        }
        metrics::counter!("adapter.snapshot.hit").increment(1);
        Some(entry.snapshot.clone())
    }

    pub fn put(&self, provider_id: String, snapshot: LivePerformance) {
        self.store.insert(
            provider_id,
            Entry {
                snapshot,
                fetched_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}
