//! In-process TTL cache backed by DashMap for lock-free concurrent access.
//! Keeps a secondary index from campaign id to live keys so invalidation
//! never scans the key space.

use dashmap::DashMap;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use uuid::Uuid;

struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
}

/// TTL cache whose entries all belong to some campaign. Expired entries are
/// dropped on read; `evict_expired` handles the rest from a background task.
pub struct TtlCache<V: Clone> {
    store: DashMap<String, CacheEntry<V>>,
    index: DashMap<Uuid, HashSet<String>>,
    ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            store: DashMap::new(),
            index: DashMap::new(),
            ttl: Duration::from_secs(ttl_secs),
        }
    }

    /// Get a value, returns None if expired or missing.
    pub fn get(&self, key: &str) -> Option<V> {
        let entry = self.store.get(key)?;
        if entry.inserted_at.elapsed() > self.ttl {
            drop(entry);
            self.store.remove(key);
            return None;
        }
        Some(entry.value.clone())
    }

    /// Insert a value and index it under its owning campaign.
    pub fn put(&self, key: String, campaign_id: Uuid, value: V) {
        self.index
            .entry(campaign_id)
            .or_default()
            .insert(key.clone());
        self.store.insert(
            key,
            CacheEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Drop a single entry. The index entry is left to the next sweep.
    pub fn remove(&self, key: &str) {
        self.store.remove(key);
    }

    /// Drop every entry indexed under the campaign. Returns the number of
    /// entries removed.
    pub fn invalidate_campaign(&self, campaign_id: &Uuid) -> usize {
        let Some((_, keys)) = self.index.remove(campaign_id) else {
            return 0;
        };
        let mut removed = 0;
        for key in keys {
            if self.store.remove(&key).is_some() {
                removed += 1;
            }
        }
        removed
    }

    /// Remove expired entries and prune them from the index. Call this
    /// periodically from a background task.
    pub fn evict_expired(&self) -> usize {
        let before = self.store.len();
        self.store
            .retain(|_, entry| entry.inserted_at.elapsed() <= self.ttl);
        self.index.retain(|_, keys| {
            keys.retain(|key| self.store.contains_key(key));
            !keys.is_empty()
        });
        before - self.store.len()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}
