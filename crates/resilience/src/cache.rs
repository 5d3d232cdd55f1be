use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};

#[derive(Debug, Clone)]
struct Entry<V> {
    data: V,
    inserted_at: Instant,
    ttl: Duration,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.inserted_at) >= self.ttl
    }
}

/// A short-lived result cache.
///
/// Reads never return an expired entry. Expired entries are physically
/// removed by [`sweep`](TtlCache::sweep), normally driven by
/// [`spawn_sweeper`]. Writes are last-writer-wins per key.
#[derive(Debug)]
pub struct TtlCache<K, V> {
    entries: RwLock<HashMap<K, Entry<V>>>,
    default_ttl: Duration,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            default_ttl,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// `None` on a miss or when the entry has outlived its TTL.
    pub async fn get(&self, key: &K) -> Option<V> {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;
        if entry.is_expired(Instant::now()) {
            None
        } else {
            Some(entry.data.clone())
        }
    }

    pub async fn set(&self, key: K, data: V) {
        self.set_with_ttl(key, data, self.default_ttl).await;
    }

    pub async fn set_with_ttl(&self, key: K, data: V, ttl: Duration) {
        self.entries.write().await.insert(
            key,
            Entry {
                data,
                inserted_at: Instant::now(),
                ttl,
            },
        );
    }

    pub async fn remove(&self, key: &K) -> Option<V> {
        self.entries.write().await.remove(key).map(|e| e.data)
    }

    /// Entries currently held, expired or not.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Removes every expired entry and returns the evicted keys.
    pub async fn sweep(&self) -> Vec<K> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let expired: Vec<K> = entries
            .iter()
            .filter(|(_, e)| e.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            entries.remove(key);
        }
        expired
    }
}

/// Sweeps `cache` every `every`, forwarding evicted keys to `evicted` when given.
///
/// The task ends when the returned handle is aborted, or once the receiving
/// side of `evicted` has been dropped.
pub fn spawn_sweeper<K, V>(
    cache: Arc<TtlCache<K, V>>,
    every: Duration,
    evicted: Option<mpsc::UnboundedSender<K>>,
) -> JoinHandle<()>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let mut timer = interval(every);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        timer.tick().await;

        loop {
            timer.tick().await;
            let keys = cache.sweep().await;
            if keys.is_empty() {
                continue;
            }
            tracing::debug!(evicted = keys.len(), "Cache sweep evicted expired entries");

            if let Some(tx) = &evicted {
                for key in keys {
                    if tx.send(key).is_err() {
                        tracing::debug!("Eviction listener dropped; stopping cache sweeper");
                        return;
                    }
                }
            }
        }
    })
}

/// The most recent successfully computed value per key.
///
/// Only ever written after a successful computation, and never expires; it
/// is the last resort when a computation fails and the cache has nothing.
#[derive(Debug, Default)]
pub struct LastGoodStore<K, V> {
    values: RwLock<HashMap<K, V>>,
}

impl<K, V> LastGoodStore<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    pub fn new() -> Self {
        Self {
            values: RwLock::new(HashMap::new()),
        }
    }

    pub async fn record_success(&self, key: K, value: V) {
        self.values.write().await.insert(key, value);
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        self.values.read().await.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.values.read().await.len()
    }
}
