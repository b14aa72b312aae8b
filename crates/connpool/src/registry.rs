//! Registry of named pools.
//!
//! Pools are shared by key: the first caller to ask for a key builds the
//! pool, everybody after gets the same instance.

use dashmap::DashMap;

use crate::handle::Factory;
use crate::pool::{Config, Pool};

/// Keyed collection of pools with construction on first use.
///
/// There is no process-wide instance; whoever owns pool lifecycles holds
/// the registry.
pub struct Registry<F: Factory> {
    pools: DashMap<String, Pool<F>>,
}

impl<F: Factory> Default for Registry<F> {
    fn default() -> Self {
        Self {
            pools: DashMap::new(),
        }
    }
}

impl<F: Factory> Registry<F> {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the pool registered under `key`, building it from `config` if
    /// there is none yet.
    ///
    /// `config` is ignored when the pool already exists. Concurrent first
    /// calls for the same key construct exactly one pool.
    pub fn get_or_create(&self, key: &str, config: Config<F>) -> Pool<F> {
        if let Some(pool) = self.pools.get(key) {
            return pool.value().clone();
        }
        self.pools
            .entry(key.to_string())
            .or_insert_with(|| {
                tracing::debug!(pool_id = key, "Registered pool");
                Pool::new(key, config)
            })
            .value()
            .clone()
    }

    /// Look up an existing pool.
    pub fn get(&self, key: &str) -> Option<Pool<F>> {
        self.pools.get(key).map(|entry| entry.value().clone())
    }

    /// Unregister a pool without closing it.
    pub fn remove(&self, key: &str) -> Option<Pool<F>> {
        self.pools.remove(key).map(|(_, pool)| pool)
    }

    /// Keys of all registered pools.
    pub fn keys(&self) -> Vec<String> {
        self.pools.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Number of registered pools.
    pub fn len(&self) -> usize {
        self.pools.len()
    }

    /// `true` when no pool is registered.
    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    /// Close every registered pool and clear the registry.
    pub async fn close_all(&self) {
        // Collect first so no shard lock is held across an await.
        let pools: Vec<Pool<F>> = self
            .pools
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        self.pools.clear();

        for pool in pools {
            pool.close().await;
        }
    }
}

impl<F: Factory> std::fmt::Debug for Registry<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("pool_count", &self.pools.len())
            .finish()
    }
}
