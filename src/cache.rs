//! Cache coordinator: key derivation, read-through population, and
//! write-triggered invalidation.
//!
//! The coordinator exclusively owns cache entry lifecycle. Backend failures
//! on the read path are treated as misses and never surfaced; failures on
//! the write path are logged and swallowed. Two concurrent misses for the
//! same key may both invoke the loader (no single-flight guarantee).

use crate::types::{Filter, SortKey, SortOrder};
use eyre::Result;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Prefix under which all list-query results are cached. Any task mutation
/// invalidates this whole prefix, since a single task's membership across
/// cached pages cannot be targeted precisely.
pub const LIST_PREFIX: &str = "tasks:";

/// Key for a single cached task.
pub fn task_key(id: i64) -> String {
    format!("task:{}", id)
}

/// Key for a cached dependency tree.
pub fn tree_key(id: i64) -> String {
    format!("task_dependencies:{}", id)
}

/// Key for a cached list page: hash of the normalized filter, sort, and
/// pagination parameters. Tags are sorted and deduplicated so equivalent
/// filters derive the same key.
pub fn list_key(filter: &Filter, sort: SortKey, order: SortOrder, offset: u64, limit: u64) -> String {
    let mut tags: Vec<&str> = filter.tags.iter().map(String::as_str).collect();
    tags.sort_unstable();
    tags.dedup();

    let normalized = format!(
        "status={:?}|priority={:?}|tags={}|search={:?}|user={:?}|sort={}:{}|offset={}|limit={}",
        filter.status,
        filter.priority,
        tags.join(","),
        filter.search,
        filter.user_id,
        sort.as_str(),
        order.as_str(),
        offset,
        limit,
    );

    let digest = Sha256::digest(normalized.as_bytes());
    let mut hex = String::with_capacity(16);
    for byte in &digest[..8] {
        hex.push_str(&format!("{:02x}", byte));
    }
    format!("{}{}", LIST_PREFIX, hex)
}

/// Backing store contract for cached entries.
pub trait CacheBackend: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;
    fn delete(&self, key: &str) -> Result<()>;
    fn delete_by_prefix(&self, prefix: &str) -> Result<()>;
}

/// In-process cache backend with per-entry TTL and lazy expiry.
pub struct MemoryCache {
    entries: Mutex<HashMap<String, CacheSlot>>,
}

struct CacheSlot {
    value: String,
    expires_at: Instant,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCache {
    fn locked(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, CacheSlot>>> {
        self.entries
            .lock()
            .map_err(|_| eyre::eyre!("cache mutex poisoned"))
    }
}

impl CacheBackend for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.locked()?;
        match entries.get(key) {
            Some(slot) if slot.expires_at > Instant::now() => Ok(Some(slot.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.locked()?.insert(
            key.to_string(),
            CacheSlot {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.locked()?.remove(key);
        Ok(())
    }

    fn delete_by_prefix(&self, prefix: &str) -> Result<()> {
        self.locked()?.retain(|key, _| !key.starts_with(prefix));
        Ok(())
    }
}

/// Coordinates cached reads and precise invalidation over a backend.
pub struct CacheCoordinator {
    backend: Box<dyn CacheBackend>,
}

impl CacheCoordinator {
    pub fn new(backend: Box<dyn CacheBackend>) -> Self {
        Self { backend }
    }

    /// Return the cached value for `key` if present and unexpired; otherwise
    /// invoke `loader`, store the result with `ttl`, and return it.
    ///
    /// A backend read failure or an undecodable entry falls through to the
    /// loader. A loader failure is returned without caching anything.
    pub fn read_through<T, F>(&self, key: &str, ttl: Duration, loader: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T>,
    {
        match self.backend.get(key) {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => return Ok(value),
                Err(e) => {
                    log::debug!("discarding undecodable cache entry '{}': {}", key, e);
                    let _ = self.backend.delete(key);
                }
            },
            Ok(None) => {}
            Err(e) => log::debug!("cache read failed for '{}', treating as miss: {}", key, e),
        }

        let value = loader()?;

        match serde_json::to_string(&value) {
            Ok(raw) => {
                if let Err(e) = self.backend.set_with_ttl(key, &raw, ttl) {
                    log::warn!("cache write failed for '{}': {}", key, e);
                }
            }
            Err(e) => log::warn!("failed to serialize cache value for '{}': {}", key, e),
        }

        Ok(value)
    }

    /// Unconditionally remove one key.
    pub fn invalidate(&self, key: &str) {
        if let Err(e) = self.backend.delete(key) {
            log::warn!("cache invalidation failed for '{}': {}", key, e);
        }
    }

    /// Unconditionally remove every key under a prefix.
    pub fn invalidate_by_prefix(&self, prefix: &str) {
        if let Err(e) = self.backend.delete_by_prefix(prefix) {
            log::warn!("cache prefix invalidation failed for '{}': {}", prefix, e);
        }
    }

    /// Clear everything derived from one task: its entry, its dependency
    /// tree, and all cached list pages.
    pub fn invalidate_task(&self, id: i64) {
        self.invalidate(&task_key(id));
        self.invalidate(&tree_key(id));
        self.invalidate_by_prefix(LIST_PREFIX);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Status;
    use std::cell::Cell;

    const TTL: Duration = Duration::from_secs(300);

    fn coordinator() -> CacheCoordinator {
        CacheCoordinator::new(Box::new(MemoryCache::new()))
    }

    /// Backend that always fails, for the miss-on-error path.
    struct BrokenCache;

    impl CacheBackend for BrokenCache {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(eyre::eyre!("backend down"))
        }
        fn set_with_ttl(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<()> {
            Err(eyre::eyre!("backend down"))
        }
        fn delete(&self, _key: &str) -> Result<()> {
            Err(eyre::eyre!("backend down"))
        }
        fn delete_by_prefix(&self, _prefix: &str) -> Result<()> {
            Err(eyre::eyre!("backend down"))
        }
    }

    #[test]
    fn test_key_derivation() {
        assert_eq!(task_key(7), "task:7");
        assert_eq!(tree_key(7), "task_dependencies:7");

        let key = list_key(&Filter::new(), SortKey::default(), SortOrder::default(), 0, 100);
        assert!(key.starts_with(LIST_PREFIX));
        assert_eq!(key.len(), LIST_PREFIX.len() + 16);
    }

    #[test]
    fn test_list_key_is_stable_and_tag_order_insensitive() {
        let a = Filter::new().tag("x").tag("y");
        let b = Filter::new().tag("y").tag("x").tag("y");
        let sort = SortKey::default();
        let order = SortOrder::default();

        assert_eq!(list_key(&a, sort, order, 0, 10), list_key(&b, sort, order, 0, 10));
    }

    #[test]
    fn test_list_key_varies_with_parameters() {
        let filter = Filter::new();
        let sort = SortKey::default();
        let order = SortOrder::default();
        let base = list_key(&filter, sort, order, 0, 10);

        assert_ne!(base, list_key(&filter, sort, order, 10, 10));
        assert_ne!(base, list_key(&filter, sort, order, 0, 20));
        assert_ne!(base, list_key(&filter, SortKey::Title, order, 0, 10));
        assert_ne!(base, list_key(&filter.clone().status(Status::Pending), sort, order, 0, 10));
    }

    #[test]
    fn test_memory_cache_ttl_expiry() {
        let cache = MemoryCache::new();
        cache.set_with_ttl("k", "v", Duration::from_millis(20)).unwrap();
        assert_eq!(cache.get("k").unwrap(), Some("v".to_string()));

        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(cache.get("k").unwrap(), None);
        // Expired entry was dropped, not just hidden
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_memory_cache_delete_by_prefix() {
        let cache = MemoryCache::new();
        cache.set_with_ttl("tasks:a", "1", TTL).unwrap();
        cache.set_with_ttl("tasks:b", "2", TTL).unwrap();
        cache.set_with_ttl("task:1", "3", TTL).unwrap();

        cache.delete_by_prefix("tasks:").unwrap();
        assert_eq!(cache.get("tasks:a").unwrap(), None);
        assert_eq!(cache.get("tasks:b").unwrap(), None);
        assert_eq!(cache.get("task:1").unwrap(), Some("3".to_string()));
    }

    #[test]
    fn test_read_through_populates_then_hits() {
        let coord = coordinator();
        let calls = Cell::new(0);

        let load = || {
            calls.set(calls.get() + 1);
            Ok(vec![1i64, 2, 3])
        };

        let first: Vec<i64> = coord.read_through("k", TTL, load).unwrap();
        assert_eq!(first, vec![1, 2, 3]);
        assert_eq!(calls.get(), 1);

        // Second read is served from cache and equals the computed value
        let second: Vec<i64> = coord
            .read_through("k", TTL, || {
                calls.set(calls.get() + 1);
                Ok(vec![])
            })
            .unwrap();
        assert_eq!(second, first);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_read_through_loader_error_not_cached() {
        let coord = coordinator();

        let result: Result<i64> = coord.read_through("k", TTL, || Err(eyre::eyre!("boom")));
        assert!(result.is_err());

        let value: i64 = coord.read_through("k", TTL, || Ok(7)).unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn test_read_through_undecodable_entry_is_a_miss() {
        let backend = MemoryCache::new();
        backend.set_with_ttl("k", "not json for i64", TTL).unwrap();
        let coord = CacheCoordinator::new(Box::new(backend));

        let value: i64 = coord.read_through("k", TTL, || Ok(5)).unwrap();
        assert_eq!(value, 5);
    }

    #[test]
    fn test_read_through_backend_failure_falls_to_loader() {
        let coord = CacheCoordinator::new(Box::new(BrokenCache));
        let value: i64 = coord.read_through("k", TTL, || Ok(9)).unwrap();
        assert_eq!(value, 9);
    }

    #[test]
    fn test_invalidate_task_clears_derived_keys() {
        let coord = coordinator();
        let _: i64 = coord.read_through(&task_key(1), TTL, || Ok(1)).unwrap();
        let _: i64 = coord.read_through(&tree_key(1), TTL, || Ok(2)).unwrap();
        let list = list_key(&Filter::new(), SortKey::default(), SortOrder::default(), 0, 10);
        let _: i64 = coord.read_through(&list, TTL, || Ok(3)).unwrap();

        coord.invalidate_task(1);

        // Every derived key reloads
        let v: i64 = coord.read_through(&task_key(1), TTL, || Ok(10)).unwrap();
        assert_eq!(v, 10);
        let v: i64 = coord.read_through(&tree_key(1), TTL, || Ok(20)).unwrap();
        assert_eq!(v, 20);
        let v: i64 = coord.read_through(&list, TTL, || Ok(30)).unwrap();
        assert_eq!(v, 30);
    }
}
