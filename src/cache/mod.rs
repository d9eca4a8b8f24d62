use lru::LruCache;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use crate::archive::Member;

/// In-memory cache of parsed member lists, keyed by archive identity.
///
/// Listings expire after a short TTL so a replaced upstream archive is
/// picked up quickly; the LRU bound keeps memory flat under many distinct
/// URLs. Nothing survives a process restart.
pub struct DirectoryCache {
    cache: Arc<RwLock<LruCache<String, CachedDirectory>>>,
    ttl: Duration,
}

struct CachedDirectory {
    members: Arc<Vec<Member>>,
    fetched_at: Instant,
}

impl DirectoryCache {
    /// Create a new cache with a maximum number of listings and a TTL
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let cache =
            LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(64).unwrap()));
        DirectoryCache {
            cache: Arc::new(RwLock::new(cache)),
            ttl,
        }
    }

    /// Cache key for an archive. The auth hints are folded in as a hash so
    /// callers with different cookies never see each other's listings.
    pub fn key(url: &str, cookie: Option<&str>, impersonate_ua: bool) -> String {
        let mut hasher = DefaultHasher::new();
        cookie.unwrap_or("").hash(&mut hasher);
        impersonate_ua.hash(&mut hasher);
        format!("{url}#{:016x}", hasher.finish())
    }

    /// Get a member list from the cache, dropping it if it has expired
    pub fn get(&self, key: &str) -> Option<Arc<Vec<Member>>> {
        let mut cache = self.cache.write().ok()?;
        match cache.get(key) {
            Some(entry) if entry.fetched_at.elapsed() < self.ttl => {
                Some(Arc::clone(&entry.members))
            }
            Some(_) => {
                cache.pop(key);
                None
            }
            None => None,
        }
    }

    /// Put a member list into the cache
    pub fn put(&self, key: String, members: Arc<Vec<Member>>) {
        if let Ok(mut cache) = self.cache.write() {
            cache.put(
                key,
                CachedDirectory {
                    members,
                    fetched_at: Instant::now(),
                },
            );
        }
    }

    pub fn len(&self) -> usize {
        self.cache.read().ok().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Clone for DirectoryCache {
    fn clone(&self) -> Self {
        DirectoryCache {
            cache: Arc::clone(&self.cache),
            ttl: self.ttl,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn members(n: usize) -> Arc<Vec<Member>> {
        Arc::new(
            (0..n)
                .map(|i| Member {
                    filename: format!("file{i}.txt"),
                    name_raw: format!("file{i}.txt").into_bytes(),
                    method: 0,
                    gp_flag: 0,
                    mod_time: 0,
                    mod_date: 0,
                    crc32: 0,
                    compressed_size: 0,
                    uncompressed_size: 0,
                    local_header_offset: 0,
                })
                .collect(),
        )
    }

    #[test]
    fn stores_and_returns_listings() {
        let cache = DirectoryCache::new(4, Duration::from_secs(60));
        let key = DirectoryCache::key("http://example.com/a.zip", None, true);

        assert!(cache.get(&key).is_none());
        cache.put(key.clone(), members(2));

        let hit = cache.get(&key).expect("cached listing");
        assert_eq!(hit.len(), 2);
    }

    #[test]
    fn expired_listings_are_dropped() {
        let cache = DirectoryCache::new(4, Duration::ZERO);
        let key = DirectoryCache::key("http://example.com/a.zip", None, true);

        cache.put(key.clone(), members(1));
        assert!(cache.get(&key).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn capacity_bound_evicts_oldest() {
        let cache = DirectoryCache::new(1, Duration::from_secs(60));

        cache.put("first".to_string(), members(1));
        cache.put("second".to_string(), members(1));

        assert!(cache.get("first").is_none());
        assert!(cache.get("second").is_some());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn auth_hints_separate_keys() {
        let url = "http://example.com/a.zip";
        let anonymous = DirectoryCache::key(url, None, true);
        let with_cookie = DirectoryCache::key(url, Some("session=abc"), true);
        let plain_ua = DirectoryCache::key(url, None, false);

        assert_ne!(anonymous, with_cookie);
        assert_ne!(anonymous, plain_ua);
    }
}
