use anyhow::{Result, anyhow};
use lru::LruCache;
use rand::RngExt;
use serde::Deserialize;
use serde::{Serialize, de::DeserializeOwned};
use std::fmt::Debug;
use std::num::NonZeroUsize;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Serialize, Deserialize)]
struct StoredEntry<T> {
    value: T,
    expires_at: u64, // Unix timestamp (milliseconds)
}

/// Bounded, short-lived store for provider responses.
///
/// Injected into the resolver and the weather lookup; never global.
pub struct ResponseCache {
    store: Mutex<LruCache<String, Vec<u8>>>,
    ttl: Duration,
}

fn now_millis() -> Result<u64> {
    let millis = SystemTime::now().duration_since(UNIX_EPOCH)?.as_millis();
    Ok(u64::try_from(millis)?)
}

impl ResponseCache {
    pub fn new(capacity: usize, ttl: Duration) -> Result<Self> {
        let capacity =
            NonZeroUsize::new(capacity).ok_or(anyhow!("Cache capacity must be greater than 0"))?;
        Ok(ResponseCache {
            store: Mutex::new(LruCache::new(capacity)),
            ttl,
        })
    }

    /// Stores a serializable value using the default TTL with ±10% jitter.
    pub fn put<T: Serialize + Debug>(&self, key: &str, value: T) -> Result<()> {
        let jitter: f64 = rand::rng().random_range(0.9..1.1);
        self.put_with_ttl(key, value, self.ttl.mul_f64(jitter))
    }

    /// Stores a serializable value with a time-to-live (TTL).
    #[tracing::instrument(name = "put_cache", level = "debug", skip(self))]
    pub fn put_with_ttl<T: Serialize + Debug>(&self, key: &str, value: T, ttl: Duration) -> Result<()> {
        let ttl_millis = u64::try_from(ttl.as_millis())?;
        let expires_at = now_millis()?
            .checked_add(ttl_millis)
            .ok_or(anyhow!("TTL overflow"))?;
        let entry = StoredEntry { value, expires_at };
        let bytes = postcard::to_stdvec(&entry)?;

        self.store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .put(key.to_string(), bytes);
        Ok(())
    }

    /// Retrieves a value if it exists and has not expired.
    /// Returns `None` for cache misses or expired entries.
    #[tracing::instrument(name = "query_cache", level = "debug", skip(self))]
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let maybe_bytes = self
            .store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned();

        if let Some(bytes) = maybe_bytes {
            let entry: StoredEntry<T> = postcard::from_bytes(&bytes)?;

            if now_millis()? < entry.expires_at {
                tracing::debug!("Key found and still fresh");
                Ok(Some(entry.value))
            } else {
                tracing::debug!("Key found but expired");
                self.remove(key);
                Ok(None)
            }
        } else {
            tracing::debug!("Key not found");
            Ok(None)
        }
    }

    /// Manually removes a key from the cache.
    pub fn remove(&self, key: &str) {
        self.store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop(key);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.store.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
