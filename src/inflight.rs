//! In-flight request de-duplication
//!
//! Identical lookups started within a short window share a single underlying
//! future instead of hitting the providers twice.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};

struct Entry<V> {
    started: Instant,
    future: Shared<BoxFuture<'static, V>>,
}

pub struct InFlight<K, V> {
    window: Duration,
    entries: Mutex<HashMap<K, Entry<V>>>,
}

impl<K, V> InFlight<K, V>
where
    K: Eq + Hash,
    V: Clone + Send + Sync + 'static,
{
    /// A zero window disables sharing
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Join a running request for `key`, or start one with `make`
    pub async fn run<F, M>(&self, key: K, make: M) -> V
    where
        M: FnOnce() -> F,
        F: Future<Output = V> + Send + 'static,
    {
        if self.window.is_zero() {
            return make().await;
        }

        let shared = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            let now = Instant::now();
            entries.retain(|_, entry| now.duration_since(entry.started) < self.window);

            if let Some(entry) = entries.get(&key) {
                tracing::debug!("Joining in-flight request");
                entry.future.clone()
            } else {
                let future = make().boxed().shared();
                entries.insert(
                    key,
                    Entry {
                        started: now,
                        future: future.clone(),
                    },
                );
                future
            }
        };

        shared.await
    }

    /// Number of tracked requests, including finished ones still inside the window
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
