// src/clock.rs
//! Injected wall clock plus the absolute-TTL cache shared by the occupation
//! providers and the embedding service.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub type SharedClock = Arc<dyn Clock>;

pub fn system_clock() -> SharedClock {
    Arc::new(SystemClock)
}

/// Process-wide key → value store with absolute TTL.
/// Expiry is checked on lookup; there is no background sweep.
pub struct TtlCache<K, V> {
    ttl: ChronoDuration,
    clock: SharedClock,
    inner: Mutex<HashMap<K, (V, DateTime<Utc>)>>,
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    /// `ttl_secs` < 1 is treated as 1.
    pub fn new(ttl_secs: u64, clock: SharedClock) -> Self {
        let secs = i64::try_from(ttl_secs.max(1)).unwrap_or(i64::MAX / 1_000);
        Self {
            ttl: ChronoDuration::seconds(secs),
            clock,
            inner: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let mut map = match self.inner.lock() {
            Ok(g) => g,
            Err(poison) => poison.into_inner(),
        };
        match map.get(key) {
            Some((v, expires_at)) if *expires_at > now => Some(v.clone()),
            Some(_) => {
                map.remove(key);
                None
            }
            None => None,
        }
    }

    /// Insert with expiry fixed at `now + ttl` (a later `get` never extends it).
    pub fn insert(&self, key: K, value: V) {
        let expires_at = self.clock.now() + self.ttl;
        let mut map = match self.inner.lock() {
            Ok(g) => g,
            Err(poison) => poison.into_inner(),
        };
        map.insert(key, (value, expires_at));
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut m) = self.inner.lock() {
            m.clear();
        }
    }
}
