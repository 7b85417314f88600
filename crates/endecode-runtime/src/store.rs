//! Key-value boundary for job and lock records.
//!
//! # Design
//! - Narrow string-keyed interface so an external store can replace the
//!   in-memory map without touching the registry.
//! - `MemoryStore` keeps everything in process memory: job and lock state is
//!   lost on restart.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::error::StoreResult;

/// String-keyed store with per-entry expiry.
pub trait KeyValueStore: Send + Sync {
    /// Value for `key`, unless missing or expired.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unavailable.
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Write `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unavailable.
    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()>;

    /// Write `value` only when `key` is free.
    ///
    /// Returns `None` when the write happened, or the current value otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unavailable.
    fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> StoreResult<Option<String>>;

    /// Remove `key` if it currently holds `expected`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unavailable.
    fn delete_if_equals(&self, key: &str, expected: &str) -> StoreResult<bool>;

    /// Live keys starting with `prefix`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unavailable.
    fn keys_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>>;
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: &str, ttl: Option<Duration>) -> Self {
        Self {
            value: value.to_string(),
            expires_at: ttl.and_then(|ttl| Instant::now().checked_add(ttl)),
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|deadline| deadline > now)
    }
}

/// Process-local store guarded by a single mutex.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        entries.retain(|_, entry| entry.is_live(now));
        entries
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.lock().get(key).map(|entry| entry.value.clone()))
    }

    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()> {
        let _ = self.lock().insert(key.to_string(), Entry::new(value, ttl));
        Ok(())
    }

    fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> StoreResult<Option<String>> {
        let mut entries = self.lock();
        if let Some(existing) = entries.get(key) {
            return Ok(Some(existing.value.clone()));
        }
        let _ = entries.insert(key.to_string(), Entry::new(value, ttl));
        Ok(None)
    }

    fn delete_if_equals(&self, key: &str, expected: &str) -> StoreResult<bool> {
        let mut entries = self.lock();
        if entries.get(key).is_some_and(|entry| entry.value == expected) {
            let _ = entries.remove(key);
            return Ok(true);
        }
        Ok(false)
    }

    fn keys_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        Ok(self
            .lock()
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_if_absent_reports_existing_owner() -> StoreResult<()> {
        let store = MemoryStore::new();
        assert_eq!(store.set_if_absent("lock:a", "one", None)?, None);
        assert_eq!(
            store.set_if_absent("lock:a", "two", None)?,
            Some("one".to_string())
        );
        assert_eq!(store.get("lock:a")?, Some("one".to_string()));
        Ok(())
    }

    #[test]
    fn delete_if_equals_ignores_other_owners() -> StoreResult<()> {
        let store = MemoryStore::new();
        store.set("lock:a", "one", None)?;
        assert!(!store.delete_if_equals("lock:a", "two")?);
        assert!(store.delete_if_equals("lock:a", "one")?);
        assert_eq!(store.get("lock:a")?, None);
        assert!(!store.delete_if_equals("lock:a", "one")?);
        Ok(())
    }

    #[test]
    fn expired_entries_disappear() -> StoreResult<()> {
        let store = MemoryStore::new();
        store.set("job:x", "{}", Some(Duration::ZERO))?;
        store.set("job:y", "{}", None)?;
        assert_eq!(store.get("job:x")?, None);
        assert_eq!(store.keys_with_prefix("job:")?, vec!["job:y".to_string()]);
        assert_eq!(store.set_if_absent("job:x", "new", None)?, None);
        Ok(())
    }
}
