//! Bounded in-process command cache.
//!
//! The cache is an accelerator in front of a [`Store`](crate::store::Store)
//! and never the only holder of a command: entries may vanish at any time
//! under capacity pressure. Every entry costs [`CacheSettings::ENTRY_COST`]
//! regardless of its size, so the configured byte budget is in practice an
//! entry-count limit.
//!
//! Writes through [`BoundedCache`] are visible to the next read on any
//! thread, but callers must still treat a miss right after an add as
//! normal and fall back to the store.

use crate::config::CacheSettings;
use crate::error::{BotioError, Result};
use crate::models::Command;
use mini_moka::sync::Cache as MokaCache;

/// A capacity-bounded command cache.
pub trait Cache: Send + Sync {
    /// Insert a command. Fails if its name or response is empty.
    fn add(&self, command: &Command) -> Result<()>;

    /// Look up a command, failing with [`BotioError::NotFound`] on a miss.
    fn get(&self, name: &str) -> Result<Command>;

    /// Whether `name` currently has an entry.
    fn contains(&self, name: &str) -> bool;

    /// Drop the entry for `name`. Removing an absent entry succeeds.
    fn remove(&self, name: &str) -> Result<()>;

    /// Drop every entry.
    fn clear(&self);
}

/// [`Cache`] backed by a `mini_moka` concurrent cache.
#[derive(Clone)]
pub struct BoundedCache {
    inner: MokaCache<String, String>,
    capacity: u64,
}

impl BoundedCache {
    /// Create a cache with a budget of `capacity` cost units.
    pub fn new(capacity: u64) -> Result<Self> {
        if capacity == 0 {
            return Err(BotioError::config("cache capacity must be greater than zero"));
        }

        let inner = MokaCache::builder()
            .weigher(|_name: &String, _response: &String| CacheSettings::ENTRY_COST)
            .max_capacity(capacity)
            .build();

        Ok(Self { inner, capacity })
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Approximate number of live entries.
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}

impl std::fmt::Debug for BoundedCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedCache")
            .field("capacity", &self.capacity)
            .field("entries", &self.inner.entry_count())
            .finish()
    }
}

impl Cache for BoundedCache {
    fn add(&self, command: &Command) -> Result<()> {
        command.validate()?;
        self.inner
            .insert(command.name.clone(), command.response.clone());
        Ok(())
    }

    fn get(&self, name: &str) -> Result<Command> {
        self.inner
            .get(&name.to_string())
            .map(|response| Command::new(name, response))
            .ok_or_else(|| BotioError::NotFound {
                name: name.to_string(),
            })
    }

    fn contains(&self, name: &str) -> bool {
        self.inner.contains_key(&name.to_string())
    }

    fn remove(&self, name: &str) -> Result<()> {
        self.inner.invalidate(&name.to_string());
        Ok(())
    }

    fn clear(&self) {
        self.inner.invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(BoundedCache::new(0).is_err());
        assert_eq!(BoundedCache::new(16).unwrap().capacity(), 16);
    }

    #[test]
    fn test_add_then_get() {
        let cache = BoundedCache::new(CacheSettings::DEFAULT_CAPACITY).unwrap();
        cache.add(&Command::new("start", "hi")).unwrap();

        // A miss is allowed; a hit must carry the added value.
        if let Ok(found) = cache.get("start") {
            assert_eq!(found, Command::new("start", "hi"));
        }
    }

    #[test]
    fn test_add_rejects_empty_fields() {
        let cache = BoundedCache::new(8).unwrap();
        assert_eq!(
            cache.add(&Command::new("", "hi")).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            cache.add(&Command::new("start", "")).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let cache = BoundedCache::new(8).unwrap();
        assert_eq!(cache.get("nope").unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_remove_and_clear() {
        let cache = BoundedCache::new(8).unwrap();
        cache.remove("never-added").unwrap();

        cache.add(&Command::new("start", "hi")).unwrap();
        cache.remove("start").unwrap();
        assert!(cache.get("start").unwrap_err().is_not_found());
        assert!(!cache.contains("start"));

        cache.add(&Command::new("help", "ask")).unwrap();
        cache.clear();
        assert!(cache.get("help").is_err());
    }
}
