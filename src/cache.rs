use crate::{Error, Result};
use parking_lot::RwLock;
use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

/// The `CacheKit` stores key/value pairs behind a single reader-writer lock.
///
/// Key/value pairs are stored in a `HashMap` in memory and not persisted to disk.
/// Reads take the lock in shared mode, writes take it exclusively, and every
/// operation releases it before returning. Values handed out are clones, so
/// nothing stored inside the cache is ever borrowed by a caller.
///
/// Share it between threads with an `Arc`.
///
/// Example:
///
/// ```rust
/// # use cachekit::CacheKit;
/// let cache = CacheKit::new();
/// cache.set("key".to_owned(), "value".to_owned());
/// let val = cache.get("key");
/// assert_eq!(val, Some("value".to_owned()));
/// assert!(cache.update("missing", "value".to_owned()).is_err());
/// ```
pub struct CacheKit<K, V> {
    data: RwLock<HashMap<K, V>>,
}

impl<K, V> CacheKit<K, V>
where
    K: Eq + Hash,
{
    /// Creates an empty `CacheKit`.
    pub fn new() -> CacheKit<K, V> {
        CacheKit {
            data: RwLock::new(HashMap::new()),
        }
    }

    /// Creates an empty `CacheKit` with room for `capacity` entries.
    ///
    /// The capacity only pre-sizes the map; it never limits insertion.
    pub fn with_capacity(capacity: usize) -> CacheKit<K, V> {
        CacheKit {
            data: RwLock::new(HashMap::with_capacity(capacity)),
        }
    }

    /// Gets a copy of the value stored for `key`.
    ///
    /// Returns `None` if the given key does not exist.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        self.data.read().get(key).cloned()
    }

    /// Gets a copy of the value stored for `key` together with a presence flag.
    ///
    /// An absent key yields `V::default()` and `false`.
    pub fn get_or_default<Q>(&self, key: &Q) -> (V, bool)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone + Default,
    {
        match self.get(key) {
            Some(value) => (value, true),
            None => (V::default(), false),
        }
    }

    /// Sets the value of `key`.
    ///
    /// If the key already exists, the previous value will be overwritten.
    pub fn set(&self, key: K, value: V) {
        self.data.write().insert(key, value);
    }

    /// Overwrites the value of an existing `key`.
    ///
    /// Unlike [`set`](CacheKit::set) this never creates an entry: an absent key
    /// returns [`Error::KeyNotFound`] and leaves the cache unchanged.
    pub fn update<Q>(&self, key: &Q, value: V) -> Result<()>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        match self.data.write().get_mut(key) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(Error::KeyNotFound),
        }
    }

    /// Removes `key` and its value. Does nothing if the key is absent.
    pub fn delete<Q>(&self, key: &Q)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.data.write().remove(key);
    }

    /// Returns whether `key` is present.
    pub fn has<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.data.read().contains_key(key)
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Returns `true` if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Removes every entry.
    pub fn clear(&self) {
        // Swap in a fresh map; the old entries are dropped after the guard.
        let old = std::mem::take(&mut *self.data.write());
        drop(old);
    }

    /// Returns a snapshot of all keys, in no particular order.
    ///
    /// Separate calls to `keys` and [`values`](CacheKit::values) are not taken
    /// atomically and do not line up element-wise. Use
    /// [`items`](CacheKit::items) for a consistent view of both.
    pub fn keys(&self) -> Vec<K>
    where
        K: Clone,
    {
        self.data.read().keys().cloned().collect()
    }

    /// Returns a snapshot of all values, in no particular order.
    pub fn values(&self) -> Vec<V>
    where
        V: Clone,
    {
        self.data.read().values().cloned().collect()
    }

    /// Returns a copy of every key/value pair, taken under a single lock hold.
    pub fn items(&self) -> HashMap<K, V>
    where
        K: Clone,
        V: Clone,
    {
        self.data.read().clone()
    }
}

impl<K, V> Default for CacheKit<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Clone for CacheKit<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn clone(&self) -> Self {
        CacheKit::from(self.items())
    }
}

impl<K, V> fmt::Debug for CacheKit<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug,
    V: Clone + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let items = self.items();
        f.debug_struct("CacheKit").field("data", &items).finish()
    }
}

impl<K, V> From<HashMap<K, V>> for CacheKit<K, V> {
    fn from(data: HashMap<K, V>) -> Self {
        CacheKit {
            data: RwLock::new(data),
        }
    }
}

impl<K, V> FromIterator<(K, V)> for CacheKit<K, V>
where
    K: Eq + Hash,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        CacheKit::from(iter.into_iter().collect::<HashMap<K, V>>())
    }
}

impl<K, V> Extend<(K, V)> for CacheKit<K, V>
where
    K: Eq + Hash,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        // `&mut self` already rules out every other reader and writer.
        self.data.get_mut().extend(iter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_replaces_storage() {
        let cache: CacheKit<u32, u32> = (0..64).map(|i| (i, i)).collect();
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.items(), HashMap::new());
    }

    #[test]
    fn clone_is_independent() {
        let cache = CacheKit::new();
        cache.set("a", 1);
        let copy = cache.clone();
        cache.set("a", 2);
        assert_eq!(copy.get("a"), Some(1));
        assert_eq!(cache.get("a"), Some(2));
    }
}
