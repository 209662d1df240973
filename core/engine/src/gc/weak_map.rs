//! Weak mappings that cooperate with the collector.
//!
//! A [`WeakMap`] holds no strong reference to its keys: an entry survives a
//! collection only if its key was marked by somebody else. The owner of the
//! map is responsible for calling [`WeakMap::sweep`] after the mark phase and
//! for marking keys by hand when the map lives outside the collected realm.

use indexmap::IndexMap;
use std::hash::Hash;

use rustc_hash::FxBuildHasher;

/// A weak-keyed map.
///
/// Every insertion is stamped with the epoch of the collector at the time it
/// happened, which lets debugging output tell old entries from fresh ones.
#[derive(Debug)]
pub struct WeakMap<K, V> {
    entries: IndexMap<K, Entry<V>, FxBuildHasher>,
}

#[derive(Debug)]
struct Entry<V> {
    value: V,
    epoch: u64,
}

impl<K, V> Default for WeakMap<K, V> {
    fn default() -> Self {
        Self {
            entries: IndexMap::default(),
        }
    }
}

impl<K: Copy + Eq + Hash, V> WeakMap<K, V> {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up the value for `key`.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key).map(|entry| &entry.value)
    }

    /// Inserts `value` under `key`, stamped with `epoch`.
    pub fn insert(&mut self, key: K, value: V, epoch: u64) -> Option<V> {
        self.entries
            .insert(key, Entry { value, epoch })
            .map(|entry| entry.value)
    }

    /// Removes the entry for `key`.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.entries.shift_remove(key).map(|entry| entry.value)
    }

    /// Returns the epoch at which `key` was inserted.
    #[must_use]
    pub fn epoch_of(&self, key: &K) -> Option<u64> {
        self.entries.get(key).map(|entry| entry.epoch)
    }

    /// Iterates over all keys, oldest first.
    pub fn keys(&self) -> impl Iterator<Item = K> + '_ {
        self.entries.keys().copied()
    }

    /// Iterates over all values, oldest first.
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.values().map(|entry| &entry.value)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every entry whose key is not `is_live`, handing each dropped
    /// value to `on_drop`.
    pub fn sweep(&mut self, mut is_live: impl FnMut(K) -> bool, mut on_drop: impl FnMut(K, V)) {
        let dead: Vec<K> = self.keys().filter(|key| !is_live(*key)).collect();
        for key in dead {
            if let Some(entry) = self.entries.shift_remove(&key) {
                on_drop(key, entry.value);
            }
        }
    }

    /// Removes every entry, handing each value to `on_drop`.
    pub fn drain(&mut self, mut on_drop: impl FnMut(K, V)) {
        for (key, entry) in self.entries.drain(..) {
            on_drop(key, entry.value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_drops_only_dead_keys() {
        let mut map = WeakMap::new();
        map.insert(1u32, "one", 0);
        map.insert(2, "two", 0);
        map.insert(3, "three", 1);

        let mut dropped = Vec::new();
        map.sweep(|key| key != 2, |key, value| dropped.push((key, value)));

        assert_eq!(dropped, vec![(2, "two")]);
        assert_eq!(map.keys().collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(map.epoch_of(&3), Some(1));
    }
}
