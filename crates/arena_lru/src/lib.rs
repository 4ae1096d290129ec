//! A fixed-capacity, arena-backed least-recently-used cache.
//!
//! Entries live in a flat `Vec` of slots addressed by index rather than by
//! pointer, and are threaded onto one intrusive doubly-linked list (MRU at
//! the head, LRU at the tail) by index. Key lookup goes through a
//! `HashMap<K, usize>` rather than a hand-rolled hash chain: it gives the
//! same O(1) membership test without the multi-pointer back-patching bug
//! class that an intrusive hash chain invites.
//!
//! This cache is not thread-safe; callers needing concurrent access must
//! add their own synchronization around it.

use std::collections::HashMap;
use std::hash::Hash;

#[derive(Debug)]
struct Slot<K, V> {
    key: Option<K>,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

/// An arena-backed LRU cache with a fixed number of slots.
///
/// The cache never grows past `capacity`: once every slot holds a live
/// entry, inserting a new key evicts the current least-recently-used slot.
#[derive(Debug)]
pub struct Lru<K, V> {
    capacity: usize,
    slots: Vec<Slot<K, V>>,
    index: HashMap<K, usize>,
    head: Option<usize>,
    tail: Option<usize>,
}

impl<K, V> Lru<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Creates a cache with room for `capacity` entries.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "LRU cache capacity must be nonzero");
        Self {
            capacity,
            slots: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
            head: None,
            tail: None,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Returns a reference to the cached value for `key`, promoting it to
    /// most-recently-used, without affecting the cache if absent.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let idx = *self.index.get(key)?;
        self.promote(idx);
        Some(&self.slots[idx].value)
    }

    /// Returns a mutable reference to the cached value for `key`, promoting
    /// it to most-recently-used, without affecting the cache if absent.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let idx = *self.index.get(key)?;
        self.promote(idx);
        Some(&mut self.slots[idx].value)
    }

    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// Returns the cached value for `key`, promoting it to
    /// most-recently-used. On a miss, evicts the current least-recently-used
    /// entry (calling `on_evict` with its key and value first, unless the
    /// cache has not yet filled up) and installs `key` with the value
    /// returned by `load`.
    ///
    /// `on_evict` and `load` may fail (e.g. a write-back or read I/O
    /// error); on failure the eviction/insertion is abandoned and the
    /// error is returned, leaving the cache unchanged.
    pub fn get_or_insert_with<E>(
        &mut self,
        key: K,
        load: impl FnOnce() -> Result<V, E>,
        mut on_evict: impl FnMut(&K, &mut V) -> Result<(), E>,
    ) -> Result<&mut V, E> {
        if let Some(&idx) = self.index.get(&key) {
            self.promote(idx);
            return Ok(&mut self.slots[idx].value);
        }

        let idx = if self.slots.len() < self.capacity {
            let value = load()?;
            self.slots.push(Slot {
                key: Some(key.clone()),
                value,
                prev: None,
                next: None,
            });
            self.slots.len() - 1
        } else {
            let idx = self.evict_lru(&mut on_evict)?;
            let value = load()?;
            self.slots[idx].key = Some(key.clone());
            self.slots[idx].value = value;
            idx
        };

        self.index.insert(key, idx);
        self.push_front(idx);
        Ok(&mut self.slots[idx].value)
    }

    /// Evicts the current LRU-tail slot, invoking `on_evict` first, and
    /// returns its now-vacated slot index for reuse.
    fn evict_lru<E>(
        &mut self,
        on_evict: &mut impl FnMut(&K, &mut V) -> Result<(), E>,
    ) -> Result<usize, E> {
        let idx = self.tail.expect("cache at capacity must have a tail");
        {
            let slot = &mut self.slots[idx];
            let key = slot.key.as_ref().expect("tail slot must be occupied");
            on_evict(key, &mut slot.value)?;
        }
        self.unlink(idx);
        let old_key = self.slots[idx]
            .key
            .take()
            .expect("tail slot must be occupied");
        self.index.remove(&old_key);
        Ok(idx)
    }

    /// Visits every occupied slot from most- to least-recently-used.
    pub fn for_each_mru_to_lru(&mut self, mut f: impl FnMut(&K, &mut V)) {
        let mut cur = self.head;
        while let Some(idx) = cur {
            cur = self.slots[idx].next;
            let slot = &mut self.slots[idx];
            let key = slot.key.as_ref().expect("linked slot must be occupied");
            f(key, &mut slot.value);
        }
    }

    fn promote(&mut self, idx: usize) {
        if self.head == Some(idx) {
            return;
        }
        self.unlink(idx);
        self.push_front(idx);
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = (self.slots[idx].prev, self.slots[idx].next);
        match prev {
            Some(p) => self.slots[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.slots[n].prev = prev,
            None => self.tail = prev,
        }
        self.slots[idx].prev = None;
        self.slots[idx].next = None;
    }

    fn push_front(&mut self, idx: usize) {
        self.slots[idx].prev = None;
        self.slots[idx].next = self.head;
        if let Some(h) = self.head {
            self.slots[h].prev = Some(idx);
        }
        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insert(cache: &mut Lru<u32, u32>, key: u32) -> Vec<u32> {
        let mut evicted = Vec::new();
        cache
            .get_or_insert_with::<()>(
                key,
                || Ok(key * 10),
                |k, _v| {
                    evicted.push(*k);
                    Ok(())
                },
            )
            .unwrap();
        evicted
    }

    #[test]
    fn evicts_least_recently_used_first() {
        let mut cache: Lru<u32, u32> = Lru::new(2);
        assert!(insert(&mut cache, 1).is_empty());
        assert!(insert(&mut cache, 2).is_empty());
        // Touch 1 so 2 becomes the LRU entry.
        cache.get(&1).unwrap();
        assert_eq!(insert(&mut cache, 3), vec![2]);
        assert!(cache.contains(&1));
        assert!(!cache.contains(&2));
        assert!(cache.contains(&3));
    }

    #[test]
    fn get_promotes_to_most_recently_used() {
        let mut cache: Lru<u32, u32> = Lru::new(3);
        insert(&mut cache, 1);
        insert(&mut cache, 2);
        insert(&mut cache, 3);
        cache.get(&1);
        // 2 is now LRU.
        assert_eq!(insert(&mut cache, 4), vec![2]);
    }

    #[test]
    fn for_each_visits_mru_to_lru() {
        let mut cache: Lru<u32, u32> = Lru::new(3);
        insert(&mut cache, 1);
        insert(&mut cache, 2);
        insert(&mut cache, 3);
        let mut order = Vec::new();
        cache.for_each_mru_to_lru(|k, _v| order.push(*k));
        assert_eq!(order, vec![3, 2, 1]);
    }
}
