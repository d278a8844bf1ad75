//! Memoisation tables.
//!
//! [`Cache`] is the computed table of the BDD manager. It is a fixed array of `2^bits`
//! slots: every key maps to exactly one slot and a newer entry overwrites the older one.
//! Lookups compare the whole key, so a lost entry only costs a recomputation.
//!
//! [`Memo`] never forgets an entry. The circuit compiler relies on it to map equal guards
//! to the same gate.

use std::collections::HashMap;
use std::hash::Hash;

use crate::reference::Ref;

/// Slot selector for [`Cache`] keys.
pub trait CacheKey: Eq {
    fn slot_hash(&self) -> u64;
}

/// Szudzik pairing, wrapping on overflow.
pub fn pairing2(a: u64, b: u64) -> u64 {
    if a < b {
        b.wrapping_mul(b).wrapping_add(a)
    } else {
        a.wrapping_mul(a).wrapping_add(a).wrapping_add(b)
    }
}

pub fn pairing3(a: u64, b: u64, c: u64) -> u64 {
    pairing2(pairing2(a, b), c)
}

impl CacheKey for Ref {
    fn slot_hash(&self) -> u64 {
        self.raw() as u32 as u64
    }
}

impl CacheKey for (Ref, Ref) {
    fn slot_hash(&self) -> u64 {
        pairing2(self.0.slot_hash(), self.1.slot_hash())
    }
}

impl CacheKey for (Ref, Ref, Ref) {
    fn slot_hash(&self) -> u64 {
        pairing3(self.0.slot_hash(), self.1.slot_hash(), self.2.slot_hash())
    }
}

pub struct Cache<K, V> {
    entries: Vec<Option<(K, V)>>,
    bitmask: u64,
    hits: usize,
    misses: usize,
    faults: usize,
}

impl<K, V> Default for Cache<K, V> {
    fn default() -> Self {
        Self::new(14)
    }
}

impl<K, V> Cache<K, V> {
    /// A table of `2^bits` slots.
    pub fn new(bits: usize) -> Self {
        assert!(bits <= 31, "Cache bits must be in range 0..=31, got {}", bits);
        let size = 1usize << bits;
        Self {
            entries: (0..size).map(|_| None).collect(),
            bitmask: (size - 1) as u64,
            hits: 0,
            misses: 0,
            faults: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Occupied slots.
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(|e| e.is_none())
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }

    /// Misses on a slot held by another key.
    pub fn faults(&self) -> usize {
        self.faults
    }

    /// Empties every slot. The counters keep running.
    pub fn clear(&mut self) {
        self.entries.fill_with(|| None);
    }
}

impl<K, V> Cache<K, V>
where
    K: CacheKey,
    V: Copy,
{
    fn index(&self, key: &K) -> usize {
        (key.slot_hash() & self.bitmask) as usize
    }

    #[inline]
    pub fn get(&mut self, key: &K) -> Option<V> {
        let idx = self.index(key);
        match &self.entries[idx] {
            Some((k, v)) if k == key => {
                self.hits += 1;
                Some(*v)
            }
            Some(_) => {
                self.faults += 1;
                self.misses += 1;
                None
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Stores `value`, evicting whatever held the slot.
    #[inline]
    pub fn insert(&mut self, key: K, value: V) {
        let idx = self.index(&key);
        self.entries[idx] = Some((key, value));
    }
}

/// Exact memo table with hit and miss counters.
pub struct Memo<K, V> {
    map: HashMap<K, V>,
    hits: usize,
    misses: usize,
}

impl<K, V> Default for Memo<K, V> {
    fn default() -> Self {
        Self {
            map: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }
}

impl<K, V> Memo<K, V> {
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }
}

impl<K, V> Memo<K, V>
where
    K: Hash + Eq,
    V: Copy,
{
    pub fn get(&mut self, key: &K) -> Option<V> {
        match self.map.get(key) {
            Some(&v) => {
                self.hits += 1;
                Some(v)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, key: K, value: V) {
        self.map.insert(key, value);
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_cache_hits_and_misses() {
        let mut cache: Cache<(Ref, Ref), Ref> = Cache::new(4);
        let f = Ref::positive(7);
        let g = Ref::positive(9);
        cache.insert((f, g), -f);

        assert_eq!(cache.get(&(f, g)), Some(-f));
        assert_eq!(cache.get(&(g, f)), None);
        assert_eq!((cache.hits(), cache.misses()), (1, 1));
        assert_eq!(cache.capacity(), 16);
    }

    #[test]
    fn test_cache_overwrites_on_collision() {
        // A single slot: every key collides.
        let mut cache: Cache<Ref, usize> = Cache::new(0);
        cache.insert(Ref::positive(3), 10);
        cache.insert(Ref::positive(4), 20);

        assert_eq!(cache.get(&Ref::positive(3)), None);
        assert_eq!(cache.get(&Ref::positive(4)), Some(20));
        assert_eq!(cache.faults(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_stays_bounded() {
        let mut cache: Cache<(Ref, Ref, Ref), Ref> = Cache::new(3);
        for i in 1..500 {
            let f = Ref::positive(i);
            cache.insert((f, -f, f), f);
        }
        assert!(cache.len() <= 8);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.get(&(Ref::positive(1), Ref::positive(1), Ref::positive(1))), None);
    }

    #[test]
    fn test_memo_is_exact() {
        let mut memo: Memo<(Ref, u32), Ref> = Memo::default();
        for i in 1..500 {
            memo.insert((Ref::positive(i), i), -Ref::positive(i));
        }
        assert_eq!(memo.len(), 499);
        assert_eq!(memo.get(&(Ref::positive(42), 42)), Some(-Ref::positive(42)));
        assert_eq!(memo.get(&(Ref::positive(42), 43)), None);
        assert_eq!((memo.hits(), memo.misses()), (1, 1));
    }
}
