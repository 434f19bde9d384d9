use std::borrow::Borrow;
use std::hash::Hash;

use linkedmap::LinkedMap;

/// All pairs written during one `slot_size` interval.
///
/// A label over its own `LinkedMap`; it adds no locking of its own.
#[derive(Debug)]
pub struct Slot<K, V> {
    index: i64,
    entries: LinkedMap<K, V>,
}

impl<K, V> Slot<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new(index: i64) -> Self {
        Self {
            index,
            entries: LinkedMap::new(),
        }
    }

    pub fn index(&self) -> i64 {
        self.index
    }

    pub fn store(&self, key: K, value: V) {
        self.entries.store(key, value);
    }

    pub fn load<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
        V: Clone,
    {
        self.entries.load(key)
    }

    /// `true` if this call inserted `key`.
    pub fn load_or_store(&self, key: K, value: V) -> (V, bool)
    where
        V: Clone,
    {
        self.entries.load_or_store(key, value)
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    /// Keys written to this slot, newest first.
    pub fn keys(&self) -> Vec<K> {
        self.entries.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_delegates_to_entries() {
        let slot = Slot::new(42);
        assert_eq!(slot.index(), 42);

        slot.store("a", 1);
        slot.store("b", 2);
        slot.store("a", 3);

        assert_eq!(slot.load("a"), Some(3));
        assert_eq!(slot.size(), 2);
        assert_eq!(slot.keys(), vec!["b", "a"]);
        assert_eq!(slot.load_or_store("b", 9), (2, false));
        assert_eq!(slot.load_or_store("c", 9), (9, true));
    }
}
