//! Concurrency-safe hash map that remembers insertion order.
//!
//! `LinkedMap` pairs a `HashMap<K, NodeId>` index with an arena-backed
//! doubly linked list, both behind one `parking_lot::RwLock`:
//!
//! - lookups, inserts and deletes are O(1);
//! - iteration runs newest-to-oldest;
//! - the oldest live entry is available in O(1).
//!
//! Order is *insertion* order: overwriting an existing key updates its value
//! in place and keeps its position.
//!
//! ```
//! use linkedmap::LinkedMap;
//!
//! let m = LinkedMap::new();
//! m.store("a", 1);
//! m.store("b", 2);
//! m.store("a", 3);
//!
//! assert_eq!(m.keys(), vec!["b", "a"]);
//! assert_eq!(m.oldest(), Some(3));
//! ```

mod error;
mod list;

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::ops::ControlFlow;

use parking_lot::RwLock;

pub use error::InvariantError;
use list::{NodeId, OrderList};

struct Inner<K, V> {
    index: HashMap<K, NodeId>,
    order: OrderList<K, V>,
}

/// Insertion-ordered concurrent map.
///
/// All operations take the internal lock for a bounded critical section.
/// Readers (`load`, `range`, `keys`, `oldest`, `len`) share it; writers
/// exclude each other and readers.
pub struct LinkedMap<K, V> {
    inner: RwLock<Inner<K, V>>,
}

impl<K, V> LinkedMap<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(Inner {
                index: HashMap::with_capacity(capacity),
                order: OrderList::with_capacity(capacity),
            }),
        }
    }

    /// Sets `key` to `value`. A new key becomes the newest entry; an existing
    /// key keeps its position.
    pub fn store(&self, key: K, value: V) {
        let mut inner = self.inner.write();
        let Inner { index, order } = &mut *inner;

        if let Some(slot) = index.get(&key).and_then(|&id| order.get_mut(id)) {
            *slot = value;
            return;
        }

        let id = order.push_back(key.clone(), value);
        index.insert(key, id);
    }

    pub fn load<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
        V: Clone,
    {
        let inner = self.inner.read();
        let id = *inner.index.get(key)?;
        inner.order.get(id).cloned()
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.inner.read().index.contains_key(key)
    }

    /// Returns `(existing, false)` if `key` is present, otherwise inserts
    /// `value` and returns `(value, true)`.
    ///
    /// The check and the insert happen under one write lock, so among
    /// concurrent callers for the same key exactly one sees `true`.
    pub fn load_or_store(&self, key: K, value: V) -> (V, bool)
    where
        V: Clone,
    {
        let mut inner = self.inner.write();
        let Inner { index, order } = &mut *inner;

        if let Some(existing) = index.get(&key).and_then(|&id| order.get(id)) {
            return (existing.clone(), false);
        }

        let id = order.push_back(key.clone(), value.clone());
        index.insert(key, id);
        (value, true)
    }

    /// Removes `key`, returning its value if it was present.
    pub fn delete<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let mut inner = self.inner.write();
        let id = inner.index.remove(key)?;
        inner.order.remove(id).map(|(_, v)| v)
    }

    /// Removes and returns the oldest entry if `pred` accepts it.
    ///
    /// Inspection and removal share one write lock, so no other writer can
    /// slip in between "which entry is oldest" and "remove it".
    pub fn pop_oldest_if<F>(&self, pred: F) -> Option<(K, V)>
    where
        F: FnOnce(&K, &V) -> bool,
    {
        let mut inner = self.inner.write();
        let id = inner.order.front_id()?;
        let (k, v) = inner.order.front()?;
        if !pred(k, v) {
            return None;
        }

        let (key, value) = inner.order.remove(id)?;
        inner.index.remove(&key);
        Some((key, value))
    }

    /// Visits entries newest-to-oldest until `f` breaks.
    ///
    /// The read lock is held for the whole scan: `f` must not write to this
    /// map.
    pub fn range<F>(&self, mut f: F)
    where
        F: FnMut(&K, &V) -> ControlFlow<()>,
    {
        let inner = self.inner.read();
        for (k, v) in inner.order.iter_rev() {
            if f(k, v).is_break() {
                break;
            }
        }
    }

    /// Keys, newest first.
    pub fn keys(&self) -> Vec<K> {
        let inner = self.inner.read();
        let mut keys = Vec::with_capacity(inner.order.len());
        keys.extend(inner.order.iter_rev().map(|(k, _)| k.clone()));
        keys
    }

    /// Value of the longest-lived entry.
    pub fn oldest(&self) -> Option<V>
    where
        V: Clone,
    {
        self.inner.read().order.front().map(|(_, v)| v.clone())
    }

    pub fn oldest_entry(&self) -> Option<(K, V)>
    where
        V: Clone,
    {
        self.inner
            .read()
            .order
            .front()
            .map(|(k, v)| (k.clone(), v.clone()))
    }

    pub fn len(&self) -> usize {
        self.inner.read().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Checks that the key index and the order list describe the same entries.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        let inner = self.inner.read();
        inner.order.validate()?;

        if inner.index.len() != inner.order.len() {
            return Err(InvariantError::new(format!(
                "index holds {} keys, order list holds {}",
                inner.index.len(),
                inner.order.len()
            )));
        }

        for (id, key) in inner.order.ids() {
            if inner.index.get(key) != Some(&id) {
                return Err(InvariantError::new(
                    "order node is not reachable through the index",
                ));
            }
        }
        Ok(())
    }
}

impl<K, V> Default for LinkedMap<K, V>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> fmt::Debug for LinkedMap<K, V>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_map().entries(inner.order.iter_rev()).finish()
    }
}
