//! Insertion-order list backing `LinkedMap`.
//!
//! Nodes live in a `Vec<Option<Node>>` arena with a free list and are linked
//! by `NodeId`, so push/unlink/head lookups are O(1) with no pointer chasing.
//!
//! ```text
//!   head (oldest) ─► [a] ◄──► [b] ◄──► [c] ◄── tail (newest)
//! ```

use std::collections::HashSet;

use crate::error::InvariantError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct NodeId(usize);

#[derive(Debug)]
struct Node<K, V> {
    key: K,
    value: V,
    prev: Option<NodeId>,
    next: Option<NodeId>,
}

#[derive(Debug)]
pub(crate) struct OrderList<K, V> {
    nodes: Vec<Option<Node<K, V>>>,
    free: Vec<usize>,
    head: Option<NodeId>,
    tail: Option<NodeId>,
    len: usize,
}

impl<K, V> OrderList<K, V> {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Appends a node at the tail (newest position).
    pub(crate) fn push_back(&mut self, key: K, value: V) -> NodeId {
        let node = Node {
            key,
            value,
            prev: self.tail,
            next: None,
        };

        let id = match self.free.pop() {
            Some(idx) => {
                self.nodes[idx] = Some(node);
                NodeId(idx)
            }
            None => {
                self.nodes.push(Some(node));
                NodeId(self.nodes.len() - 1)
            }
        };

        match self.tail.and_then(|t| self.node_mut(t)) {
            Some(tail) => tail.next = Some(id),
            None => self.head = Some(id),
        }
        self.tail = Some(id);
        self.len += 1;
        id
    }

    /// Unlinks `id` and frees its arena slot.
    pub(crate) fn remove(&mut self, id: NodeId) -> Option<(K, V)> {
        let node = self.nodes.get_mut(id.0)?.take()?;

        match node.prev {
            Some(prev) => {
                if let Some(p) = self.node_mut(prev) {
                    p.next = node.next;
                }
            }
            None => self.head = node.next,
        }
        match node.next {
            Some(next) => {
                if let Some(n) = self.node_mut(next) {
                    n.prev = node.prev;
                }
            }
            None => self.tail = node.prev,
        }

        self.free.push(id.0);
        self.len -= 1;
        Some((node.key, node.value))
    }

    pub(crate) fn get(&self, id: NodeId) -> Option<&V> {
        self.node(id).map(|n| &n.value)
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut V> {
        self.node_mut(id).map(|n| &mut n.value)
    }

    pub(crate) fn front_id(&self) -> Option<NodeId> {
        self.head
    }

    /// Oldest entry.
    pub(crate) fn front(&self) -> Option<(&K, &V)> {
        self.head
            .and_then(|id| self.node(id))
            .map(|n| (&n.key, &n.value))
    }

    /// Newest-to-oldest iteration.
    pub(crate) fn iter_rev(&self) -> RevIter<'_, K, V> {
        RevIter {
            list: self,
            current: self.tail,
        }
    }

    fn node(&self, id: NodeId) -> Option<&Node<K, V>> {
        self.nodes.get(id.0).and_then(|n| n.as_ref())
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node<K, V>> {
        self.nodes.get_mut(id.0).and_then(|n| n.as_mut())
    }

    /// Walks the list in both directions and checks links, length and arena accounting.
    pub(crate) fn validate(&self) -> Result<(), InvariantError> {
        let mut seen = HashSet::new();
        let mut prev = None;
        let mut current = self.head;

        while let Some(id) = current {
            if !seen.insert(id) {
                return Err(InvariantError::new(format!("cycle at node {}", id.0)));
            }
            let node = self
                .node(id)
                .ok_or_else(|| InvariantError::new(format!("dangling link to node {}", id.0)))?;
            if node.prev != prev {
                return Err(InvariantError::new(format!(
                    "node {} has a stale prev link",
                    id.0
                )));
            }
            prev = current;
            current = node.next;
        }

        if prev != self.tail {
            return Err(InvariantError::new("tail does not terminate the forward walk"));
        }
        if seen.len() != self.len {
            return Err(InvariantError::new(format!(
                "list walk found {} nodes, len is {}",
                seen.len(),
                self.len
            )));
        }
        if self.nodes.len() - self.free.len() != self.len {
            return Err(InvariantError::new("arena occupancy disagrees with len"));
        }
        Ok(())
    }

    /// Live nodes in arena order (not list order).
    pub(crate) fn ids(&self) -> impl Iterator<Item = (NodeId, &K)> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(idx, n)| n.as_ref().map(|n| (NodeId(idx), &n.key)))
    }
}

pub(crate) struct RevIter<'a, K, V> {
    list: &'a OrderList<K, V>,
    current: Option<NodeId>,
}

impl<'a, K, V> Iterator for RevIter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.list.node(self.current?)?;
        self.current = node.prev;
        Some((&node.key, &node.value))
    }
}
