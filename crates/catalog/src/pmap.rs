//! Persistent hash-array-mapped trie.
//!
//! Every edit returns a new map that shares all untouched subtrees with the
//! original through `Arc`; the original stays valid and unchanged. Each level
//! of the trie consumes five bits of a fixed-seed 64-bit hash, so lookups and
//! edits touch at most thirteen nodes. Keys whose full hashes are equal end up
//! in a collision bucket below the last level.

use std::{
    borrow::Borrow,
    fmt,
    hash::Hash,
    slice,
    sync::Arc,
};

use ahash::RandomState;

const BITS: u32 = 5;
const MASK: u64 = (1 << BITS) - 1;
/// Shift of the deepest branch level; past it the whole hash has been consumed.
const MAX_SHIFT: u32 = 60;

const SEEDS: [u64; 4] = [
    0x243f_6a88_85a3_08d3,
    0x1319_8a2e_0370_7344,
    0xa409_3822_299f_31d0,
    0x082e_fa98_ec4e_6c89,
];

fn hash_of<Q: Hash + ?Sized>(key: &Q) -> u64 {
    RandomState::with_seeds(SEEDS[0], SEEDS[1], SEEDS[2], SEEDS[3]).hash_one(key)
}

fn bit_for(hash: u64, shift: u32) -> u32 {
    1 << ((hash >> shift) & MASK)
}

fn slot_index(bitmap: u32, bit: u32) -> usize {
    (bitmap & (bit - 1)).count_ones() as usize
}

#[derive(Clone)]
enum Node<K, V> {
    Branch { bitmap: u32, slots: Vec<Slot<K, V>> },
    Collision { hash: u64, entries: Vec<(K, V)> },
}

#[derive(Clone)]
enum Slot<K, V> {
    Leaf { hash: u64, key: K, value: V },
    Child(Arc<Node<K, V>>),
}

enum Removal<K, V> {
    NotFound,
    Empty,
    Node(Node<K, V>),
    /// The subtree shrank to a single entry that the parent should inline.
    Leaf { hash: u64, key: K, value: V },
}

/// Immutable map with structural sharing.
pub struct PersistentMap<K, V> {
    root: Arc<Node<K, V>>,
    len: usize,
}

impl<K, V> PersistentMap<K, V> {
    pub fn new() -> Self {
        Self {
            root: Arc::new(Node::Branch {
                bitmap: 0,
                slots: Vec::new(),
            }),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// True when both maps are the same version (no copy happened in between).
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.root, &other.root)
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        let mut iter = Iter {
            stack: Vec::new(),
            collision: Default::default(),
            remaining: self.len,
        };
        match self.root.as_ref() {
            Node::Branch { slots, .. } => iter.stack.push(slots.iter()),
            Node::Collision { entries, .. } => iter.collision = entries.iter(),
        }
        iter
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.iter().map(|(_, v)| v)
    }
}

impl<K: Hash + Eq, V> PersistentMap<K, V> {
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = hash_of(key);
        let mut node = self.root.as_ref();
        let mut shift = 0;
        loop {
            match node {
                Node::Branch { bitmap, slots } => {
                    let bit = bit_for(hash, shift);
                    if bitmap & bit == 0 {
                        return None;
                    }
                    match &slots[slot_index(*bitmap, bit)] {
                        Slot::Leaf {
                            hash: h,
                            key: k,
                            value,
                        } => {
                            let found = *h == hash && <K as Borrow<Q>>::borrow(k) == key;
                            return found.then_some(value);
                        }
                        Slot::Child(child) => {
                            node = child.as_ref();
                            shift += BITS;
                        }
                    }
                }
                Node::Collision { hash: h, entries } => {
                    if *h != hash {
                        return None;
                    }
                    return entries
                        .iter()
                        .find(|(k, _)| <K as Borrow<Q>>::borrow(k) == key)
                        .map(|(_, v)| v);
                }
            }
        }
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(key).is_some()
    }
}

impl<K: Hash + Eq + Clone, V: Clone> PersistentMap<K, V> {
    /// New map with `key` bound to `value`.
    pub fn insert(&self, key: K, value: V) -> Self {
        let hash = hash_of(&key);
        let (root, added) = insert_into(&self.root, 0, hash, key, value);
        Self {
            root: Arc::new(root),
            len: self.len + usize::from(added),
        }
    }

    /// New map without `key`; shares the receiver when the key is absent.
    pub fn remove<Q>(&self, key: &Q) -> Self
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = hash_of(key);
        match remove_from(&self.root, 0, hash, key) {
            Removal::NotFound => self.clone(),
            Removal::Empty => Self::new(),
            Removal::Node(node) => Self {
                root: Arc::new(node),
                len: self.len - 1,
            },
            Removal::Leaf { hash, key, value } => Self {
                root: Arc::new(Node::Branch {
                    bitmap: bit_for(hash, 0),
                    slots: vec![Slot::Leaf { hash, key, value }],
                }),
                len: self.len - 1,
            },
        }
    }
}

fn insert_into<K: Eq + Clone, V: Clone>(
    node: &Node<K, V>,
    shift: u32,
    hash: u64,
    key: K,
    value: V,
) -> (Node<K, V>, bool) {
    match node {
        Node::Branch { bitmap, slots } => {
            let bit = bit_for(hash, shift);
            let idx = slot_index(*bitmap, bit);
            let mut slots = slots.clone();
            if bitmap & bit == 0 {
                slots.insert(idx, Slot::Leaf { hash, key, value });
                return (
                    Node::Branch {
                        bitmap: bitmap | bit,
                        slots,
                    },
                    true,
                );
            }
            let (slot, added) = match &slots[idx] {
                Slot::Leaf {
                    hash: h, key: k, ..
                } if *h == hash && *k == key => (Slot::Leaf { hash, key, value }, false),
                Slot::Leaf {
                    hash: h,
                    key: k,
                    value: v,
                } => {
                    let merged = merge_leaves(shift + BITS, (*h, k.clone(), v.clone()), (hash, key, value));
                    (Slot::Child(Arc::new(merged)), true)
                }
                Slot::Child(child) => {
                    let (child, added) = insert_into(child, shift + BITS, hash, key, value);
                    (Slot::Child(Arc::new(child)), added)
                }
            };
            slots[idx] = slot;
            (
                Node::Branch {
                    bitmap: *bitmap,
                    slots,
                },
                added,
            )
        }
        Node::Collision { hash: h, entries } => {
            let mut entries = entries.clone();
            let added = match entries.iter().position(|(k, _)| *k == key) {
                Some(pos) => {
                    entries[pos].1 = value;
                    false
                }
                None => {
                    entries.push((key, value));
                    true
                }
            };
            (Node::Collision { hash: *h, entries }, added)
        }
    }
}

fn merge_leaves<K, V>(shift: u32, a: (u64, K, V), b: (u64, K, V)) -> Node<K, V> {
    if shift > MAX_SHIFT {
        return Node::Collision {
            hash: a.0,
            entries: vec![(a.1, a.2), (b.1, b.2)],
        };
    }
    let bit_a = bit_for(a.0, shift);
    let bit_b = bit_for(b.0, shift);
    if bit_a == bit_b {
        return Node::Branch {
            bitmap: bit_a,
            slots: vec![Slot::Child(Arc::new(merge_leaves(shift + BITS, a, b)))],
        };
    }
    let leaf_a = Slot::Leaf {
        hash: a.0,
        key: a.1,
        value: a.2,
    };
    let leaf_b = Slot::Leaf {
        hash: b.0,
        key: b.1,
        value: b.2,
    };
    let slots = if bit_a < bit_b {
        vec![leaf_a, leaf_b]
    } else {
        vec![leaf_b, leaf_a]
    };
    Node::Branch {
        bitmap: bit_a | bit_b,
        slots,
    }
}

fn remove_from<K, V, Q>(node: &Node<K, V>, shift: u32, hash: u64, key: &Q) -> Removal<K, V>
where
    K: Borrow<Q> + Clone,
    V: Clone,
    Q: Eq + ?Sized,
{
    match node {
        Node::Branch { bitmap, slots } => {
            let bit = bit_for(hash, shift);
            if bitmap & bit == 0 {
                return Removal::NotFound;
            }
            let idx = slot_index(*bitmap, bit);
            let replacement = match &slots[idx] {
                Slot::Leaf { hash: h, key: k, .. } => {
                    if *h != hash || <K as Borrow<Q>>::borrow(k) != key {
                        return Removal::NotFound;
                    }
                    None
                }
                Slot::Child(child) => match remove_from(child, shift + BITS, hash, key) {
                    Removal::NotFound => return Removal::NotFound,
                    Removal::Empty => None,
                    Removal::Node(node) => Some(Slot::Child(Arc::new(node))),
                    Removal::Leaf { hash, key, value } => Some(Slot::Leaf { hash, key, value }),
                },
            };
            let mut slots = slots.clone();
            let bitmap = match replacement {
                Some(slot) => {
                    slots[idx] = slot;
                    *bitmap
                }
                None => {
                    slots.remove(idx);
                    bitmap & !bit
                }
            };
            collapse(shift, bitmap, slots)
        }
        Node::Collision { hash: h, entries } => {
            let Some(pos) = entries
                .iter()
                .position(|(k, _)| <K as Borrow<Q>>::borrow(k) == key)
            else {
                return Removal::NotFound;
            };
            let mut entries = entries.clone();
            entries.remove(pos);
            if entries.len() == 1 {
                if let Some((key, value)) = entries.pop() {
                    return Removal::Leaf {
                        hash: *h,
                        key,
                        value,
                    };
                }
            }
            Removal::Node(Node::Collision { hash: *h, entries })
        }
    }
}

fn collapse<K, V>(shift: u32, bitmap: u32, mut slots: Vec<Slot<K, V>>) -> Removal<K, V> {
    if slots.is_empty() {
        return Removal::Empty;
    }
    if shift > 0 && slots.len() == 1 && matches!(slots[0], Slot::Leaf { .. }) {
        if let Some(Slot::Leaf { hash, key, value }) = slots.pop() {
            return Removal::Leaf { hash, key, value };
        }
    }
    Removal::Node(Node::Branch { bitmap, slots })
}

impl<K, V> Clone for PersistentMap<K, V> {
    fn clone(&self) -> Self {
        Self {
            root: Arc::clone(&self.root),
            len: self.len,
        }
    }
}

impl<K, V> Default for PersistentMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for PersistentMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: Hash + Eq, V: PartialEq> PartialEq for PersistentMap<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
            || (self.len == other.len && self.iter().all(|(k, v)| other.get(k) == Some(v)))
    }
}

impl<K: Hash + Eq, V: Eq> Eq for PersistentMap<K, V> {}

impl<K: Hash + Eq + Clone, V: Clone> FromIterator<(K, V)> for PersistentMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::new(), |map, (k, v)| map.insert(k, v))
    }
}

impl<'a, K, V> IntoIterator for &'a PersistentMap<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Borrowing iterator over a [`PersistentMap`], in trie order.
pub struct Iter<'a, K, V> {
    stack: Vec<slice::Iter<'a, Slot<K, V>>>,
    collision: slice::Iter<'a, (K, V)>,
    remaining: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((key, value)) = self.collision.next() {
                self.remaining -= 1;
                return Some((key, value));
            }
            let top = self.stack.last_mut()?;
            match top.next() {
                None => {
                    self.stack.pop();
                }
                Some(Slot::Leaf { key, value, .. }) => {
                    self.remaining -= 1;
                    return Some((key, value));
                }
                Some(Slot::Child(child)) => match child.as_ref() {
                    Node::Branch { slots, .. } => self.stack.push(slots.iter()),
                    Node::Collision { entries, .. } => self.collision = entries.iter(),
                },
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

/// Immutable set built on [`PersistentMap`].
pub struct PersistentSet<T>(PersistentMap<T, ()>);

impl<T> PersistentSet<T> {
    pub fn new() -> Self {
        Self(PersistentMap::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.0.keys()
    }
}

impl<T: Hash + Eq> PersistentSet<T> {
    pub fn contains<Q>(&self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.0.contains_key(value)
    }
}

impl<T: Hash + Eq + Clone> PersistentSet<T> {
    pub fn insert(&self, value: T) -> Self {
        Self(self.0.insert(value, ()))
    }

    pub fn remove<Q>(&self, value: &Q) -> Self
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        Self(self.0.remove(value))
    }
}

impl<T> Clone for PersistentSet<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Default for PersistentSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for PersistentSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<T: Hash + Eq> PartialEq for PersistentSet<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<T: Hash + Eq> Eq for PersistentSet<T> {}

impl<T: Hash + Eq + Clone> FromIterator<T> for PersistentSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self(iter.into_iter().map(|v| (v, ())).collect())
    }
}
