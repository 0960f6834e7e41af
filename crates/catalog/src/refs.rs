//! Reverse-reference index.
//!
//! For every referenced object `B` the index records which objects point at it
//! and through which `(class, field)`. It is maintained from per-field deltas so
//! that an edit costs time proportional to the references it changes.

use std::collections::{BTreeMap, BTreeSet};

use ahash::RandomState;
use hashbrown::HashSet;
use types::{ObjectId, Value};

use crate::{
    pmap::{PersistentMap, PersistentSet},
    registry::SchemaClass,
};

/// Referring class and field name.
pub type RefKey = (SchemaClass, &'static str);

pub(crate) type IdSet = HashSet<ObjectId, RandomState>;

/// Referrers of a single target, grouped by referring class and field.
pub type RefEntry = PersistentMap<RefKey, PersistentSet<ObjectId>>;

/// Set of identifiers referenced by a stored field value.
pub(crate) fn refs_of(value: &Value) -> IdSet {
    value.object_refs().into_iter().collect()
}

/// Old and new reference sets of one object-reference field.
#[derive(Debug, Default)]
pub(crate) struct FieldDelta {
    pub field: &'static str,
    pub old: IdSet,
    pub new: IdSet,
}

impl FieldDelta {
    pub fn new(field: &'static str, old: &Value, new: &Value) -> Self {
        Self {
            field,
            old: refs_of(old),
            new: refs_of(new),
        }
    }

    pub fn is_noop(&self) -> bool {
        self.old == self.new
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReverseIndex {
    entries: PersistentMap<ObjectId, RefEntry>,
}

impl ReverseIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of objects that currently have at least one referrer.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn referrers(&self, target: &ObjectId) -> Option<&RefEntry> {
        self.entries.get(target)
    }

    /// Apply the reference changes of `source` (of class `class`).
    ///
    /// Targets gained by a field get `source` added under `(class, field)`;
    /// targets lost get it removed. Empty keys and empty target entries are
    /// dropped.
    pub(crate) fn apply(
        &self,
        source: ObjectId,
        class: SchemaClass,
        deltas: &[FieldDelta],
    ) -> Self {
        let mut entries = self.entries.clone();
        for delta in deltas {
            if delta.is_noop() {
                continue;
            }
            let key: RefKey = (class, delta.field);
            for target in delta.new.difference(&delta.old) {
                let entry = entries.get(target).cloned().unwrap_or_default();
                let ids = entry.get(&key).cloned().unwrap_or_default();
                entries = entries.insert(*target, entry.insert(key, ids.insert(source)));
            }
            for target in delta.old.difference(&delta.new) {
                let Some(entry) = entries.get(target) else {
                    continue;
                };
                let Some(ids) = entry.get(&key) else {
                    continue;
                };
                let ids = ids.remove(&source);
                let entry = if ids.is_empty() {
                    entry.remove(&key)
                } else {
                    entry.insert(key, ids)
                };
                entries = if entry.is_empty() {
                    entries.remove(target)
                } else {
                    entries.insert(*target, entry)
                };
            }
        }
        Self { entries }
    }

    /// Ordered copy of the whole index, for comparisons and diagnostics.
    pub fn to_sorted(&self) -> BTreeMap<ObjectId, BTreeMap<RefKey, BTreeSet<ObjectId>>> {
        self.entries
            .iter()
            .map(|(target, entry)| {
                let grouped = entry
                    .iter()
                    .map(|(key, ids)| (*key, ids.iter().copied().collect()))
                    .collect();
                (*target, grouped)
            })
            .collect()
    }
}
