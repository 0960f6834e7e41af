//! Per-snapshot query memo.
//!
//! A snapshot never changes after creation, so its query results can be cached
//! for its whole lifetime. Each new snapshot gets a fresh, empty memo; the old
//! one stays with the old snapshot.

use std::{
    fmt,
    num::NonZeroUsize,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
};

use common::SchemaResult;
use lru::LruCache;
use tracing::trace;
use types::{Name, ObjectId};

use crate::registry::{Object, SchemaClass};

static NEXT_SNAPSHOT: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of one store snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SnapshotId(pub u64);

impl SnapshotId {
    pub(crate) fn next() -> Self {
        SnapshotId(NEXT_SNAPSHOT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) enum MemoKey {
    Referrers {
        target: ObjectId,
        class: Option<SchemaClass>,
        field: Option<String>,
    },
    Casts {
        ty: ObjectId,
        field: &'static str,
        implicit: bool,
        assignment: bool,
    },
    Overloads {
        class: SchemaClass,
        name: Name,
    },
}

pub(crate) struct SnapshotMemo {
    capacity: Option<NonZeroUsize>,
    /// Allocated on the first store; most snapshots are never queried.
    cache: Mutex<Option<LruCache<MemoKey, Arc<[Object]>>>>,
}

impl SnapshotMemo {
    /// A memo holding at most `capacity` results; zero disables caching.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: NonZeroUsize::new(capacity),
            cache: Mutex::new(None),
        }
    }

    /// Cached result for `key`, computing and storing it on a miss.
    ///
    /// Errors are returned as-is and never cached. A poisoned lock only
    /// disables caching.
    pub fn get_or_try_insert(
        &self,
        key: MemoKey,
        compute: impl FnOnce() -> SchemaResult<Arc<[Object]>>,
    ) -> SchemaResult<Arc<[Object]>> {
        if let Ok(mut guard) = self.cache.lock()
            && let Some(cache) = guard.as_mut()
            && let Some(hit) = cache.get(&key)
        {
            trace!(?key, "memo hit");
            return Ok(Arc::clone(hit));
        }

        let value = compute()?;
        if let Some(capacity) = self.capacity
            && let Ok(mut guard) = self.cache.lock()
        {
            guard
                .get_or_insert_with(|| LruCache::new(capacity))
                .put(key, Arc::clone(&value));
        }
        Ok(value)
    }

    #[cfg(test)]
    fn is_allocated(&self) -> bool {
        self.cache.lock().is_ok_and(|guard| guard.is_some())
    }

    pub fn len(&self) -> usize {
        match self.cache.lock() {
            Ok(guard) => guard.as_ref().map_or(0, LruCache::len),
            Err(_) => 0,
        }
    }
}

impl fmt::Debug for SnapshotMemo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotMemo")
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(n: u128) -> MemoKey {
        MemoKey::Referrers {
            target: ObjectId::from_u128(n),
            class: None,
            field: None,
        }
    }

    #[test]
    fn second_lookup_hits_the_cache() {
        let memo = SnapshotMemo::new(4);
        let mut calls = 0;
        for _ in 0..2 {
            let result = memo
                .get_or_try_insert(key(1), || {
                    calls += 1;
                    Ok(Arc::from(Vec::new()))
                })
                .unwrap();
            assert!(result.is_empty());
        }
        assert_eq!(calls, 1);
        assert_eq!(memo.len(), 1);
    }

    #[test]
    fn zero_capacity_disables_caching() {
        let memo = SnapshotMemo::new(0);
        let mut calls = 0;
        for _ in 0..3 {
            memo.get_or_try_insert(key(1), || {
                calls += 1;
                Ok(Arc::from(Vec::new()))
            })
            .unwrap();
        }
        assert_eq!(calls, 3);
        assert_eq!(memo.len(), 0);
        assert!(!memo.is_allocated());
    }

    #[test]
    fn cache_is_allocated_on_first_store() {
        let memo = SnapshotMemo::new(256);
        assert!(!memo.is_allocated());

        memo.get_or_try_insert(key(3), || Err(common::SchemaError::internal("boom")))
            .unwrap_err();
        assert!(!memo.is_allocated());

        memo.get_or_try_insert(key(3), || Ok(Arc::from(Vec::new())))
            .unwrap();
        assert!(memo.is_allocated());
        assert_eq!(memo.len(), 1);
    }

    #[test]
    fn errors_are_not_cached() {
        let memo = SnapshotMemo::new(4);
        let err = memo
            .get_or_try_insert(key(2), || Err(common::SchemaError::internal("boom")))
            .unwrap_err();
        assert!(err.is_internal());
        assert_eq!(memo.len(), 0);
    }

    #[test]
    fn snapshot_ids_are_unique() {
        let a = SnapshotId::next();
        let b = SnapshotId::next();
        assert!(b > a);
    }
}
