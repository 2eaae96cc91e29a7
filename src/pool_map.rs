// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Port of gobwas/pool/pool.go: MakePoolMap, generalized over the pooled
// payload type. Go's map[int]*sync.Pool is untyped (interface{}) by
// necessity; here each PoolMap<T> is built for one concrete T.

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::pow2::{ceil_pow2, log_range};

/// A map from each power-of-two capacity in `[ceil_pow2(min), max]` to an
/// empty per-bucket free-list of `T`.
///
/// Lookup key is always `ceil_pow2(requested_capacity)`. If no bucket exists
/// for that key, callers must fall back to a fresh value and must not store
/// it back — `put` on a capacity outside the configured range is a silent
/// no-op by construction (there is no bucket to push into).
pub struct PoolMap<T> {
    buckets: BTreeMap<usize, Mutex<Vec<T>>>,
}

impl<T> PoolMap<T> {
    /// Builds buckets for every power-of-two capacity in `[min, max]`.
    pub fn new(min: usize, max: usize) -> Self {
        let mut buckets = BTreeMap::new();
        log_range(min, max, |n| {
            buckets.insert(n, Mutex::new(Vec::new()));
        });
        Self { buckets }
    }

    /// Looks up the bucket for `ceil_pow2(capacity)`, if one was configured.
    pub fn bucket(&self, capacity: usize) -> Option<&Mutex<Vec<T>>> {
        self.buckets.get(&ceil_pow2(capacity))
    }

    /// Pops a previously pooled value for `capacity`, if any bucket exists
    /// and holds one.
    pub fn get(&self, capacity: usize) -> Option<T> {
        self.bucket(capacity)?.lock().unwrap().pop()
    }

    /// Returns `value` to the bucket for `capacity`. A no-op if `capacity`
    /// falls outside the configured range.
    pub fn put(&self, capacity: usize, value: T) {
        if let Some(bucket) = self.bucket(capacity) {
            bucket.lock().unwrap().push(value);
        }
    }

    /// Whether a bucket exists for `capacity` (regardless of whether it is
    /// currently populated).
    pub fn has_bucket(&self, capacity: usize) -> bool {
        self.buckets.contains_key(&ceil_pow2(capacity))
    }
}
