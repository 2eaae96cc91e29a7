// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Port of gobwas/pool/slab/pool.go. A map from power-of-two capacity to a
// whole Cache for that size — same bucketed-by-capacity shape as
// `pool_map`/`bytes_pool`, but each bucket is a slab allocator instead of a
// plain free-list of reused `Vec<u8>`.

use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};

use crate::pow2::{ceil_pow2, log_range};

use super::cache::{Cache, SlabBuf};

/// Either a slab-backed buffer or, for sizes outside the pool's configured
/// range, a plain heap allocation. Go's `[]byte` return value covers both
/// cases uniformly; Rust needs the two ownership stories (mmap slot vs.
/// global allocator) spelled out as distinct variants instead.
pub enum PooledBytes {
    Slab(SlabBuf),
    Heap(Vec<u8>),
}

impl Deref for PooledBytes {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        match self {
            PooledBytes::Slab(b) => b,
            PooledBytes::Heap(v) => v,
        }
    }
}

impl DerefMut for PooledBytes {
    fn deref_mut(&mut self) -> &mut [u8] {
        match self {
            PooledBytes::Slab(b) => b,
            PooledBytes::Heap(v) => v,
        }
    }
}

/// A map from each power-of-two capacity in `[min, max]` to a `Cache` sized
/// for that capacity. Sizes outside the range fall back to a plain
/// allocation that `put` silently drops instead of pooling.
pub struct SlabPool {
    caches: BTreeMap<usize, Cache>,
}

impl SlabPool {
    /// Builds one `Cache` per power-of-two capacity from `min` to `max`.
    pub fn new(min: usize, max: usize) -> Self {
        let mut caches = BTreeMap::new();
        log_range(min, max, |n| {
            caches.insert(n, Cache::new(n, None));
        });
        Self { caches }
    }

    /// Returns a probably-reused buffer with at least capacity `c` and
    /// exactly length `n`.
    ///
    /// # Panics
    /// Panics if `n > c`.
    pub fn get(&self, n: usize, c: usize) -> PooledBytes {
        assert!(n <= c, "requested length is greater than capacity");

        let x = ceil_pow2(c);
        match self.caches.get(&x) {
            Some(cache) => {
                let mut buf = cache.alloc();
                buf.truncate(n);
                PooledBytes::Slab(buf)
            }
            None => {
                let mut v = Vec::with_capacity(c);
                v.resize(n, 0);
                PooledBytes::Heap(v)
            }
        }
    }

    pub fn get_len(&self, n: usize) -> PooledBytes {
        self.get(n, n)
    }

    pub fn get_cap(&self, c: usize) -> PooledBytes {
        self.get(0, c)
    }

    /// Returns `bts` to its originating cache for reuse. A `Heap` buffer is
    /// simply dropped; a `Slab` buffer whose capacity doesn't match one of
    /// this pool's own buckets is also dropped (its slot is never reclaimed
    /// — the same fire-and-forget contract `Cache::free` documents for a
    /// foreign buffer, mirrored here at the pool layer).
    pub fn put(&self, bts: PooledBytes) {
        if let PooledBytes::Slab(buf) = bts {
            let cap = buf.full_cap();
            if let Some(cache) = self.caches.get(&cap) {
                cache.free(buf);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_range_get_put_round_trips_through_slab() {
        let p = SlabPool::new(64, 256);
        let buf = p.get_len(100);
        assert_eq!(buf.len(), 100);
        assert!(matches!(buf, PooledBytes::Slab(_)));
        p.put(buf);
    }

    #[test]
    fn out_of_range_falls_back_to_heap() {
        let p = SlabPool::new(64, 256);
        let buf = p.get_len(4096);
        assert_eq!(buf.len(), 4096);
        assert!(matches!(buf, PooledBytes::Heap(_)));
        p.put(buf);
    }

    #[test]
    #[should_panic(expected = "greater than capacity")]
    fn get_panics_when_len_exceeds_cap() {
        let p = SlabPool::new(64, 256);
        p.get(200, 100);
    }
}
