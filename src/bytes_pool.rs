// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Port of gobwas/pool/pbytes/pbytes.go.
// Out of the core slab subsystem by spec (§1): a thin size-indexed free-list
// of byte buffers, layered directly on pool_map.

use crate::pow2::ceil_pow2;
use crate::pool_map::PoolMap;

/// Reuses `Vec<u8>` allocations bucketed by power-of-two capacity.
pub struct BytesPool {
    map: PoolMap<Vec<u8>>,
}

impl BytesPool {
    /// Creates a pool reusing slices whose capacity falls in `[min, max]`.
    /// `min` is ceiled to the next power of two.
    pub fn new(min: usize, max: usize) -> Self {
        Self {
            map: PoolMap::new(min, max),
        }
    }

    /// Returns a probably-reused slice of bytes with at least capacity `c`
    /// and exactly length `n`.
    ///
    /// # Panics
    /// Panics if `n > c`.
    pub fn get(&self, n: usize, c: usize) -> Vec<u8> {
        assert!(n <= c, "requested length is greater than capacity");

        let bucket_cap = ceil_pow2(c);
        match self.map.get(bucket_cap) {
            Some(mut bts) => {
                bts.clear();
                bts.resize(n, 0);
                bts
            }
            None => vec![0; n],
        }
    }

    /// Returns a probably-reused slice of bytes with at least capacity `c`.
    pub fn get_cap(&self, c: usize) -> Vec<u8> {
        self.get(0, c)
    }

    /// Returns a probably-reused slice of bytes with at least capacity `n`
    /// and exactly length `n`.
    pub fn get_len(&self, n: usize) -> Vec<u8> {
        self.get(n, n)
    }

    /// Returns `bts` to the pool for reuse. A no-op if `bts`'s capacity is
    /// not a power of two in the configured range.
    pub fn put(&self, bts: Vec<u8>) {
        let cap = bts.capacity();
        if self.map.has_bucket(cap) && ceil_pow2(cap) == cap {
            self.map.put(cap, bts);
        }
    }
}
