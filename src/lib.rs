// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// A fixed-size slab allocator in the style of Bonwick's SunOS cache, plus
// the lock-free free-list and d-ary free-count heap it's built on. Also
// carries the lighter-weight byte-slice and buffered-reader/writer pools
// that sit alongside it as plain size-bucketed free-lists.

mod platform;

mod rw_lock;

pub mod pow2;
pub mod pool_map;

pub mod bytes_pool;
pub use bytes_pool::BytesPool;

pub mod io_pool;
pub use io_pool::{get_reader, get_writer, put_reader, put_writer, PooledReader, PooledWriter};

pub mod slab;
pub use slab::{Cache, CacheConfig, SlabBuf, SlabPool};
