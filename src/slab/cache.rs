// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Port of gobwas/pool/slab/cache.go. A fixed-size object cache built from
// mmap'd slabs, each carved into equal buffers with an in-band control
// header (bufctl) that lets a freed pointer find its way back to the slab
// and stack slot it came from.

use std::mem;
use std::ops::{Deref, DerefMut};
use std::slice;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use crate::platform::{self, AnonMap};
use crate::rw_lock::Guarded;

use super::heap::SlabHeap;
use super::stack::TaggedStack;

/// Per-buffer control header, written into the first `ctl_size()` bytes of
/// every slot by [`Cache::grow`]. Never exposed to callers directly — only
/// reached via pointer arithmetic from a buffer's address.
#[repr(C)]
struct BufCtl {
    magic: u32,
    slab: *const Slab,
    index: i32,
    ref_count: AtomicI32,
}

fn ctl_size() -> usize {
    mem::size_of::<BufCtl>()
}

/// One mmap'd region carved into `N` fixed-size slots, each `stride` bytes
/// (control header + user payload). Owns the lock-free free-list of slot
/// indices and a running count of currently handed-out slots.
pub struct Slab {
    map: AnonMap,
    stride: usize,
    stack: TaggedStack,
    busy: AtomicI32,
}

// The mapping and the atomics inside are the only state; nothing here is
// tied to the thread that created it.
unsafe impl Send for Slab {}
unsafe impl Sync for Slab {}

impl Slab {
    fn slot_ptr(&self, index: i32) -> *mut u8 {
        let low = index as usize * self.stride;
        unsafe { self.map.as_mut_ptr().add(low) }
    }

    /// Pops a free slot and marks it busy. Returns the slot's control-header
    /// address, or `None` if the slab has no free slots left.
    fn alloc(&self) -> Option<(i32, *mut u8)> {
        let i = self.stack.pop();
        if i < 0 {
            return None;
        }
        self.busy.fetch_add(1, Ordering::AcqRel);
        Some((i, self.slot_ptr(i)))
    }

    /// Returns slot `index` to the free-list. Returns the post-decrement
    /// busy count (0 means the slab is now fully free).
    fn free(&self, index: i32) -> i32 {
        self.stack.push(index);
        self.busy.fetch_sub(1, Ordering::AcqRel) - 1
    }

    /// Current count of outstanding (allocated) slots.
    fn ref_count(&self) -> i32 {
        self.busy.load(Ordering::Acquire)
    }
}

/// A buffer handed out by [`Cache::alloc`]. Derefs to exactly `size` bytes
/// (spec.md's "length and capacity both equal size") without itself owning
/// an allocation the global allocator knows about — the bytes live inside
/// the owning [`Slab`]'s `mmap` region, kept alive here by the held `Arc`.
///
/// Dropping a `SlabBuf` without passing it to [`Cache::free`] leaks the slot:
/// it stays marked busy in its slab forever. That's a caller bug, not
/// something `Cache` tries to recover from — matching spec.md's framing of
/// a held buffer with `ref != 1` as a fatal contract violation, not a
/// condition to paper over with a `Drop` impl.
pub struct SlabBuf {
    ptr: *mut u8,
    len: usize,
    slab: Arc<Slab>,
}

unsafe impl Send for SlabBuf {}

impl SlabBuf {
    /// Shrinks the visible slice to `n` bytes without touching the
    /// underlying slot — freeing still locates the control header by
    /// stepping back from the slot's base address, not from `len`.
    ///
    /// # Panics
    /// Panics if `n` is longer than the slot this buffer was allocated from.
    pub(crate) fn truncate(&mut self, n: usize) {
        assert!(n <= self.len, "truncate: n exceeds allocated slot size");
        self.len = n;
    }

    /// The full slot size this buffer was allocated from, independent of
    /// any `truncate` applied since.
    pub(crate) fn full_cap(&self) -> usize {
        self.slab.stride - ctl_size()
    }
}

impl Deref for SlabBuf {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(self.ptr, self.len) }
    }
}

impl DerefMut for SlabBuf {
    fn deref_mut(&mut self) -> &mut [u8] {
        unsafe { slice::from_raw_parts_mut(self.ptr, self.len) }
    }
}

fn salloc(slab: &Arc<Slab>) -> Option<SlabBuf> {
    let (_index, base) = slab.alloc()?;
    let ctl_ptr = base as *mut BufCtl;
    let prev = unsafe { (*ctl_ptr).ref_count.fetch_add(1, Ordering::AcqRel) };
    assert_eq!(
        prev, 0,
        "inconsistent slab state: obtained buffer has references"
    );
    let data_ptr = unsafe { base.add(ctl_size()) };
    Some(SlabBuf {
        ptr: data_ptr,
        len: slab.stride - ctl_size(),
        slab: Arc::clone(slab),
    })
}

/// Consumes a `SlabBuf`, returning its owning slab and the slab's
/// post-decrement busy count.
fn sfree(buf: SlabBuf, magic: u32) -> (Arc<Slab>, i32) {
    let ctl_ptr = unsafe { buf.ptr.sub(ctl_size()) } as *mut BufCtl;
    let index = unsafe {
        assert_eq!(
            (*ctl_ptr).magic,
            magic,
            "freeing bytes not known to this cache"
        );
        let prev = (*ctl_ptr).ref_count.fetch_add(-1, Ordering::AcqRel);
        assert_eq!(
            prev, 1,
            "inconsistent slab state: reclaimed buffer has non-zero references"
        );
        (*ctl_ptr).index
    };
    let slab = buf.slab;
    let new_ref = slab.free(index);
    (slab, new_ref)
}

/// Config options for a [`Cache`].
pub struct CacheConfig {
    pub name: Option<String>,
    /// Invoked once per slot at slab creation, on the user-visible byte
    /// range (after the control header).
    pub ctor: Option<Box<dyn Fn(&mut [u8]) + Send + Sync>>,
    /// Reserved for a slab-unmap path this design doesn't have: slabs are
    /// never returned to the OS, so `dtor` is stored but never invoked.
    pub dtor: Option<Box<dyn Fn(&mut [u8]) + Send + Sync>>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            name: None,
            ctor: None,
            dtor: None,
        }
    }
}

struct Topology {
    heap: SlabHeap,
    complete: Vec<Arc<Slab>>,
}

/// Fixed-size object cache: coordinates many slabs of equal-sized buffers,
/// biasing new allocations toward the most-populated partial slab.
pub struct Cache {
    topology: Guarded<Topology>,
    magic: u32,
    buf_size: usize,
    slab_size: usize,
    config: CacheConfig,
}

// In general, if a slab contains n buffers, the internal fragmentation is
// at most 1/n; the SunOS 5.4 implementation limits it to 12.5% (1/8), found
// empirically to be the sweet spot between internal and external
// fragmentation.
fn get_slab_size(sz: usize, p: usize) -> usize {
    let n = sz * 8;
    if n < p {
        return p;
    }
    (n + p - 1) & !(p - 1)
}

impl Cache {
    /// Creates a cache for `size`-byte buffers. No backing memory is
    /// mapped until the first `alloc()`.
    ///
    /// # Panics
    /// Panics if `size == 0`.
    pub fn new(size: usize, config: Option<CacheConfig>) -> Self {
        assert!(size > 0, "size is too small");
        let buf_size = size + ctl_size();
        Self {
            topology: Guarded::new(Topology {
                heap: SlabHeap::new(2),
                complete: Vec::new(),
            }),
            magic: rand::random(),
            buf_size,
            slab_size: get_slab_size(buf_size, platform::page_size()),
            config: config.unwrap_or_default(),
        }
    }

    /// Returns exactly `size` bytes. Never returns `None`; a corrupted
    /// allocator state panics instead.
    pub fn alloc(&self) -> SlabBuf {
        {
            let topo = self.topology.read();
            if let Some(top) = topo.heap.top() {
                if let Some(buf) = salloc(&top) {
                    return buf;
                }
            }
        }

        // Slow path: the optimistic probe above missed (either no slab was
        // in the heap, or a concurrent run of allocs beat us to the last
        // free slot in the top slab).
        let mut topo = self.topology.write();
        topo.heap.heapify();

        if let Some(top) = topo.heap.top() {
            if let Some(buf) = salloc(&top) {
                return buf;
            }
        }

        let s = self.grow(&mut topo.complete);
        topo.heap.push(Arc::clone(&s), 0);

        salloc(&s).expect("slab: can not alloc with new slab")
    }

    /// Returns a buffer previously obtained from this cache's `alloc()`.
    ///
    /// # Panics
    /// Panics on double-free, a foreign buffer, or inconsistent ref state.
    pub fn free(&self, buf: SlabBuf) {
        let (slab, ref_count) = sfree(buf, self.magic);
        if ref_count != 0 {
            return;
        }

        let mut topo = self.topology.write();
        if slab.ref_count() != 0 {
            // Became partial again while we were waiting for the lock.
            return;
        }
        topo.heap.remove(&slab);
        topo.complete.push(slab);
    }

    /// Write lock on `topology` must already be held by the caller.
    fn grow(&self, complete: &mut Vec<Arc<Slab>>) -> Arc<Slab> {
        if let Some(s) = complete.pop() {
            return s;
        }

        let map = AnonMap::new(self.slab_size).expect("mmap failed");
        let n = self.slab_size / self.buf_size;
        let slab = Arc::new(Slab {
            map,
            stride: self.buf_size,
            stack: TaggedStack::new(n),
            busy: AtomicI32::new(0),
        });
        let slab_ptr: *const Slab = Arc::as_ptr(&slab);
        let magic = self.magic;
        let ctor = self.config.ctor.as_deref();

        for i in 0..n {
            let base = slab.slot_ptr(i as i32);
            unsafe {
                (base as *mut BufCtl).write(BufCtl {
                    magic,
                    slab: slab_ptr,
                    index: i as i32,
                    ref_count: AtomicI32::new(0),
                });
                if let Some(ctor) = ctor {
                    let data = slice::from_raw_parts_mut(
                        base.add(ctl_size()),
                        self.buf_size - ctl_size(),
                    );
                    ctor(data);
                }
            }
        }

        slab
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// A slab with no backing memory, suitable only for exercising
    /// [`SlabHeap`]'s bookkeeping (identity and weight), never `alloc`/`free`.
    pub(crate) fn dummy_slab() -> Arc<Slab> {
        Arc::new(Slab {
            map: AnonMap::new(platform::page_size()).expect("mmap failed"),
            stride: 64,
            stack: TaggedStack::new(1),
            busy: AtomicI32::new(0),
        })
    }
}
