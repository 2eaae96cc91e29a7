// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Port of cpp-ipc/include/libipc/rw_lock.h (rw_lock class).
// Single-word atomic read-write lock using bit flags.
// - High bit (w_flag) marks exclusive/write lock.
// - Low bits count concurrent shared/read locks.

use std::sync::atomic::{AtomicU32, Ordering};

/// Adaptive backoff (shared with spin_lock).
#[inline]
fn adaptive_yield(k: &mut u32) {
    if *k < 4 {
        // busy spin
    } else if *k < 16 {
        std::hint::spin_loop();
    } else if *k < 32 {
        std::thread::yield_now();
    } else {
        std::thread::sleep(std::time::Duration::from_millis(1));
        return;
    }
    *k += 1;
}

const W_MASK: u32 = i32::MAX as u32;   // 0x7FFF_FFFF — reader count mask
const W_FLAG: u32 = W_MASK + 1;        // 0x8000_0000 — writer flag

/// A single-word atomic read-write lock.
///
/// Port of `ipc::rw_lock` from cpp-ipc. Writers get exclusive access,
/// multiple readers can hold the lock concurrently.
///
/// The high bit signals a write lock; the remaining 31 bits count active readers.
pub struct RwLock {
    lc: AtomicU32,
}

impl RwLock {
    /// Create a new unlocked read-write lock.
    pub const fn new() -> Self {
        Self { lc: AtomicU32::new(0) }
    }

    /// Acquire an exclusive (write) lock.
    pub fn lock(&self) {
        let mut k = 0u32;
        loop {
            let old = self.lc.fetch_or(W_FLAG, Ordering::AcqRel);
            if old == 0 {
                return; // got w-lock, no readers
            }
            if old & W_FLAG == 0 {
                break; // readers present but no other writer — wait for them to finish
            }
            // another writer holds the lock, spin
            adaptive_yield(&mut k);
        }
        // Wait for all readers to finish
        let mut k = 0u32;
        while self.lc.load(Ordering::Acquire) & W_MASK != 0 {
            adaptive_yield(&mut k);
        }
    }

    /// Release the exclusive (write) lock.
    pub fn unlock(&self) {
        self.lc.store(0, Ordering::Release);
    }

    /// Acquire a shared (read) lock.
    pub fn lock_shared(&self) {
        let mut old = self.lc.load(Ordering::Acquire);
        let mut k = 0u32;
        loop {
            if old & W_FLAG != 0 {
                // writer is active, spin
                adaptive_yield(&mut k);
                old = self.lc.load(Ordering::Acquire);
            } else if self
                .lc
                .compare_exchange_weak(old, old + 1, Ordering::Release, Ordering::Relaxed)
                .is_ok()
            {
                return;
            } else {
                // CAS failed, `old` has been updated by compare_exchange_weak
                old = self.lc.load(Ordering::Acquire);
            }
        }
    }

    /// Release a shared (read) lock.
    pub fn unlock_shared(&self) {
        self.lc.fetch_sub(1, Ordering::Release);
    }
}

impl Default for RwLock {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl Send for RwLock {}
unsafe impl Sync for RwLock {}

/// `RwLock` above is the bare cpp-ipc primitive — no associated data, just
/// lock/unlock calls the caller has to pair up by hand. `Guarded<T>` pairs
/// it with the data it protects and hands out RAII guards, for call sites
/// that would otherwise need to remember to call `unlock`/`unlock_shared`
/// on every return path.
pub struct Guarded<T> {
    lock: RwLock,
    data: std::cell::UnsafeCell<T>,
}

unsafe impl<T: Send> Send for Guarded<T> {}
unsafe impl<T: Send> Sync for Guarded<T> {}

impl<T> Guarded<T> {
    pub fn new(value: T) -> Self {
        Self {
            lock: RwLock::new(),
            data: std::cell::UnsafeCell::new(value),
        }
    }

    pub fn read(&self) -> ReadGuard<'_, T> {
        self.lock.lock_shared();
        ReadGuard { owner: self }
    }

    pub fn write(&self) -> WriteGuard<'_, T> {
        self.lock.lock();
        WriteGuard { owner: self }
    }
}

pub struct ReadGuard<'a, T> {
    owner: &'a Guarded<T>,
}

impl<T> std::ops::Deref for ReadGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.owner.data.get() }
    }
}

impl<T> Drop for ReadGuard<'_, T> {
    fn drop(&mut self) {
        self.owner.lock.unlock_shared();
    }
}

pub struct WriteGuard<'a, T> {
    owner: &'a Guarded<T>,
}

impl<T> std::ops::Deref for WriteGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.owner.data.get() }
    }
}

impl<T> std::ops::DerefMut for WriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.owner.data.get() }
    }
}

impl<T> Drop for WriteGuard<'_, T> {
    fn drop(&mut self) {
        self.owner.lock.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    // Port of RWLockTest.BasicWriteLock
    #[test]
    fn basic_write_lock() {
        let lock = RwLock::new();
        lock.lock();
        lock.unlock();
    }

    // Port of RWLockTest.BasicReadLock
    #[test]
    fn basic_read_lock() {
        let lock = RwLock::new();
        lock.lock_shared();
        lock.unlock_shared();
    }

    // Port of RWLockTest.MultipleWriteCycles
    #[test]
    fn multiple_write_cycles() {
        let lock = RwLock::new();
        for _ in 0..100 {
            lock.lock();
            lock.unlock();
        }
    }

    // Port of RWLockTest.MultipleReadCycles
    #[test]
    fn multiple_read_cycles() {
        let lock = RwLock::new();
        for _ in 0..100 {
            lock.lock_shared();
            lock.unlock_shared();
        }
    }

    // Port of RWLockTest.WriteLockProtection
    #[test]
    fn write_lock_protection() {
        let lock = Arc::new(Guarded::new(0usize));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let lock = Arc::clone(&lock);
            handles.push(thread::spawn(move || {
                for _ in 0..1000 {
                    *lock.write() += 1;
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(*lock.read(), 8000);
    }

    // Port of RWLockTest.ConcurrentReaders
    #[test]
    fn concurrent_readers() {
        let lock = Arc::new(Guarded::new(42usize));
        let seen = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let lock = Arc::clone(&lock);
            let seen = Arc::clone(&seen);
            handles.push(thread::spawn(move || {
                let g = lock.read();
                assert_eq!(*g, 42);
                seen.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(5));
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(seen.load(Ordering::SeqCst), 8);
    }

    // Port of RWLockTest.WriterExclusiveAccess
    #[test]
    fn writer_exclusive_access() {
        let lock = Arc::new(Guarded::new(0usize));
        let active = Arc::new(AtomicUsize::new(0));
        let max_active = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let lock = Arc::clone(&lock);
            let active = Arc::clone(&active);
            let max_active = Arc::clone(&max_active);
            handles.push(thread::spawn(move || {
                let mut g = lock.write();
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                max_active.fetch_max(now, Ordering::SeqCst);
                *g += 1;
                active.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(max_active.load(Ordering::SeqCst), 1);
        assert_eq!(*lock.read(), 8);
    }

    // Port of RWLockTest.ReadersWritersNoOverlap
    #[test]
    fn readers_writers_no_overlap() {
        let lock = Arc::new(Guarded::new(0usize));
        let writers_active = Arc::new(AtomicUsize::new(0));
        let readers_active = Arc::new(AtomicUsize::new(0));
        let violated = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();

        for _ in 0..4 {
            let lock = Arc::clone(&lock);
            let writers_active = Arc::clone(&writers_active);
            let readers_active = Arc::clone(&readers_active);
            let violated = Arc::clone(&violated);
            handles.push(thread::spawn(move || {
                let mut g = lock.write();
                writers_active.fetch_add(1, Ordering::SeqCst);
                if readers_active.load(Ordering::SeqCst) != 0 {
                    violated.fetch_add(1, Ordering::SeqCst);
                }
                *g += 1;
                writers_active.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for _ in 0..4 {
            let lock = Arc::clone(&lock);
            let writers_active = Arc::clone(&writers_active);
            let readers_active = Arc::clone(&readers_active);
            let violated = Arc::clone(&violated);
            handles.push(thread::spawn(move || {
                let _g = lock.read();
                readers_active.fetch_add(1, Ordering::SeqCst);
                if writers_active.load(Ordering::SeqCst) != 0 {
                    violated.fetch_add(1, Ordering::SeqCst);
                }
                readers_active.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(violated.load(Ordering::SeqCst), 0);
    }

    // Port of RWLockTest.ReadWriteReadPattern
    #[test]
    fn read_write_read_pattern() {
        let lock = Guarded::new(1usize);
        assert_eq!(*lock.read(), 1);
        *lock.write() = 2;
        assert_eq!(*lock.read(), 2);
    }

    // Port of RWLockTest.ManyReadersOneWriter
    #[test]
    fn many_readers_one_writer() {
        let lock = Arc::new(Guarded::new(0usize));
        let mut handles = Vec::new();
        for _ in 0..31 {
            let lock = Arc::clone(&lock);
            handles.push(thread::spawn(move || {
                let _g = lock.read();
                thread::sleep(Duration::from_micros(100));
            }));
        }
        {
            let lock = Arc::clone(&lock);
            handles.push(thread::spawn(move || {
                *lock.write() += 1;
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(*lock.read(), 1);
    }

    // Port of RWLockTest.RapidReadLocks
    #[test]
    fn rapid_read_locks() {
        let lock = RwLock::new();
        for _ in 0..10_000 {
            lock.lock_shared();
            lock.unlock_shared();
        }
    }

    // Port of RWLockTest.RapidWriteLocks
    #[test]
    fn rapid_write_locks() {
        let lock = RwLock::new();
        for _ in 0..10_000 {
            lock.lock();
            lock.unlock();
        }
    }

    // Port of RWLockTest.MixedRapidOperations
    #[test]
    fn mixed_rapid_operations() {
        let lock = RwLock::new();
        for i in 0..10_000 {
            if i % 2 == 0 {
                lock.lock_shared();
                lock.unlock_shared();
            } else {
                lock.lock();
                lock.unlock();
            }
        }
    }

    // Port of RWLockTest.WriteLockBlocksReaders
    #[test]
    fn write_lock_blocks_readers() {
        let lock = Arc::new(Guarded::new(0usize));
        let writer_done = Arc::new(AtomicUsize::new(0));

        let w_lock = Arc::clone(&lock);
        let w_done = Arc::clone(&writer_done);
        let writer = thread::spawn(move || {
            let mut g = w_lock.write();
            thread::sleep(Duration::from_millis(20));
            *g = 99;
            w_done.store(1, Ordering::SeqCst);
        });

        thread::sleep(Duration::from_millis(5));
        let r_lock = Arc::clone(&lock);
        let r_done = Arc::clone(&writer_done);
        let reader = thread::spawn(move || {
            let g = r_lock.read();
            assert_eq!(r_done.load(Ordering::SeqCst), 1);
            assert_eq!(*g, 99);
        });

        writer.join().unwrap();
        reader.join().unwrap();
    }

    // Port of RWLockTest.MultipleWriteLockPattern
    #[test]
    fn multiple_write_lock_pattern() {
        let lock = Arc::new(Guarded::new(Vec::<usize>::new()));
        let mut handles = Vec::new();
        for i in 0..16 {
            let lock = Arc::clone(&lock);
            handles.push(thread::spawn(move || {
                lock.write().push(i);
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(lock.read().len(), 16);
    }

    // Port of RWLockTest.ConcurrentMixedOperations
    #[test]
    fn concurrent_mixed_operations() {
        let lock = Arc::new(Guarded::new(0i64));
        let mut handles = Vec::new();
        for i in 0..20 {
            let lock = Arc::clone(&lock);
            handles.push(thread::spawn(move || {
                if i % 3 == 0 {
                    *lock.write() += 1;
                } else {
                    let _ = *lock.read();
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        let expected = (0..20).filter(|i| i % 3 == 0).count() as i64;
        assert_eq!(*lock.read(), expected);
    }
}
