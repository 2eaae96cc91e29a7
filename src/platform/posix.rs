// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// POSIX anonymous memory mapping for slab backing storage. Port of the
// mmap half of gobwas/pool/slab/cache.go's grow() (syscall.Mmap) plus the
// page-size half of getSlabSize().

use std::io;
use std::ptr;

/// The OS page size, queried once per process.
pub fn page_size() -> usize {
    static PAGE_SIZE: std::sync::OnceLock<usize> = std::sync::OnceLock::new();
    *PAGE_SIZE.get_or_init(|| unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize })
}

/// An anonymous, page-backed memory mapping owned for the lifetime of one
/// `Slab`. Mapped read/write, shared (not copy-on-write) — matches
/// `slab/cache.go`'s `syscall.Mmap(..., MAP_SHARED|MAP_ANONYMOUS)`, minus
/// the historical `PROT_EXEC` spec.md notes is unnecessary.
pub struct AnonMap {
    ptr: *mut u8,
    len: usize,
}

// Safety: the mapping is exclusively owned by the `Slab`/`Cache` that holds
// it; shared access to the bytes inside is mediated by the slab's own
// lock-free stack and atomic ref counts, not by this type.
unsafe impl Send for AnonMap {}
unsafe impl Sync for AnonMap {}

impl AnonMap {
    /// Maps `len` bytes of fresh, zeroed, anonymous memory.
    pub fn new(len: usize) -> io::Result<Self> {
        assert!(len > 0, "AnonMap: len must be positive");
        let mem = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if mem == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }
        Ok(Self {
            ptr: mem as *mut u8,
            len,
        })
    }

    /// Pointer to the start of the mapping.
    pub fn as_mut_ptr(&self) -> *mut u8 {
        self.ptr
    }

    /// Size of the mapping in bytes.
    pub fn len(&self) -> usize {
        self.len
    }
}

impl Drop for AnonMap {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.ptr as *mut libc::c_void, self.len);
        }
    }
}
