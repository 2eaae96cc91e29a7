// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Windows anonymous memory mapping for slab backing storage. VirtualAlloc
// plays the same role `mmap(MAP_ANONYMOUS)` does on POSIX.

use std::io;

/// The OS page / allocation granularity, queried once per process.
pub fn page_size() -> usize {
    use windows_sys::Win32::System::SystemInformation::GetSystemInfo;
    static PAGE_SIZE: std::sync::OnceLock<usize> = std::sync::OnceLock::new();
    *PAGE_SIZE.get_or_init(|| unsafe {
        let mut info = std::mem::zeroed();
        GetSystemInfo(&mut info);
        info.dwPageSize as usize
    })
}

/// An anonymous, page-backed memory mapping owned for the lifetime of one
/// `Slab`.
pub struct AnonMap {
    ptr: *mut u8,
    len: usize,
}

unsafe impl Send for AnonMap {}
unsafe impl Sync for AnonMap {}

impl AnonMap {
    /// Reserves and commits `len` bytes of fresh, zeroed memory.
    pub fn new(len: usize) -> io::Result<Self> {
        use windows_sys::Win32::System::Memory::{
            VirtualAlloc, MEM_COMMIT, MEM_RESERVE, PAGE_READWRITE,
        };
        assert!(len > 0, "AnonMap: len must be positive");
        let mem = unsafe {
            VirtualAlloc(
                std::ptr::null(),
                len,
                MEM_COMMIT | MEM_RESERVE,
                PAGE_READWRITE,
            )
        };
        if mem.is_null() {
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
        use windows_sys::Win32::System::Memory::{VirtualFree, MEM_RELEASE};
        unsafe {
            VirtualFree(self.ptr as *mut std::ffi::c_void, 0, MEM_RELEASE);
        }
    }
}
