// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Anonymous-mapping backend for slab storage. Trimmed from the named-shm
// platform layer this crate started from: spec.md's Non-goals exclude
// cross-process sharing, so only an anonymous page mapping is needed — no
// shm_open/CreateFileMapping naming, no trailing ref counter.

#[cfg(unix)]
pub mod posix;

#[cfg(windows)]
pub mod windows;

#[cfg(unix)]
pub use posix::{page_size, AnonMap};

#[cfg(windows)]
pub use windows::{page_size, AnonMap};
