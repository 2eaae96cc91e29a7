// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Port of gobwas/pool/pbufio/pbufio.go.
// Out of the core slab subsystem by spec (§1): a thin size-indexed free-list
// of buffered reader/writer objects, layered directly on pool_map.
//
// std::io::BufReader/BufWriter expose no `Size()`/capacity accessor and no
// `Reset(new_inner)` the way Go's bufio.Reader/Writer do, so this hand-rolls
// the minimal buffering needed to (a) remember its own configured size and
// (b) swap its inner source/sink without reallocating the buffer — the
// "probe trick" spec.md anticipates turns out unnecessary once the buffer is
// our own type instead of borrowed from std.

use std::io::{self, Read, Write};

use crate::pool_map::PoolMap;
use crate::pow2::ceil_pow2;

const DEFAULT_BUF_SIZE: usize = 4096;

/// A buffered reader over a type-erased byte source, reusable across
/// sources of the same pooled buffer size.
pub struct PooledReader {
    buf: Vec<u8>,
    pos: usize,
    filled: usize,
    src: Box<dyn Read + Send>,
}

impl PooledReader {
    fn new(src: Box<dyn Read + Send>, size: usize) -> Self {
        Self {
            buf: vec![0; size],
            pos: 0,
            filled: 0,
            src,
        }
    }

    /// Buffer capacity this reader was constructed with.
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Swaps in a new source, discarding any buffered bytes from the old one.
    pub fn reset(&mut self, src: Box<dyn Read + Send>) {
        self.pos = 0;
        self.filled = 0;
        self.src = src;
    }

    /// Detaches the underlying source, replacing it with an empty reader so
    /// the pooled instance doesn't keep the original source alive.
    fn detach(&mut self) {
        self.pos = 0;
        self.filled = 0;
        self.src = Box::new(io::empty());
    }
}

impl Read for PooledReader {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if self.pos == self.filled {
            if out.len() >= self.buf.len() {
                return self.src.read(out);
            }
            self.pos = 0;
            self.filled = self.src.read(&mut self.buf)?;
            if self.filled == 0 {
                return Ok(0);
            }
        }
        let n = (self.filled - self.pos).min(out.len());
        out[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// A buffered writer over a type-erased byte sink, reusable across sinks of
/// the same pooled buffer size.
pub struct PooledWriter {
    buf: Vec<u8>,
    used: usize,
    dst: Box<dyn Write + Send>,
}

impl PooledWriter {
    fn new(dst: Box<dyn Write + Send>, size: usize) -> Self {
        Self {
            buf: vec![0; size],
            used: 0,
            dst,
        }
    }

    /// Buffer capacity this writer was constructed with.
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Swaps in a new sink. Does not flush the old one — callers that care
    /// about pending bytes must `flush()` first.
    pub fn reset(&mut self, dst: Box<dyn Write + Send>) {
        self.used = 0;
        self.dst = dst;
    }

    /// Flushes then detaches the underlying sink, replacing it with a sink
    /// so the pooled instance doesn't keep the original destination alive.
    fn detach(&mut self) {
        let _ = self.flush();
        self.used = 0;
        self.dst = Box::new(io::sink());
    }
}

impl Write for PooledWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.used == 0 && data.len() >= self.buf.len() {
            return self.dst.write(data);
        }
        let room = self.buf.len() - self.used;
        let n = room.min(data.len());
        self.buf[self.used..self.used + n].copy_from_slice(&data[..n]);
        self.used += n;
        if self.used == self.buf.len() {
            self.flush()?;
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.used > 0 {
            self.dst.write_all(&self.buf[..self.used])?;
            self.used = 0;
        }
        self.dst.flush()
    }
}

impl Drop for PooledWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

static READERS: std::sync::OnceLock<PoolMap<PooledReader>> = std::sync::OnceLock::new();
static WRITERS: std::sync::OnceLock<PoolMap<PooledWriter>> = std::sync::OnceLock::new();

fn readers() -> &'static PoolMap<PooledReader> {
    READERS.get_or_init(|| PoolMap::new(256, 65536))
}

fn writers() -> &'static PoolMap<PooledWriter> {
    WRITERS.get_or_init(|| PoolMap::new(256, 65536))
}

/// Returns a `PooledReader` over `src` with the given buffer size (rounded
/// up to the nearest power of two). Sizes outside the configured range
/// bypass pooling entirely.
pub fn get_reader(src: impl Read + Send + 'static, size: usize) -> PooledReader {
    let n = ceil_pow2(size);
    match readers().get(n) {
        Some(mut r) => {
            r.reset(Box::new(src));
            r
        }
        None => PooledReader::new(Box::new(src), size.max(1)),
    }
}

/// Returns a `PooledReader` for future reuse. `size` should be `0` (use the
/// reader's own recorded capacity) unless the caller wants to force a
/// different bucket.
pub fn put_reader(mut r: PooledReader) {
    let size = if r.capacity() == 0 {
        DEFAULT_BUF_SIZE
    } else {
        r.capacity()
    };
    let n = ceil_pow2(size);
    if readers().has_bucket(n) {
        r.detach();
        readers().put(n, r);
    }
}

/// Returns a `PooledWriter` over `dst` with the given buffer size (rounded
/// up to the nearest power of two). Sizes outside the configured range
/// bypass pooling entirely.
pub fn get_writer(dst: impl Write + Send + 'static, size: usize) -> PooledWriter {
    let n = ceil_pow2(size);
    match writers().get(n) {
        Some(mut w) => {
            w.reset(Box::new(dst));
            w
        }
        None => PooledWriter::new(Box::new(dst), size.max(1)),
    }
}

/// Returns a `PooledWriter` for future reuse. `size` should be `0` (use the
/// writer's own recorded capacity) unless the caller wants to force a
/// different bucket.
pub fn put_writer(mut w: PooledWriter) {
    let size = if w.capacity() == 0 {
        DEFAULT_BUF_SIZE
    } else {
        w.capacity()
    };
    let n = ceil_pow2(size);
    if writers().has_bucket(n) {
        w.detach();
        writers().put(n, w);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read, Write};

    #[test]
    fn reader_round_trips_through_pool() {
        let src = Cursor::new(b"hello world".to_vec());
        let mut r = get_reader(src, 512);
        let mut out = Vec::new();
        r.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"hello world");
        let cap = r.capacity();
        put_reader(r);

        let src2 = Cursor::new(b"second".to_vec());
        let mut r2 = get_reader(src2, 512);
        assert_eq!(r2.capacity(), cap);
        let mut out2 = Vec::new();
        r2.read_to_end(&mut out2).unwrap();
        assert_eq!(out2, b"second");
    }

    #[test]
    fn writer_buffers_and_flushes() {
        let dst: Vec<u8> = Vec::new();
        let mut w = get_writer(dst, 512);
        w.write_all(b"abc").unwrap();
        w.flush().unwrap();
        put_writer(w);
    }

    #[test]
    fn out_of_range_size_bypasses_pool() {
        let src = Cursor::new(b"tiny".to_vec());
        // 8 bytes is below the configured [256, 65536] range.
        let mut r = get_reader(src, 8);
        let mut out = Vec::new();
        r.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"tiny");
        put_reader(r); // silently dropped, not pooled
    }
}
