// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Port of gobwas/pool/slab/heap_gen.go.
// A d-ary min-heap of partial slabs keyed by "free slots remaining"
// (stored here as a plain weight; see spec.md §9 on why the weight stays 0
// in the allocator's actual usage), with an O(1) reverse index so an
// arbitrary slab can be located and removed without a linear scan.

use std::collections::HashMap;
use std::sync::Arc;

use super::cache::Slab;

#[derive(Clone)]
struct Record {
    x: Arc<Slab>,
    w: i64,
}

/// Identity key for a slab inside the heap's reverse index. Two `Arc<Slab>`
/// clones pointing at the same `Slab` must map to the same key — pointer
/// identity, mirroring Go's `map[*slab]int`.
fn key(x: &Arc<Slab>) -> *const Slab {
    Arc::as_ptr(x)
}

/// A d-ary min-heap over `Arc<Slab>`, ordered by weight.
pub struct SlabHeap {
    d: usize,
    data: Vec<Record>,
    index: HashMap<*const Slab, usize>,
}

impl SlabHeap {
    /// Creates an empty heap with branching factor `d`.
    ///
    /// # Panics
    /// Panics if `d < 2`.
    pub fn new(d: usize) -> Self {
        assert!(d >= 2, "heap branching factor must be at least 2");
        Self {
            d,
            data: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The slab with the smallest weight, without removing it.
    pub fn top(&self) -> Option<Arc<Slab>> {
        self.data.first().map(|r| Arc::clone(&r.x))
    }

    /// Inserts `x` with weight `w`.
    ///
    /// # Panics
    /// Panics if `x` is already present.
    pub fn push(&mut self, x: Arc<Slab>, w: i64) {
        assert!(
            !self.index.contains_key(&key(&x)),
            "could not push value that is already present in heap"
        );
        let i = self.data.len();
        self.index.insert(key(&x), i);
        self.data.push(Record { x, w });
        self.sift_up(i);
    }

    /// Removes and returns the root (smallest-weight slab).
    pub fn pop(&mut self) -> Option<Arc<Slab>> {
        if self.data.is_empty() {
            return None;
        }
        let n = self.data.len();
        self.data.swap(0, n - 1);
        if n > 1 {
            self.index.insert(key(&self.data[0].x), 0);
        }
        let popped = self.data.pop().unwrap();
        self.index.remove(&key(&popped.x));
        self.sift_down(0);
        Some(popped.x)
    }

    /// Removes `x` from the heap wherever it sits, in O(log n).
    pub fn remove(&mut self, x: &Arc<Slab>) {
        if let Some(&i) = self.index.get(&key(x)) {
            self.sift_to_root(i);
            self.pop();
        }
    }

    /// Rebuilds heap order bottom-up. Idempotent on an already-valid heap.
    pub fn heapify(&mut self) {
        let start = if self.d == 0 {
            0
        } else {
            self.data.len() / self.d
        };
        for i in (0..start).rev() {
            self.sift_down(i);
        }
    }

    /// Applies `f` to the current weight of `x` and repositions it.
    ///
    /// # Panics
    /// Panics if `x` is not present.
    pub fn with_priority(&mut self, x: &Arc<Slab>, f: impl FnOnce(i64) -> i64) {
        let i = *self
            .index
            .get(&key(x))
            .expect("could not update value that is not present in heap");
        let new_w = f(self.data[i].w);
        self.update(i, new_w);
    }

    /// Sets the weight of `x` directly and repositions it.
    ///
    /// # Panics
    /// Panics if `x` is not present.
    pub fn change_priority(&mut self, x: &Arc<Slab>, w: i64) {
        let i = *self
            .index
            .get(&key(x))
            .expect("could not update value that is not present in heap");
        self.update(i, w);
    }

    /// `weight(a) - weight(b)` for two heap-resident slabs.
    ///
    /// # Panics
    /// Panics if either is absent.
    pub fn compare(&self, a: &Arc<Slab>, b: &Arc<Slab>) -> i64 {
        let i = *self
            .index
            .get(&key(a))
            .expect("comparing record that not in heap");
        let j = *self
            .index
            .get(&key(b))
            .expect("comparing record that not in heap");
        self.data[i].w - self.data[j].w
    }

    /// Visits every item in weight order. Internally pops from a cloned
    /// snapshot, so the heap itself — `data` and `index` both — is left
    /// exactly as it was before the call; unlike `pop`, this never changes
    /// which slab is at the root. Stops early if `it` returns `false`.
    pub fn ascend(&mut self, mut it: impl FnMut(&Arc<Slab>, i64) -> bool) {
        let d = self.d;
        let mut data = self.data.clone();
        let mut index: HashMap<*const Slab, usize> = data
            .iter()
            .enumerate()
            .map(|(i, r)| (key(&r.x), i))
            .collect();

        while !data.is_empty() {
            let keep_going = it(&data[0].x, data[0].w);
            let last = data.len() - 1;
            data.swap(0, last);
            data.pop();
            if !data.is_empty() {
                Self::sift_down_in(&mut data, &mut index, d, 0);
            }
            if !keep_going {
                break;
            }
        }
    }

    /// Visits every item, in unspecified order, without perturbing heap
    /// structure. Stops early if `it` returns `false`.
    pub fn for_each(&self, mut it: impl FnMut(&Arc<Slab>, i64) -> bool) {
        for r in &self.data {
            if !it(&r.x, r.w) {
                return;
            }
        }
    }

    fn update(&mut self, i: usize, w: i64) {
        let prev_w = self.data[i].w;
        self.data[i].w = w;
        if w > prev_w {
            self.sift_down(i);
        } else {
            self.sift_up(i);
        }
    }

    /// Moves the item at `i` all the way to the root by repeated swaps with
    /// its parent, ignoring weight order — used by `remove` to bring an
    /// arbitrary element to a position `pop` can cheaply evict.
    fn sift_to_root(&mut self, mut i: usize) {
        while i > 0 {
            let parent = (i - 1) / self.d;
            self.swap(parent, i);
            i = parent;
        }
    }

    fn sift_down(&mut self, root: usize) {
        let d = self.d;
        let mut data = std::mem::take(&mut self.data);
        Self::sift_down_in(&mut data, &mut self.index, d, root);
        self.data = data;
    }

    fn sift_down_in(
        data: &mut Vec<Record>,
        index: &mut HashMap<*const Slab, usize>,
        d: usize,
        mut root: usize,
    ) {
        loop {
            let mut min = root;
            for i in 1..=d {
                let child = d * root + i;
                if child >= data.len() {
                    break;
                }
                if data[child].w < data[min].w {
                    min = child;
                }
            }
            if min == root {
                return;
            }
            index.insert(key(&data[root].x), min);
            index.insert(key(&data[min].x), root);
            data.swap(root, min);
            root = min;
        }
    }

    fn sift_up(&mut self, mut root: usize) {
        while root > 0 {
            let parent = (root - 1) / self.d;
            if self.data[root].w >= self.data[parent].w {
                return;
            }
            self.swap(parent, root);
            root = parent;
        }
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.index.insert(key(&self.data[a].x), b);
        self.index.insert(key(&self.data[b].x), a);
        self.data.swap(a, b);
    }
}
