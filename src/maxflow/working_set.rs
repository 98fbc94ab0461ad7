/*
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use crossbeam_utils::CachePadded;
use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A fixed-capacity concurrent buffer of nodes.
///
/// Nodes are appended with [`push`](Self::push) or
/// [`batch_push`](Self::batch_push), and consumed through a separate cursor
/// using [`get_and_add`](Self::get_and_add) (or its convenience wrapper
/// [`claim`](Self::claim)) and [`pop`](Self::pop). The only mutations of the
/// two shared counters are atomic fetch-and-add operations, so the structure
/// is lock free.
///
/// The buffer never grows: the capacity passed to [`new`](Self::new) must be
/// at least the maximum number of nodes that will be appended between two
/// calls to [`reset`](Self::reset). In this crate the capacity is always the
/// number of nodes of the flow graph, and callers deduplicate insertions, so
/// the bound cannot be exceeded. Exceeding the capacity is a contract
/// violation and causes a panic.
///
/// Appending and consuming are meant to happen in different generations of
/// tasks (see [`run_with_concurrency`](crate::utils::run_with_concurrency)):
/// a consumer reading while another thread is appending might see a slot
/// that has been reserved but not yet written.
///
/// # Failed claims
///
/// When [`pop`](Self::pop) or [`claim`](Self::claim) find that the cursor is
/// past the end of the buffer, the cursor is *not* rolled back: a failed claim
/// is permanently consumed. Rolling back would let a late pusher's element be
/// claimed twice (once by the retrying thread and once by the thread that
/// observed the rollback), and it would make termination depend on the
/// interleaving of threads. Since the cursor only moves forward, every call
/// either returns a fresh element or fails, and once it fails it fails for
/// every thread until [`reset_idx`](Self::reset_idx) is called.
#[derive(Debug)]
pub struct AtomicWorkingSet {
    data: Box<[AtomicUsize]>,
    size: CachePadded<AtomicUsize>,
    idx: CachePadded<AtomicUsize>,
}

impl AtomicWorkingSet {
    /// Creates a new empty working set with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            data: (0..capacity).map(|_| AtomicUsize::new(0)).collect(),
            size: CachePadded::new(AtomicUsize::new(0)),
            idx: CachePadded::new(AtomicUsize::new(0)),
        }
    }

    /// Returns the capacity of the working set.
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Returns the number of nodes appended since the last reset.
    #[inline(always)]
    pub fn size(&self) -> usize {
        self.size.load(Ordering::Acquire)
    }

    /// Returns true if no node has been appended since the last reset.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Appends a node.
    ///
    /// # Panics
    ///
    /// Panics if the working set is full.
    #[inline]
    pub fn push(&self, node: usize) {
        let pos = self.size.fetch_add(1, Ordering::AcqRel);
        assert!(
            pos < self.data.len(),
            "Working set overflow: capacity is {}",
            self.data.len()
        );
        self.data[pos].store(node, Ordering::Relaxed);
    }

    /// Appends a batch of nodes, reserving a contiguous range of slots with a
    /// single atomic operation.
    ///
    /// # Panics
    ///
    /// Panics if the working set cannot accommodate the batch.
    pub fn batch_push(&self, nodes: &[usize]) {
        if nodes.is_empty() {
            return;
        }
        let start = self.size.fetch_add(nodes.len(), Ordering::AcqRel);
        assert!(
            start + nodes.len() <= self.data.len(),
            "Working set overflow: cannot add {} nodes at position {} (capacity is {})",
            nodes.len(),
            start,
            self.data.len()
        );
        for (slot, &node) in self.data[start..start + nodes.len()].iter().zip(nodes) {
            slot.store(node, Ordering::Relaxed);
        }
    }

    /// Atomically advances the consumption cursor by `batch_size` and returns
    /// its previous value.
    ///
    /// The caller owns the indices in the returned position plus
    /// `batch_size`, intersected with [0 . . [`size`](Self::size)).
    #[inline(always)]
    pub fn get_and_add(&self, batch_size: usize) -> usize {
        self.idx.fetch_add(batch_size, Ordering::AcqRel)
    }

    /// Claims a range of at most `batch_size` indices, or returns `None` if
    /// the buffer has been consumed.
    #[inline]
    pub fn claim(&self, batch_size: usize) -> Option<Range<usize>> {
        let size = self.size();
        let start = self.get_and_add(batch_size);
        (start < size).then(|| start..size.min(start + batch_size))
    }

    /// Claims and returns a single node, or `None` if the buffer has been
    /// consumed.
    #[inline]
    pub fn pop(&self) -> Option<usize> {
        let pos = self.get_and_add(1);
        // The increment is not undone on failure.
        (pos < self.size()).then(|| self.data[pos].load(Ordering::Relaxed))
    }

    /// Returns the node at the given position.
    #[inline(always)]
    pub fn get(&self, index: usize) -> usize {
        debug_assert!(index < self.size());
        self.data[index].load(Ordering::Relaxed)
    }

    /// Returns an iterator over the nodes currently in the working set.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.data[..self.size().min(self.data.len())]
            .iter()
            .map(|slot| slot.load(Ordering::Relaxed))
    }

    /// Empties the working set.
    pub fn reset(&self) {
        self.size.store(0, Ordering::Release);
        self.idx.store(0, Ordering::Release);
    }

    /// Rewinds the consumption cursor, so that the current content can be
    /// consumed again.
    pub fn reset_idx(&self) {
        self.idx.store(0, Ordering::Release);
    }
}
