/*
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Gap detection.
//!
//! If labels are valid (for every residual arc (*u*, *v*), *d*(*u*) ≤
//! *d*(*v*) + 1) and no node has label *g*, then no node with label greater
//! than *g* can reach the sink: every residual path to the sink decreases
//! labels by at most one at each step, so it would have to cross label *g*.
//! All such nodes can thus be retired at once by setting their label to the
//! sentinel value.
//!
//! The three detectors in this module implement the same contract and differ
//! in how they find the nodes to retire: [`CountsGap`] keeps just a counter
//! per label and scans the whole label array, whereas [`BucketsGap`] and
//! [`SortedSetGap`] keep the members of each label and visit exactly the
//! retired nodes. [`CountsGap`] uses atomic counters and can be updated
//! concurrently.
//!
//! Nodes whose label is the sentinel are never tracked.

use super::Gap;
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A gap detector, chosen at construction among the available strategies.
#[derive(Debug)]
pub enum GapDetector {
    /// No gap detection: [`move_from`](GapDetector::move_from) never reports
    /// a gap.
    None,
    Counts(CountsGap),
    Buckets(BucketsGap),
    SortedSet(SortedSetGap),
}

impl GapDetector {
    /// Creates a gap detector of the given kind for labels in [0 . .
    /// `sentinel`]. The sentinel is the number of nodes of the flow graph.
    pub fn new(kind: Gap, sentinel: usize) -> Self {
        match kind {
            Gap::None => GapDetector::None,
            Gap::Counts => GapDetector::Counts(CountsGap::new(sentinel)),
            Gap::Buckets => GapDetector::Buckets(BucketsGap::new(sentinel)),
            Gap::SortedSet => GapDetector::SortedSet(SortedSetGap::new(sentinel)),
        }
    }

    /// Rebuilds the state of the detector from a label array.
    pub fn reset_counts(&mut self, labels: &[usize]) {
        match self {
            GapDetector::None => {}
            GapDetector::Counts(g) => g.reset_counts(labels),
            GapDetector::Buckets(g) => g.reset_counts(labels),
            GapDetector::SortedSet(g) => g.reset_counts(labels),
        }
    }

    /// Records that the label of `node` changed from `from` to `to`, and
    /// returns whether no node has label `from` anymore.
    ///
    /// Moving from the sentinel never reports a gap.
    #[inline]
    pub fn move_from(&mut self, node: usize, from: usize, to: usize) -> bool {
        match self {
            GapDetector::None => false,
            GapDetector::Counts(g) => g.move_from(from, to),
            GapDetector::Buckets(g) => g.move_from(node, from, to),
            GapDetector::SortedSet(g) => g.move_from(node, from, to),
        }
    }

    /// Sets to the sentinel the label of every node whose label is greater
    /// than `gap`, and returns the number of relabeled nodes.
    pub fn relabel(&mut self, gap: usize, labels: &mut [usize]) -> usize {
        match self {
            GapDetector::None => 0,
            GapDetector::Counts(g) => g.relabel(gap, labels),
            GapDetector::Buckets(g) => g.relabel(gap, labels),
            GapDetector::SortedSet(g) => g.relabel(gap, labels),
        }
    }

    /// Returns whether no node has the given label.
    ///
    /// Without gap detection, this method always returns false.
    pub fn is_empty(&self, label: usize) -> bool {
        match self {
            GapDetector::None => false,
            GapDetector::Counts(g) => g.is_empty(label),
            GapDetector::Buckets(g) => g.is_empty(label),
            GapDetector::SortedSet(g) => g.is_empty(label),
        }
    }
}

/// A gap detector keeping an atomic counter per label.
///
/// All methods take `&self`, so label changes can be recorded concurrently;
/// [`relabel`](CountsGap::relabel) scans the whole label array in parallel.
#[derive(Debug)]
pub struct CountsGap {
    counts: Box<[AtomicUsize]>,
    sentinel: usize,
}

impl CountsGap {
    pub fn new(sentinel: usize) -> Self {
        Self {
            counts: (0..sentinel).map(|_| AtomicUsize::new(0)).collect(),
            sentinel,
        }
    }

    pub fn reset_counts(&self, labels: &[usize]) {
        self.counts
            .par_iter()
            .with_min_len(sux::RAYON_MIN_LEN)
            .for_each(|c| c.store(0, Ordering::Relaxed));
        labels
            .par_iter()
            .with_min_len(sux::RAYON_MIN_LEN)
            .filter(|&&label| label < self.sentinel)
            .for_each(|&label| {
                self.counts[label].fetch_add(1, Ordering::Relaxed);
            });
    }

    #[inline]
    pub fn move_from(&self, from: usize, to: usize) -> bool {
        if to < self.sentinel {
            self.counts[to].fetch_add(1, Ordering::Relaxed);
        }
        from < self.sentinel && self.counts[from].fetch_sub(1, Ordering::Relaxed) == 1
    }

    pub fn relabel(&self, gap: usize, labels: &mut [usize]) -> usize {
        let sentinel = self.sentinel;
        let relabeled = labels
            .par_iter_mut()
            .with_min_len(sux::RAYON_MIN_LEN)
            .map(|label| {
                if *label > gap && *label < sentinel {
                    *label = sentinel;
                    1
                } else {
                    0
                }
            })
            .sum();
        for count in self.counts.iter().skip(gap + 1) {
            count.store(0, Ordering::Relaxed);
        }
        relabeled
    }

    #[inline(always)]
    pub fn is_empty(&self, label: usize) -> bool {
        self.counts[label].load(Ordering::Relaxed) == 0
    }
}

const NIL: usize = usize::MAX;

/// A gap detector keeping a doubly linked list of nodes per label.
///
/// Lists are stored in flat arrays indexed by node, so the detector uses
/// three words per node and one word per label.
#[derive(Debug)]
pub struct BucketsGap {
    heads: Box<[usize]>,
    next: Box<[usize]>,
    prev: Box<[usize]>,
    /// An upper bound on the largest nonempty label.
    max_label: usize,
    sentinel: usize,
}

impl BucketsGap {
    pub fn new(sentinel: usize) -> Self {
        Self {
            heads: vec![NIL; sentinel].into_boxed_slice(),
            next: vec![NIL; sentinel].into_boxed_slice(),
            prev: vec![NIL; sentinel].into_boxed_slice(),
            max_label: 0,
            sentinel,
        }
    }

    fn insert(&mut self, node: usize, label: usize) {
        let head = self.heads[label];
        self.next[node] = head;
        self.prev[node] = NIL;
        if head != NIL {
            self.prev[head] = node;
        }
        self.heads[label] = node;
        self.max_label = self.max_label.max(label);
    }

    fn remove(&mut self, node: usize, label: usize) {
        let (prev, next) = (self.prev[node], self.next[node]);
        if prev != NIL {
            self.next[prev] = next;
        } else {
            self.heads[label] = next;
        }
        if next != NIL {
            self.prev[next] = prev;
        }
    }

    pub fn reset_counts(&mut self, labels: &[usize]) {
        self.heads.fill(NIL);
        self.max_label = 0;
        for (node, &label) in labels.iter().enumerate() {
            if label < self.sentinel {
                self.insert(node, label);
            }
        }
    }

    #[inline]
    pub fn move_from(&mut self, node: usize, from: usize, to: usize) -> bool {
        if from < self.sentinel {
            self.remove(node, from);
        }
        if to < self.sentinel {
            self.insert(node, to);
        }
        from < self.sentinel && self.heads[from] == NIL
    }

    pub fn relabel(&mut self, gap: usize, labels: &mut [usize]) -> usize {
        let mut relabeled = 0;
        for label in gap + 1..=self.max_label.min(self.sentinel - 1) {
            let mut node = std::mem::replace(&mut self.heads[label], NIL);
            while node != NIL {
                labels[node] = self.sentinel;
                relabeled += 1;
                node = self.next[node];
            }
        }
        self.max_label = self.max_label.min(gap);
        relabeled
    }

    #[inline(always)]
    pub fn is_empty(&self, label: usize) -> bool {
        self.heads[label] == NIL
    }
}

/// A gap detector keeping the nodes sorted by label.
///
/// The nodes to retire are split off the ordered set in a single operation.
#[derive(Debug)]
pub struct SortedSetGap {
    /// Pairs made of a label and a node with that label.
    members: BTreeSet<(usize, usize)>,
    sentinel: usize,
}

impl SortedSetGap {
    pub fn new(sentinel: usize) -> Self {
        Self {
            members: BTreeSet::new(),
            sentinel,
        }
    }

    pub fn reset_counts(&mut self, labels: &[usize]) {
        self.members = labels
            .iter()
            .enumerate()
            .filter(|&(_, &label)| label < self.sentinel)
            .map(|(node, &label)| (label, node))
            .collect();
    }

    #[inline]
    pub fn move_from(&mut self, node: usize, from: usize, to: usize) -> bool {
        if from < self.sentinel {
            self.members.remove(&(from, node));
        }
        if to < self.sentinel {
            self.members.insert((to, node));
        }
        from < self.sentinel && self.is_empty(from)
    }

    pub fn relabel(&mut self, gap: usize, labels: &mut [usize]) -> usize {
        let retired = self.members.split_off(&(gap + 1, 0));
        for &(_, node) in &retired {
            labels[node] = self.sentinel;
        }
        retired.len()
    }

    #[inline]
    pub fn is_empty(&self, label: usize) -> bool {
        self.members
            .range((label, 0)..=(label, usize::MAX))
            .next()
            .is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(kind: Gap) {
        // Sentinel is 6: node 5 is already unreachable
        let mut labels = vec![0, 1, 2, 2, 3, 6];
        let mut gap = GapDetector::new(kind, 6);
        gap.reset_counts(&labels);
        assert!(!gap.is_empty(2));
        assert!(gap.is_empty(4));

        // Moving one of two nodes does not empty the label
        labels[2] = 3;
        assert!(!gap.move_from(2, 2, 3));
        // Moving the last one does
        labels[3] = 4;
        assert!(gap.move_from(3, 2, 4));
        assert!(gap.is_empty(2));

        assert_eq!(gap.relabel(2, &mut labels), 3);
        assert_eq!(labels, vec![0, 1, 6, 6, 6, 6]);
        assert!(gap.is_empty(3));
        assert!(gap.is_empty(4));
        assert!(!gap.is_empty(1));

        // Moving from the sentinel is not a gap
        labels[5] = 2;
        assert!(!gap.move_from(5, 6, 2));
        assert!(!gap.is_empty(2));
    }

    #[test]
    fn test_counts() {
        check(Gap::Counts);
    }

    #[test]
    fn test_buckets() {
        check(Gap::Buckets);
    }

    #[test]
    fn test_sorted_set() {
        check(Gap::SortedSet);
    }

    #[test]
    fn test_none() {
        let mut labels = vec![0, 1, 2];
        let mut gap = GapDetector::new(Gap::None, 3);
        gap.reset_counts(&labels);
        assert!(!gap.move_from(1, 1, 2));
        assert_eq!(gap.relabel(0, &mut labels), 0);
        assert_eq!(labels, vec![0, 1, 2]);
    }
}
