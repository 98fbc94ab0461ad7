/*
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Synchronous parallel discharging.
//!
//! All active nodes are discharged at the same time by a set of worker
//! tasks, each round being made of three phases separated by barriers:
//!
//! * [`Phase::Discharge`]: tasks claim batches of active nodes from a shared
//!   [working set](AtomicWorkingSet) and discharge them, reading labels and
//!   excesses as they were at the start of the round. New labels are written
//!   in a staging array, and excess changes are accumulated atomically in a
//!   separate array. Nodes receiving excess are discovered using an atomic
//!   bit vector and collected in thread-local queues.
//!
//! * [`Phase::SyncWorkingSet`]: tasks claim again the same batches, and
//!   commit new labels and accumulated excess of the discharged nodes.
//!
//! * [`Phase::UpdateWorkingSet`]: tasks fold the accumulated excess of the
//!   nodes they discovered, and move those that are still active into the
//!   (reset) working set for the next round.
//!
//! When a node *v* could push along an admissible arc towards an active
//! node *w*, which might push back along the same arc in the same round,
//! the push happens only if *v* wins the arc, that is, if *d*(*v*) =
//! *d*(*w*) + 1, *d*(*v*) < *d*(*w*) − 1, or *d*(*v*) = *d*(*w*) and *v* <
//! *w*, where *d* denotes labels at the start of the round. Thus, each arc
//! is modified by at most one of its endpoints in a round.
//!
//! A node that relabels in a round does not see the residual arcs created
//! by the pushes it receives in the same round. If such a node runs out of
//! admissible arcs it keeps its previous label instead of being retired, and
//! when the working set becomes empty a last global relabeling reactivates
//! the nodes that still have excess and a path to the sink.

use super::flow_graph::FlowGraph;
use super::gap::CountsGap;
use super::global_relabeling::GlobalRelabeling;
use super::working_set::AtomicWorkingSet;
use super::{work_threshold, DischargeConfig, Gap, MaxFlowStats, BETA};
use crate::utils::{atomic_f64_slice, run_with_concurrency, AtomicF64, Interrupted, TerminationFlag};
use dsi_progress_logger::{ConcurrentProgressLog, ProgressLog};
use rayon::prelude::*;
use std::sync::atomic::Ordering;
use sux::bits::AtomicBitVec;
use sync_cell_slice::{SyncCell, SyncSlice};

/// The phases of a round of parallel discharging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Discharge,
    SyncWorkingSet,
    UpdateWorkingSet,
}

/// The state shared by all tasks during a phase.
struct Shared<'s> {
    graph: &'s FlowGraph,
    labels: &'s [SyncCell<usize>],
    excess: &'s [SyncCell<f64>],
    temp_labels: &'s [SyncCell<usize>],
    added_excess: &'s [AtomicF64],
    discovered: &'s AtomicBitVec,
    working_set: &'s AtomicWorkingSet,
    gap: Option<&'s CountsGap>,
    sink: usize,
    granularity: usize,
    termination: &'s TerminationFlag,
}

/// A worker of [`Discharging`].
///
/// The only state carried from a phase to the next one is the queue of
/// discovered nodes, the candidate gaps, and the work counter, which are
/// read by the driver between rounds.
#[derive(Debug)]
pub struct DischargeTask<P> {
    queue: Vec<usize>,
    gaps: Vec<usize>,
    work: u64,
    pl: P,
}

impl<P: ConcurrentProgressLog> DischargeTask<P> {
    fn new(pl: P) -> Self {
        Self {
            queue: vec![],
            gaps: vec![],
            work: 0,
            pl,
        }
    }

    fn run(&mut self, phase: Phase, shared: &Shared) -> Result<(), Interrupted> {
        match phase {
            Phase::Discharge => {
                while let Some(batch) = shared.working_set.claim(shared.granularity) {
                    shared.termination.assert_running()?;
                    self.pl.update_with_count(batch.len());
                    for pos in batch {
                        self.discharge(shared.working_set.get(pos), shared);
                    }
                }
            }
            Phase::SyncWorkingSet => {
                while let Some(batch) = shared.working_set.claim(shared.granularity) {
                    for pos in batch {
                        self.sync(shared.working_set.get(pos), shared);
                    }
                }
            }
            Phase::UpdateWorkingSet => self.update(shared),
        }
        Ok(())
    }

    fn discharge(&mut self, node: usize, shared: &Shared) {
        let graph = shared.graph;
        let sentinel = graph.num_nodes();
        // SAFETY: labels and excesses are not written during this phase, and
        // the staging label of a node is written only by the task that
        // claimed it.
        let (label, initial_excess) =
            unsafe { (shared.labels[node].get(), shared.excess[node].get()) };
        let mut excess = initial_excess;
        let mut new_label = label;

        loop {
            let mut next_label = sentinel;
            let mut skipped = false;
            for arc in graph.relationships(node) {
                if excess <= 0.0 {
                    break;
                }
                let other = arc.node;
                let other_label = unsafe { shared.labels[other].get() };
                if other_label >= sentinel {
                    continue;
                }
                let residual = graph.residual(arc);
                if residual <= 0.0 {
                    continue;
                }
                if new_label == other_label + 1 {
                    if other != shared.sink && unsafe { shared.excess[other].get() } > 0.0 {
                        let win = label == other_label + 1
                            || label + 1 < other_label
                            || (label == other_label && node < other);
                        if !win {
                            skipped = true;
                            continue;
                        }
                    }
                    let delta = excess.min(residual);
                    graph.push_atomic(arc, delta);
                    excess -= delta;
                    shared.added_excess[other].fetch_add(delta, Ordering::Relaxed);
                    if other != shared.sink && !shared.discovered.swap(other, true, Ordering::Relaxed)
                    {
                        self.queue.push(other);
                    }
                } else if other_label >= new_label {
                    next_label = next_label.min(other_label + 1);
                }
            }

            if excess <= 0.0 || skipped {
                break;
            }
            new_label = next_label;
            if new_label >= sentinel {
                break;
            }
        }

        unsafe { shared.temp_labels[node].set(new_label) };
        let pushed = initial_excess - excess;
        if pushed > 0.0 {
            shared.added_excess[node].fetch_add(-pushed, Ordering::Relaxed);
        }
        if excess > 0.0
            && new_label < sentinel
            && !shared.discovered.swap(node, true, Ordering::Relaxed)
        {
            self.queue.push(node);
        }
        self.work += graph.degree(node) as u64 + BETA;
    }

    fn sync(&mut self, node: usize, shared: &Shared) {
        // SAFETY: the label and excess of a node in the working set are
        // written only by the task that claimed it.
        unsafe {
            let old = shared.labels[node].get();
            let mut new = shared.temp_labels[node].get();
            // A node that received excess in this round relabeled against a
            // stale residual graph, so it must not be retired
            if new >= shared.graph.num_nodes()
                && old < new
                && shared.discovered.get(node, Ordering::Relaxed)
            {
                new = old;
            }
            if new != old {
                shared.labels[node].set(new);
                if let Some(gap) = shared.gap {
                    if gap.move_from(old, new) {
                        self.gaps.push(old);
                    }
                }
            }
            let added = shared.added_excess[node].swap(0.0, Ordering::Relaxed);
            shared.excess[node].set(shared.excess[node].get() + added);
        }
    }

    fn update(&mut self, shared: &Shared) {
        let sentinel = shared.graph.num_nodes();
        self.queue.retain(|&node| {
            shared.discovered.set(node, false, Ordering::Relaxed);
            // SAFETY: discovered nodes belong to the task that discovered
            // them.
            unsafe {
                let added = shared.added_excess[node].swap(0.0, Ordering::Relaxed);
                let excess = shared.excess[node].get() + added;
                shared.excess[node].set(excess);
                excess > 0.0 && shared.labels[node].get() < sentinel
            }
        });
        shared.working_set.batch_push(&self.queue);
        self.queue.clear();
    }
}

/// Parallel discharging by synchronous rounds.
///
/// See the [module documentation](self) for a description of the algorithm.
/// As in [sequential discharging](super::sequential::SequentialDischarging),
/// labels are periodically recomputed by a [global
/// relabeling](GlobalRelabeling); gap detection, if enabled, always uses
/// atomic [counters](CountsGap), and retired nodes are found by a parallel
/// scan of the label array.
#[derive(Debug)]
pub struct Discharging<'a> {
    graph: &'a FlowGraph,
    config: &'a DischargeConfig,
    granularity: usize,
    relabeling: GlobalRelabeling<'a>,
    working_set: AtomicWorkingSet,
    temp_labels: Box<[usize]>,
    added_excess: Box<[AtomicF64]>,
    discovered: AtomicBitVec,
    gap: Option<CountsGap>,
    work: u64,
    stats: MaxFlowStats,
}

impl<'a> Discharging<'a> {
    pub fn new(graph: &'a FlowGraph, config: &'a DischargeConfig) -> Self {
        let num_nodes = graph.num_nodes();
        let granularity = config
            .granularity
            .node_granularity(num_nodes, graph.num_arcs() as u64);
        Self {
            graph,
            config,
            granularity,
            relabeling: GlobalRelabeling::new(graph, granularity),
            working_set: AtomicWorkingSet::new(num_nodes),
            temp_labels: vec![0; num_nodes].into_boxed_slice(),
            added_excess: atomic_f64_slice(num_nodes, 0.0),
            discovered: AtomicBitVec::new(num_nodes),
            gap: (config.gap != Gap::None).then(|| CountsGap::new(num_nodes)),
            work: 0,
            stats: MaxFlowStats::default(),
        }
    }

    /// Returns the statistics accumulated by all calls to
    /// [`run`](Self::run).
    pub fn stats(&self) -> MaxFlowStats {
        self.stats
    }

    /// Recomputes labels and refills the working set with the active nodes.
    fn global_relabel(
        &mut self,
        labels: &mut [usize],
        excess: &[f64],
        source: usize,
        sink: usize,
        cpl: &mut impl ConcurrentProgressLog,
    ) -> Result<(), Interrupted> {
        self.relabeling
            .run(labels, source, sink, &self.config.termination, cpl)?;
        if let Some(gap) = &self.gap {
            gap.reset_counts(labels);
        }
        self.stats.global_relabelings += 1;
        self.work = 0;

        let sentinel = self.graph.num_nodes();
        let active = (0..sentinel)
            .into_par_iter()
            .with_min_len(sux::RAYON_MIN_LEN)
            .filter(|&node| {
                node != source && node != sink && excess[node] > 0.0 && labels[node] < sentinel
            })
            .collect::<Vec<_>>();
        self.working_set.reset();
        self.working_set.batch_push(&active);
        Ok(())
    }

    /// Moves excess from the nodes with positive excess towards `sink`, until
    /// no node (except for `source` and `sink`) is active.
    ///
    /// The postconditions are the same as those of
    /// [`SequentialDischarging::run`](super::sequential::SequentialDischarging::run).
    pub fn run(
        &mut self,
        labels: &mut [usize],
        excess: &mut [f64],
        source: usize,
        sink: usize,
        pl: &mut impl ProgressLog,
        cpl: &mut impl ConcurrentProgressLog,
    ) -> Result<(), Interrupted> {
        let graph = self.graph;
        let threshold = work_threshold(graph, self.config.freq);

        self.discovered.fill(false, Ordering::Relaxed);
        self.global_relabel(labels, excess, source, sink, cpl)?;

        pl.item_name("round");
        pl.expected_updates(None);
        pl.start(format!(
            "Discharging {} active nodes towards {} in parallel...",
            self.working_set.size(),
            sink
        ));

        let mut tasks = (0..rayon::current_num_threads())
            .map(|_| DischargeTask::new(cpl.clone()))
            .collect::<Vec<_>>();

        // Whether labels are exact, that is, no round ran since the last
        // global relabeling
        let mut exact = true;
        loop {
            if self.working_set.is_empty() {
                if exact {
                    break;
                }
                // Concurrent pushes might have left excess on nodes whose
                // labels are too high
                self.global_relabel(labels, excess, source, sink, cpl)?;
                exact = true;
                if !self.working_set.is_empty() {
                    log::debug!(
                        "Global relabeling after the last round reactivated {} nodes",
                        self.working_set.size()
                    );
                }
                continue;
            }
            exact = false;
            self.stats.discharges += self.working_set.size() as u64;

            {
                let shared = Shared {
                    graph,
                    labels: labels.as_sync_slice(),
                    excess: excess.as_sync_slice(),
                    temp_labels: self.temp_labels.as_sync_slice(),
                    added_excess: &self.added_excess,
                    discovered: &self.discovered,
                    working_set: &self.working_set,
                    gap: self.gap.as_ref(),
                    sink,
                    granularity: self.granularity,
                    termination: &self.config.termination,
                };
                run_with_concurrency(&mut tasks, |task| task.run(Phase::Discharge, &shared))?;
                shared.working_set.reset_idx();
                run_with_concurrency(&mut tasks, |task| {
                    task.run(Phase::SyncWorkingSet, &shared)
                })?;
            }

            // The smallest candidate that is still empty after all commits
            let gap = tasks
                .iter_mut()
                .flat_map(|task| task.gaps.drain(..))
                .filter(|&label| self.gap.as_ref().is_some_and(|g| g.is_empty(label)))
                .min();
            if let (Some(gap), Some(counts)) = (gap, &self.gap) {
                let relabeled = counts.relabel(gap, labels);
                self.stats.gap_relabelings += 1;
                log::debug!("Gap at label {}: {} nodes retired", gap, relabeled);
            }

            self.working_set.reset();
            {
                let shared = Shared {
                    graph,
                    labels: labels.as_sync_slice(),
                    excess: excess.as_sync_slice(),
                    temp_labels: self.temp_labels.as_sync_slice(),
                    added_excess: &self.added_excess,
                    discovered: &self.discovered,
                    working_set: &self.working_set,
                    gap: self.gap.as_ref(),
                    sink,
                    granularity: self.granularity,
                    termination: &self.config.termination,
                };
                run_with_concurrency(&mut tasks, |task| {
                    task.run(Phase::UpdateWorkingSet, &shared)
                })?;
            }
            excess[sink] += self.added_excess[sink].swap(0.0, Ordering::Relaxed);
            pl.update();

            self.work += tasks
                .iter_mut()
                .map(|task| std::mem::take(&mut task.work))
                .sum::<u64>();
            if self.work > threshold && !self.working_set.is_empty() {
                self.global_relabel(labels, excess, source, sink, cpl)?;
                exact = true;
            }
        }

        drop(tasks);
        pl.done();
        Ok(())
    }
}
