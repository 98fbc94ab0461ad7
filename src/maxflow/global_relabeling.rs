/*
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use super::flow_graph::FlowGraph;
use super::working_set::AtomicWorkingSet;
use crate::utils::{run_with_concurrency, Interrupted, TerminationFlag};
use dsi_progress_logger::ConcurrentProgressLog;
use rayon::prelude::*;
use std::sync::atomic::Ordering;
use sux::bits::AtomicBitVec;
use sync_cell_slice::SyncSlice;

/// Exact distance labels by a parallel breadth-first visit of the residual
/// graph from the sink.
///
/// The visit proceeds by rounds separated by barriers. In each round, the
/// worker tasks claim batches of the current frontier, and discover the
/// unvisited nodes having a residual arc towards a frontier node, assigning
/// them the current distance plus one. Newly discovered nodes are collected
/// in thread-local queues, which are then merged into the frontier for the
/// next round.
///
/// The source is marked as visited from the start, so it is never expanded:
/// nodes that can reach the sink only through the source get the sentinel
/// label, as does the source itself.
///
/// The same instance can be run any number of times; its frontier and
/// visited set are allocated once.
#[derive(Debug)]
pub struct GlobalRelabeling<'a> {
    graph: &'a FlowGraph,
    frontier: AtomicWorkingSet,
    discovered: AtomicBitVec,
    granularity: usize,
}

struct RelabelTask<P> {
    queue: Vec<usize>,
    pl: P,
}

impl<'a> GlobalRelabeling<'a> {
    /// Creates a new global relabeling for a flow graph, in which tasks claim
    /// `granularity` frontier nodes at a time.
    pub fn new(graph: &'a FlowGraph, granularity: usize) -> Self {
        let num_nodes = graph.num_nodes();
        Self {
            graph,
            frontier: AtomicWorkingSet::new(num_nodes),
            discovered: AtomicBitVec::new(num_nodes),
            granularity: granularity.max(1),
        }
    }

    /// Computes distance labels towards `sink`, using `source` as the source.
    ///
    /// After the call, `labels[sink]` is zero, every node that can reach
    /// the sink through residual arcs, without passing through `source`, has
    /// its exact distance as label, and every other node (including
    /// `source`) has the sentinel label, that is, the number of nodes.
    ///
    /// Returns the largest finite label.
    pub fn run(
        &mut self,
        labels: &mut [usize],
        source: usize,
        sink: usize,
        termination: &TerminationFlag,
        cpl: &mut impl ConcurrentProgressLog,
    ) -> Result<usize, Interrupted> {
        let graph = self.graph;
        let sentinel = graph.num_nodes();
        debug_assert_eq!(labels.len(), sentinel);

        labels
            .par_iter_mut()
            .with_min_len(sux::RAYON_MIN_LEN)
            .for_each(|label| *label = sentinel);
        labels[sink] = 0;

        self.discovered.fill(false, Ordering::Relaxed);
        self.discovered.set(source, true, Ordering::Relaxed);
        self.discovered.set(sink, true, Ordering::Relaxed);

        self.frontier.reset();
        self.frontier.push(sink);

        cpl.item_name("node");
        cpl.expected_updates(Some(sentinel));
        cpl.start("Relabeling...");

        let mut tasks = (0..rayon::current_num_threads())
            .map(|_| RelabelTask {
                queue: vec![],
                pl: cpl.clone(),
            })
            .collect::<Vec<_>>();

        let frontier = &self.frontier;
        let discovered = &self.discovered;
        let granularity = self.granularity;
        let labels = labels.as_sync_slice();
        let mut distance = 0;

        loop {
            let next_distance = distance + 1;
            run_with_concurrency(&mut tasks, |task| {
                while let Some(batch) = frontier.claim(granularity) {
                    termination.assert_running()?;
                    task.pl.update_with_count(batch.len());
                    for pos in batch {
                        let node = frontier.get(pos);
                        for arc in graph.relationships(node) {
                            if graph.reverse_residual(arc) > 0.0
                                && !discovered.swap(arc.node, true, Ordering::Relaxed)
                            {
                                // SAFETY: the label of a node is written only
                                // by the task that discovers it.
                                unsafe { labels[arc.node].set(next_distance) };
                                task.queue.push(arc.node);
                            }
                        }
                    }
                }
                Ok::<_, Interrupted>(())
            })?;

            frontier.reset();
            run_with_concurrency(&mut tasks, |task| {
                frontier.batch_push(&task.queue);
                task.queue.clear();
                Ok::<_, Interrupted>(())
            })?;

            if frontier.is_empty() {
                break;
            }
            distance = next_distance;
        }

        drop(tasks);
        cpl.done();

        log::debug!("Global relabeling completed: largest label {}", distance);
        Ok(distance)
    }
}
