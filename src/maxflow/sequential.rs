/*
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use super::flow_graph::{FlowGraph, ResidualArc};
use super::gap::GapDetector;
use super::global_relabeling::GlobalRelabeling;
use super::{work_threshold, DischargeConfig, MaxFlowStats, BETA};
use crate::utils::Interrupted;
use dsi_progress_logger::{ConcurrentProgressLog, ProgressLog};
use std::collections::VecDeque;
use sux::bits::BitVec;

/// Sequential discharging with a FIFO queue of active nodes.
///
/// Active nodes (non-terminal nodes with positive excess and a label smaller
/// than the sentinel) are kept in a FIFO queue, with a bit vector recording
/// membership. Each node extracted from the queue is discharged: its residual
/// arcs towards nodes with a label smaller than the sentinel are sorted by
/// the label of the other endpoint, and scanned in this order. When the
/// current arc is not admissible the node is relabeled; otherwise, as much
/// excess as possible is pushed along the arc.
///
/// If a relabeling empties a label, all nodes above it are retired using the
/// configured [gap detector](GapDetector). If a node still has excess after
/// scanning all its arcs, it cannot reach the sink anymore and gets the
/// sentinel label.
///
/// Labels are recomputed from scratch by a [global
/// relabeling](GlobalRelabeling) at the start, and then whenever the work
/// performed since the last global relabeling (the sum of the degrees of the
/// discharged nodes, plus a constant per discharge) exceeds a threshold
/// depending on the [frequency](DischargeConfig::freq).
#[derive(Debug)]
pub struct SequentialDischarging<'a> {
    graph: &'a FlowGraph,
    config: &'a DischargeConfig,
    relabeling: GlobalRelabeling<'a>,
    gap: GapDetector,
    queue: VecDeque<usize>,
    in_queue: BitVec,
    candidates: Vec<(usize, ResidualArc)>,
    work: u64,
    stats: MaxFlowStats,
}

impl<'a> SequentialDischarging<'a> {
    pub fn new(graph: &'a FlowGraph, config: &'a DischargeConfig) -> Self {
        let num_nodes = graph.num_nodes();
        let granularity = config
            .granularity
            .node_granularity(num_nodes, graph.num_arcs() as u64);
        Self {
            graph,
            config,
            relabeling: GlobalRelabeling::new(graph, granularity),
            gap: GapDetector::new(config.gap, num_nodes),
            queue: VecDeque::new(),
            in_queue: BitVec::new(num_nodes),
            candidates: vec![],
            work: 0,
            stats: MaxFlowStats::default(),
        }
    }

    /// Returns the statistics accumulated by all calls to
    /// [`run`](Self::run).
    pub fn stats(&self) -> MaxFlowStats {
        self.stats
    }

    fn global_relabel(
        &mut self,
        labels: &mut [usize],
        source: usize,
        sink: usize,
        cpl: &mut impl ConcurrentProgressLog,
    ) -> Result<(), Interrupted> {
        self.relabeling
            .run(labels, source, sink, &self.config.termination, cpl)?;
        self.gap.reset_counts(labels);
        self.stats.global_relabelings += 1;
        self.work = 0;
        Ok(())
    }

    fn enqueue(&mut self, node: usize) {
        if !self.in_queue[node] {
            self.in_queue.set(node, true);
            self.queue.push_back(node);
        }
    }

    /// Enqueues all active nodes.
    fn enqueue_active(&mut self, labels: &[usize], excess: &[f64], source: usize, sink: usize) {
        let sentinel = self.graph.num_nodes();
        for node in 0..sentinel {
            if node != source && node != sink && excess[node] > 0.0 && labels[node] < sentinel {
                self.enqueue(node);
            }
        }
    }

    /// Retires all nodes with label greater than `gap`.
    fn gap_relabel(&mut self, gap: usize, labels: &mut [usize]) {
        let relabeled = self.gap.relabel(gap, labels);
        self.stats.gap_relabelings += 1;
        log::debug!("Gap at label {}: {} nodes retired", gap, relabeled);
    }

    /// Moves excess from the nodes with positive excess towards `sink`, until
    /// no node (except for `source` and `sink`) is active.
    ///
    /// On return, every node with positive excess, except for `sink`, has the
    /// sentinel label; `excess[sink]` has been increased by the flow
    /// delivered to the sink.
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
        let sentinel = graph.num_nodes();
        let threshold = work_threshold(graph, self.config.freq);

        self.queue.clear();
        self.in_queue.fill(false);
        self.global_relabel(labels, source, sink, cpl)?;
        self.enqueue_active(labels, excess, source, sink);

        pl.item_name("node");
        pl.expected_updates(None);
        pl.start(format!(
            "Discharging {} active nodes towards {}...",
            self.queue.len(),
            sink
        ));

        while let Some(node) = self.queue.pop_front() {
            self.in_queue.set(node, false);
            if labels[node] >= sentinel {
                // Retired while in the queue
                continue;
            }
            self.config.termination.assert_running()?;

            self.discharge(node, labels, excess, sink);
            self.stats.discharges += 1;
            self.work += graph.degree(node) as u64 + BETA;
            pl.light_update();

            if self.work > threshold {
                self.global_relabel(labels, source, sink, cpl)?;
                self.enqueue_active(labels, excess, source, sink);
            }
        }

        pl.done();
        Ok(())
    }

    fn discharge(&mut self, node: usize, labels: &mut [usize], excess: &mut [f64], sink: usize) {
        let graph = self.graph;
        let sentinel = graph.num_nodes();

        let mut candidates = std::mem::take(&mut self.candidates);
        candidates.clear();
        candidates.extend(
            graph
                .relationships(node)
                .map(|arc| (labels[arc.node], arc))
                .filter(|&(label, arc)| label < sentinel && graph.residual(arc) > 0.0),
        );
        // Stable, so ties keep the scan order
        candidates.sort_by_key(|&(label, _)| label);

        for &(label, arc) in &candidates {
            let current = labels[node];
            if label + 1 > current {
                labels[node] = label + 1;
                if self.gap.move_from(node, current, label + 1) {
                    self.gap_relabel(current, labels);
                    self.candidates = candidates;
                    return;
                }
            }

            let residual = graph.residual(arc);
            if residual <= 0.0 {
                continue;
            }
            let delta = excess[node].min(residual);
            graph.push(arc, delta);
            excess[node] -= delta;
            excess[arc.node] += delta;
            if arc.node != sink {
                self.enqueue(arc.node);
            }

            if excess[node] <= 0.0 {
                break;
            }
        }

        if excess[node] > 0.0 {
            // All residual arcs lead to retired nodes
            let current = labels[node];
            labels[node] = sentinel;
            if self.gap.move_from(node, current, sentinel) {
                self.gap_relabel(current, labels);
            }
        }

        self.candidates = candidates;
    }
}
