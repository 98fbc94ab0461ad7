/*
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use super::flow_graph::FlowGraph;
use super::parallel::Discharging;
use super::sequential::SequentialDischarging;
use super::{DischargeConfig, Engine, MaxFlowStats};
use crate::utils::Interrupted;
use dsi_progress_logger::{ConcurrentProgressLog, ProgressLog};

enum Driver<'a> {
    Sequential(SequentialDischarging<'a>),
    Parallel(Discharging<'a>),
}

impl Driver<'_> {
    fn run(
        &mut self,
        labels: &mut [usize],
        excess: &mut [f64],
        source: usize,
        sink: usize,
        pl: &mut impl ProgressLog,
        cpl: &mut impl ConcurrentProgressLog,
    ) -> Result<(), Interrupted> {
        match self {
            Driver::Sequential(d) => d.run(labels, excess, source, sink, pl, cpl),
            Driver::Parallel(d) => d.run(labels, excess, source, sink, pl, cpl),
        }
    }

    fn stats(&self) -> MaxFlowStats {
        match self {
            Driver::Sequential(d) => d.stats(),
            Driver::Parallel(d) => d.stats(),
        }
    }
}

/// A complete push-relabel computation on a [`FlowGraph`].
///
/// The computation starts by saturating all arcs leaving the super-source.
/// Then, excess is discharged towards the super-target, obtaining a maximum
/// preflow; the super-source has the sentinel label, so excess that cannot
/// reach the super-target remains stranded at nodes with the sentinel
/// label. Finally, excess is discharged again with the roles of the
/// terminals exchanged, sending stranded excess back to the super-source,
/// so that flow is conserved at every node but the terminals.
///
/// Labels, excesses, and the discharge engine are allocated once, and
/// reused by both passes.
pub struct MaxFlowPhase<'a> {
    graph: &'a FlowGraph,
    config: &'a DischargeConfig,
    engine: Engine,
    labels: Box<[usize]>,
    excess: Box<[f64]>,
    stats: MaxFlowStats,
}

impl std::fmt::Debug for MaxFlowPhase<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaxFlowPhase")
            .field("engine", &self.engine)
            .field("config", &self.config)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl<'a> MaxFlowPhase<'a> {
    pub fn new(graph: &'a FlowGraph, config: &'a DischargeConfig, engine: Engine) -> Self {
        let num_nodes = graph.num_nodes();
        Self {
            graph,
            config,
            engine,
            labels: vec![num_nodes; num_nodes].into_boxed_slice(),
            excess: vec![0.0; num_nodes].into_boxed_slice(),
            stats: MaxFlowStats::default(),
        }
    }

    /// Returns the labels.
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// Returns the excesses.
    ///
    /// After a complete [run](Self::run), all nodes but the terminals have
    /// zero excess.
    pub fn excess(&self) -> &[f64] {
        &self.excess
    }

    /// Returns the statistics of the last run.
    pub fn stats(&self) -> MaxFlowStats {
        self.stats
    }

    /// Returns the flow currently delivered to the super-target.
    pub fn total_flow(&self) -> f64 {
        self.graph.delivered_flow()
    }

    /// Saturates the arcs leaving the super-source.
    pub fn initialize_preflow(&mut self) {
        let graph = self.graph;
        let source = graph.source();
        self.excess.fill(0.0);
        for arc in graph.arcs(source) {
            let residual = graph.residual(arc);
            if residual > 0.0 {
                graph.push(arc, residual);
                self.excess[arc.node] += residual;
                self.excess[source] -= residual;
            }
        }
    }

    fn new_driver(&self) -> Driver<'a> {
        match self.engine {
            Engine::Sequential => {
                Driver::Sequential(SequentialDischarging::new(self.graph, self.config))
            }
            Engine::Parallel => Driver::Parallel(Discharging::new(self.graph, self.config)),
        }
    }

    /// Runs only the first pass, computing a maximum preflow.
    ///
    /// This method must be called after
    /// [`initialize_preflow`](Self::initialize_preflow).
    pub fn compute_max_preflow(
        &mut self,
        pl: &mut impl ProgressLog,
        cpl: &mut impl ConcurrentProgressLog,
    ) -> Result<(), Interrupted> {
        let mut driver = self.new_driver();
        let result = self.first_pass(&mut driver, pl, cpl);
        self.stats = driver.stats();
        result
    }

    fn first_pass(
        &mut self,
        driver: &mut Driver,
        pl: &mut impl ProgressLog,
        cpl: &mut impl ConcurrentProgressLog,
    ) -> Result<(), Interrupted> {
        let (source, target) = (self.graph.source(), self.graph.target());
        driver.run(&mut self.labels, &mut self.excess, source, target, pl, cpl)?;
        log::info!(
            "Maximum preflow computed: {} units delivered",
            self.excess[target]
        );
        Ok(())
    }

    fn second_pass(
        &mut self,
        driver: &mut Driver,
        pl: &mut impl ProgressLog,
        cpl: &mut impl ConcurrentProgressLog,
    ) -> Result<(), Interrupted> {
        let (source, target) = (self.graph.source(), self.graph.target());
        driver.run(&mut self.labels, &mut self.excess, target, source, pl, cpl)?;
        log::info!(
            "Stranded excess returned: {} units left the source",
            -self.excess[source]
        );
        Ok(())
    }

    /// Runs both passes, leaving a maximum flow in the flow graph.
    pub fn run(
        &mut self,
        pl: &mut impl ProgressLog,
        cpl: &mut impl ConcurrentProgressLog,
    ) -> Result<(), Interrupted> {
        self.initialize_preflow();
        let mut driver = self.new_driver();
        let result = self
            .first_pass(&mut driver, pl, cpl)
            .and_then(|()| self.second_pass(&mut driver, pl, cpl));
        self.stats = driver.stats();
        result?;

        log::info!(
            "Maximum flow: {} ({} global relabelings, {} gap relabelings, {} discharges)",
            self.total_flow(),
            self.stats.global_relabelings,
            self.stats.gap_relabelings,
            self.stats.discharges
        );
        Ok(())
    }
}
