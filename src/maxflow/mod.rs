/*
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Maximum flows by the push-relabel method.
//!
//! The main entry point is [`MaxFlow`], which builds a [residual
//! graph](flow_graph::FlowGraph) with a super-source and a super-target from
//! a [`CapacityGraph`] and two sets of [terminals](InputNodes), and then
//! runs a [two-pass computation](phase::MaxFlowPhase) using either a
//! [sequential](sequential::SequentialDischarging) or a
//! [parallel](parallel::Discharging) discharging engine.

pub mod flow_graph;
pub mod gap;
pub mod global_relabeling;
pub mod parallel;
pub mod phase;
pub mod sequential;
pub mod working_set;

use crate::traits::CapacityGraph;
use crate::utils::{Granularity, Interrupted, TerminationFlag};
use dsi_progress_logger::{no_logging, ConcurrentProgressLog, ProgressLog};
use flow_graph::{FlowArc, FlowGraph, FlowGraphBuilder};
use phase::MaxFlowPhase;
use thiserror::Error;

/// Multiplier of the number of nodes in the global-relabeling threshold.
pub const ALPHA: u64 = 6;
/// Work accounted to each discharge in addition to the degree of the node.
pub const BETA: u64 = 12;

/// Returns the amount of discharge work after which labels are recomputed
/// by a global relabeling, that is, (α*n* + *m*) / `freq`.
pub(crate) fn work_threshold(graph: &FlowGraph, freq: f64) -> u64 {
    ((ALPHA * graph.num_nodes() as u64 + graph.num_arcs() as u64) as f64 / freq) as u64
}

/// Gap-detection strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum Gap {
    /// No gap detection.
    None,
    /// Count the nodes with each label, and find the nodes to retire by
    /// scanning all labels.
    Counts,
    /// Keep a list of nodes for each label.
    #[default]
    Buckets,
    /// Keep the nodes in an ordered set sorted by label.
    SortedSet,
}

impl std::fmt::Display for Gap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Gap::None => f.write_str("none"),
            Gap::Counts => f.write_str("counts"),
            Gap::Buckets => f.write_str("buckets"),
            Gap::SortedSet => f.write_str("sorted set"),
        }
    }
}

/// Discharging engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum Engine {
    /// [Sequential discharging](sequential::SequentialDischarging) with a
    /// FIFO queue; global relabelings are still parallel.
    #[default]
    #[cfg_attr(feature = "cli", value(name = "seq"))]
    Sequential,
    /// [Synchronous parallel discharging](parallel::Discharging).
    #[cfg_attr(feature = "cli", value(name = "par"))]
    Parallel,
}

impl std::fmt::Display for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Engine::Sequential => f.write_str("sequential"),
            Engine::Parallel => f.write_str("parallel"),
        }
    }
}

/// A set of terminals, identified by their original node identifiers.
#[derive(Debug, Clone, PartialEq)]
pub enum InputNodes {
    /// Terminals without an explicit capacity. Sources can supply as much
    /// as the total capacity of their outgoing arcs, and targets can absorb
    /// as much as the total capacity of their incoming arcs.
    List(Vec<u64>),
    /// Terminals with an explicit supply (for sources) or demand (for
    /// targets).
    Map(Vec<(u64, f64)>),
}

impl InputNodes {
    /// Returns the number of terminals.
    pub fn len(&self) -> usize {
        match self {
            InputNodes::List(v) => v.len(),
            InputNodes::Map(v) => v.len(),
        }
    }

    /// Returns true if there are no terminals.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Vec<u64>> for InputNodes {
    fn from(nodes: Vec<u64>) -> Self {
        InputNodes::List(nodes)
    }
}

impl From<Vec<(u64, f64)>> for InputNodes {
    fn from(nodes: Vec<(u64, f64)>) -> Self {
        InputNodes::Map(nodes)
    }
}

/// Errors detected before starting the computation, or interruption.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MaxFlowError {
    /// An arc has a negative (or NaN) capacity.
    #[error("Arc {src} -> {dst} has invalid capacity {capacity}")]
    NegativeCapacity { src: usize, dst: usize, capacity: f64 },
    /// A node has a negative (or NaN) capacity.
    #[error("Node {node} has invalid capacity {capacity}")]
    InvalidNodeCapacity { node: usize, capacity: f64 },
    /// A terminal has a negative, infinite, or NaN capacity.
    #[error("Terminal {node} has invalid capacity {capacity}")]
    InvalidTerminalCapacity { node: u64, capacity: f64 },
    /// A terminal identifier does not correspond to a node.
    #[error("Unknown node {node}")]
    UnknownNode { node: u64 },
    #[error("No source nodes")]
    NoSources,
    #[error("No target nodes")]
    NoTargets,
    /// A node appears twice in a set of terminals.
    #[error("Node {node} appears more than once in a set of terminals")]
    DuplicateTerminal { node: u64 },
    /// A node is both a source and a target.
    #[error("Node {node} is both a source and a target")]
    SourceIsTarget { node: u64 },
    #[error(transparent)]
    Interrupted(#[from] Interrupted),
}

/// Parameters shared by the discharging engines.
#[derive(Debug, Clone)]
pub struct DischargeConfig {
    /// The frequency of global relabelings.
    pub freq: f64,
    /// The gap-detection strategy.
    pub gap: Gap,
    /// The number of nodes claimed at a time by parallel tasks.
    pub granularity: Granularity,
    /// A flag checked periodically to interrupt the computation.
    pub termination: TerminationFlag,
}

impl Default for DischargeConfig {
    fn default() -> Self {
        Self {
            freq: 0.5,
            gap: Gap::default(),
            granularity: Granularity::default(),
            termination: TerminationFlag::default(),
        }
    }
}

/// Statistics about a maximum-flow computation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaxFlowStats {
    /// The number of global relabelings.
    pub global_relabelings: usize,
    /// The number of gaps found.
    pub gap_relabelings: usize,
    /// The number of node discharges.
    pub discharges: u64,
}

/// The result of a maximum-flow computation.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowResult {
    /// The arcs of the input graph with positive flow.
    pub flows: Vec<FlowArc>,
    /// The total flow from the sources to the targets.
    pub total_flow: f64,
}

/// Computes a maximum flow between two sets of nodes.
///
/// The struct is configured via setters and then executed via
/// [`run`](Self::run), which returns a [`FlowResult`]. Sources and targets
/// are given as [`InputNodes`]; they are connected to a super-source and a
/// super-target, respectively, by arcs whose capacity is the supply or
/// demand of the terminal.
///
/// Discharging is [sequential](Engine::Sequential) by default, but global
/// relabelings are always performed in parallel in the current Rayon thread
/// pool. The [parallel](Engine::Parallel) engine uses a number of tasks
/// equal to the number of threads of the current pool.
///
/// # Examples
///
/// ```
/// use maxflow::graphs::vec_graph::CapacityVecGraph;
/// use maxflow::maxflow::{InputNodes, MaxFlow};
///
/// // A diamond: 0 → 1 → 3 and 0 → 2 → 3
/// let graph = CapacityVecGraph::from_arcs([
///     (0, 1, 3.0),
///     (1, 3, 3.0),
///     (0, 2, 2.0),
///     (2, 3, 2.0),
/// ]);
/// let mut max_flow = MaxFlow::new(&graph, InputNodes::List(vec![0]), InputNodes::List(vec![3]));
/// let result = max_flow.run()?;
/// assert_eq!(result.total_flow, 5.0);
/// assert_eq!(result.flows.len(), 4);
/// # Ok::<(), maxflow::maxflow::MaxFlowError>(())
/// ```
///
/// Node capacities and explicit demands:
///
/// ```
/// use maxflow::graphs::vec_graph::CapacityVecGraph;
/// use maxflow::maxflow::{Engine, InputNodes, MaxFlow};
///
/// let graph = CapacityVecGraph::from_arcs([
///     (0, 1, 3.0),
///     (1, 3, 3.0),
///     (0, 2, 2.0),
///     (2, 3, 2.0),
/// ]);
/// let node_capacities = [f64::INFINITY, 1.0, f64::INFINITY, f64::INFINITY];
/// let mut max_flow = MaxFlow::new(&graph, InputNodes::List(vec![0]), InputNodes::Map(vec![(3, 10.0)]));
/// max_flow
///     .node_capacities(Some(&node_capacities[..]))
///     .engine(Engine::Parallel);
/// assert_eq!(max_flow.run()?.total_flow, 3.0);
/// # Ok::<(), maxflow::maxflow::MaxFlowError>(())
/// ```
pub struct MaxFlow<'a, G: CapacityGraph> {
    graph: &'a G,
    sources: InputNodes,
    targets: InputNodes,
    node_capacities: Option<&'a [f64]>,
    engine: Engine,
    config: DischargeConfig,
    stats: MaxFlowStats,
    labels: Box<[usize]>,
    excess: Box<[f64]>,
}

impl<G: CapacityGraph> std::fmt::Debug for MaxFlow<'_, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaxFlow")
            .field("sources", &self.sources.len())
            .field("targets", &self.targets.len())
            .field("engine", &self.engine)
            .field("config", &self.config)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl<'a, G: CapacityGraph> MaxFlow<'a, G> {
    /// Creates a new maximum-flow computation.
    pub fn new(graph: &'a G, sources: InputNodes, targets: InputNodes) -> Self {
        Self {
            graph,
            sources,
            targets,
            node_capacities: None,
            engine: Engine::default(),
            config: DischargeConfig::default(),
            stats: MaxFlowStats::default(),
            labels: Box::default(),
            excess: Box::default(),
        }
    }

    /// Sets the frequency of global relabelings.
    ///
    /// Labels are recomputed from scratch when the discharge work since the
    /// last global relabeling exceeds (α*n* + *m*) / `freq`, where *n* and
    /// *m* are the numbers of nodes and arcs of the flow graph, α is
    /// [`ALPHA`], and each discharge accounts for the degree of the node
    /// plus [`BETA`]. The default is 0.5.
    ///
    /// # Panics
    ///
    /// Panics if `freq` is not positive.
    pub fn freq(&mut self, freq: f64) -> &mut Self {
        assert!(freq > 0.0, "The global-relabeling frequency must be positive, got {freq}");
        self.config.freq = freq;
        self
    }

    /// Sets the [gap-detection strategy](Gap).
    ///
    /// The parallel engine always uses [counters](Gap::Counts) unless gap
    /// detection is [disabled](Gap::None).
    pub fn gap(&mut self, gap: Gap) -> &mut Self {
        self.config.gap = gap;
        self
    }

    /// Sets the [discharging engine](Engine).
    pub fn engine(&mut self, engine: Engine) -> &mut Self {
        self.engine = engine;
        self
    }

    /// Sets the parallel task granularity.
    ///
    /// The granularity expresses how many
    /// [nodes](Granularity::node_granularity) are claimed by a task at a
    /// time during global relabelings and parallel discharging.
    pub fn granularity(&mut self, granularity: Granularity) -> &mut Self {
        self.config.granularity = granularity;
        self
    }

    /// Sets node capacities, or removes them if `None`.
    ///
    /// An infinite capacity means no constraint.
    ///
    /// # Panics
    ///
    /// Panics if the length of the slice is not the number of nodes.
    pub fn node_capacities(&mut self, node_capacities: Option<&'a [f64]>) -> &mut Self {
        if let Some(c) = node_capacities {
            assert_eq!(
                c.len(),
                self.graph.num_nodes(),
                "Node-capacity vector length ({}) does not match the number of nodes ({})",
                c.len(),
                self.graph.num_nodes()
            );
        }
        self.node_capacities = node_capacities;
        self
    }

    /// Sets the flag used to interrupt the computation.
    pub fn termination(&mut self, termination: TerminationFlag) -> &mut Self {
        self.config.termination = termination;
        self
    }

    /// Returns the statistics of the last run.
    pub fn stats(&self) -> MaxFlowStats {
        self.stats
    }

    /// Returns the final excess of each node of the flow graph (see
    /// [`FlowGraph`] for the numbering of nodes).
    pub fn excess(&self) -> &[f64] {
        &self.excess
    }

    /// Returns the final label of each node of the flow graph.
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// Computes a maximum flow.
    pub fn run(&mut self) -> Result<FlowResult, MaxFlowError> {
        self.run_with_logging(no_logging![], no_logging![])
    }

    /// Computes a maximum flow, logging progress.
    ///
    /// `pl` is a sequential [`ProgressLog`] used for the construction of the
    /// flow graph and for discharges. `cpl` is a [`ConcurrentProgressLog`]
    /// used for global relabelings and parallel discharges.
    pub fn run_with_logging(
        &mut self,
        pl: &mut impl ProgressLog,
        cpl: &mut impl ConcurrentProgressLog,
    ) -> Result<FlowResult, MaxFlowError> {
        log::info!("Engine: {}", self.engine);
        log::info!("Gap detection: {}", self.config.gap);
        log::info!("Global-relabeling frequency: {}", self.config.freq);
        log::info!(
            "{} sources, {} targets",
            self.sources.len(),
            self.targets.len()
        );

        let flow_graph = FlowGraphBuilder::new(self.graph)
            .node_capacities(self.node_capacities)
            .build(&self.sources, &self.targets, pl)?;
        log::info!(
            "Flow graph: {} nodes ({} split), {} arcs",
            flow_graph.num_nodes(),
            flow_graph.num_split_nodes(),
            flow_graph.num_arcs()
        );

        let mut phase = MaxFlowPhase::new(&flow_graph, &self.config, self.engine);
        let result = phase.run(pl, cpl);
        self.stats = phase.stats();
        self.labels = phase.labels().into();
        self.excess = phase.excess().into();
        result?;

        Ok(FlowResult {
            flows: flow_graph.flows(),
            total_flow: flow_graph.delivered_flow(),
        })
    }
}

/// Estimates the memory used by a computation, in bytes.
///
/// The estimate includes the flow graph, labels and excesses, and the
/// structures used by global relabelings and by the given engine (assuming
/// gap detection by [buckets](Gap::Buckets) for the sequential engine), but
/// not the input graph. Split nodes are not taken into account.
pub fn mem_usage(
    num_nodes: usize,
    num_arcs: u64,
    num_terminals: usize,
    engine: Engine,
    num_threads: usize,
) -> usize {
    const WORD: usize = std::mem::size_of::<usize>();
    let n = num_nodes + 2;
    let m = num_arcs as usize + num_terminals;
    let bits = n.div_ceil(8);

    // Direct and reverse CSR: offsets, targets, capacities, flows, and
    // reverse sources and arc indices
    let flow_graph = 2 * (n + 1) * WORD + 5 * m * WORD;
    let labels_and_excess = 2 * n * WORD;
    // Frontier, visited bits, and thread-local queues (at most n nodes)
    let relabeling = 2 * n * WORD + bits + num_threads * 3 * WORD;

    let engine = match engine {
        // Queue, membership bits, and buckets
        Engine::Sequential => n * WORD + bits + 3 * n * WORD,
        // Working set, staging labels, added excess, discovered bits,
        // counters, and thread-local queues
        Engine::Parallel => 5 * n * WORD + bits + num_threads * 6 * WORD,
    };

    flow_graph + labels_and_excess + relabeling + engine
}
