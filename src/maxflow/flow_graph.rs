/*
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! The residual graph used by the solver.
//!
//! A [`FlowGraph`] contains the arcs of the input graph plus two synthetic
//! terminals: a super-source, with an arc towards every source, and a
//! super-target, with an arc towards every target. Nodes are numbered as
//! follows:
//!
//! * the nodes of the input graph, in [0 . . *n*);
//! * the super-source *n* and the super-target *n* + 1;
//! * possibly, split nodes used to model node capacities, from *n* + 2 on.
//!
//! Arcs are stored in compressed sparse row (CSR) format, and each arc has a
//! capacity and a flow. Residual arcs are not stored: a second, reverse CSR
//! structure lists, for each node, the arcs entering it, referring to the
//! same flow slot. The residual capacity of an arc is *c* − *f*, and the
//! residual capacity of its reverse is *f*.
//!
//! Arcs from the super-target to targets start saturated, that is, with flow
//! equal to their capacity. Thus, sending flow from a target into the
//! super-target means decreasing the flow of the arc, and the flow delivered
//! to a target is the capacity of its arc minus its flow.

use super::{InputNodes, MaxFlowError};
use crate::traits::CapacityGraph;
use crate::utils::{atomic_f64_slice, AtomicF64};
use dsi_progress_logger::ProgressLog;
use std::sync::atomic::Ordering;

const NIL: usize = usize::MAX;

/// An arc of the residual graph, as seen from one of its endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResidualArc {
    /// The other endpoint.
    pub node: usize,
    /// The index of the underlying arc (and of its flow slot).
    pub index: usize,
    /// Whether the underlying arc enters the node we are looking from.
    pub reverse: bool,
}

/// A flow on an arc of the input graph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowArc {
    pub src: usize,
    pub dst: usize,
    pub flow: f64,
}

/// A residual graph built from a [`CapacityGraph`] and two sets of terminals.
///
/// The structure of the graph is immutable; flows are atomic so that the
/// graph can be shared among threads. See the [module documentation](self).
#[derive(Debug)]
pub struct FlowGraph {
    num_original_nodes: usize,
    num_original_arcs: u64,
    offsets: Box<[usize]>,
    targets: Box<[usize]>,
    capacities: Box<[f64]>,
    flow: Box<[AtomicF64]>,
    rev_offsets: Box<[usize]>,
    rev_sources: Box<[usize]>,
    rev_arcs: Box<[usize]>,
    /// The original node of each split node.
    split_nodes: Box<[usize]>,
}

impl FlowGraph {
    /// Returns the number of nodes, including terminals and split nodes.
    ///
    /// This value is also the sentinel label of unreachable nodes.
    #[inline(always)]
    pub fn num_nodes(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Returns the number of arcs, including terminal and split arcs.
    #[inline(always)]
    pub fn num_arcs(&self) -> usize {
        self.targets.len()
    }

    /// Returns the number of nodes of the input graph.
    #[inline(always)]
    pub fn num_original_nodes(&self) -> usize {
        self.num_original_nodes
    }

    /// Returns the number of arcs of the input graph.
    #[inline(always)]
    pub fn num_original_arcs(&self) -> u64 {
        self.num_original_arcs
    }

    /// Returns the number of split nodes.
    #[inline(always)]
    pub fn num_split_nodes(&self) -> usize {
        self.split_nodes.len()
    }

    /// Returns the super-source.
    #[inline(always)]
    pub fn source(&self) -> usize {
        self.num_original_nodes
    }

    /// Returns the super-target.
    #[inline(always)]
    pub fn target(&self) -> usize {
        self.num_original_nodes + 1
    }

    /// Returns whether a node is one of the two terminals.
    #[inline(always)]
    pub fn is_terminal(&self, node: usize) -> bool {
        node == self.source() || node == self.target()
    }

    /// Returns the number of arcs leaving a node.
    #[inline(always)]
    pub fn outdegree(&self, node: usize) -> usize {
        self.offsets[node + 1] - self.offsets[node]
    }

    /// Returns the number of arcs entering a node.
    #[inline(always)]
    pub fn indegree(&self, node: usize) -> usize {
        self.rev_offsets[node + 1] - self.rev_offsets[node]
    }

    /// Returns the number of residual arcs of a node, that is, the sum of its
    /// outdegree and indegree.
    #[inline(always)]
    pub fn degree(&self, node: usize) -> usize {
        self.outdegree(node) + self.indegree(node)
    }

    /// Returns the target of an arc.
    #[inline(always)]
    pub fn arc_target(&self, index: usize) -> usize {
        self.targets[index]
    }

    /// Returns the capacity of an arc.
    #[inline(always)]
    pub fn capacity(&self, index: usize) -> f64 {
        self.capacities[index]
    }

    /// Returns the current flow on an arc.
    #[inline(always)]
    pub fn flow(&self, index: usize) -> f64 {
        self.flow[index].load(Ordering::Relaxed)
    }

    /// Returns the arcs leaving a node.
    pub fn arcs(&self, node: usize) -> impl Iterator<Item = ResidualArc> + '_ {
        (self.offsets[node]..self.offsets[node + 1]).map(|index| ResidualArc {
            node: self.targets[index],
            index,
            reverse: false,
        })
    }

    /// Returns the arcs entering a node, as reverse residual arcs.
    pub fn reverse_arcs(&self, node: usize) -> impl Iterator<Item = ResidualArc> + '_ {
        (self.rev_offsets[node]..self.rev_offsets[node + 1]).map(|pos| ResidualArc {
            node: self.rev_sources[pos],
            index: self.rev_arcs[pos],
            reverse: true,
        })
    }

    /// Returns all residual arcs of a node: first the arcs leaving it, and
    /// then the arcs entering it, tagged as reverse.
    pub fn relationships(&self, node: usize) -> impl Iterator<Item = ResidualArc> + '_ {
        self.arcs(node).chain(self.reverse_arcs(node))
    }

    /// Returns the residual capacity of an arc in the direction it was
    /// reached from, that is, from the node we are looking from towards
    /// `arc.node`.
    #[inline(always)]
    pub fn residual(&self, arc: ResidualArc) -> f64 {
        let flow = self.flow(arc.index);
        if arc.reverse {
            flow
        } else {
            self.capacities[arc.index] - flow
        }
    }

    /// Returns the residual capacity of an arc in the direction opposite to
    /// the one it was reached from, that is, from `arc.node` towards the node
    /// we are looking from.
    #[inline(always)]
    pub fn reverse_residual(&self, arc: ResidualArc) -> f64 {
        let flow = self.flow(arc.index);
        if arc.reverse {
            self.capacities[arc.index] - flow
        } else {
            flow
        }
    }

    /// Sends flow along a residual arc in the direction it was reached from.
    ///
    /// This method is not atomic: it must not be used while other threads
    /// might push on the same arc.
    #[inline(always)]
    pub fn push(&self, arc: ResidualArc, amount: f64) {
        self.flow[arc.index].add(if arc.reverse { -amount } else { amount });
    }

    /// Sends flow along a residual arc in the direction it was reached from,
    /// using an atomic addition.
    #[inline(always)]
    pub fn push_atomic(&self, arc: ResidualArc, amount: f64) {
        self.flow[arc.index].fetch_add(if arc.reverse { -amount } else { amount }, Ordering::Relaxed);
    }

    /// Restores the initial flow: zero everywhere, except for the saturated
    /// arcs leaving the super-target.
    pub fn reset_flow(&self) {
        let target = self.target();
        for (index, flow) in self.flow.iter().enumerate() {
            flow.store(0.0, Ordering::Relaxed);
            if (self.offsets[target]..self.offsets[target + 1]).contains(&index) {
                flow.store(self.capacities[index], Ordering::Relaxed);
            }
        }
    }

    /// Returns the total flow leaving the super-source.
    pub fn supplied_flow(&self) -> f64 {
        self.arcs(self.source()).map(|arc| self.flow(arc.index)).sum()
    }

    /// Returns the total flow delivered to the super-target, that is, the sum
    /// over the arcs leaving the super-target of the difference between
    /// capacity and flow.
    pub fn delivered_flow(&self) -> f64 {
        self.arcs(self.target())
            .map(|arc| self.capacities[arc.index] - self.flow(arc.index))
            .sum()
    }

    /// Returns the arcs of the input graph with strictly positive flow, in
    /// the numbering of the input graph.
    ///
    /// Arcs leaving a split node are reported as leaving the node it was
    /// split from; the arc connecting a node with its split node is not
    /// reported.
    pub fn flows(&self) -> Vec<FlowArc> {
        let mut result = vec![];
        let first_split = self.num_original_nodes + 2;
        let originals = (0..self.num_original_nodes).map(|node| (node, node));
        let splits = self
            .split_nodes
            .iter()
            .enumerate()
            .map(|(i, &original)| (first_split + i, original));
        for (node, src) in originals.chain(splits) {
            for arc in self.arcs(node) {
                if arc.node >= self.num_original_nodes {
                    // Split arc
                    continue;
                }
                let flow = self.flow(arc.index);
                if flow > 0.0 {
                    result.push(FlowArc {
                        src,
                        dst: arc.node,
                        flow,
                    });
                }
            }
        }
        result
    }
}

/// Builds a [`FlowGraph`].
///
/// # Examples
///
/// ```
/// use maxflow::graphs::vec_graph::CapacityVecGraph;
/// use maxflow::maxflow::{flow_graph::FlowGraphBuilder, InputNodes};
/// use dsi_progress_logger::no_logging;
///
/// let graph = CapacityVecGraph::from_arcs([(0, 1, 3.0), (1, 2, 2.0)]);
/// let flow_graph = FlowGraphBuilder::new(&graph).build(
///     &InputNodes::List(vec![0]),
///     &InputNodes::Map(vec![(2, 1.0)]),
///     no_logging![],
/// )?;
/// // Three nodes plus the two terminals
/// assert_eq!(flow_graph.num_nodes(), 5);
/// // Two arcs plus one terminal arc per terminal
/// assert_eq!(flow_graph.num_arcs(), 4);
/// assert_eq!(flow_graph.delivered_flow(), 0.0);
/// # Ok::<(), maxflow::maxflow::MaxFlowError>(())
/// ```
#[derive(Debug)]
pub struct FlowGraphBuilder<'a, G: CapacityGraph> {
    graph: &'a G,
    node_capacities: Option<&'a [f64]>,
}

impl<'a, G: CapacityGraph> FlowGraphBuilder<'a, G> {
    pub fn new(graph: &'a G) -> Self {
        Self {
            graph,
            node_capacities: None,
        }
    }

    /// Sets the node capacities.
    ///
    /// Every node with a finite capacity is split: a new node is added,
    /// all arcs leaving the original node leave the new node instead, and an
    /// arc with the node capacity connects the original node to the new one.
    /// The arc from the super-target to a split target enters the new node,
    /// so the capacity also bounds the flow absorbed by the target. An
    /// infinite capacity means no constraint.
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

    /// Maps terminals to nodes, checking them and assigning them a capacity.
    fn resolve(
        &self,
        terminals: &InputNodes,
        in_capacities: Option<&[f64]>,
    ) -> Result<Vec<(usize, f64)>, MaxFlowError> {
        let map = |id: u64| {
            self.graph
                .to_mapped_node_id(id)
                .ok_or(MaxFlowError::UnknownNode { node: id })
        };
        let resolved = match terminals {
            InputNodes::List(ids) => ids
                .iter()
                .map(|&id| {
                    let node = map(id)?;
                    let capacity = match in_capacities {
                        Some(c) => c[node],
                        None => self.graph.out_capacity(node),
                    };
                    Ok((node, capacity))
                })
                .collect::<Result<Vec<_>, MaxFlowError>>()?,
            InputNodes::Map(ids) => ids
                .iter()
                .map(|&(id, capacity)| {
                    if !(capacity >= 0.0 && capacity.is_finite()) {
                        return Err(MaxFlowError::InvalidTerminalCapacity { node: id, capacity });
                    }
                    Ok((map(id)?, capacity))
                })
                .collect::<Result<Vec<_>, MaxFlowError>>()?,
        };
        let mut nodes = resolved.iter().map(|&(node, _)| node).collect::<Vec<_>>();
        nodes.sort_unstable();
        if let Some(w) = nodes.windows(2).find(|w| w[0] == w[1]) {
            return Err(MaxFlowError::DuplicateTerminal { node: w[0] as u64 });
        }
        Ok(resolved)
    }

    /// Checks the input, and then builds the flow graph.
    ///
    /// Nothing is allocated before all capacities and terminals have been
    /// checked.
    pub fn build(
        &self,
        sources: &InputNodes,
        targets: &InputNodes,
        pl: &mut impl ProgressLog,
    ) -> Result<FlowGraph, MaxFlowError> {
        let graph = self.graph;
        let n = graph.num_nodes();

        if sources.is_empty() {
            return Err(MaxFlowError::NoSources);
        }
        if targets.is_empty() {
            return Err(MaxFlowError::NoTargets);
        }

        if let Some(node_capacities) = self.node_capacities {
            if let Some((node, &capacity)) = node_capacities
                .iter()
                .enumerate()
                .find(|(_, c)| !(**c >= 0.0))
            {
                return Err(MaxFlowError::InvalidNodeCapacity { node, capacity });
            }
        }

        // Check capacities, and compute in-capacities if needed by targets
        let mut in_capacities = matches!(targets, InputNodes::List(_)).then(|| vec![0.0; n]);
        let mut num_arcs = 0;
        for src in 0..n {
            for (dst, capacity) in graph.successors(src) {
                if !(capacity >= 0.0) {
                    return Err(MaxFlowError::NegativeCapacity { src, dst, capacity });
                }
                if src != dst {
                    if let Some(c) = in_capacities.as_mut() {
                        c[dst] += capacity;
                    }
                    num_arcs += 1;
                }
            }
        }

        let sources = self.resolve(sources, None)?;
        let targets = self.resolve(targets, in_capacities.as_deref())?;
        drop(in_capacities);
        {
            let mut target_nodes = targets.iter().map(|&(node, _)| node).collect::<Vec<_>>();
            target_nodes.sort_unstable();
            if let Some(&(node, _)) = sources
                .iter()
                .find(|(node, _)| target_nodes.binary_search(node).is_ok())
            {
                return Err(MaxFlowError::SourceIsTarget { node: node as u64 });
            }
        }

        let mut split_index = vec![NIL; n];
        let mut split_nodes = vec![];
        if let Some(node_capacities) = self.node_capacities {
            for (node, &capacity) in node_capacities.iter().enumerate() {
                if capacity.is_finite() {
                    split_index[node] = n + 2 + split_nodes.len();
                    split_nodes.push(node);
                }
            }
        }

        let num_nodes = n + 2 + split_nodes.len();
        let num_arcs = num_arcs + split_nodes.len() + sources.len() + targets.len();

        pl.item_name("node");
        pl.expected_updates(Some(num_nodes));
        pl.start(format!(
            "Building flow graph with {} nodes and {} arcs...",
            num_nodes, num_arcs
        ));

        let mut offsets = Vec::with_capacity(num_nodes + 1);
        let mut arc_targets = Vec::with_capacity(num_arcs);
        let mut capacities = Vec::with_capacity(num_arcs);
        offsets.push(0);

        let add_successors = |src: usize, arc_targets: &mut Vec<usize>, capacities: &mut Vec<f64>| {
            for (dst, capacity) in graph.successors(src) {
                // Loops can never carry useful flow
                if dst != src {
                    arc_targets.push(dst);
                    capacities.push(capacity);
                }
            }
        };

        for node in 0..n {
            if split_index[node] != NIL {
                arc_targets.push(split_index[node]);
                // Split nodes exist only for finite capacities
                capacities.push(self.node_capacities.map_or(f64::INFINITY, |c| c[node]));
            } else {
                add_successors(node, &mut arc_targets, &mut capacities);
            }
            offsets.push(arc_targets.len());
            pl.light_update();
        }

        for &(node, supply) in &sources {
            arc_targets.push(node);
            capacities.push(supply);
        }
        offsets.push(arc_targets.len());
        let first_demand_arc = arc_targets.len();
        for &(node, demand) in &targets {
            // Flow absorbed by a split target must cross its split arc
            arc_targets.push(if split_index[node] != NIL {
                split_index[node]
            } else {
                node
            });
            capacities.push(demand);
        }
        let end_demand_arc = arc_targets.len();
        offsets.push(end_demand_arc);
        pl.update_with_count(2);

        for &node in &split_nodes {
            add_successors(node, &mut arc_targets, &mut capacities);
            offsets.push(arc_targets.len());
            pl.light_update();
        }

        debug_assert_eq!(offsets.len(), num_nodes + 1);
        debug_assert_eq!(arc_targets.len(), num_arcs);

        // Reverse CSR: count indegrees, then fill
        let mut rev_offsets = vec![0; num_nodes + 1];
        for &dst in &arc_targets {
            rev_offsets[dst + 1] += 1;
        }
        for i in 0..num_nodes {
            rev_offsets[i + 1] += rev_offsets[i];
        }
        let mut next = rev_offsets[..num_nodes].to_vec();
        let mut rev_sources = vec![0; num_arcs];
        let mut rev_arcs = vec![0; num_arcs];
        for src in 0..num_nodes {
            for index in offsets[src]..offsets[src + 1] {
                let dst = arc_targets[index];
                rev_sources[next[dst]] = src;
                rev_arcs[next[dst]] = index;
                next[dst] += 1;
            }
        }

        let flow = atomic_f64_slice(num_arcs, 0.0);
        for index in first_demand_arc..end_demand_arc {
            flow[index].store(capacities[index], Ordering::Relaxed);
        }

        pl.done();

        Ok(FlowGraph {
            num_original_nodes: n,
            num_original_arcs: graph.num_arcs(),
            offsets: offsets.into_boxed_slice(),
            targets: arc_targets.into_boxed_slice(),
            capacities: capacities.into_boxed_slice(),
            flow,
            rev_offsets: rev_offsets.into_boxed_slice(),
            rev_sources: rev_sources.into_boxed_slice(),
            rev_arcs: rev_arcs.into_boxed_slice(),
            split_nodes: split_nodes.into_boxed_slice(),
        })
    }
}
