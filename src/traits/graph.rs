/*
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Traits for read-only graphs with arc capacities.
//!
//! The flow solver never modifies the graph it is given: it reads its
//! adjacency lists once, while [building](crate::maxflow::flow_graph::FlowGraphBuilder)
//! its own residual representation.
//!
//! Implementations are usually shared between threads through a `&G`. Since
//! iteration state lives in the [`Successors`](CapacityGraph::Successors)
//! iterator and not in the graph, any number of threads can enumerate
//! successors concurrently as long as the graph is [`Sync`].

/// A read-only directed graph with a nonnegative capacity on each arc.
///
/// Nodes are identified by integers in [0 . . [`num_nodes`](CapacityGraph::num_nodes)).
/// Parallel arcs are allowed and are treated as distinct arcs.
pub trait CapacityGraph {
    /// The type of the iterator over the successors of a node, returning
    /// pairs made of the target node and the arc capacity.
    type Successors<'a>: IntoIterator<Item = (usize, f64)>
    where
        Self: 'a;

    /// Returns the number of nodes in the graph.
    fn num_nodes(&self) -> usize;

    /// Returns the number of arcs in the graph.
    fn num_arcs(&self) -> u64;

    /// Returns the number of successors of a node.
    fn outdegree(&self, node: usize) -> usize;

    /// Returns the successors of a node, with the capacity of each arc.
    ///
    /// Successive calls must return the successors in the same order.
    fn successors(&self, node: usize) -> Self::Successors<'_>;

    /// Maps an original (external) node identifier to a node of this graph.
    ///
    /// The default implementation is the identity on [0 . .
    /// [`num_nodes`](CapacityGraph::num_nodes)), and returns `None` on any
    /// other value.
    fn to_mapped_node_id(&self, original: u64) -> Option<usize> {
        usize::try_from(original)
            .ok()
            .filter(|&node| node < self.num_nodes())
    }

    /// Returns the sum of the capacities of the outgoing arcs of a node,
    /// excluding loops.
    fn out_capacity(&self, node: usize) -> f64 {
        self.successors(node)
            .into_iter()
            .filter(|&(succ, _)| succ != node)
            .map(|(_, c)| c)
            .sum()
    }
}

impl<G: CapacityGraph + ?Sized> CapacityGraph for &G {
    type Successors<'a>
        = G::Successors<'a>
    where
        Self: 'a;

    #[inline(always)]
    fn num_nodes(&self) -> usize {
        (**self).num_nodes()
    }

    #[inline(always)]
    fn num_arcs(&self) -> u64 {
        (**self).num_arcs()
    }

    #[inline(always)]
    fn outdegree(&self, node: usize) -> usize {
        (**self).outdegree(node)
    }

    #[inline(always)]
    fn successors(&self, node: usize) -> Self::Successors<'_> {
        (**self).successors(node)
    }

    #[inline(always)]
    fn to_mapped_node_id(&self, original: u64) -> Option<usize> {
        (**self).to_mapped_node_id(original)
    }

    #[inline(always)]
    fn out_capacity(&self, node: usize) -> f64 {
        (**self).out_capacity(node)
    }
}
