/*
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use crate::traits::CapacityGraph;

/// A mutable [`CapacityGraph`] implementation based on a vector of vectors.
///
/// Arcs can be added in any order, and parallel arcs are kept as distinct
/// arcs. Successors are returned in insertion order.
///
/// # Examples
///
/// ```
/// use maxflow::graphs::vec_graph::CapacityVecGraph;
/// use maxflow::traits::CapacityGraph;
///
/// let graph = CapacityVecGraph::from_arcs([(0, 1, 3.0), (0, 2, 2.0), (1, 2, 1.0)]);
/// assert_eq!(graph.num_nodes(), 3);
/// assert_eq!(graph.num_arcs(), 3);
/// assert_eq!(graph.out_capacity(0), 5.0);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CapacityVecGraph {
    /// The number of arcs in the graph.
    num_arcs: u64,
    /// For each node, its list of successors with the associated capacity.
    succ: Vec<Vec<(usize, f64)>>,
}

impl CapacityVecGraph {
    /// Creates a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new empty graph with `n` nodes.
    pub fn empty(n: usize) -> Self {
        Self {
            num_arcs: 0,
            succ: Vec::from_iter((0..n).map(|_| Vec::new())),
        }
    }

    /// Adds an isolated node to the graph and returns true if it is a new node.
    pub fn add_node(&mut self, node: usize) -> bool {
        let len = self.succ.len();
        self.succ.extend((len..=node).map(|_| Vec::new()));
        len <= node
    }

    /// Adds an arc with the given capacity to the graph.
    ///
    /// Capacities are not checked here: negative or NaN capacities are
    /// rejected when building a [flow graph](crate::maxflow::flow_graph::FlowGraph).
    ///
    /// # Panics
    ///
    /// This method will panic if one of the given nodes is greater or equal
    /// than the number of nodes in the graph.
    pub fn add_arc(&mut self, u: usize, v: usize, capacity: f64) {
        let max = u.max(v);
        if max >= self.succ.len() {
            panic!(
                "Node {} does not exist (the graph has {} nodes)",
                max,
                self.succ.len(),
            );
        }
        self.succ[u].push((v, capacity));
        self.num_arcs += 1;
    }

    /// Adds arcs from an [`IntoIterator`], adding new nodes as needed.
    pub fn add_arcs(&mut self, arcs: impl IntoIterator<Item = (usize, usize, f64)>) -> &mut Self {
        for (u, v, c) in arcs {
            self.add_node(u.max(v));
            self.add_arc(u, v, c);
        }
        self
    }

    /// Creates a new graph from an [`IntoIterator`] of arcs with capacities.
    ///
    /// The number of nodes is one plus the largest node appearing in an arc.
    pub fn from_arcs(arcs: impl IntoIterator<Item = (usize, usize, f64)>) -> Self {
        let mut g = Self::new();
        g.add_arcs(arcs);
        g
    }

    /// Creates a new graph from an [`IntoIterator`] of arcs, all with
    /// unit capacity.
    ///
    /// ```
    /// use maxflow::graphs::vec_graph::CapacityVecGraph;
    /// use maxflow::traits::CapacityGraph;
    ///
    /// let graph = CapacityVecGraph::from_unweighted_arcs([(0, 1), (0, 2), (1, 2)]);
    /// assert_eq!(graph.num_nodes(), 3);
    /// assert_eq!(graph.num_arcs(), 3);
    /// assert_eq!(graph.out_capacity(0), 2.0);
    /// assert_eq!(graph.successors(1).collect::<Vec<_>>(), vec![(2, 1.0)]);
    /// ```
    pub fn from_unweighted_arcs(arcs: impl IntoIterator<Item = (usize, usize)>) -> Self {
        Self::from_arcs(arcs.into_iter().map(|(u, v)| (u, v, 1.0)))
    }

    /// Shrinks the capacity of the graph to fit its current size.
    pub fn shrink_to_fit(&mut self) {
        self.succ.shrink_to_fit();
        for s in self.succ.iter_mut() {
            s.shrink_to_fit();
        }
    }
}

impl CapacityGraph for CapacityVecGraph {
    type Successors<'a> = std::iter::Copied<std::slice::Iter<'a, (usize, f64)>>;

    #[inline(always)]
    fn num_nodes(&self) -> usize {
        self.succ.len()
    }

    #[inline(always)]
    fn num_arcs(&self) -> u64 {
        self.num_arcs
    }

    #[inline(always)]
    fn outdegree(&self, node: usize) -> usize {
        self.succ[node].len()
    }

    #[inline(always)]
    fn successors(&self, node: usize) -> Self::Successors<'_> {
        self.succ[node].iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_arcs() {
        let mut g = CapacityVecGraph::empty(2);
        g.add_arc(0, 1, 1.0);
        g.add_arc(0, 1, 2.0);
        g.add_arcs([(3, 0, 4.0)]);
        assert_eq!(g.num_nodes(), 4);
        assert_eq!(g.num_arcs(), 3);
        assert_eq!(g.outdegree(0), 2);
        assert_eq!(g.outdegree(2), 0);
        assert_eq!(
            g.successors(0).collect::<Vec<_>>(),
            vec![(1, 1.0), (1, 2.0)]
        );
        assert_eq!(g.to_mapped_node_id(3), Some(3));
        assert_eq!(g.to_mapped_node_id(4), None);
    }

    #[test]
    fn test_out_capacity() {
        let g = CapacityVecGraph::from_arcs([(0, 1, 2.0), (0, 0, 7.0), (0, 2, 3.0), (1, 1, 1.0)]);
        // Loops carry no flow, so they are not counted
        assert_eq!(g.out_capacity(0), 5.0);
        assert_eq!(g.out_capacity(1), 0.0);
        assert_eq!(g.out_capacity(2), 0.0);
    }

    #[test]
    #[should_panic]
    fn test_missing_node() {
        CapacityVecGraph::empty(2).add_arc(0, 2, 1.0);
    }
}
