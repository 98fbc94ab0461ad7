/*
 * SPDX-FileCopyrightText: 2025 Inria
 * SPDX-FileCopyrightText: 2025 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

/// Granularity of parallel tasks, specified transparently by nodes or arcs.
///
/// Parallel phases of the solver (relabeling rounds and concurrent discharges)
/// consume a shared [working set](crate::maxflow::working_set::AtomicWorkingSet)
/// by claiming contiguous batches of nodes. This enum specifies the size of
/// such batches either directly, as a number of nodes, or indirectly, as a
/// number of arcs, in which case the number of nodes is derived from the
/// average outdegree of the flow graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    /// Node granularity.
    ///
    /// Each batch will be formed by the specified number of nodes.
    Nodes(usize),
    /// Arc granularity.
    ///
    /// Each batch will be formed by a number of nodes that has, tentatively,
    /// sum of outdegrees equal to the specified number of arcs.
    Arcs(u64),
}

impl core::default::Default for Granularity {
    /// Returns a default granularity of 1024 nodes.
    fn default() -> Self {
        Self::Nodes(1024)
    }
}

impl Granularity {
    /// Returns a node granularity for a given number of nodes and arcs.
    ///
    /// For the variant [`Nodes`](Self::Nodes), the specified number of nodes is
    /// returned. For the variant [`Arcs`](Self::Arcs), the number of nodes is
    /// computed as the specified number of arcs divided by the average
    /// outdegree. The result is never zero.
    pub fn node_granularity(&self, num_nodes: usize, num_arcs: u64) -> usize {
        match self {
            Self::Nodes(n) => (*n).max(1),
            Self::Arcs(n) => {
                let average_degree = num_arcs as f64 / num_nodes.max(1) as f64;
                if average_degree == 0.0 {
                    return (*n).clamp(1, usize::MAX as u64) as usize;
                }
                (*n as f64 / average_degree)
                    .min(usize::MAX as f64)
                    .ceil()
                    .max(1.) as usize
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_granularity() {
        assert_eq!(Granularity::Nodes(100).node_granularity(10, 1000), 100);
        assert_eq!(Granularity::Nodes(0).node_granularity(10, 1000), 1);
        // Average degree 10
        assert_eq!(Granularity::Arcs(1000).node_granularity(100, 1000), 100);
        assert_eq!(Granularity::Arcs(5).node_granularity(100, 1000), 1);
        // No arcs at all
        assert_eq!(Granularity::Arcs(64).node_granularity(100, 0), 64);
    }
}
