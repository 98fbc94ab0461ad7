/*
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use super::vec_graph::CapacityVecGraph;
use rand::{rngs::SmallRng, Rng, SeedableRng};

/// Random graphs with a fixed outdegree and uniformly distributed capacities.
///
/// Every node gets exactly `outdegree` arcs towards targets chosen uniformly
/// at random among the other nodes (so parallel arcs are possible, but loops
/// are not), and each arc gets a capacity chosen uniformly at random in
/// [0 . . `max_capacity`).
///
/// Generation is deterministic given the seed, which makes these graphs
/// suitable for regression tests and benchmarks.
#[derive(Debug, Clone)]
pub struct UniformCapacities {
    n: usize,
    outdegree: usize,
    max_capacity: f64,
    seed: u64,
}

impl UniformCapacities {
    /// Creates a new generator given the number of nodes, the outdegree of
    /// each node, the capacity upper bound, and a seed for the [pseudorandom
    /// number generator](SmallRng).
    pub fn new(n: usize, outdegree: usize, max_capacity: f64, seed: u64) -> Self {
        assert!(
            max_capacity > 0.0 && max_capacity.is_finite(),
            "The capacity upper bound must be positive and finite, got {max_capacity}"
        );
        Self {
            n,
            outdegree,
            max_capacity,
            seed,
        }
    }

    /// Generates the graph.
    pub fn generate(&self) -> CapacityVecGraph {
        let mut rng = SmallRng::seed_from_u64(self.seed);
        let mut graph = CapacityVecGraph::empty(self.n);
        if self.n < 2 {
            return graph;
        }
        for u in 0..self.n {
            for _ in 0..self.outdegree {
                // Skip u by shifting the upper part of the range
                let mut v = rng.random_range(0..self.n - 1);
                if v >= u {
                    v += 1;
                }
                let capacity = rng.random_range(0.0..self.max_capacity);
                graph.add_arc(u, v, capacity);
            }
        }
        graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::CapacityGraph;

    #[test]
    fn test_uniform_capacities() {
        let g = UniformCapacities::new(100, 5, 10.0, 0).generate();
        assert_eq!(g.num_nodes(), 100);
        assert_eq!(g.num_arcs(), 500);
        for u in 0..100 {
            for (v, c) in g.successors(u) {
                assert_ne!(u, v);
                assert!((0.0..10.0).contains(&c));
            }
        }
        assert_eq!(g, UniformCapacities::new(100, 5, 10.0, 0).generate());
    }
}
