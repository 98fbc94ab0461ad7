/*
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

#![allow(dead_code)]

use maxflow::maxflow::flow_graph::FlowArc;
use maxflow::prelude::*;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, VecDeque};

/// Returns the terminals with their capacity, computing the implicit supply
/// and demand of [list](InputNodes::List) terminals.
pub fn terminal_capacities(
    graph: &CapacityVecGraph,
    terminals: &InputNodes,
    is_source: bool,
) -> Vec<(usize, f64)> {
    match terminals {
        InputNodes::Map(v) => v.iter().map(|&(n, c)| (n as usize, c)).collect(),
        InputNodes::List(v) => v
            .iter()
            .map(|&n| {
                let n = n as usize;
                let cap = if is_source {
                    graph
                        .successors(n)
                        .filter(|&(d, _)| d != n)
                        .map(|(_, c)| c)
                        .sum()
                } else {
                    (0..graph.num_nodes())
                        .filter(|&u| u != n)
                        .flat_map(|u| graph.successors(u))
                        .filter(|&(d, _)| d == n)
                        .map(|(_, c)| c)
                        .sum()
                };
                (n, cap)
            })
            .collect(),
    }
}

/// Computes the value of a maximum flow as the capacity of a minimum cut,
/// enumerating all cuts.
///
/// Only usable for graphs with a few nodes.
pub fn brute_force_max_flow(
    graph: &CapacityVecGraph,
    sources: &InputNodes,
    targets: &InputNodes,
) -> f64 {
    let n = graph.num_nodes();
    assert!(n <= 20, "Too many nodes for brute force: {}", n);
    let sources = terminal_capacities(graph, sources, true);
    let targets = terminal_capacities(graph, targets, false);
    let mut best = f64::INFINITY;
    // Bit i set means node i is on the source side
    for side in 0_u64..1 << n {
        let on_source_side = |node: usize| side & (1 << node) != 0;
        let mut cut = 0.0;
        for &(s, supply) in &sources {
            if !on_source_side(s) {
                cut += supply;
            }
        }
        for &(t, demand) in &targets {
            if on_source_side(t) {
                cut += demand;
            }
        }
        for u in (0..n).filter(|&u| on_source_side(u)) {
            for (v, c) in graph.successors(u) {
                if !on_source_side(v) {
                    cut += c;
                }
            }
        }
        best = f64::min(best, cut);
    }
    best
}

/// Creates a random graph with integer capacities in [0 . . `max_capacity`).
pub fn random_graph(n: usize, m: usize, max_capacity: u32, seed: u64) -> CapacityVecGraph {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut graph = CapacityVecGraph::empty(n);
    for _ in 0..m {
        let u = rng.random_range(0..n);
        let v = rng.random_range(0..n);
        let c = rng.random_range(0..max_capacity) as f64;
        graph.add_arc(u, v, c);
    }
    graph
}

/// Checks that the given flows are feasible: capacities are respected, flow
/// is conserved at every non-terminal node, sources supply at most their
/// supply, and targets absorb at most their demand and exactly
/// `total_flow` overall.
pub fn check_feasible(
    graph: &CapacityVecGraph,
    flows: &[FlowArc],
    sources: &InputNodes,
    targets: &InputNodes,
    node_capacities: Option<&[f64]>,
    total_flow: f64,
) {
    let n = graph.num_nodes();
    let mut capacity = HashMap::<(usize, usize), f64>::new();
    for u in 0..n {
        for (v, c) in graph.successors(u) {
            *capacity.entry((u, v)).or_default() += c;
        }
    }
    let mut carried = HashMap::<(usize, usize), f64>::new();
    let mut balance = vec![0.0; n];
    let mut outflow = vec![0.0; n];
    let mut inflow = vec![0.0; n];
    for arc in flows {
        assert!(arc.flow > 0.0);
        *carried.entry((arc.src, arc.dst)).or_default() += arc.flow;
        balance[arc.dst] += arc.flow;
        balance[arc.src] -= arc.flow;
        outflow[arc.src] += arc.flow;
        inflow[arc.dst] += arc.flow;
    }
    for (pair, &f) in &carried {
        assert!(
            f <= capacity[pair] + 1E-9,
            "Arc {:?} carries {} > {}",
            pair,
            f,
            capacity[pair]
        );
    }

    let sources = terminal_capacities(graph, sources, true);
    let targets = terminal_capacities(graph, targets, false);
    let mut delivered = 0.0;
    for node in 0..n {
        if let Some(&(_, supply)) = sources.iter().find(|&&(s, _)| s == node) {
            assert!(-balance[node] >= -1E-9 && -balance[node] <= supply + 1E-9);
        } else if let Some(&(_, demand)) = targets.iter().find(|&&(t, _)| t == node) {
            assert!(balance[node] >= -1E-9 && balance[node] <= demand + 1E-9);
            delivered += balance[node];
        } else {
            assert!(
                balance[node].abs() <= 1E-9,
                "Node {} has imbalance {}",
                node,
                balance[node]
            );
        }
        if let Some(c) = node_capacities {
            // Throughput, counting flow absorbed by targets
            let through = f64::max(inflow[node], outflow[node]);
            assert!(
                through <= c[node] + 1E-9,
                "Node {} carries {} > {}",
                node,
                through,
                c[node]
            );
        }
    }
    assert!((delivered - total_flow).abs() <= 1E-9 * total_flow.max(1.0));
}

/// Returns the nodes of a flow graph that can reach `sink` through arcs with
/// positive residual capacity, without passing through `avoid`.
pub fn can_reach(
    graph: &maxflow::maxflow::flow_graph::FlowGraph,
    sink: usize,
    avoid: usize,
) -> Vec<bool> {
    let mut reached = vec![false; graph.num_nodes()];
    let mut queue = VecDeque::from([sink]);
    reached[sink] = true;
    reached[avoid] = true;
    while let Some(v) = queue.pop_front() {
        for arc in graph.relationships(v) {
            if !reached[arc.node] && graph.reverse_residual(arc) > 0.0 {
                reached[arc.node] = true;
                queue.push_back(arc.node);
            }
        }
    }
    reached[avoid] = false;
    reached
}

/// Returns the exact distances towards `sink` in the residual graph,
/// without passing through `avoid`, or `None` for unreachable nodes.
pub fn distances(
    graph: &maxflow::maxflow::flow_graph::FlowGraph,
    sink: usize,
    avoid: usize,
) -> Vec<Option<usize>> {
    let mut dist = vec![None; graph.num_nodes()];
    let mut queue = VecDeque::from([sink]);
    dist[sink] = Some(0);
    while let Some(v) = queue.pop_front() {
        let d = dist[v].unwrap();
        for arc in graph.relationships(v) {
            if arc.node != avoid && dist[arc.node].is_none() && graph.reverse_residual(arc) > 0.0 {
                dist[arc.node] = Some(d + 1);
                queue.push_back(arc.node);
            }
        }
    }
    dist
}
