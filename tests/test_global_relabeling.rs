/*
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

mod common;

use anyhow::Result;
use common::*;
use dsi_progress_logger::no_logging;
use maxflow::maxflow::flow_graph::{FlowGraph, FlowGraphBuilder};
use maxflow::maxflow::global_relabeling::GlobalRelabeling;
use maxflow::maxflow::phase::MaxFlowPhase;
use maxflow::maxflow::DischargeConfig;
use maxflow::prelude::*;
use maxflow::thread_pool;

fn build(graph: &CapacityVecGraph, sources: &[u64], targets: &[u64]) -> Result<FlowGraph> {
    Ok(FlowGraphBuilder::new(graph).build(
        &InputNodes::List(sources.to_vec()),
        &InputNodes::List(targets.to_vec()),
        no_logging![],
    )?)
}

/// Checks that labels are exactly the residual distances towards `sink`.
fn check_exact(flow_graph: &FlowGraph, labels: &[usize], source: usize, sink: usize) {
    let sentinel = flow_graph.num_nodes();
    let dist = distances(flow_graph, sink, source);
    for node in 0..sentinel {
        let expected = if node == source {
            sentinel
        } else {
            dist[node].unwrap_or(sentinel)
        };
        assert_eq!(labels[node], expected, "node {}", node);
    }
}

/// Checks that labels are valid: for each residual arc (u, v), with neither
/// node being the source, d(u) ≤ d(v) + 1.
fn check_valid(flow_graph: &FlowGraph, labels: &[usize], source: usize) {
    for u in 0..flow_graph.num_nodes() {
        if u == source {
            continue;
        }
        for arc in flow_graph.relationships(u) {
            if arc.node != source && flow_graph.residual(arc) > 0.0 {
                assert!(
                    labels[u] <= labels[arc.node] + 1,
                    "arc {} -> {}: labels {} and {}",
                    u,
                    arc.node,
                    labels[u],
                    labels[arc.node]
                );
            }
        }
    }
}

#[test]
fn test_path() -> Result<()> {
    let graph = CapacityVecGraph::from_arcs([(0, 1, 1.0), (1, 2, 1.0), (2, 3, 1.0), (4, 3, 1.0)]);
    let flow_graph = build(&graph, &[0], &[3])?;
    let (s, t) = (flow_graph.source(), flow_graph.target());
    let mut labels = vec![0; flow_graph.num_nodes()];
    let mut relabeling = GlobalRelabeling::new(&flow_graph, 1);
    let max = relabeling.run(
        &mut labels,
        s,
        t,
        &TerminationFlag::new(),
        no_logging![],
    )?;
    assert_eq!(labels[t], 0);
    assert_eq!(labels[3], 1);
    assert_eq!(labels[2], 2);
    assert_eq!(labels[1], 3);
    assert_eq!(labels[0], 4);
    assert_eq!(labels[4], 2);
    assert_eq!(labels[s], flow_graph.num_nodes());
    assert_eq!(max, 4);
    check_exact(&flow_graph, &labels, s, t);

    // Backwards: only the source side can be reached
    let max = relabeling.run(
        &mut labels,
        t,
        s,
        &TerminationFlag::new(),
        no_logging![],
    )?;
    assert_eq!(labels[s], 0);
    assert_eq!(labels[t], flow_graph.num_nodes());
    assert_eq!(max, 0);
    check_exact(&flow_graph, &labels, t, s);
    Ok(())
}

#[test]
fn test_random_exact() -> Result<()> {
    for seed in 0..10 {
        let graph = random_graph(300, 900, 3, seed);
        let flow_graph = build(&graph, &[0, 1, 2], &[297, 298, 299])?;
        let (s, t) = (flow_graph.source(), flow_graph.target());
        for num_threads in [1, 4] {
            for granularity in [1, 16, 1000] {
                let mut labels = vec![0; flow_graph.num_nodes()];
                thread_pool![num_threads].install(|| {
                    GlobalRelabeling::new(&flow_graph, granularity).run(
                        &mut labels,
                        s,
                        t,
                        &TerminationFlag::new(),
                        no_logging![],
                    )
                })?;
                check_exact(&flow_graph, &labels, s, t);
                check_valid(&flow_graph, &labels, s);
            }
        }
    }
    Ok(())
}

#[test]
fn test_idempotent() -> Result<()> {
    let graph = random_graph(500, 2000, 5, 7);
    let flow_graph = build(&graph, &[0], &[499])?;
    let (s, t) = (flow_graph.source(), flow_graph.target());
    let mut relabeling = GlobalRelabeling::new(&flow_graph, 8);
    let mut first = vec![0; flow_graph.num_nodes()];
    let mut second = vec![17; flow_graph.num_nodes()];
    relabeling.run(&mut first, s, t, &TerminationFlag::new(), no_logging![])?;
    relabeling.run(&mut second, s, t, &TerminationFlag::new(), no_logging![])?;
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn test_interrupted() -> Result<()> {
    let graph = random_graph(50, 200, 5, 0);
    let flow_graph = build(&graph, &[0], &[49])?;
    let flag = TerminationFlag::new();
    flag.terminate();
    let mut labels = vec![0; flow_graph.num_nodes()];
    assert_eq!(
        GlobalRelabeling::new(&flow_graph, 1).run(
            &mut labels,
            flow_graph.source(),
            flow_graph.target(),
            &flag,
            no_logging![],
        ),
        Err(Interrupted)
    );
    Ok(())
}

#[test]
fn test_max_preflow_cut() -> Result<()> {
    // After the first pass, retired nodes cannot reach the target
    for seed in 0..10 {
        let graph = random_graph(14, 50, 10, seed);
        let flow_graph = build(&graph, &[0, 1], &[12, 13])?;
        let expected = brute_force_max_flow(
            &graph,
            &InputNodes::List(vec![0, 1]),
            &InputNodes::List(vec![12, 13]),
        );
        let (s, t) = (flow_graph.source(), flow_graph.target());
        for engine in [Engine::Sequential, Engine::Parallel] {
            for gap in [Gap::None, Gap::Counts, Gap::Buckets, Gap::SortedSet] {
                flow_graph.reset_flow();
                let config = DischargeConfig {
                    gap,
                    ..Default::default()
                };
                let mut phase = MaxFlowPhase::new(&flow_graph, &config, engine);
                phase.initialize_preflow();
                phase.compute_max_preflow(no_logging![], no_logging![])?;

                let sentinel = flow_graph.num_nodes();
                let reachable = can_reach(&flow_graph, t, s);
                let labels = phase.labels();
                let excess = phase.excess();
                for node in 0..sentinel {
                    if node == s || node == t {
                        continue;
                    }
                    if labels[node] == sentinel {
                        assert!(!reachable[node], "{engine}, {gap}: node {node}");
                    }
                    // No active node is left
                    assert!(excess[node] <= 1E-9 || labels[node] == sentinel);
                }
                // The preflow value is the value of a maximum flow
                assert_eq!(phase.total_flow(), expected);
            }
        }
    }
    Ok(())
}
