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
use maxflow::maxflow::flow_graph::FlowGraphBuilder;
use maxflow::prelude::*;

#[test]
fn test_structure() -> Result<()> {
    for seed in 0..5 {
        let graph = random_graph(200, 1000, 10, seed);
        let node_capacities = (0..200)
            .map(|node| if node % 3 == 0 { 5.0 } else { f64::INFINITY })
            .collect::<Vec<_>>();
        let sources = InputNodes::List(vec![1, 2]);
        let targets = InputNodes::Map(vec![(198, 4.0), (199, 4.0)]);

        for caps in [None, Some(&node_capacities[..])] {
            let flow_graph = FlowGraphBuilder::new(&graph)
                .node_capacities(caps)
                .build(&sources, &targets, no_logging![])?;

            let num_loops = (0..graph.num_nodes())
                .map(|u| graph.successors(u).filter(|&(v, _)| u == v).count())
                .sum::<usize>();
            let num_split = if caps.is_some() { 67 } else { 0 };
            assert_eq!(flow_graph.num_split_nodes(), num_split);
            assert_eq!(flow_graph.num_nodes(), 202 + num_split);
            assert_eq!(
                flow_graph.num_arcs(),
                1000 - num_loops + num_split + 4
            );
            assert_eq!(flow_graph.num_original_arcs(), 1000);

            // Every arc appears exactly once among the reverse arcs of its
            // target
            let mut degree_sum = 0;
            for u in 0..flow_graph.num_nodes() {
                degree_sum += flow_graph.degree(u);
                for arc in flow_graph.arcs(u) {
                    assert_eq!(flow_graph.arc_target(arc.index), arc.node);
                    let back = flow_graph
                        .reverse_arcs(arc.node)
                        .filter(|b| b.index == arc.index)
                        .collect::<Vec<_>>();
                    assert_eq!(back.len(), 1);
                    assert_eq!(back[0].node, u);
                }
            }
            assert_eq!(degree_sum, 2 * flow_graph.num_arcs());

            // Only the demand arcs carry flow
            assert_eq!(flow_graph.delivered_flow(), 0.0);
            assert_eq!(flow_graph.supplied_flow(), 0.0);
            assert!(flow_graph.flows().is_empty());
            assert_eq!(
                flow_graph
                    .arcs(flow_graph.target())
                    .map(|arc| flow_graph.flow(arc.index))
                    .sum::<f64>(),
                8.0
            );
        }
    }
    Ok(())
}

#[test]
fn test_terminal_capacities() -> Result<()> {
    let graph = CapacityVecGraph::from_arcs([
        (0, 1, 2.0),
        (0, 2, 3.0),
        (0, 0, 7.0),
        (1, 3, 1.0),
        (2, 3, 4.0),
        (3, 3, 7.0),
    ]);
    let flow_graph = FlowGraphBuilder::new(&graph).build(
        &InputNodes::List(vec![0]),
        &InputNodes::List(vec![3]),
        no_logging![],
    )?;
    let supply = flow_graph.arcs(flow_graph.source()).collect::<Vec<_>>();
    assert_eq!(supply.len(), 1);
    assert_eq!(supply[0].node, 0);
    assert_eq!(flow_graph.capacity(supply[0].index), 5.0);

    let demand = flow_graph.arcs(flow_graph.target()).collect::<Vec<_>>();
    assert_eq!(demand.len(), 1);
    assert_eq!(demand[0].node, 3);
    assert_eq!(flow_graph.capacity(demand[0].index), 5.0);
    assert!(flow_graph.is_terminal(flow_graph.source()));
    assert!(!flow_graph.is_terminal(0));
    Ok(())
}

#[test]
fn test_flows_of_split_nodes() -> Result<()> {
    let graph = CapacityVecGraph::from_arcs([(0, 1, 4.0), (1, 2, 4.0), (1, 3, 4.0)]);
    let node_capacities = [f64::INFINITY, 3.0, f64::INFINITY, f64::INFINITY];
    let mut max_flow = MaxFlow::new(&graph, vec![0].into(), vec![2, 3].into());
    max_flow.node_capacities(Some(&node_capacities[..]));
    let result = max_flow.run()?;
    assert_eq!(result.total_flow, 3.0);
    // Arcs of the split node are reported as leaving node 1
    assert!(result.flows.iter().all(|a| a.src < 4 && a.dst < 4));
    let out_of_1 = result
        .flows
        .iter()
        .filter(|a| a.src == 1)
        .map(|a| a.flow)
        .sum::<f64>();
    assert_eq!(out_of_1, 3.0);
    Ok(())
}
