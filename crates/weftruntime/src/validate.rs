//! Pre-run structural validation.

use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use std::collections::HashMap;
use weftcore::{Graph, GraphError, NodeId};

/// Check a graph before running it: every flow input must carry a body, and
/// the value connections must form a DAG. Connect-time checks already reject
/// type mismatches and self-loops; this catches what only the whole graph
/// can show.
pub fn validate_graph(graph: &Graph) -> Result<(), GraphError> {
    for (id, node) in graph.iter_nodes() {
        for input in node.flow_inputs() {
            if !input.has_action() {
                return Err(GraphError::MissingAction {
                    node: id,
                    port: input.key().to_string(),
                });
            }
        }
    }

    let mut dag: DiGraph<NodeId, ()> = DiGraph::new();
    let mut indices = HashMap::new();
    for (id, _) in graph.iter_nodes() {
        indices.insert(id, dag.add_node(id));
    }
    for link in graph.value_links() {
        if let (Some(&from), Some(&to)) = (
            indices.get(&link.output.node),
            indices.get(&link.input.node),
        ) {
            if from != to {
                dag.add_edge(from, to, ());
            }
        }
    }
    toposort(&dag, None).map_err(|_| GraphError::CyclicDependency)?;
    Ok(())
}
