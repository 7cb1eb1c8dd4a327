//! Ordering and reachability over committed nodes.

use super::error::GraphError;
use super::node::{DependencyNode, NodeId};
use petgraph::stable_graph::StableDiGraph;
use petgraph::Direction;
use std::collections::{HashMap, HashSet, VecDeque};

/// Performs a Topological Sort using Depth-First Search (DFS).
///
/// Returns the nodes so that every input appears before its consumer, which
/// is the order an execution engine must run them in.
///
/// Uses DFS instead of BFS (Kahn's) so a deep chain A->B->C stays contiguous
/// in the output rather than being spread across layers.
pub fn sort<E>(graph: &StableDiGraph<DependencyNode, E>) -> Result<Vec<NodeId>, GraphError> {
    let mut order = Vec::with_capacity(graph.node_count());
    let mut state: HashMap<NodeId, VisitState> = HashMap::with_capacity(graph.node_count());

    // Every node is a start point so disconnected components are covered.
    for id in graph.node_indices() {
        if !state.contains_key(&id) {
            visit(id, graph, &mut state, &mut order)?;
        }
    }

    Ok(order)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum VisitState {
    Visiting, // Used for cycle detection
    Visited,
}

fn visit<E>(
    node: NodeId,
    graph: &StableDiGraph<DependencyNode, E>,
    state: &mut HashMap<NodeId, VisitState>,
    order: &mut Vec<NodeId>,
) -> Result<(), GraphError> {
    match state.get(&node) {
        Some(VisitState::Visited) => return Ok(()),
        Some(VisitState::Visiting) => return Err(GraphError::CycleDetected(node)),
        None => {
            state.insert(node, VisitState::Visiting);
        }
    }

    // Recurse on inputs first.
    if let Some(weight) = graph.node_weight(node) {
        for input in weight.input_nodes() {
            visit(input, graph, state, order)?;
        }
    }

    state.insert(node, VisitState::Visited);
    order.push(node);
    Ok(())
}

/// All nodes the given nodes (transitively) consume, including themselves.
pub fn upstream_from<E>(graph: &StableDiGraph<DependencyNode, E>, start_nodes: &[NodeId]) -> HashSet<NodeId> {
    let mut visited = HashSet::new();
    let mut queue = VecDeque::from(start_nodes.to_vec());

    while let Some(node) = queue.pop_front() {
        if !graph.contains_node(node) {
            continue;
        }
        if visited.insert(node) {
            for input in graph[node].input_nodes() {
                queue.push_back(input);
            }
        }
    }
    visited
}

/// All nodes that (transitively) consume the given nodes, including themselves.
/// Used to find what must be recomputed when a source value changes.
pub fn downstream_from<E>(graph: &StableDiGraph<DependencyNode, E>, start_nodes: &[NodeId]) -> HashSet<NodeId> {
    let mut visited = HashSet::new();
    let mut queue = VecDeque::from(start_nodes.to_vec());

    while let Some(node) = queue.pop_front() {
        if !graph.contains_node(node) {
            continue;
        }
        if visited.insert(node) {
            for consumer in graph.neighbors_directed(node, Direction::Outgoing) {
                queue.push_back(consumer);
            }
        }
    }
    visited
}
