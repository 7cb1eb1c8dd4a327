//! dag.rs
//! The dependency graph: committed nodes, the indices used to find them by
//! output, and the terminal outputs the caller asked for.

use super::error::GraphError;
use super::node::{DependencyNode, NodeId, ResolvedValue};
use super::topology;
use crate::target::TargetRef;
use crate::value::{ValueRequirement, ValueSpecification};
use petgraph::stable_graph::StableDiGraph;
use petgraph::Direction;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::io;

/// Edges run from an input node to its consumer and carry the consumed value.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    calculation_configuration_name: String,
    graph: StableDiGraph<DependencyNode, ValueSpecification>,

    // Primary index: exactly one node per output specification.
    by_output: HashMap<ValueSpecification, NodeId>,
    // Secondary index for reuse lookups: target -> value name -> outputs.
    by_value: HashMap<TargetRef, HashMap<String, BTreeSet<ValueSpecification>>>,

    terminal_outputs: BTreeMap<ValueRequirement, ValueSpecification>,
}

impl DependencyGraph {
    pub fn new(calculation_configuration_name: impl Into<String>) -> Self {
        Self { calculation_configuration_name: calculation_configuration_name.into(), ..Default::default() }
    }

    pub fn calculation_configuration_name(&self) -> &str { &self.calculation_configuration_name }

    // --- Mutation ---

    /// Commits a fully resolved node.
    ///
    /// Fails if any output is already produced by another node or if an input
    /// is not produced by the node it names.
    pub fn add_dependency_node(&mut self, node: DependencyNode) -> Result<NodeId, GraphError> {
        for spec in node.outputs() {
            if let Some(&existing) = self.by_output.get(spec) {
                return Err(GraphError::DuplicateOutput { specification: spec.clone(), existing });
            }
        }
        for input in node.inputs() {
            let produced = self.graph.node_weight(input.node).is_some_and(|n| n.produces(&input.specification));
            if !produced {
                return Err(GraphError::MissingInput { node: input.node, specification: input.specification.clone() });
            }
        }

        let inputs: Vec<ResolvedValue> = node.inputs().to_vec();
        let outputs: Vec<ValueSpecification> = node.outputs().iter().cloned().collect();
        let id = self.graph.add_node(node);

        for input in inputs {
            self.graph.add_edge(input.node, id, input.specification);
        }
        for spec in outputs {
            self.index_output(id, spec);
        }
        Ok(id)
    }

    /// Undoes a speculative commit. Refuses while anything still consumes the node.
    pub fn remove_dependency_node(&mut self, id: NodeId) -> Result<DependencyNode, GraphError> {
        if !self.graph.contains_node(id) {
            return Err(GraphError::UnknownNode(id));
        }
        if self.has_dependents(id) || self.is_terminal(id) {
            return Err(GraphError::HasDependents(id));
        }
        self.detach(id).ok_or(GraphError::UnknownNode(id))
    }

    /// Registers `specification` as the answer to one of the caller's requirements.
    pub fn add_terminal_output_value(
        &mut self,
        requirement: ValueRequirement,
        specification: ValueSpecification,
    ) -> Result<NodeId, GraphError> {
        let node = self
            .node_producing(&specification)
            .ok_or_else(|| GraphError::UnknownSpecification(specification.clone()))?;
        self.terminal_outputs.insert(requirement, specification);
        Ok(node)
    }

    /// Removes every node no terminal output depends on. Returns how many went.
    pub fn retain_upstream_of_terminals(&mut self) -> usize {
        let roots: Vec<NodeId> = self
            .terminal_outputs
            .values()
            .filter_map(|spec| self.by_output.get(spec).copied())
            .collect();
        let keep = topology::upstream_from(&self.graph, &roots);
        let doomed: Vec<NodeId> = self.graph.node_indices().filter(|id| !keep.contains(id)).collect();
        // `keep` is closed under inputs, so nothing kept can consume a doomed node.
        for &id in &doomed {
            self.detach(id);
        }
        doomed.len()
    }

    fn detach(&mut self, id: NodeId) -> Option<DependencyNode> {
        let node = self.graph.remove_node(id)?;
        for spec in node.outputs() {
            if self.by_output.get(spec) == Some(&id) {
                self.by_output.remove(spec);
                self.unindex_value(spec);
            }
        }
        Some(node)
    }

    fn index_output(&mut self, id: NodeId, spec: ValueSpecification) {
        self.by_value
            .entry(spec.target().clone())
            .or_default()
            .entry(spec.value_name().to_string())
            .or_default()
            .insert(spec.clone());
        self.by_output.insert(spec, id);
    }

    fn unindex_value(&mut self, spec: &ValueSpecification) {
        if let Some(names) = self.by_value.get_mut(spec.target()) {
            if let Some(specs) = names.get_mut(spec.value_name()) {
                specs.remove(spec);
                if specs.is_empty() {
                    names.remove(spec.value_name());
                }
            }
            if names.is_empty() {
                self.by_value.remove(spec.target());
            }
        }
    }

    // --- Lookup ---

    pub fn node_producing(&self, spec: &ValueSpecification) -> Option<NodeId> {
        self.by_output.get(spec).copied()
    }

    /// Every committed output that could satisfy `requirement`, with its node.
    pub fn nodes_satisfying(&self, requirement: &ValueRequirement) -> Vec<ResolvedValue> {
        let Some(specs) = self
            .by_value
            .get(requirement.target())
            .and_then(|names| names.get(requirement.value_name()))
        else {
            return Vec::new();
        };
        specs
            .iter()
            .filter(|spec| requirement.is_satisfied_by(spec))
            .filter_map(|spec| self.by_output.get(spec).map(|&id| ResolvedValue::new(id, spec.clone())))
            .collect()
    }

    pub fn contains_node(&self, id: NodeId) -> bool { self.graph.contains_node(id) }

    pub fn has_dependents(&self, id: NodeId) -> bool {
        self.graph.neighbors_directed(id, Direction::Outgoing).next().is_some()
    }

    pub fn is_terminal(&self, id: NodeId) -> bool {
        self.terminal_outputs.values().any(|spec| self.by_output.get(spec) == Some(&id))
    }

    // --- Accessors ---

    pub fn node(&self, id: NodeId) -> Option<&DependencyNode> { self.graph.node_weight(id) }
    pub fn node_count(&self) -> usize { self.graph.node_count() }
    pub fn is_empty(&self) -> bool { self.graph.node_count() == 0 }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &DependencyNode)> + '_ {
        self.graph.node_indices().map(move |id| (id, &self.graph[id]))
    }

    pub fn inputs(&self, id: NodeId) -> &[ResolvedValue] {
        match self.graph.node_weight(id) {
            Some(node) => node.inputs(),
            None => &[],
        }
    }

    /// Nodes consuming at least one output of `id`.
    pub fn dependents(&self, id: NodeId) -> BTreeSet<NodeId> {
        self.graph.neighbors_directed(id, Direction::Outgoing).collect()
    }

    /// Nodes with no inputs (live data and other sources).
    pub fn source_nodes(&self) -> Vec<NodeId> {
        self.graph.node_indices().filter(|&id| self.graph[id].inputs().is_empty()).collect()
    }

    /// Nodes nothing else consumes.
    pub fn root_nodes(&self) -> Vec<NodeId> {
        self.graph.node_indices().filter(|&id| !self.has_dependents(id)).collect()
    }

    pub fn output_specifications(&self) -> impl Iterator<Item = &ValueSpecification> + '_ {
        self.by_output.keys()
    }

    pub fn terminal_outputs(&self) -> impl Iterator<Item = (&ValueRequirement, &ValueSpecification)> + '_ {
        self.terminal_outputs.iter()
    }

    pub fn terminal_output(&self, requirement: &ValueRequirement) -> Option<ResolvedValue> {
        let spec = self.terminal_outputs.get(requirement)?;
        self.node_producing(spec).map(|id| ResolvedValue::new(id, spec.clone()))
    }

    pub fn terminal_output_specifications(&self) -> BTreeSet<&ValueSpecification> {
        self.terminal_outputs.values().collect()
    }

    // --- Graph Algorithms ---

    /// Every node ordered so inputs precede their consumers.
    pub fn execution_order(&self) -> Result<Vec<NodeId>, GraphError> {
        topology::sort(&self.graph)
    }

    pub fn upstream_from(&self, start_nodes: &[NodeId]) -> HashSet<NodeId> {
        topology::upstream_from(&self.graph, start_nodes)
    }

    pub fn downstream_from(&self, start_nodes: &[NodeId]) -> HashSet<NodeId> {
        topology::downstream_from(&self.graph, start_nodes)
    }

    // --- Diagnostics ---

    /// Writes the tree rendering from [`crate::display::format_structure`].
    pub fn dump_structure_ascii(&self, out: &mut impl io::Write) -> io::Result<()> {
        out.write_all(crate::display::format_structure(self).as_bytes())
    }
}
