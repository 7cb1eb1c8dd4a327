//! Defines the `DependencyNode` and its draft form, representing a single
//! computation step: one function applied to one target.

use crate::function::{FunctionId, ParameterizedFunction};
use crate::target::{ComputationTarget, TargetRef};
use crate::value::ValueSpecification;
use petgraph::stable_graph::NodeIndex;
use smallvec::SmallVec;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// A stable identifier for a committed node. Survives removal of other nodes.
pub type NodeId = NodeIndex<u32>;

/// A value pinned to the node that produces it. Used for bound inputs and
/// for the answer to a resolved requirement alike.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedValue {
    pub node: NodeId,
    pub specification: ValueSpecification,
}

impl ResolvedValue {
    pub fn new(node: NodeId, specification: ValueSpecification) -> Self {
        Self { node, specification }
    }
}

/// A (function, target) pair further up the chain of nodes waiting on this one.
///
/// Lookup only: used to stop a function being chosen again for the same
/// target inside its own input chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DependentNode {
    pub function: FunctionId,
    pub target: TargetRef,
}

/// A node under construction. Outputs and inputs change freely while the
/// resolver searches; [`NodeDraft::freeze`] produces the committed form.
#[derive(Debug, Clone)]
pub struct NodeDraft {
    target: ComputationTarget,
    outputs: BTreeSet<ValueSpecification>,
    inputs: Vec<ResolvedValue>,
    dependents: Arc<[DependentNode]>,
}

impl NodeDraft {
    pub fn new(target: ComputationTarget, dependents: Arc<[DependentNode]>) -> Self {
        Self { target, outputs: BTreeSet::new(), inputs: Vec::new(), dependents }
    }

    pub fn target(&self) -> &ComputationTarget { &self.target }
    pub fn outputs(&self) -> &BTreeSet<ValueSpecification> { &self.outputs }
    pub fn inputs(&self) -> &[ResolvedValue] { &self.inputs }
    pub fn dependents(&self) -> &[DependentNode] { &self.dependents }

    /// True when `function` is already at work on this draft's target further up the chain.
    pub fn is_dependent(&self, function: &FunctionId) -> bool {
        self.dependents
            .iter()
            .any(|d| &d.function == function && &d.target == self.target.reference())
    }

    /// The dependent chain seen by inputs of this draft when `function` computes it.
    pub fn chain_for_inputs(&self, function: &FunctionId) -> Arc<[DependentNode]> {
        let mut chain: Vec<DependentNode> = self.dependents.to_vec();
        chain.push(DependentNode { function: function.clone(), target: self.target.reference().clone() });
        chain.into()
    }

    pub fn add_output(&mut self, spec: ValueSpecification) {
        self.outputs.insert(spec);
    }

    pub fn add_outputs(&mut self, specs: impl IntoIterator<Item = ValueSpecification>) {
        self.outputs.extend(specs);
    }

    pub fn set_outputs(&mut self, outputs: BTreeSet<ValueSpecification>) {
        self.outputs = outputs;
    }

    pub fn add_input(&mut self, value: ResolvedValue) {
        self.inputs.push(value);
    }

    pub fn clear_inputs(&mut self) {
        self.inputs.clear();
    }

    /// The set of input values, as handed to late-resolution calls.
    pub fn input_values(&self) -> BTreeSet<ValueSpecification> {
        self.inputs.iter().map(|i| i.specification.clone()).collect()
    }

    /// Copies the draft into an immutable node bound to `function`.
    pub fn freeze(&self, function: ParameterizedFunction) -> DependencyNode {
        DependencyNode {
            target: self.target.clone(),
            function,
            outputs: self.outputs.clone(),
            inputs: self.inputs.iter().cloned().collect(),
        }
    }
}

/// A committed node. Immutable once in the graph.
#[derive(Debug, Clone)]
pub struct DependencyNode {
    target: ComputationTarget,
    function: ParameterizedFunction,
    outputs: BTreeSet<ValueSpecification>,
    // Most functions consume a handful of values.
    inputs: SmallVec<[ResolvedValue; 4]>,
}

impl DependencyNode {
    pub fn target(&self) -> &ComputationTarget { &self.target }
    pub fn function(&self) -> &ParameterizedFunction { &self.function }
    pub fn outputs(&self) -> &BTreeSet<ValueSpecification> { &self.outputs }
    pub fn inputs(&self) -> &[ResolvedValue] { &self.inputs }

    pub fn input_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.inputs.iter().map(|i| i.node)
    }

    pub fn input_values(&self) -> impl Iterator<Item = &ValueSpecification> + '_ {
        self.inputs.iter().map(|i| &i.specification)
    }

    pub fn produces(&self, spec: &ValueSpecification) -> bool {
        self.outputs.contains(spec)
    }

    /// Drops outputs already produced elsewhere. Only valid before commit.
    pub(crate) fn retain_outputs(&mut self, mut keep: impl FnMut(&ValueSpecification) -> bool) {
        self.outputs.retain(|spec| keep(spec));
    }
}

impl fmt::Display for DependencyNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}", self.function.id(), self.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::LiveDataSourcingFunction;
    use crate::value::{ValueProperties, ValueRequirement};

    fn draft(chain: Vec<DependentNode>) -> NodeDraft {
        NodeDraft::new(ComputationTarget::new(TargetRef::primitive("USD")), chain.into())
    }

    #[test]
    fn test_dependent_chain_grows_per_level() {
        let root = draft(Vec::new());
        let f = FunctionId::new("CurveFn");
        let chain = root.chain_for_inputs(&f);
        assert_eq!(chain.len(), 1);

        let child = NodeDraft::new(ComputationTarget::new(TargetRef::primitive("USD")), chain);
        assert!(child.is_dependent(&f));
        assert!(!child.is_dependent(&FunctionId::new("OtherFn")));

        let elsewhere = NodeDraft::new(ComputationTarget::new(TargetRef::primitive("EUR")), child.dependents().to_vec().into());
        assert!(!elsewhere.is_dependent(&f));
    }

    #[test]
    fn test_freeze_copies_state() {
        let req = ValueRequirement::new("Rate", TargetRef::primitive("USD"), ValueProperties::new());
        let live = LiveDataSourcingFunction::new(&req);
        let spec = live.result().clone();

        let mut d = draft(Vec::new());
        d.add_output(spec.clone());
        let node = d.freeze(live.into_parameterized());
        d.clear_inputs();
        d.set_outputs(BTreeSet::new());

        assert!(node.produces(&spec));
        assert!(node.inputs().is_empty());
        assert_eq!(node.to_string(), "LiveDataSourcingFunction on PRIMITIVE~USD");
    }
}
