use crate::graph::{DependencyGraph, NodeId};
use crate::value::ValueSpecification;
use std::collections::HashMap;
use std::fmt::Write;

/// Renders the graph as one tree per terminal output. A node reached a
/// second time is printed as a reference to the level it was first shown at.
pub fn format_structure(graph: &DependencyGraph) -> String {
    let mut tracer = Tracer { graph, visited_at_level: HashMap::new(), output: String::new() };

    let terminals: Vec<_> = graph.terminal_outputs().collect();
    let _ = writeln!(
        tracer.output,
        "DEPENDENCY GRAPH '{}': {} nodes, {} terminal outputs",
        graph.calculation_configuration_name(),
        graph.node_count(),
        terminals.len()
    );
    let _ = writeln!(tracer.output, "--------------------------------------------------");

    for (requirement, specification) in terminals {
        let _ = writeln!(tracer.output, "{}", requirement);
        match graph.node_producing(specification) {
            Some(node) => tracer.trace_node(node, specification, 1, "`--"),
            None => {
                let _ = writeln!(tracer.output, "`-- {} [MISSING]", specification);
            }
        }
    }

    // Only present when pruning is off.
    let mut orphans: Vec<NodeId> = graph.nodes().map(|(id, _)| id).filter(|id| !tracer.visited_at_level.contains_key(id)).collect();
    if !orphans.is_empty() {
        orphans.sort();
        let _ = writeln!(tracer.output, "Unreferenced nodes:");
        let last = orphans.len() - 1;
        for (i, id) in orphans.into_iter().enumerate() {
            if let Some(node) = graph.node(id) {
                let connector = if i == last { "`--" } else { "|--" };
                let _ = writeln!(tracer.output, "{} {}", connector, node);
            }
        }
    }
    tracer.output
}

struct Tracer<'a> {
    graph: &'a DependencyGraph,
    visited_at_level: HashMap<NodeId, usize>,
    output: String,
}

impl Tracer<'_> {
    fn trace_node(&mut self, node_id: NodeId, value: &ValueSpecification, level: usize, prefix: &str) {
        if let Some(&first_seen) = self.visited_at_level.get(&node_id) {
            let _ = writeln!(self.output, "{}[L{}] {} -> (Ref to L{})", prefix, level, value, first_seen);
            return;
        }
        self.visited_at_level.insert(node_id, level);

        let graph = self.graph;
        let Some(node) = graph.node(node_id) else {
            let _ = writeln!(self.output, "{}[L{}] {} [MISSING]", prefix, level, value);
            return;
        };
        let _ = writeln!(self.output, "{}[L{}] {} <- {}", prefix, level, value, node);

        let stem = self.build_child_stem(prefix);
        let inputs = node.inputs();
        for (i, input) in inputs.iter().enumerate() {
            let connector = if i == inputs.len() - 1 { "`--" } else { "|--" };
            let full_prefix = format!("{}{}", stem, connector);
            self.trace_node(input.node, &input.specification, level + 1, &full_prefix);
        }
    }

    fn build_child_stem(&self, current_prefix: &str) -> String {
        current_prefix.replace("`--", "   ").replace("|--", "|  ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::{CompilationContext, CompiledFunction, FunctionError, FunctionId, LiveDataSourcingFunction};
    use crate::graph::{NodeDraft, ResolvedValue};
    use crate::target::{ComputationTarget, TargetRef};
    use crate::value::{ValueProperties, ValueRequirement};
    use std::collections::BTreeSet;
    use std::sync::Arc;

    #[derive(Debug)]
    struct Pricer(FunctionId);

    impl CompiledFunction for Pricer {
        fn id(&self) -> &FunctionId { &self.0 }
        fn results(&self, _: &CompilationContext, _: &ComputationTarget) -> Result<BTreeSet<ValueSpecification>, FunctionError> {
            Ok(BTreeSet::new())
        }
        fn requirements(&self, _: &CompilationContext, _: &ComputationTarget, _: &ValueRequirement) -> Result<Vec<ValueRequirement>, FunctionError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_shared_input_printed_once() {
        let mut graph = DependencyGraph::new("Default");
        let spot_req = ValueRequirement::unconstrained("Spot", TargetRef::primitive("EURUSD"));
        let live = LiveDataSourcingFunction::new(&spot_req);
        let spot = live.result().clone();
        let mut draft = NodeDraft::new(ComputationTarget::new(TargetRef::primitive("EURUSD")), Vec::new().into());
        draft.add_output(spot.clone());
        let spot_node = graph.add_dependency_node(draft.freeze(live.into_parameterized())).unwrap();

        let pv = ValueSpecification::new("PV", TargetRef::security("FWD"), ValueProperties::new().with("Ccy", "USD"));
        let mut draft = NodeDraft::new(ComputationTarget::new(TargetRef::security("FWD")), Vec::new().into());
        draft.add_output(pv.clone());
        draft.add_input(ResolvedValue::new(spot_node, spot.clone()));
        let function: Arc<dyn CompiledFunction> = Arc::new(Pricer(FunctionId::new("FxForwardPV")));
        graph.add_dependency_node(draft.freeze(function.into())).unwrap();

        let pv_req = ValueRequirement::unconstrained("PV", TargetRef::security("FWD"));
        graph.add_terminal_output_value(pv_req, pv).unwrap();
        graph.add_terminal_output_value(spot_req, spot).unwrap();

        let text = format_structure(&graph);
        let expected = "\
DEPENDENCY GRAPH 'Default': 2 nodes, 2 terminal outputs
--------------------------------------------------
PV[SECURITY~FWD]{}
`--[L1] PV[SECURITY~FWD]{Ccy=USD} <- FxForwardPV on SECURITY~FWD
   `--[L2] Spot[PRIMITIVE~EURUSD]{} <- LiveDataSourcingFunction on PRIMITIVE~EURUSD
Spot[PRIMITIVE~EURUSD]{}
`--[L1] Spot[PRIMITIVE~EURUSD]{} -> (Ref to L2)
";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_unreferenced_nodes_are_listed() {
        let mut graph = DependencyGraph::new("Scratch");
        let req = ValueRequirement::unconstrained("Vol", TargetRef::primitive("USD"));
        let live = LiveDataSourcingFunction::new(&req);
        let mut draft = NodeDraft::new(ComputationTarget::new(TargetRef::primitive("USD")), Vec::new().into());
        draft.add_output(live.result().clone());
        graph.add_dependency_node(draft.freeze(live.into_parameterized())).unwrap();

        let text = format_structure(&graph);
        assert!(text.starts_with("DEPENDENCY GRAPH 'Scratch': 1 nodes, 0 terminal outputs"));
        assert!(text.ends_with("Unreferenced nodes:\n`-- LiveDataSourcingFunction on PRIMITIVE~USD\n"));
    }
}
