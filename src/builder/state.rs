//! state.rs
//! The backtracking search state for one requirement.
//!
//! A state holds the candidates still to try for its requirement, most
//! preferred first. Existing graph nodes are added up front; function
//! candidates are pulled from the resolver only when the list runs dry. Each
//! function candidate keeps the states used to resolve its own inputs once
//! explored, so the whole search forms an explicit tree that
//! [`ResolutionState::remove_deepest`] can walk.

use crate::function::{invoke, CandidateIter, CompilationContext, ParameterizedFunction, ResolvedFunction};
use crate::graph::{DependencyGraph, NodeDraft, NodeId, ResolvedValue};
use crate::value::{ValueRequirement, ValueSpecification};
use std::collections::VecDeque;
use tracing::debug;

pub(crate) struct Candidate<'a> {
    pub specification: ValueSpecification,
    pub kind: CandidateKind<'a>,
}

pub(crate) enum CandidateKind<'a> {
    /// A committed node already producing the specification.
    Existing(NodeId),
    Function(FunctionCandidate<'a>),
}

pub(crate) struct FunctionCandidate<'a> {
    pub function: ParameterizedFunction,
    pub draft: NodeDraft,
    /// `None` until the inputs have been resolved once.
    pub input_states: Option<Vec<ResolutionState<'a>>>,
    /// The node this candidate last committed, with its resolved output.
    pub committed: Option<ResolvedValue>,
}

impl<'a> Candidate<'a> {
    pub fn existing(value: ResolvedValue) -> Self {
        Self { specification: value.specification, kind: CandidateKind::Existing(value.node) }
    }

    pub fn function(specification: ValueSpecification, candidate: FunctionCandidate<'a>) -> Self {
        Self { specification, kind: CandidateKind::Function(candidate) }
    }
}

impl FunctionCandidate<'_> {
    pub fn new(function: ParameterizedFunction, draft: NodeDraft) -> Self {
        Self { function, draft, input_states: None, committed: None }
    }
}

struct CandidateSource<'a> {
    candidates: CandidateIter<'a>,
    template: NodeDraft,
    context: &'a CompilationContext,
}

pub(crate) struct ResolutionState<'a> {
    requirement: ValueRequirement,
    candidates: VecDeque<Candidate<'a>>,
    source: Option<CandidateSource<'a>>,
    last_valid: Option<ResolvedValue>,
}

impl<'a> ResolutionState<'a> {
    pub fn new(requirement: ValueRequirement) -> Self {
        Self { requirement, candidates: VecDeque::new(), source: None, last_valid: None }
    }

    pub fn requirement(&self) -> &ValueRequirement { &self.requirement }

    pub fn add_existing(&mut self, values: impl IntoIterator<Item = ResolvedValue>) {
        self.candidates.extend(values.into_iter().map(Candidate::existing));
    }

    pub fn add_function(&mut self, specification: ValueSpecification, function: ParameterizedFunction, draft: NodeDraft) {
        self.candidates.push_back(Candidate::function(specification, FunctionCandidate::new(function, draft)));
    }

    /// Attaches the lazy function candidates. `template` is cloned into a
    /// fresh draft for every function pulled.
    pub fn set_source(&mut self, candidates: CandidateIter<'a>, template: NodeDraft, context: &'a CompilationContext) {
        self.source = Some(CandidateSource { candidates, template, context });
    }

    pub fn last_valid(&self) -> Option<&ResolvedValue> { self.last_valid.as_ref() }

    pub fn set_last_valid(&mut self, value: ResolvedValue) {
        self.last_valid = Some(value);
    }

    /// True when no candidate is left, pulling from the source if needed.
    pub fn is_empty(&mut self, graph: &DependencyGraph) -> bool {
        self.candidates.is_empty() && !self.populate(graph)
    }

    pub fn pop_first(&mut self, graph: &DependencyGraph) -> Option<Candidate<'a>> {
        if self.is_empty(graph) {
            return None;
        }
        self.candidates.pop_front()
    }

    pub fn push_front(&mut self, candidate: Candidate<'a>) {
        self.candidates.push_front(candidate);
    }

    fn has_alternative(&mut self, graph: &DependencyGraph) -> bool {
        while self.candidates.len() < 2 {
            if !self.populate(graph) {
                break;
            }
        }
        self.candidates.len() >= 2
    }

    /// Discards the most deeply nested choice that still has an alternative.
    ///
    /// Input states of the current candidate are searched last-bound first,
    /// then the current candidate itself. Returns false when nothing in the
    /// tree below and including this state can change.
    pub fn remove_deepest(&mut self, graph: &DependencyGraph) -> bool {
        if let Some(Candidate { kind: CandidateKind::Function(current), .. }) = self.candidates.front_mut() {
            if let Some(states) = current.input_states.as_mut() {
                for state in states.iter_mut().rev() {
                    if state.remove_deepest(graph) {
                        return true;
                    }
                }
            }
        }
        if self.has_alternative(graph) {
            if let Some(discarded) = self.candidates.pop_front() {
                debug!("Discarding candidate {} for {}", discarded.specification, self.requirement);
            }
            return true;
        }
        false
    }

    /// Pulls the next usable function from the source and turns it into a
    /// candidate. A function whose declared output is already in the graph
    /// becomes an existing-node candidate instead.
    fn populate(&mut self, graph: &DependencyGraph) -> bool {
        let Some(source) = self.source.as_mut() else {
            return false;
        };
        for ResolvedFunction { function, specification: original } in source.candidates.by_ref() {
            let target = source.template.target();
            let outputs = match invoke(|| function.function().results(source.context, target)) {
                Ok(outputs) => outputs,
                Err(e) => {
                    debug!("Skipping {} for {}: {}", function.id(), self.requirement, e);
                    continue;
                }
            };

            let resolved = original.compose(&self.requirement);
            if let Some(existing) = graph.node_producing(&resolved) {
                debug!("Found {} - already in graph", resolved);
                self.candidates.push_back(Candidate::existing(ResolvedValue::new(existing, resolved)));
                return true;
            }

            let mut draft = source.template.clone();
            if original == resolved {
                draft.add_outputs(outputs);
            } else {
                for output in outputs {
                    if output == original {
                        debug!("Substituting {} with {}", output, resolved);
                    } else {
                        draft.add_output(output);
                    }
                }
                draft.add_output(resolved.clone());
            }
            self.candidates.push_back(Candidate::function(resolved, FunctionCandidate::new(function, draft)));
            return true;
        }
        self.source = None;
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::{
        CompiledFunction, DefaultFunctionResolver, FunctionError, FunctionId, FunctionResolver, LiveDataSourcingFunction,
    };
    use crate::target::{ComputationTarget, TargetRef};
    use crate::value::ValueProperties;
    use std::collections::BTreeSet;
    use std::sync::Arc;

    #[derive(Debug)]
    struct Generic {
        id: FunctionId,
        extra: bool,
    }

    impl CompiledFunction for Generic {
        fn id(&self) -> &FunctionId { &self.id }

        fn results(&self, _: &CompilationContext, target: &ComputationTarget) -> Result<BTreeSet<ValueSpecification>, FunctionError> {
            let mut out = BTreeSet::from([ValueSpecification::new(
                "PV",
                target.reference().clone(),
                ValueProperties::new().with_any("Curve"),
            )]);
            if self.extra {
                out.insert(ValueSpecification::new("Delta", target.reference().clone(), ValueProperties::new()));
            }
            Ok(out)
        }

        fn requirements(&self, _: &CompilationContext, _: &ComputationTarget, _: &ValueRequirement) -> Result<Vec<ValueRequirement>, FunctionError> {
            Ok(Vec::new())
        }
    }

    fn usd() -> TargetRef { TargetRef::primitive("USD") }

    fn pv_ois() -> ValueRequirement {
        ValueRequirement::new("PV", usd(), ValueProperties::new().with("Curve", "OIS"))
    }

    fn resolver(names: &[&str]) -> DefaultFunctionResolver {
        names.iter().fold(DefaultFunctionResolver::new(), |r, name| {
            r.with_function(Arc::new(Generic { id: FunctionId::new(*name), extra: true }), 0)
        })
    }

    fn state_for<'a>(resolver: &'a DefaultFunctionResolver, context: &'a CompilationContext) -> ResolutionState<'a> {
        let template = NodeDraft::new(ComputationTarget::new(usd()), Vec::new().into());
        let mut state = ResolutionState::new(pv_ois());
        state.set_source(resolver.resolve_function(&pv_ois(), &template, context), template, context);
        state
    }

    fn live_value(graph: &mut DependencyGraph, req: &ValueRequirement) -> ResolvedValue {
        let live = LiveDataSourcingFunction::new(req);
        let spec = live.result().clone();
        let mut draft = NodeDraft::new(ComputationTarget::new(req.target().clone()), Vec::new().into());
        draft.add_output(spec.clone());
        let id = graph.add_dependency_node(draft.freeze(live.into_parameterized())).unwrap();
        ResolvedValue::new(id, spec)
    }

    #[test]
    fn test_population_substitutes_composed_output() {
        let resolver = resolver(&["A"]);
        let context = CompilationContext::new();
        let graph = DependencyGraph::default();
        let mut state = state_for(&resolver, &context);

        let candidate = state.pop_first(&graph).expect("one candidate");
        let expected = ValueSpecification::new("PV", usd(), ValueProperties::new().with("Curve", "OIS"));
        assert_eq!(candidate.specification, expected);
        let CandidateKind::Function(f) = candidate.kind else { panic!("expected a function candidate") };
        assert_eq!(f.function.id().as_str(), "A");
        assert!(f.draft.outputs().contains(&expected));
        assert_eq!(f.draft.outputs().len(), 2);
        assert!(state.is_empty(&graph));
    }

    #[test]
    fn test_population_prefers_committed_output() {
        let resolver = resolver(&["A"]);
        let context = CompilationContext::new();
        let mut graph = DependencyGraph::default();
        let committed = live_value(&mut graph, &pv_ois());
        let mut state = state_for(&resolver, &context);

        let candidate = state.pop_first(&graph).unwrap();
        assert!(matches!(candidate.kind, CandidateKind::Existing(id) if id == committed.node));
    }

    #[test]
    fn test_existing_nodes_come_before_functions() {
        let resolver = resolver(&["A", "B"]);
        let context = CompilationContext::new();
        let mut graph = DependencyGraph::default();
        let other = ValueRequirement::new("PV", usd(), ValueProperties::new().with_values("Curve", ["OIS", "LIBOR"]));
        let existing = live_value(&mut graph, &other);

        let mut state = state_for(&resolver, &context);
        state.add_existing([existing.clone()]);
        assert!(state.has_alternative(&graph));
        assert_eq!(state.candidates.len(), 2);

        let order: Vec<bool> = std::iter::from_fn(|| state.pop_first(&graph))
            .map(|c| matches!(c.kind, CandidateKind::Existing(_)))
            .collect();
        assert_eq!(order, vec![true, false, false]);
    }

    #[test]
    fn test_remove_deepest_prefers_nested_alternatives() {
        let graph = DependencyGraph::default();
        let template = NodeDraft::new(ComputationTarget::new(usd()), Vec::new().into());
        let function = ParameterizedFunction::from(Arc::new(Generic { id: FunctionId::new("A"), extra: false }) as Arc<dyn CompiledFunction>);
        let spec = |curve: &str| ValueSpecification::new("PV", usd(), ValueProperties::new().with("Curve", curve));
        let node = |i: u32| ResolvedValue::new(NodeId::new(i as usize), spec("X"));

        // First input: a single option. Second input: two options.
        let mut fixed = ResolutionState::new(pv_ois());
        fixed.add_existing([node(1)]);
        let mut open = ResolutionState::new(pv_ois());
        open.add_existing([node(2), node(3)]);

        let mut root = ResolutionState::new(pv_ois());
        root.add_function(spec("OIS"), function.clone(), template.clone());
        root.add_function(spec("OIS"), function, template);
        if let Some(Candidate { kind: CandidateKind::Function(f), .. }) = root.candidates.front_mut() {
            f.input_states = Some(vec![fixed, open]);
        }

        // The nested alternative goes first, then the root's own.
        assert!(root.remove_deepest(&graph));
        assert_eq!(root.candidates.len(), 2);
        assert!(root.remove_deepest(&graph));
        assert_eq!(root.candidates.len(), 1);
        assert!(!root.remove_deepest(&graph));
    }

    #[test]
    fn test_last_valid_survives_exhaustion() {
        let graph = DependencyGraph::default();
        let mut state = ResolutionState::new(pv_ois());
        let value = ResolvedValue::new(NodeId::new(0), ValueSpecification::from_requirement(&pv_ois()));
        state.set_last_valid(value.clone());
        assert!(state.is_empty(&graph));
        assert!(state.pop_first(&graph).is_none());
        assert_eq!(state.last_valid(), Some(&value));
    }
}
