//! engine.rs
//! Drives resolution of requested values into the dependency graph.

use super::error::BuildError;
use super::state::{Candidate, CandidateKind, FunctionCandidate, ResolutionState};
use super::Collaborators;
use crate::config::BuilderConfig;
use crate::function::{invoke, CompilationContext, LiveDataSourcingFunction};
use crate::graph::{DependencyGraph, DependentNode, NodeDraft, ResolvedValue};
use crate::target::{ComputationTarget, TargetRef};
use crate::value::{ValueRequirement, ValueSpecification};
use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Builds one dependency graph for one calculation configuration.
///
/// Requirements may be added across several calls; nodes committed by earlier
/// calls are reused by later ones.
pub struct GraphBuilder {
    config: BuilderConfig,
    collaborators: Collaborators,
    graph: DependencyGraph,
}

impl GraphBuilder {
    pub fn new(config: BuilderConfig, collaborators: Collaborators) -> Self {
        let graph = DependencyGraph::new(config.calculation_configuration_name.clone());
        Self { config, collaborators, graph }
    }

    pub fn config(&self) -> &BuilderConfig { &self.config }

    /// Resolves each requirement in turn and registers it as a terminal output.
    ///
    /// Stops at the first requirement that cannot be satisfied; requirements
    /// after it are not attempted and those before it stay in the graph.
    pub fn add_target(&mut self, requirements: impl IntoIterator<Item = ValueRequirement>) -> Result<(), BuildError> {
        let mut targets = TargetCache::new();
        for requirement in requirements {
            self.add_with_targets(requirement, &mut targets)?;
        }
        Ok(())
    }

    pub fn add_requirement(&mut self, requirement: ValueRequirement) -> Result<(), BuildError> {
        self.add_with_targets(requirement, &mut TargetCache::new())
    }

    fn add_with_targets(&mut self, requirement: ValueRequirement, targets: &mut TargetCache) -> Result<(), BuildError> {
        let outcome = Resolution {
            collaborators: &self.collaborators,
            config: &self.config,
            graph: &mut self.graph,
            targets,
        }
        .resolve_terminal(&requirement);

        let result = match outcome {
            Ok(value) => {
                debug!("Terminal node {:?} producing {}", value.node, value.specification);
                self.graph.add_terminal_output_value(requirement, value.specification).map(|_| ()).map_err(BuildError::from)
            }
            Err(e) => Err(e),
        };

        if self.config.prune_unreachable {
            let removed = self.graph.retain_upstream_of_terminals();
            if removed > 0 {
                debug!("Pruned {} speculative nodes", removed);
            }
        }
        result
    }

    /// The graph built so far.
    pub fn dependency_graph(&self) -> &DependencyGraph { &self.graph }

    /// Hands the finished graph over, writing the structure dump first if configured.
    pub fn into_dependency_graph(self) -> DependencyGraph {
        if let Some(path) = &self.config.dump_path {
            let written = File::create(path).and_then(|file| {
                let mut out = BufWriter::new(file);
                self.graph.dump_structure_ascii(&mut out)?;
                out.flush()
            });
            if let Err(e) = written {
                warn!("Cannot write dependency graph dump to {}: {}", path.display(), e);
            }
        }
        self.graph
    }
}

/// Which way the input binding went for one function candidate.
struct Binding {
    pending: bool,
    strict: bool,
}

impl Binding {
    fn new() -> Self {
        Self { pending: false, strict: true }
    }

    fn record(&mut self, state: &mut ResolutionState<'_>, graph: &DependencyGraph) {
        if !state.is_empty(graph) {
            self.pending = true;
        }
        if !state.requirement().constraints().is_strict() {
            self.strict = false;
        }
    }
}

/// One resolution pass. Borrows the collaborators for `'a` so candidate
/// iterators can outlive the individual calls that create them.
struct Resolution<'a, 'g> {
    collaborators: &'a Collaborators,
    config: &'a BuilderConfig,
    graph: &'g mut DependencyGraph,
    targets: &'g mut TargetCache,
}

/// Targets looked up during one `add_target` call, misses included.
type TargetCache = HashMap<TargetRef, Option<ComputationTarget>>;

impl<'a> Resolution<'a, '_> {
    fn context(&self) -> &'a CompilationContext {
        let collaborators: &'a Collaborators = self.collaborators;
        &collaborators.compilation_context
    }

    fn resolve_terminal(&mut self, requirement: &ValueRequirement) -> Result<ResolvedValue, BuildError> {
        let mut state = self.resolve(requirement, Vec::new().into())?;
        self.satisfy(&mut state)
    }

    /// Sets up the search state for `requirement`, seen from the chain of
    /// nodes waiting on it.
    fn resolve(&mut self, requirement: &ValueRequirement, dependents: Arc<[DependentNode]>) -> Result<ResolutionState<'a>, BuildError> {
        if dependents.len() > self.config.max_resolution_depth {
            return Err(BuildError::DepthExceeded {
                requirement: requirement.clone(),
                max_depth: self.config.max_resolution_depth,
            });
        }
        let collaborators: &'a Collaborators = self.collaborators;
        let target = self
            .targets
            .entry(requirement.target().clone())
            .or_insert_with_key(|reference| collaborators.target_resolver.resolve(reference))
            .clone()
            .ok_or_else(|| BuildError::UnresolvableTarget(requirement.target().clone()))?;
        info!("Resolving target requirement for {} on {}", requirement, target);

        let mut state = ResolutionState::new(requirement.clone());
        let live = collaborators.live_data.is_available(requirement);
        let existing = self.graph.nodes_satisfying(requirement);
        let draft = NodeDraft::new(target, dependents);

        if !existing.is_empty() {
            debug!("{} existing nodes found", existing.len());
            state.add_existing(existing);
        }
        if live {
            // After any existing node, a fresh source for when none fits without narrowing.
            debug!("Live Data : {} on {}", requirement, draft.target());
            let function = LiveDataSourcingFunction::new(requirement);
            let mut draft = draft;
            draft.add_output(function.result().clone());
            state.add_function(function.result().clone(), function.into_parameterized(), draft);
            return Ok(state);
        }

        let candidates = collaborators.function_resolver.resolve_function(requirement, &draft, self.context());
        state.set_source(candidates, draft, self.context());
        Ok(state)
    }

    /// Runs the search for one state until a candidate yields a committed value.
    fn satisfy(&mut self, state: &mut ResolutionState<'a>) -> Result<ResolvedValue, BuildError> {
        loop {
            let Some(candidate) = state.pop_first(self.graph) else {
                return state
                    .last_valid()
                    .and_then(|value| self.refresh(value))
                    .ok_or_else(|| BuildError::unsatisfiable(state.requirement().clone(), None));
            };

            // Backtracking may already have committed an exact match.
            if candidate.specification.properties().is_strict() {
                if let Some(existing) = self.graph.node_producing(&candidate.specification) {
                    debug!("Existing node {:?} produces {}", existing, candidate.specification);
                    let value = ResolvedValue::new(existing, candidate.specification.clone());
                    state.push_front(candidate);
                    return Ok(value);
                }
            }

            let Candidate { specification, kind } = candidate;
            match kind {
                CandidateKind::Existing(node) => {
                    let Some(current) = self.refresh(&ResolvedValue::new(node, specification.clone())) else {
                        debug!("{} is no longer in the graph", specification);
                        if state.is_empty(self.graph) {
                            return Err(BuildError::unsatisfiable(state.requirement().clone(), None));
                        }
                        continue;
                    };
                    let node = current.node;
                    let resolved = specification.compose(state.requirement());
                    if resolved == specification {
                        let value = ResolvedValue::new(node, resolved);
                        let retained = !state.is_empty(self.graph);
                        return Ok(settle(state, Candidate::existing(value.clone()), retained, value));
                    }
                    debug!("Existing node {:?} would need narrowing to {}; skipping", node, resolved);
                    if state.is_empty(self.graph) {
                        return Err(BuildError::unsatisfiable(state.requirement().clone(), None));
                    }
                }
                CandidateKind::Function(function) => {
                    if let Some(value) = self.attempt(state, specification, function)? {
                        return Ok(value);
                    }
                }
            }
        }
    }

    /// Tries one function candidate. `Ok(None)` means another candidate is
    /// now at the front and the search should go round again.
    fn attempt(
        &mut self,
        state: &mut ResolutionState<'a>,
        specification: ValueSpecification,
        mut candidate: FunctionCandidate<'a>,
    ) -> Result<Option<ResolvedValue>, BuildError> {
        let requirement = state.requirement().clone();

        let bound = match candidate.input_states.take() {
            None => self.bind_new_inputs(&requirement, &mut candidate),
            Some(mut states) => {
                // A retry after backtracking: undo the previous commit first.
                if let Some(committed) = candidate.committed.take() {
                    if self.graph.has_dependents(committed.node) || self.graph.is_terminal(committed.node) {
                        debug!("Keeping {:?}; it is already consumed", committed.node);
                        candidate.committed = Some(committed.clone());
                        candidate.input_states = Some(states);
                        state.push_front(Candidate::function(specification, candidate));
                        return Ok(Some(committed));
                    }
                    if self.graph.contains_node(committed.node) {
                        self.graph.remove_dependency_node(committed.node)?;
                    }
                }
                candidate.draft.clear_inputs();
                let bound = self.rebind_inputs(&mut candidate.draft, &mut states);
                candidate.input_states = Some(states);
                bound
            }
        };

        let binding = match bound {
            Ok(binding) => binding,
            Err(e) if e.is_recoverable() => {
                debug!("Backtracking on dependency graph error: {}", e);
                if state.is_empty(self.graph) {
                    return Err(BuildError::unsatisfiable(requirement, Some(e)));
                }
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        let retained = binding.pending || !state.is_empty(self.graph);
        let strict = binding.strict && specification.properties().is_strict();

        let context = self.context();
        let function = candidate.function.clone();
        let mut resolved = specification.clone();
        let mut previous_outputs: Option<BTreeSet<ValueSpecification>> = None;

        // Late resolution of the output against the inputs actually bound.
        if !strict {
            let inputs = candidate.draft.input_values();
            let target = candidate.draft.target();
            let produced = match invoke(|| function.function().results_with_inputs(context, target, &inputs)) {
                Ok(produced) => produced,
                Err(source) => {
                    debug!("Deep backtracking at late resolution failure: {}", source);
                    candidate.draft.clear_inputs();
                    let cause = BuildError::function(&requirement, function.id(), source);
                    return self.backtrack_deep(state, specification, candidate, retained, Some(cause));
                }
            };

            if &produced != candidate.draft.outputs() {
                let mut narrowed = None;
                let mut outputs = BTreeSet::new();
                for output in produced {
                    if narrowed.is_none() && requirement.is_satisfied_by(&output) {
                        let composed = output.compose(&requirement);
                        debug!("Raw output {} resolves to {}", output, composed);
                        narrowed = Some(composed.clone());
                        outputs.insert(composed);
                    } else {
                        outputs.insert(output);
                    }
                }

                let Some(narrowed) = narrowed else {
                    debug!(
                        "Deep backtracking as provisional specification {} no longer in output after late resolution of {}",
                        specification, requirement
                    );
                    candidate.draft.clear_inputs();
                    return self.backtrack_deep(state, specification, candidate, retained, None);
                };
                if let Some(existing) = self.graph.node_producing(&narrowed) {
                    debug!("Reduce {} to existing node {:?}", specification, existing);
                    candidate.draft.clear_inputs();
                    let value = ResolvedValue::new(existing, narrowed);
                    return Ok(Some(settle(state, Candidate::function(specification, candidate), retained, value)));
                }
                previous_outputs = Some(candidate.draft.outputs().clone());
                candidate.draft.set_outputs(outputs);
                resolved = narrowed;
            }
        }

        // Extra inputs implied by the concrete inputs and outputs.
        let inputs = candidate.draft.input_values();
        let additional = invoke(|| {
            function
                .function()
                .additional_requirements(context, candidate.draft.target(), &inputs, candidate.draft.outputs())
        });
        let failure = match additional {
            Ok(requirements) => {
                let chain = candidate.draft.chain_for_inputs(function.id());
                let mut failure = None;
                for input in requirements {
                    match self.resolve(&input, chain.clone()).and_then(|mut s| self.satisfy(&mut s)) {
                        Ok(value) => candidate.draft.add_input(value),
                        Err(e) if e.is_recoverable() => {
                            failure = Some(e);
                            break;
                        }
                        Err(e) => return Err(e),
                    }
                }
                failure
            }
            Err(source) => Some(BuildError::function(&requirement, function.id(), source)),
        };
        if let Some(cause) = failure {
            debug!("Deep backtracking on dependency graph error: {}", cause);
            restore(&mut candidate.draft, previous_outputs);
            return self.backtrack_deep(state, specification, candidate, retained, Some(cause));
        }

        // A node elsewhere in the tree may have been committed with this output meanwhile.
        if let Some(existing) = self.graph.node_producing(&resolved) {
            debug!("{} already produced by {:?}; merging", resolved, existing);
            restore(&mut candidate.draft, previous_outputs);
            let value = ResolvedValue::new(existing, resolved);
            return Ok(Some(settle(state, Candidate::function(specification, candidate), retained, value)));
        }

        let mut node = candidate.draft.freeze(function);
        {
            let graph = &*self.graph;
            node.retain_outputs(|output| output == &resolved || graph.node_producing(output).is_none());
        }
        debug!("Adding {} to graph", node);
        let id = self.graph.add_dependency_node(node)?;
        let value = ResolvedValue::new(id, resolved);
        candidate.committed = Some(value.clone());
        Ok(Some(settle(state, Candidate::function(specification, candidate), retained, value)))
    }

    fn bind_new_inputs(&mut self, requirement: &ValueRequirement, candidate: &mut FunctionCandidate<'a>) -> Result<Binding, BuildError> {
        let context = self.context();
        let function = candidate.function.clone();
        let target = candidate.draft.target();
        let requirements = invoke(|| function.function().requirements(context, target, requirement))
            .map_err(|source| BuildError::function(requirement, function.id(), source))?;

        let chain = candidate.draft.chain_for_inputs(function.id());
        let mut states = Vec::with_capacity(requirements.len());
        let mut binding = Binding::new();
        for input in &requirements {
            let mut input_state = self.resolve(input, chain.clone())?;
            let value = self.satisfy(&mut input_state)?;
            candidate.draft.add_input(value);
            binding.record(&mut input_state, self.graph);
            states.push(input_state);
        }
        candidate.input_states = Some(states);
        Ok(binding)
    }

    fn rebind_inputs(&mut self, draft: &mut NodeDraft, states: &mut [ResolutionState<'a>]) -> Result<Binding, BuildError> {
        let mut binding = Binding::new();
        for input_state in states.iter_mut() {
            let value = self.satisfy(input_state)?;
            draft.add_input(value);
            binding.record(input_state, self.graph);
        }
        Ok(binding)
    }

    /// The node currently producing `value`'s specification. A retried
    /// candidate may have re-committed it under another id.
    fn refresh(&self, value: &ResolvedValue) -> Option<ResolvedValue> {
        if self.graph.node(value.node).is_some_and(|n| n.produces(&value.specification)) {
            return Some(value.clone());
        }
        let node = self.graph.node_producing(&value.specification)?;
        Some(ResolvedValue::new(node, value.specification.clone()))
    }

    /// A failure found after the inputs were bound: retry from the deepest
    /// choice that still has an alternative.
    fn backtrack_deep(
        &mut self,
        state: &mut ResolutionState<'a>,
        specification: ValueSpecification,
        candidate: FunctionCandidate<'a>,
        retained: bool,
        cause: Option<BuildError>,
    ) -> Result<Option<ResolvedValue>, BuildError> {
        if !retained {
            return Err(BuildError::unsatisfiable(state.requirement().clone(), cause));
        }
        state.push_front(Candidate::function(specification, candidate));
        if !state.remove_deepest(self.graph) {
            return Err(BuildError::unsatisfiable(state.requirement().clone(), cause));
        }
        Ok(None)
    }
}

/// Puts a candidate that produced `value` back in front of the state while
/// it may still be backtracked into, otherwise remembers its value.
fn settle<'a>(state: &mut ResolutionState<'a>, candidate: Candidate<'a>, retained: bool, value: ResolvedValue) -> ResolvedValue {
    if retained {
        state.push_front(candidate);
    } else {
        state.set_last_valid(value.clone());
    }
    value
}

fn restore(draft: &mut NodeDraft, previous_outputs: Option<BTreeSet<ValueSpecification>>) {
    draft.clear_inputs();
    if let Some(outputs) = previous_outputs {
        draft.set_outputs(outputs);
    }
}
