//! resolver.rs
//! Finds the functions able to produce a requirement, most preferred first.

use super::context::CompilationContext;
use super::definition::{invoke, CompiledFunction, FunctionParameters, ParameterizedFunction};
use crate::graph::NodeDraft;
use crate::value::{ValueRequirement, ValueSpecification};
use std::sync::Arc;
use tracing::debug;

/// A function together with the declared output it was chosen for.
#[derive(Debug, Clone)]
pub struct ResolvedFunction {
    pub function: ParameterizedFunction,
    pub specification: ValueSpecification,
}

/// Candidates are pulled one at a time; the resolver may stop early and drop
/// the rest without them ever being computed.
pub type CandidateIter<'a> = Box<dyn Iterator<Item = ResolvedFunction> + 'a>;

pub trait FunctionResolver: Send + Sync {
    /// Ranks the functions able to satisfy `requirement` on `node`'s target.
    ///
    /// `node` carries the target and the dependent chain, so implementations
    /// can refuse a function already at work on the same target up the chain.
    /// `context` is the builder's own, so functions are asked to apply under
    /// the same context their inputs and results are later queried with.
    fn resolve_function<'a>(
        &'a self,
        requirement: &ValueRequirement,
        node: &NodeDraft,
        context: &'a CompilationContext,
    ) -> CandidateIter<'a>;
}

#[derive(Debug, Clone)]
struct RegisteredFunction {
    priority: i32,
    function: ParameterizedFunction,
}

/// A priority-ordered function repository.
///
/// Higher priority functions are offered first; equal priorities keep their
/// registration order.
#[derive(Debug, Clone, Default)]
pub struct DefaultFunctionResolver {
    functions: Vec<RegisteredFunction>,
}

impl DefaultFunctionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_function(&mut self, function: Arc<dyn CompiledFunction>, priority: i32) {
        self.add_parameterized(ParameterizedFunction::new(function, FunctionParameters::default()), priority);
    }

    pub fn add_parameterized(&mut self, function: ParameterizedFunction, priority: i32) {
        // Insert after every entry of equal or higher priority (stable order).
        let pos = self.functions.partition_point(|f| f.priority >= priority);
        self.functions.insert(pos, RegisteredFunction { priority, function });
    }

    pub fn with_function(mut self, function: Arc<dyn CompiledFunction>, priority: i32) -> Self {
        self.add_function(function, priority);
        self
    }

    pub fn len(&self) -> usize { self.functions.len() }
    pub fn is_empty(&self) -> bool { self.functions.is_empty() }
}

impl FunctionResolver for DefaultFunctionResolver {
    fn resolve_function<'a>(
        &'a self,
        requirement: &ValueRequirement,
        node: &NodeDraft,
        context: &'a CompilationContext,
    ) -> CandidateIter<'a> {
        let requirement = requirement.clone();
        let target = node.target().clone();
        let node = node.clone();

        Box::new(
            self.functions
                .iter()
                .filter(move |registered| {
                    let function = &registered.function;
                    if node.is_dependent(function.id()) {
                        debug!("Skipping {} - already computing {} further up", function.id(), node.target());
                        return false;
                    }
                    invoke(|| Ok(function.function().can_apply_to(context, node.target()))).unwrap_or(false)
                })
                .flat_map(move |registered| {
                    let function = &registered.function;
                    let results = match invoke(|| function.function().results(context, &target)) {
                        Ok(results) => results,
                        Err(e) => {
                            debug!("{} cannot declare results: {}", function.id(), e);
                            Default::default()
                        }
                    };
                    results
                        .into_iter()
                        .filter(|spec| requirement.is_satisfied_by(spec))
                        .map(|specification| ResolvedFunction { function: function.clone(), specification })
                        .collect::<Vec<_>>()
                }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::{FunctionError, FunctionId};
    use crate::target::{ComputationTarget, TargetRef};
    use crate::value::ValueProperties;
    use std::collections::BTreeSet;

    #[derive(Debug)]
    struct Declares {
        id: FunctionId,
        curve: Option<&'static str>,
        broken: bool,
    }

    impl CompiledFunction for Declares {
        fn id(&self) -> &FunctionId { &self.id }

        fn can_apply_to(&self, _: &CompilationContext, target: &ComputationTarget) -> bool {
            target.attribute("Currency") != Some("JPY")
        }

        fn results(&self, _: &CompilationContext, target: &ComputationTarget) -> Result<BTreeSet<ValueSpecification>, FunctionError> {
            if self.broken {
                return Err(FunctionError::failed("no conventions"));
            }
            let props = match self.curve {
                Some(curve) => ValueProperties::new().with("Curve", curve),
                None => ValueProperties::new().with_any("Curve"),
            };
            Ok(BTreeSet::from([ValueSpecification::new("PV", target.reference().clone(), props)]))
        }

        fn requirements(&self, _: &CompilationContext, _: &ComputationTarget, _: &ValueRequirement) -> Result<Vec<ValueRequirement>, FunctionError> {
            Ok(Vec::new())
        }
    }

    fn declares(id: &str, curve: Option<&'static str>) -> Arc<dyn CompiledFunction> {
        Arc::new(Declares { id: FunctionId::new(id), curve, broken: false })
    }

    fn bond() -> ComputationTarget {
        ComputationTarget::new(TargetRef::security("BOND")).with_attribute("Currency", "USD")
    }

    fn pv(curve: Option<&str>) -> ValueRequirement {
        let props = curve.map_or_else(ValueProperties::new, |c| ValueProperties::new().with("Curve", c));
        ValueRequirement::new("PV", TargetRef::security("BOND"), props)
    }

    fn ids(resolver: &DefaultFunctionResolver, req: &ValueRequirement, node: &NodeDraft) -> Vec<String> {
        resolver.resolve_function(req, node, &CompilationContext::new()).map(|c| c.function.id().to_string()).collect()
    }

    #[test]
    fn test_priority_then_registration_order() {
        let resolver = DefaultFunctionResolver::new()
            .with_function(declares("Low", None), 1)
            .with_function(declares("HighA", None), 10)
            .with_function(declares("HighB", None), 10);
        let node = NodeDraft::new(bond(), Vec::new().into());
        assert_eq!(ids(&resolver, &pv(None), &node), vec!["HighA", "HighB", "Low"]);
    }

    #[test]
    fn test_only_satisfying_results_are_offered() {
        let resolver = DefaultFunctionResolver::new()
            .with_function(declares("Ois", Some("OIS")), 0)
            .with_function(declares("Libor", Some("LIBOR")), 0)
            .with_function(declares("Generic", None), 0);
        let node = NodeDraft::new(bond(), Vec::new().into());
        assert_eq!(ids(&resolver, &pv(Some("LIBOR")), &node), vec!["Libor", "Generic"]);
    }

    #[test]
    fn test_skips_functions_up_the_chain_and_broken_ones() {
        let mut resolver = DefaultFunctionResolver::new()
            .with_function(declares("Outer", None), 0)
            .with_function(declares("Inner", None), 0);
        resolver.add_function(Arc::new(Declares { id: FunctionId::new("Broken"), curve: None, broken: true }), 5);
        assert_eq!(resolver.len(), 3);

        let parent = NodeDraft::new(bond(), Vec::new().into());
        let node = NodeDraft::new(bond(), parent.chain_for_inputs(&FunctionId::new("Outer")));
        assert_eq!(ids(&resolver, &pv(None), &node), vec!["Inner"]);
    }

    #[test]
    fn test_can_apply_to_filters_targets() {
        let resolver = DefaultFunctionResolver::new().with_function(declares("Any", None), 0);
        let yen = ComputationTarget::new(TargetRef::security("BOND")).with_attribute("Currency", "JPY");
        let node = NodeDraft::new(yen, Vec::new().into());
        assert!(ids(&resolver, &pv(None), &node).is_empty());
    }

    #[test]
    fn test_candidates_are_pulled_lazily() {
        let resolver = DefaultFunctionResolver::new()
            .with_function(declares("First", None), 2)
            .with_function(declares("Second", None), 1);
        let node = NodeDraft::new(bond(), Vec::new().into());
        let context = CompilationContext::new();
        let mut candidates = resolver.resolve_function(&pv(None), &node, &context);
        let first = candidates.next().unwrap();
        assert_eq!(first.function.id().as_str(), "First");
        assert_eq!(first.specification.properties(), &ValueProperties::new().with_any("Curve"));
        drop(candidates);
    }
}
