//! definition.rs
//! The capability set every computing function offers to the resolver.

use super::context::CompilationContext;
use super::error::FunctionError;
use crate::target::ComputationTarget;
use crate::value::{ValueRequirement, ValueSpecification};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Stable identifier of a function. Two registrations with the same id are
/// treated as the same function by self-reference checks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FunctionId(pub String);

impl FunctionId {
    pub fn new(id: impl Into<String>) -> Self { Self(id.into()) }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a function can produce and what it needs to produce it.
///
/// Every method may fail. The resolver treats a failure (or a panic) as "this
/// candidate does not work here" and backtracks.
pub trait CompiledFunction: Send + Sync + fmt::Debug {
    fn id(&self) -> &FunctionId;

    fn can_apply_to(&self, _context: &CompilationContext, _target: &ComputationTarget) -> bool {
        true
    }

    /// The outputs this function declares for `target`. May contain wildcards.
    fn results(
        &self,
        context: &CompilationContext,
        target: &ComputationTarget,
    ) -> Result<BTreeSet<ValueSpecification>, FunctionError>;

    /// The inputs needed to produce `desired`, in the order they will be bound.
    fn requirements(
        &self,
        context: &CompilationContext,
        target: &ComputationTarget,
        desired: &ValueRequirement,
    ) -> Result<Vec<ValueRequirement>, FunctionError>;

    /// Extra inputs implied by the concrete inputs and outputs once known.
    fn additional_requirements(
        &self,
        _context: &CompilationContext,
        _target: &ComputationTarget,
        _inputs: &BTreeSet<ValueSpecification>,
        _outputs: &BTreeSet<ValueSpecification>,
    ) -> Result<Vec<ValueRequirement>, FunctionError> {
        Ok(Vec::new())
    }

    /// The actual outputs given the resolved inputs (late resolution).
    fn results_with_inputs(
        &self,
        context: &CompilationContext,
        target: &ComputationTarget,
        _inputs: &BTreeSet<ValueSpecification>,
    ) -> Result<BTreeSet<ValueSpecification>, FunctionError> {
        self.results(context, target)
    }
}

/// Opaque per-registration parameters carried alongside a function.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FunctionParameters(pub BTreeMap<String, String>);

impl FunctionParameters {
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> { self.0.get(name).map(String::as_str) }
}

/// A function bound to its parameters. This is what a graph node executes.
#[derive(Debug, Clone)]
pub struct ParameterizedFunction {
    function: Arc<dyn CompiledFunction>,
    parameters: FunctionParameters,
}

impl ParameterizedFunction {
    pub fn new(function: Arc<dyn CompiledFunction>, parameters: FunctionParameters) -> Self {
        Self { function, parameters }
    }

    pub fn id(&self) -> &FunctionId { self.function.id() }
    pub fn function(&self) -> &Arc<dyn CompiledFunction> { &self.function }
    pub fn parameters(&self) -> &FunctionParameters { &self.parameters }
}

impl PartialEq for ParameterizedFunction {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id() && self.parameters == other.parameters
    }
}

impl Eq for ParameterizedFunction {}

impl From<Arc<dyn CompiledFunction>> for ParameterizedFunction {
    fn from(function: Arc<dyn CompiledFunction>) -> Self {
        Self::new(function, FunctionParameters::default())
    }
}

/// Runs a capability call, turning a panic into [`FunctionError::Panicked`].
pub fn invoke<T>(call: impl FnOnce() -> Result<T, FunctionError>) -> Result<T, FunctionError> {
    match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(result) => result,
        Err(payload) => {
            let msg = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(FunctionError::Panicked(msg))
        }
    }
}
