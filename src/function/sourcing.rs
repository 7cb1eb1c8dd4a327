//! The synthetic function behind live-data source nodes.

use super::context::CompilationContext;
use super::definition::{CompiledFunction, FunctionId, FunctionParameters, ParameterizedFunction};
use super::error::FunctionError;
use crate::target::ComputationTarget;
use crate::value::{ValueRequirement, ValueSpecification};
use std::collections::BTreeSet;
use std::sync::Arc;

pub const LIVE_DATA_FUNCTION_ID: &str = "LiveDataSourcingFunction";

/// Sources one externally supplied value. Has no inputs.
#[derive(Debug, Clone)]
pub struct LiveDataSourcingFunction {
    id: FunctionId,
    result: ValueSpecification,
}

impl LiveDataSourcingFunction {
    pub fn new(requirement: &ValueRequirement) -> Self {
        Self {
            id: FunctionId::new(LIVE_DATA_FUNCTION_ID),
            result: ValueSpecification::from_requirement(requirement),
        }
    }

    pub fn result(&self) -> &ValueSpecification { &self.result }

    pub fn into_parameterized(self) -> ParameterizedFunction {
        ParameterizedFunction::new(Arc::new(self), FunctionParameters::default())
    }
}

impl CompiledFunction for LiveDataSourcingFunction {
    fn id(&self) -> &FunctionId { &self.id }

    fn can_apply_to(&self, _context: &CompilationContext, target: &ComputationTarget) -> bool {
        target.reference() == self.result.target()
    }

    fn results(&self, _context: &CompilationContext, _target: &ComputationTarget) -> Result<BTreeSet<ValueSpecification>, FunctionError> {
        Ok(BTreeSet::from([self.result.clone()]))
    }

    fn requirements(
        &self,
        _context: &CompilationContext,
        _target: &ComputationTarget,
        _desired: &ValueRequirement,
    ) -> Result<Vec<ValueRequirement>, FunctionError> {
        Ok(Vec::new())
    }
}
