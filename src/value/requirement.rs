use super::properties::ValueProperties;
use super::specification::ValueSpecification;
use crate::target::TargetRef;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A request for a named value on a target, possibly underspecified.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ValueRequirement {
    value_name: String,
    target: TargetRef,
    constraints: ValueProperties,
}

impl ValueRequirement {
    pub fn new(value_name: impl Into<String>, target: TargetRef, constraints: ValueProperties) -> Self {
        Self { value_name: value_name.into(), target, constraints }
    }

    /// A requirement with no constraints at all.
    pub fn unconstrained(value_name: impl Into<String>, target: TargetRef) -> Self {
        Self::new(value_name, target, ValueProperties::new())
    }

    pub fn value_name(&self) -> &str { &self.value_name }
    pub fn target(&self) -> &TargetRef { &self.target }
    pub fn constraints(&self) -> &ValueProperties { &self.constraints }

    pub fn is_satisfied_by(&self, specification: &ValueSpecification) -> bool {
        self.value_name == specification.value_name()
            && &self.target == specification.target()
            && self.constraints.is_satisfied_by(specification.properties())
    }
}

impl fmt::Display for ValueRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]{}", self.value_name, self.target, self.constraints)
    }
}
