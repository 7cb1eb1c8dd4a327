use super::properties::ValueProperties;
use super::requirement::ValueRequirement;
use crate::target::TargetRef;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A concretely producible value. Equality over (name, target, properties) is
/// the identity the dependency graph keys its nodes by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ValueSpecification {
    value_name: String,
    target: TargetRef,
    properties: ValueProperties,
}

impl ValueSpecification {
    pub fn new(value_name: impl Into<String>, target: TargetRef, properties: ValueProperties) -> Self {
        Self { value_name: value_name.into(), target, properties }
    }

    /// The specification a requirement describes, taken literally.
    pub fn from_requirement(requirement: &ValueRequirement) -> Self {
        Self::new(requirement.value_name(), requirement.target().clone(), requirement.constraints().clone())
    }

    pub fn value_name(&self) -> &str { &self.value_name }
    pub fn target(&self) -> &TargetRef { &self.target }
    pub fn properties(&self) -> &ValueProperties { &self.properties }

    /// Tightens a generic declared output into the instance `requirement` wants.
    pub fn compose(&self, requirement: &ValueRequirement) -> ValueSpecification {
        let properties = self.properties.compose(requirement.constraints());
        if properties == self.properties {
            return self.clone();
        }
        Self { value_name: self.value_name.clone(), target: self.target.clone(), properties }
    }
}

impl fmt::Display for ValueSpecification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]{}", self.value_name, self.target, self.properties)
    }
}
