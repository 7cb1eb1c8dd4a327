//! Live data availability: which requirements are sourced externally
//! rather than computed.

use crate::target::TargetRef;
use crate::value::ValueRequirement;
use std::collections::{HashMap, HashSet};

pub trait LiveDataAvailability: Send + Sync {
    fn is_available(&self, requirement: &ValueRequirement) -> bool;
}

impl<F> LiveDataAvailability for F
where
    F: Fn(&ValueRequirement) -> bool + Send + Sync,
{
    fn is_available(&self, requirement: &ValueRequirement) -> bool {
        self(requirement)
    }
}

/// A fixed set of (value name, target) pairs known to be sourced externally.
/// Constraints are not considered.
#[derive(Debug, Clone, Default)]
pub struct FixedLiveDataAvailability {
    available: HashMap<TargetRef, HashSet<String>>,
}

impl FixedLiveDataAvailability {
    pub fn new() -> Self { Self::default() }

    pub fn add(&mut self, value_name: impl Into<String>, target: TargetRef) {
        self.available.entry(target).or_default().insert(value_name.into());
    }

    pub fn with(mut self, value_name: impl Into<String>, target: TargetRef) -> Self {
        self.add(value_name, target);
        self
    }
}

impl LiveDataAvailability for FixedLiveDataAvailability {
    fn is_available(&self, requirement: &ValueRequirement) -> bool {
        self.available
            .get(requirement.target())
            .is_some_and(|names| names.contains(requirement.value_name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ValueProperties;

    #[test]
    fn test_fixed_availability_ignores_constraints() {
        let oracle = FixedLiveDataAvailability::new().with("MarketPrice", TargetRef::security("AAPL"));
        let plain = ValueRequirement::unconstrained("MarketPrice", TargetRef::security("AAPL"));
        let constrained = ValueRequirement::new(
            "MarketPrice",
            TargetRef::security("AAPL"),
            ValueProperties::new().with("Source", "BLOOMBERG"),
        );
        assert!(oracle.is_available(&plain));
        assert!(oracle.is_available(&constrained));
        assert!(!oracle.is_available(&ValueRequirement::unconstrained("MarketPrice", TargetRef::security("MSFT"))));
    }

    #[test]
    fn test_closures_are_oracles() {
        let oracle = |r: &ValueRequirement| r.value_name() == "Spot";
        assert!(oracle.is_available(&ValueRequirement::unconstrained("Spot", TargetRef::primitive("EURUSD"))));
        assert!(!oracle.is_available(&ValueRequirement::unconstrained("Fwd", TargetRef::primitive("EURUSD"))));
    }
}
