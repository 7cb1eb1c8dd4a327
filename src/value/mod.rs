//! The value model: what is asked for (requirements) and what can be
//! produced (specifications), plus the property algebra matching the two.
pub mod properties;
pub mod requirement;
pub mod specification;

pub use properties::{PropertyValues, ValueProperties};
pub use requirement::ValueRequirement;
pub use specification::ValueSpecification;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::TargetRef;

    fn pv_requirement(constraints: ValueProperties) -> ValueRequirement {
        ValueRequirement::new("PresentValue", TargetRef::security("SWAP-1"), constraints)
    }

    fn pv_spec(properties: ValueProperties) -> ValueSpecification {
        ValueSpecification::new("PresentValue", TargetRef::security("SWAP-1"), properties)
    }

    #[test]
    fn test_requirement_checks_name_and_target() {
        let req = pv_requirement(ValueProperties::new());
        assert!(req.is_satisfied_by(&pv_spec(ValueProperties::new())));

        let other_name = ValueSpecification::new("Delta", TargetRef::security("SWAP-1"), ValueProperties::new());
        assert!(!req.is_satisfied_by(&other_name));

        let other_target = ValueSpecification::new("PresentValue", TargetRef::security("SWAP-2"), ValueProperties::new());
        assert!(!req.is_satisfied_by(&other_target));
    }

    #[test]
    fn test_compose_narrows_generic_output() {
        let generic = pv_spec(ValueProperties::new().with_any("Curve"));
        let req = pv_requirement(ValueProperties::new().with("Curve", "USD-OIS"));
        assert!(req.is_satisfied_by(&generic));

        let composed = generic.compose(&req);
        assert_eq!(composed, pv_spec(ValueProperties::new().with("Curve", "USD-OIS")));
        assert!(req.is_satisfied_by(&composed));
        assert_eq!(composed.compose(&req), composed);
    }

    #[test]
    fn test_compose_without_effect_returns_equal_spec() {
        let spec = pv_spec(ValueProperties::new().with("Curve", "A"));
        let req = pv_requirement(ValueProperties::new());
        assert_eq!(spec.compose(&req), spec);
    }

    #[test]
    fn test_from_requirement_keeps_constraints() {
        let req = pv_requirement(ValueProperties::new().with("Curve", "A"));
        let spec = ValueSpecification::from_requirement(&req);
        assert!(req.is_satisfied_by(&spec));
        assert_eq!(spec.to_string(), "PresentValue[SECURITY~SWAP-1]{Curve=A}");
    }
}
