//! Defines the error types raised while building a dependency graph.
use crate::function::{FunctionError, FunctionId};
use crate::graph::GraphError;
use crate::target::TargetRef;
use crate::value::ValueRequirement;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuildError {
    #[error("target {0} cannot be resolved")]
    UnresolvableTarget(TargetRef),

    #[error("unable to satisfy requirement {requirement}")]
    Unsatisfiable {
        requirement: ValueRequirement,
        #[source]
        cause: Option<Box<BuildError>>,
    },

    #[error("function {function} failed while resolving {requirement}")]
    Function {
        requirement: ValueRequirement,
        function: FunctionId,
        #[source]
        source: FunctionError,
    },

    #[error("resolution of {requirement} exceeded the maximum depth of {max_depth}")]
    DepthExceeded { requirement: ValueRequirement, max_depth: usize },

    #[error("graph invariant violated: {0}")]
    Graph(#[from] GraphError),
}

impl BuildError {
    pub fn unsatisfiable(requirement: ValueRequirement, cause: Option<BuildError>) -> Self {
        BuildError::Unsatisfiable { requirement, cause: cause.map(Box::new) }
    }

    pub fn function(requirement: &ValueRequirement, function: &FunctionId, source: FunctionError) -> Self {
        BuildError::Function { requirement: requirement.clone(), function: function.clone(), source }
    }

    /// Recoverable failures are absorbed by backtracking. Structural ones abort the build.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, BuildError::Graph(_))
    }

    /// The innermost failure in a chain of unsatisfiable requirements.
    pub fn root_cause(&self) -> &BuildError {
        match self {
            BuildError::Unsatisfiable { cause: Some(cause), .. } => cause.root_cause(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeId;
    use std::error::Error;

    #[test]
    fn test_only_graph_errors_are_fatal() {
        let req = ValueRequirement::unconstrained("PV", TargetRef::security("BOND"));
        assert!(BuildError::UnresolvableTarget(TargetRef::security("BOND")).is_recoverable());
        assert!(BuildError::unsatisfiable(req.clone(), None).is_recoverable());
        assert!(BuildError::DepthExceeded { requirement: req, max_depth: 4 }.is_recoverable());
        assert!(!BuildError::from(GraphError::UnknownNode(NodeId::new(3))).is_recoverable());
    }

    #[test]
    fn test_cause_chain() {
        let inner = ValueRequirement::unconstrained("Curve", TargetRef::primitive("USD"));
        let outer = ValueRequirement::unconstrained("PV", TargetRef::security("BOND"));
        let failure = BuildError::function(&inner, &FunctionId::new("CurveFn"), FunctionError::failed("no quotes"));
        let err = BuildError::unsatisfiable(outer, Some(BuildError::unsatisfiable(inner, Some(failure.clone()))));

        assert_eq!(err.to_string(), "unable to satisfy requirement PV[SECURITY~BOND]{}");
        assert!(err.source().is_some());
        assert_eq!(err.root_cause(), &failure);
    }
}
