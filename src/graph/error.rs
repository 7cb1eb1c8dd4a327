//! Defines the error types for the graph module.
use super::node::NodeId;
use crate::value::ValueSpecification;
use thiserror::Error;

/// A structural violation of the graph's invariants.
///
/// These indicate a resolver bug rather than an unsatisfiable model, and are
/// never absorbed by backtracking.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("'{specification}' is already produced by node {existing:?}")]
    DuplicateOutput { specification: ValueSpecification, existing: NodeId },
    #[error("node {0:?} is not in the graph")]
    UnknownNode(NodeId),
    #[error("input '{specification}' is not produced by node {node:?}")]
    MissingInput { node: NodeId, specification: ValueSpecification },
    #[error("node {0:?} is still consumed by other nodes or terminal outputs")]
    HasDependents(NodeId),
    #[error("no node produces '{0}'")]
    UnknownSpecification(ValueSpecification),
    #[error("Cycle detected involving node {0:?}")]
    CycleDetected(NodeId),
}
