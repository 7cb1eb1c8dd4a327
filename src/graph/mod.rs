//! Defines the output data structure: committed computation steps and the
//! indices used to find them again.
pub mod dag;
pub mod error;
pub mod node;
pub mod topology;

// Re-export key types for convenient access
pub use dag::DependencyGraph;
pub use error::GraphError;
pub use node::{DependencyNode, DependentNode, NodeDraft, NodeId, ResolvedValue};
