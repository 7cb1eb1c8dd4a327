// Dependency graph construction for a calculation engine.
// Requested values go in; a graph of function applications, each bound to
// the inputs it consumes, comes out for an execution engine to run.

pub mod builder;
pub mod compilation;
pub mod config;
pub mod display;
pub mod function;
pub mod graph;
pub mod livedata;
pub mod target;
pub mod value;

pub use builder::{BuildError, Collaborators, GraphBuilder};
pub use compilation::{compile_configuration, compile_configurations, CalculationConfiguration};
pub use config::BuilderConfig;
pub use graph::{DependencyGraph, DependencyNode, GraphError, NodeId, ResolvedValue};
pub use value::{ValueProperties, ValueRequirement, ValueSpecification};
