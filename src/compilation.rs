//! Builds the graphs of several calculation configurations in parallel.
//!
//! Each configuration gets its own builder and graph; only the collaborators
//! are shared.

use crate::builder::{BuildError, Collaborators, GraphBuilder};
use crate::config::BuilderConfig;
use crate::graph::DependencyGraph;
use crate::value::ValueRequirement;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculationConfiguration {
    pub config: BuilderConfig,
    pub requirements: Vec<ValueRequirement>,
}

impl CalculationConfiguration {
    pub fn new(config: BuilderConfig, requirements: Vec<ValueRequirement>) -> Self {
        Self { config, requirements }
    }

    pub fn name(&self) -> &str { &self.config.calculation_configuration_name }
}

/// Builds one graph for one configuration.
pub fn compile_configuration(
    collaborators: &Collaborators,
    configuration: &CalculationConfiguration,
) -> Result<DependencyGraph, BuildError> {
    let mut builder = GraphBuilder::new(configuration.config.clone(), collaborators.clone());
    builder.add_target(configuration.requirements.iter().cloned())?;
    let graph = builder.into_dependency_graph();
    info!(
        "Compiled {} with {} nodes for {} terminal outputs",
        graph.calculation_configuration_name(),
        graph.node_count(),
        configuration.requirements.len()
    );
    Ok(graph)
}

/// Results come back in the order the configurations were given, keyed by name.
pub fn compile_configurations(
    collaborators: &Collaborators,
    configurations: &[CalculationConfiguration],
) -> Vec<(String, Result<DependencyGraph, BuildError>)> {
    configurations
        .par_iter()
        .map(|configuration| (configuration.name().to_string(), compile_configuration(collaborators, configuration)))
        .collect()
}
