//! Turns requested values into a dependency graph by searching, with
//! backtracking, for functions able to produce them.
pub mod engine;
pub mod error;
pub(crate) mod state;

pub use engine::GraphBuilder;
pub use error::BuildError;

use crate::function::{CompilationContext, FunctionResolver};
use crate::livedata::LiveDataAvailability;
use crate::target::TargetResolver;
use std::sync::Arc;

/// The read-only services a builder consults. Shared freely between builders
/// running on different threads.
#[derive(Clone)]
pub struct Collaborators {
    pub target_resolver: Arc<dyn TargetResolver>,
    pub function_resolver: Arc<dyn FunctionResolver>,
    pub live_data: Arc<dyn LiveDataAvailability>,
    pub compilation_context: Arc<CompilationContext>,
}

impl Collaborators {
    pub fn new(
        target_resolver: Arc<dyn TargetResolver>,
        function_resolver: Arc<dyn FunctionResolver>,
        live_data: Arc<dyn LiveDataAvailability>,
        compilation_context: Arc<CompilationContext>,
    ) -> Self {
        Self { target_resolver, function_resolver, live_data, compilation_context }
    }
}
