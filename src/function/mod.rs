//! Computing functions as the resolver sees them: a capability set, the
//! parameters they were registered with, and the resolver ranking them.
pub mod context;
pub mod definition;
pub mod error;
pub mod resolver;
pub mod sourcing;

pub use context::CompilationContext;
pub use definition::{invoke, CompiledFunction, FunctionId, FunctionParameters, ParameterizedFunction};
pub use error::FunctionError;
pub use resolver::{CandidateIter, DefaultFunctionResolver, FunctionResolver, ResolvedFunction};
pub use sourcing::{LiveDataSourcingFunction, LIVE_DATA_FUNCTION_ID};
