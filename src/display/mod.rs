//! Human-readable renderings of a built graph.
pub mod trace;

pub use trace::format_structure;
