//! Computation targets: the entities values are computed over.
//!
//! The resolver only ever reads targets. Ownership and lookup of the real
//! entities (securities, positions, portfolio nodes) belongs to whoever
//! implements [`TargetResolver`].

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TargetType {
    /// A bare identifier (a currency, a curve name). Needs no lookup.
    Primitive,
    Security,
    Position,
    PortfolioNode,
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TargetType::Primitive => "PRIMITIVE",
            TargetType::Security => "SECURITY",
            TargetType::Position => "POSITION",
            TargetType::PortfolioNode => "PORTFOLIO_NODE",
        };
        f.write_str(name)
    }
}

/// An unresolved reference to a target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TargetRef {
    pub target_type: TargetType,
    pub id: String,
}

impl TargetRef {
    pub fn new(target_type: TargetType, id: impl Into<String>) -> Self {
        Self { target_type, id: id.into() }
    }

    pub fn primitive(id: impl Into<String>) -> Self { Self::new(TargetType::Primitive, id) }
    pub fn security(id: impl Into<String>) -> Self { Self::new(TargetType::Security, id) }
}

impl fmt::Display for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}~{}", self.target_type, self.id)
    }
}

/// A resolved target. Functions may inspect its attributes (e.g. a security's
/// currency) to decide what they can compute and what they need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputationTarget {
    reference: TargetRef,
    attributes: BTreeMap<String, String>,
}

impl ComputationTarget {
    pub fn new(reference: TargetRef) -> Self {
        Self { reference, attributes: BTreeMap::new() }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn reference(&self) -> &TargetRef { &self.reference }
    pub fn target_type(&self) -> TargetType { self.reference.target_type }
    pub fn attribute(&self, name: &str) -> Option<&str> { self.attributes.get(name).map(String::as_str) }
}

impl fmt::Display for ComputationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.reference.fmt(f)
    }
}

pub trait TargetResolver: Send + Sync {
    /// Returns `None` when the reference names nothing.
    fn resolve(&self, reference: &TargetRef) -> Option<ComputationTarget>;
}

/// In-memory resolver. Primitive references always resolve, to a bare target
/// unless a richer one was registered.
#[derive(Debug, Clone, Default)]
pub struct MapTargetResolver {
    targets: HashMap<TargetRef, ComputationTarget>,
}

impl MapTargetResolver {
    pub fn new() -> Self { Self::default() }

    pub fn add(&mut self, target: ComputationTarget) {
        self.targets.insert(target.reference.clone(), target);
    }

    pub fn with(mut self, target: ComputationTarget) -> Self {
        self.add(target);
        self
    }
}

impl TargetResolver for MapTargetResolver {
    fn resolve(&self, reference: &TargetRef) -> Option<ComputationTarget> {
        match self.targets.get(reference) {
            Some(target) => Some(target.clone()),
            None if reference.target_type == TargetType::Primitive => Some(ComputationTarget::new(reference.clone())),
            None => None,
        }
    }
}
