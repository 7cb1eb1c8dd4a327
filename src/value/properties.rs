//! properties.rs
//! Named property constraints and their matching algebra.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// The acceptable values for a single named property.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PropertyValues {
    /// Wildcard: any value is acceptable (or, on a specification, not yet decided).
    Any,
    Values(BTreeSet<String>),
}

impl PropertyValues {
    pub fn single(value: impl Into<String>) -> Self {
        Self::Values(BTreeSet::from([value.into()]))
    }

    pub fn is_any(&self) -> bool {
        matches!(self, PropertyValues::Any)
    }

    /// A property is pinned when it names exactly one value.
    pub fn is_pinned(&self) -> bool {
        matches!(self, PropertyValues::Values(v) if v.len() == 1)
    }

    fn intersects(&self, other: &PropertyValues) -> bool {
        match (self, other) {
            (PropertyValues::Any, _) | (_, PropertyValues::Any) => true,
            (PropertyValues::Values(a), PropertyValues::Values(b)) => !a.is_disjoint(b),
        }
    }

    fn narrow(&self, constraint: &PropertyValues) -> PropertyValues {
        match (self, constraint) {
            (_, PropertyValues::Any) => self.clone(),
            (PropertyValues::Any, PropertyValues::Values(wanted)) => PropertyValues::Values(wanted.clone()),
            (PropertyValues::Values(offered), PropertyValues::Values(wanted)) => {
                let common: BTreeSet<String> = offered.intersection(wanted).cloned().collect();
                if common.is_empty() {
                    self.clone()
                } else {
                    PropertyValues::Values(common)
                }
            }
        }
    }
}

/// A property set. Used both as the constraints of a requirement and as the
/// (possibly still generic) properties of a specification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ValueProperties {
    properties: BTreeMap<String, PropertyValues>,
}

impl ValueProperties {
    pub fn new() -> Self { Self::default() }

    // --- Builders ---

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name.into(), PropertyValues::single(value));
        self
    }

    pub fn with_values<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: BTreeSet<String> = values.into_iter().map(Into::into).collect();
        self.properties.insert(name.into(), PropertyValues::Values(values));
        self
    }

    pub fn with_any(mut self, name: impl Into<String>) -> Self {
        self.properties.insert(name.into(), PropertyValues::Any);
        self
    }

    // --- Accessors ---

    pub fn get(&self, name: &str) -> Option<&PropertyValues> { self.properties.get(name) }
    pub fn names(&self) -> impl Iterator<Item = &str> { self.properties.keys().map(String::as_str) }
    pub fn is_empty(&self) -> bool { self.properties.is_empty() }
    pub fn len(&self) -> usize { self.properties.len() }

    /// Returns the value of a pinned property.
    pub fn single_value(&self, name: &str) -> Option<&str> {
        match self.properties.get(name)? {
            PropertyValues::Values(v) if v.len() == 1 => v.iter().next().map(String::as_str),
            _ => None,
        }
    }

    // --- Algebra ---

    /// True when every property is pinned to exactly one value.
    pub fn is_strict(&self) -> bool {
        self.properties.values().all(PropertyValues::is_pinned)
    }

    /// Tests these properties, read as constraints, against the properties of a
    /// produced value. Every constrained name must be present on `offered`.
    pub fn is_satisfied_by(&self, offered: &ValueProperties) -> bool {
        self.properties.iter().all(|(name, constraint)| {
            offered
                .properties
                .get(name)
                .is_some_and(|values| constraint.intersects(values))
        })
    }

    /// Narrows these properties to the values demanded by `constraints`.
    ///
    /// Only names present here and constrained there are touched. Composing
    /// twice against the same constraints yields the same set.
    pub fn compose(&self, constraints: &ValueProperties) -> ValueProperties {
        let properties = self
            .properties
            .iter()
            .map(|(name, offered)| {
                let narrowed = match constraints.properties.get(name) {
                    Some(constraint) => offered.narrow(constraint),
                    None => offered.clone(),
                };
                (name.clone(), narrowed)
            })
            .collect();
        ValueProperties { properties }
    }
}

impl fmt::Display for ValueProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, values)) in self.properties.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match values {
                PropertyValues::Any => write!(f, "{}=*", name)?,
                PropertyValues::Values(v) => {
                    let joined: Vec<&str> = v.iter().map(String::as_str).collect();
                    write!(f, "{}={}", name, joined.join("|"))?
                }
            }
        }
        write!(f, "}}")
    }
}
