//! context.rs
//! The compilation context: an opaque bag populated by the surrounding engine
//! and handed through, untouched, to every function capability call.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompilationContext {
    entries: BTreeMap<String, serde_json::Value>,
}

impl CompilationContext {
    pub fn new() -> Self { Self::default() }

    pub fn insert(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.entries.insert(key.into(), value);
    }

    pub fn with(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.insert(key, value);
        self
    }

    /// Serializes `value` into the bag.
    pub fn insert_typed<T: Serialize>(&mut self, key: impl Into<String>, value: &T) -> Result<(), serde_json::Error> {
        let json = serde_json::to_value(value)?;
        self.entries.insert(key.into(), json);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> { self.entries.get(key) }

    /// Reads an entry back as `T`. `None` if absent or of the wrong shape.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.entries.get(key).and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_typed_round_trip() {
        let mut ctx = CompilationContext::new();
        ctx.insert_typed("curves", &vec!["USD-OIS".to_string(), "EUR-6M".to_string()]).unwrap();
        let curves: Vec<String> = ctx.get_as("curves").unwrap();
        assert_eq!(curves, vec!["USD-OIS", "EUR-6M"]);
    }

    #[test]
    fn test_wrong_shape_reads_as_none() {
        let ctx = CompilationContext::new().with("valuation_date", json!("2024-01-31"));
        assert_eq!(ctx.get_as::<u32>("valuation_date"), None);
        assert_eq!(ctx.get("valuation_date"), Some(&json!("2024-01-31")));
        assert!(ctx.get("missing").is_none());
    }
}
