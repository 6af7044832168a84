//! Attribute mapping and the schema-less record entity.
//!
//! # Responsibility
//! - Provide `Attributes`, the field-name → value mapping passed into
//!   create/update operations and produced by raw queries.
//! - Provide `Record`, the dynamic entity used by the table-backed variant,
//!   with typed accessors instead of reflection-style field lookup.
//!
//! # Invariants
//! - Field iteration order is sorted and stable across calls.
//! - `fill` overwrites existing fields and never removes absent ones.

use std::collections::BTreeMap;

pub use rusqlite::types::Value;

/// Ordered mapping of field name to value.
///
/// Transient by design: built by the caller for a single create/update call,
/// or assembled from one raw query row. The repository never retains one
/// across calls.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    fields: BTreeMap<String, Value>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets one field, replacing any previous value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Iterates fields in sorted name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Copies every field of `other` into `self`, overwriting collisions.
    pub fn merge(&mut self, other: &Attributes) {
        for (name, value) in other.iter() {
            self.fields.insert(name.to_string(), value.clone());
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut attributes = Attributes::new();
        for (name, value) in iter {
            attributes.set(name, value);
        }
        attributes
    }
}

/// Schema-less entity for the table-backed persistence variant.
///
/// Wraps an attribute mapping and exposes typed accessors. The primary-key
/// field is read and written by name through the owning strategy, so a
/// record built from one table can be reused with a different key column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    attributes: Attributes,
}

impl Record {
    pub fn new(attributes: Attributes) -> Self {
        Self { attributes }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.attributes.set(name, value);
        self
    }

    /// Overwrites this record's fields with the given attributes.
    pub fn fill(&mut self, attributes: &Attributes) {
        self.attributes.merge(attributes);
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn into_attributes(self) -> Attributes {
        self.attributes
    }

    /// Reads a field as an integer, if present and of that type.
    pub fn integer(&self, name: &str) -> Option<i64> {
        match self.get(name) {
            Some(Value::Integer(value)) => Some(*value),
            _ => None,
        }
    }

    /// Reads a field as text, if present and of that type.
    pub fn text(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            Some(Value::Text(value)) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Reads a field as a float, if present and of that type.
    pub fn real(&self, name: &str) -> Option<f64> {
        match self.get(name) {
            Some(Value::Real(value)) => Some(*value),
            _ => None,
        }
    }
}

impl From<Attributes> for Record {
    fn from(attributes: Attributes) -> Self {
        Self::new(attributes)
    }
}

#[cfg(test)]
mod tests {
    use super::{Attributes, Record, Value};

    #[test]
    fn attributes_iterate_in_sorted_order() {
        let mut attributes = Attributes::new();
        attributes.set("zeta", 1_i64);
        attributes.set("alpha", 2_i64);
        attributes.set("mid", 3_i64);

        let names: Vec<&str> = attributes.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn set_replaces_existing_field() {
        let mut attributes = Attributes::new();
        attributes.set("name", "draft".to_string());
        attributes.set("name", "final".to_string());

        assert_eq!(attributes.len(), 1);
        assert_eq!(
            attributes.get("name"),
            Some(&Value::Text("final".to_string()))
        );
    }

    #[test]
    fn merge_overwrites_collisions_and_keeps_the_rest() {
        let mut base: Attributes = [("a", 1_i64), ("b", 2_i64)].into_iter().collect();
        let incoming: Attributes = [("b", 20_i64), ("c", 30_i64)].into_iter().collect();

        base.merge(&incoming);
        assert_eq!(base.get("a"), Some(&Value::Integer(1)));
        assert_eq!(base.get("b"), Some(&Value::Integer(20)));
        assert_eq!(base.get("c"), Some(&Value::Integer(30)));
    }

    #[test]
    fn record_typed_accessors_reject_mismatched_types() {
        let mut record = Record::empty();
        record.set("id", 7_i64);
        record.set("name", "bob".to_string());
        record.set("score", 0.5_f64);

        assert_eq!(record.integer("id"), Some(7));
        assert_eq!(record.text("name"), Some("bob"));
        assert_eq!(record.real("score"), Some(0.5));

        assert_eq!(record.integer("name"), None);
        assert_eq!(record.text("id"), None);
        assert_eq!(record.integer("missing"), None);
    }

    #[test]
    fn record_fill_merges_attributes() {
        let mut record = Record::new([("name", "bob".to_string())].into_iter().collect());
        let update: Attributes = [("email", "bob@example.org".to_string())]
            .into_iter()
            .collect();

        record.fill(&update);
        assert_eq!(record.text("name"), Some("bob"));
        assert_eq!(record.text("email"), Some("bob@example.org"));
    }
}
