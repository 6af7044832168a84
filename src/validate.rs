//! Validation collaborator contract and structured error messages.
//!
//! # Responsibility
//! - Define the pass/fail + error-message contract consumed by the pipeline.
//! - Provide `ErrorBag`, the field → messages mapping surfaced to callers.
//!
//! # Invariants
//! - The rule engine itself lives outside this crate; only its verdict and
//!   messages cross this boundary.
//! - Messages within a field keep their insertion order.

use crate::model::record::{Attributes, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Validation collaborator consulted before mutating operations.
///
/// The repository seeds the `table` placeholder on attach and the `key`
/// placeholder (current entity key) before each validated update, so rule
/// templates like unique-checks can reference them.
pub trait Validator {
    /// Checks attributes for a create operation.
    fn valid_create(&mut self, attributes: &Attributes) -> bool;
    /// Checks attributes for an update operation.
    fn valid_update(&mut self, attributes: &Attributes) -> bool;
    /// Sets a named placeholder in the validator's template context.
    fn replace(&mut self, placeholder: &str, value: Value);
    /// Returns the messages from the most recent failing check.
    fn errors(&self) -> ErrorBag;
}

/// Field-keyed validation messages.
///
/// Produced fresh per failing validate call; the repository retains the most
/// recent bag until the next failing call overwrites it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorBag {
    messages: BTreeMap<String, Vec<String>>,
}

impl ErrorBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one message for a field, preserving message order.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) -> &mut Self {
        self.messages
            .entry(field.into())
            .or_default()
            .push(message.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Messages recorded for one field, in insertion order.
    pub fn get(&self, field: &str) -> &[String] {
        self.messages.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Fields that have at least one message, in sorted order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.messages.keys().map(String::as_str)
    }

    /// All messages across fields, field-sorted then insertion-ordered.
    pub fn all(&self) -> impl Iterator<Item = &str> {
        self.messages
            .values()
            .flat_map(|messages| messages.iter().map(String::as_str))
    }
}
