//! Entity and attribute shapes shared by both persistence variants.
//!
//! # Responsibility
//! - Define the attribute mapping consumed by create/update operations.
//! - Define the schema-less record entity of the table-backed variant.
//!
//! # Invariants
//! - `Attributes` iterates in deterministic (sorted) field order.
//! - A `Record` stores its primary-key value like any other field; which
//!   field that is belongs to the strategy that configured its name.

pub mod record;
