//! Mapped-entity ("ORM-backed") persistence strategy.
//!
//! # Responsibility
//! - Bind the pipeline to a caller-supplied mapped entity type.
//! - Funnel create and update through the entity's own save step.
//!
//! # Invariants
//! - A prototype instance serves as factory for new entities and queries.
//! - Update requires the entity to report prior persistence (`exists`).

use crate::model::record::{Attributes, Value};
use crate::query::Query;
use crate::repo::{PersistenceStrategy, RepoResult};

/// Contract a mapped entity type implements to be driven by the pipeline.
///
/// Instance-level factory methods (`new_instance`, `new_query`) let one
/// injected prototype carry whatever store handle the implementation needs,
/// so freshly constructed entities can save themselves.
pub trait Model: Sized {
    /// Query handle produced by this entity type's own query facility.
    type Query: Query<Record = Self>;

    /// Constructs a fresh, unpersisted instance carrying these attributes.
    fn new_instance(&self, attributes: Attributes) -> Self;

    /// Builds a query over this entity type's backing store.
    fn new_query(&self) -> Self::Query;

    /// Backing table name.
    fn table(&self) -> String;

    /// Table-qualified primary key column, e.g. `contacts.id`.
    fn qualified_key_name(&self) -> String;

    /// Assigns attributes onto this instance, overwriting collisions.
    fn fill(&mut self, attributes: &Attributes);

    /// Snapshot of this instance's current attributes.
    fn attributes(&self) -> Attributes;

    /// Persists this instance. `false` means the store reported no effect.
    fn save(&mut self) -> RepoResult<bool>;

    /// Deep save: persists this instance and cascades to related entities.
    /// Defaults to a plain save for types without relations.
    fn push(&mut self) -> RepoResult<bool> {
        self.save()
    }

    /// Deletes this instance from the store.
    fn delete(&mut self) -> RepoResult<bool>;

    /// Current primary-key value, `None` when unset.
    fn key(&self) -> Option<Value>;

    /// Whether this instance is known to exist in the store.
    fn exists(&self) -> bool;
}

/// Persistence strategy delegating to a mapped entity type.
pub struct MappedStrategy<M: Model> {
    prototype: M,
    table: String,
    deep: bool,
}

impl<M: Model> MappedStrategy<M> {
    /// Builds a strategy that persists with plain `save`.
    pub fn new(prototype: M) -> Self {
        let table = prototype.table();
        Self {
            prototype,
            table,
            deep: false,
        }
    }

    /// Builds a strategy that persists with `push`, cascading saves to
    /// related entities.
    pub fn deep(prototype: M) -> Self {
        let mut strategy = Self::new(prototype);
        strategy.deep = true;
        strategy
    }

    pub fn prototype(&self) -> &M {
        &self.prototype
    }

    /// Single save step shared by create and update: callers cannot
    /// distinguish which of the two a save failure came from.
    fn save_entity(&self, entity: &mut M, attributes: &Attributes) -> RepoResult<bool> {
        entity.fill(attributes);
        if self.deep {
            entity.push()
        } else {
            entity.save()
        }
    }
}

impl<M: Model> PersistenceStrategy for MappedStrategy<M> {
    type Entity = M;
    type Query = M::Query;

    fn table(&self) -> &str {
        &self.table
    }

    fn key_name(&self) -> String {
        self.prototype.qualified_key_name()
    }

    fn new_query(&self) -> M::Query {
        self.prototype.new_query()
    }

    fn new_entity(&self, attributes: Attributes) -> M {
        self.prototype.new_instance(attributes)
    }

    fn from_record(&self, record: M) -> M {
        record
    }

    fn entity_key(&self, entity: &M) -> Option<Value> {
        entity.key().filter(|key| !matches!(key, Value::Null))
    }

    fn entity_attributes(&self, entity: &M) -> Attributes {
        entity.attributes()
    }

    fn update_eligible(&self, entity: &M) -> bool {
        entity.exists()
    }

    fn perform_create(&self, entity: &mut M, attributes: &Attributes) -> RepoResult<bool> {
        self.save_entity(entity, attributes)
    }

    fn perform_update(&self, entity: &mut M, attributes: &Attributes) -> RepoResult<bool> {
        self.save_entity(entity, attributes)
    }

    fn perform_delete(&self, entity: &mut M) -> RepoResult<bool> {
        entity.delete()
    }
}
