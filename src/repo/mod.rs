//! Repository pipeline: validation gating, hooks, and persistence dispatch.
//!
//! # Responsibility
//! - Decompose every CRUD operation into validate → before → perform → after.
//! - Keep failure signaling consistent across persistence variants.
//!
//! # Invariants
//! - Recoverable outcomes (validation failure, zero-effect storage) are
//!   sentinel return values (`Ok(None)` / `Ok(false)`), never `Err`.
//! - Precondition violations and backend faults are `Err` and abort the call
//!   before any storage mutation.
//! - The last-error slot is overwritten by each failing validated call.

use crate::model::record::{Attributes, Value};
use crate::query::{Op, Page, Query};
use crate::validate::{ErrorBag, Validator};
use log::{debug, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod mapped;
pub mod table;

pub type RepoResult<T> = Result<T, RepoError>;

/// Non-recoverable repository error.
///
/// Validation failures never appear here; they are reported through sentinel
/// return values plus [`Repository::last_errors`].
#[derive(Debug)]
pub enum RepoError {
    /// Programmer error: the call was made against invalid program state
    /// (updating an unpersisted entity, configuring an empty table name).
    Precondition(String),
    /// Raw-table backend fault.
    Sqlite(rusqlite::Error),
    /// Mapped-entity backend fault.
    Backend(Box<dyn Error + Send + Sync>),
}

impl RepoError {
    /// Wraps a mapped-entity backend error.
    pub fn backend(err: impl Error + Send + Sync + 'static) -> Self {
        Self::Backend(Box::new(err))
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Precondition(message) => write!(f, "precondition violated: {message}"),
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::Backend(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Precondition(_) => None,
            Self::Sqlite(err) => Some(err),
            Self::Backend(err) => Some(err.as_ref()),
        }
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

/// Swappable component that actually talks to the backing store.
///
/// One implementation binds the pipeline to a raw table
/// ([`table::TableStrategy`]), the other to a caller-supplied mapped entity
/// type ([`mapped::MappedStrategy`]).
pub trait PersistenceStrategy {
    type Entity;
    type Query: Query;

    /// Backing table name; seeded into the validator's `table` placeholder.
    fn table(&self) -> &str;

    /// Table-qualified primary key column, e.g. `users.id`.
    fn key_name(&self) -> String;

    /// Builds a fresh query scoped to this strategy's store.
    fn new_query(&self) -> Self::Query;

    /// Entity factory used by create and by raw-result transformation.
    fn new_entity(&self, attributes: Attributes) -> Self::Entity;

    /// Transforms one raw query result into an entity.
    fn from_record(&self, record: <Self::Query as Query>::Record) -> Self::Entity;

    /// The entity's current key, `None` when unset.
    fn entity_key(&self, entity: &Self::Entity) -> Option<Value>;

    /// Snapshot of the entity's own attributes (used by `persist`).
    fn entity_attributes(&self, entity: &Self::Entity) -> Attributes;

    /// Whether `update` may touch this entity at all. The mapped variant
    /// requires prior persistence; the table variant has no such notion.
    fn update_eligible(&self, entity: &Self::Entity) -> bool {
        let _ = entity;
        true
    }

    /// Writes a new entity to the store. `false` means the store reported
    /// no effect (recoverable), `Err` means a backend fault.
    fn perform_create(
        &self,
        entity: &mut Self::Entity,
        attributes: &Attributes,
    ) -> RepoResult<bool>;

    fn perform_update(
        &self,
        entity: &mut Self::Entity,
        attributes: &Attributes,
    ) -> RepoResult<bool>;

    fn perform_delete(&self, entity: &mut Self::Entity) -> RepoResult<bool>;
}

/// Optional callback slots wrapping pipeline steps.
///
/// Registered callbacks replace the subclass-override extension points of a
/// classic repository base class: leave a slot `None` for a no-op.
pub struct Hooks<E, Q> {
    /// Runs after validation, before the create perform-step.
    pub before_create: Option<Box<dyn FnMut(&mut E, &Attributes)>>,
    /// Runs only when the create perform-step succeeded.
    pub after_create: Option<Box<dyn FnMut(&mut E)>>,
    /// Runs after validation, before the update perform-step.
    pub before_update: Option<Box<dyn FnMut(&mut E, &Attributes)>>,
    /// Runs only when the update perform-step succeeded.
    pub after_update: Option<Box<dyn FnMut(&mut E)>>,
    /// Runs before any fetch executes; the flag is `true` for multi-row
    /// fetches so a hook can branch on fetch shape.
    pub before_query: Option<Box<dyn FnMut(&mut Q, bool)>>,
    /// Runs over transformed fetch results; skipped when a single-row fetch
    /// found nothing.
    pub after_query: Option<Box<dyn FnMut(&mut [E])>>,
}

impl<E, Q> Default for Hooks<E, Q> {
    fn default() -> Self {
        Self {
            before_create: None,
            after_create: None,
            before_update: None,
            after_update: None,
            before_query: None,
            after_query: None,
        }
    }
}

/// Repository pipeline parameterized by a persistence strategy.
///
/// Synchronous and single-threaded by design: the only state carried across
/// calls is the last-validation-error slot, which belongs to whichever call
/// wrote it last.
pub struct Repository<S: PersistenceStrategy> {
    strategy: S,
    validator: Option<Box<dyn Validator>>,
    hooks: Hooks<S::Entity, S::Query>,
    last_errors: Option<ErrorBag>,
}

impl<S: PersistenceStrategy> Repository<S> {
    /// Builds a repository with no validation gate.
    pub fn new(strategy: S) -> Self {
        Self {
            strategy,
            validator: None,
            hooks: Hooks::default(),
            last_errors: None,
        }
    }

    /// Builds a repository that consults `validator` before create/update.
    ///
    /// Seeds the validator's `table` placeholder with the strategy's table
    /// name so rule templates can reference it.
    pub fn with_validator(strategy: S, mut validator: Box<dyn Validator>) -> Self {
        validator.replace("table", Value::Text(strategy.table().to_string()));
        Self {
            strategy,
            validator: Some(validator),
            hooks: Hooks::default(),
            last_errors: None,
        }
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    /// Callback registration point; assign slots directly.
    pub fn hooks_mut(&mut self) -> &mut Hooks<S::Entity, S::Query> {
        &mut self.hooks
    }

    /// Messages from the most recent failing validated call, if any.
    pub fn last_errors(&self) -> Option<&ErrorBag> {
        self.last_errors.as_ref()
    }

    /// Creates a new entity from the given attributes.
    ///
    /// `Ok(None)` signals a recoverable failure: either the validator
    /// rejected the attributes (see [`Self::last_errors`]) or the store
    /// reported no row inserted. No storage access happens on validation
    /// failure.
    pub fn create(&mut self, attributes: Attributes) -> RepoResult<Option<S::Entity>> {
        if !self.check_create(&attributes) {
            warn!(
                "event=repo_create table={} status=validation_failed",
                self.strategy.table()
            );
            return Ok(None);
        }

        let mut entity = self.strategy.new_entity(Attributes::new());
        let created = self.run_create(&mut entity, &attributes)?;
        debug!(
            "event=repo_create table={} status={}",
            self.strategy.table(),
            if created { "ok" } else { "no_effect" }
        );
        Ok(created.then_some(entity))
    }

    /// Updates an existing entity with the given attributes.
    ///
    /// Returns `Ok(false)` when validation rejects the attributes or the
    /// store reports zero affected rows. Calling this on an entity the
    /// strategy considers unpersisted is a precondition violation.
    pub fn update(&mut self, entity: &mut S::Entity, attributes: Attributes) -> RepoResult<bool> {
        if !self.strategy.update_eligible(entity) {
            warn!(
                "event=repo_update table={} status=precondition_violation",
                self.strategy.table()
            );
            return Err(RepoError::Precondition(format!(
                "cannot update an entity that has not been persisted (table `{}`)",
                self.strategy.table()
            )));
        }

        if !self.check_update(entity, &attributes) {
            warn!(
                "event=repo_update table={} status=validation_failed",
                self.strategy.table()
            );
            return Ok(false);
        }

        if let Some(hook) = self.hooks.before_update.as_mut() {
            hook(entity, &attributes);
        }
        let updated = self.strategy.perform_update(entity, &attributes)?;
        if updated {
            if let Some(hook) = self.hooks.after_update.as_mut() {
                hook(entity);
            }
        }
        debug!(
            "event=repo_update table={} status={}",
            self.strategy.table(),
            if updated { "ok" } else { "no_effect" }
        );
        Ok(updated)
    }

    /// Deletes an entity. No validation step; zero affected rows is the
    /// recoverable `Ok(false)`, not a fault.
    pub fn delete(&mut self, entity: &mut S::Entity) -> RepoResult<bool> {
        let deleted = self.strategy.perform_delete(entity)?;
        debug!(
            "event=repo_delete table={} status={}",
            self.strategy.table(),
            if deleted { "ok" } else { "no_effect" }
        );
        Ok(deleted)
    }

    /// Fetches a single entity by primary key.
    ///
    /// The `after_query` hook is skipped entirely when no row matches.
    pub fn get_by_key(&mut self, key: Value) -> RepoResult<Option<S::Entity>> {
        let mut query = self.strategy.new_query();
        query.filter(&self.strategy.key_name(), Op::Eq, key);
        if let Some(hook) = self.hooks.before_query.as_mut() {
            hook(&mut query, false);
        }

        match query.first()? {
            None => Ok(None),
            Some(record) => {
                let mut entity = self.strategy.from_record(record);
                if let Some(hook) = self.hooks.after_query.as_mut() {
                    hook(std::slice::from_mut(&mut entity));
                }
                Ok(Some(entity))
            }
        }
    }

    /// Fetches all entities, each mapped through the strategy's factory.
    pub fn get_all(&mut self) -> RepoResult<Vec<S::Entity>> {
        let mut query = self.strategy.new_query();
        if let Some(hook) = self.hooks.before_query.as_mut() {
            hook(&mut query, true);
        }

        let records = query.get()?;
        let mut entities: Vec<S::Entity> = records
            .into_iter()
            .map(|record| self.strategy.from_record(record))
            .collect();
        if let Some(hook) = self.hooks.after_query.as_mut() {
            hook(&mut entities);
        }
        Ok(entities)
    }

    /// Fetches one page of entities plus the unpaginated total.
    pub fn paginate(&mut self, page: u32, per_page: u32) -> RepoResult<Page<S::Entity>> {
        let mut query = self.strategy.new_query();
        if let Some(hook) = self.hooks.before_query.as_mut() {
            hook(&mut query, true);
        }

        let records = query.paginate(page, per_page)?;
        let mut mapped = records.map(|record| self.strategy.from_record(record));
        if let Some(hook) = self.hooks.after_query.as_mut() {
            hook(&mut mapped.items);
        }
        Ok(mapped)
    }

    /// Upsert dispatcher: updates when the entity's key is set, otherwise
    /// runs the create pipeline against the entity's own attributes.
    pub fn persist(&mut self, entity: &mut S::Entity) -> RepoResult<bool> {
        if self.strategy.entity_key(entity).is_some() {
            return self.update(entity, Attributes::new());
        }

        let attributes = self.strategy.entity_attributes(entity);
        if !self.check_create(&attributes) {
            warn!(
                "event=repo_persist table={} status=validation_failed",
                self.strategy.table()
            );
            return Ok(false);
        }
        self.run_create(entity, &attributes)
    }

    /// Shared create tail: before-hook, perform-step, conditional after-hook.
    fn run_create(&mut self, entity: &mut S::Entity, attributes: &Attributes) -> RepoResult<bool> {
        if let Some(hook) = self.hooks.before_create.as_mut() {
            hook(entity, attributes);
        }
        let created = self.strategy.perform_create(entity, attributes)?;
        if created {
            if let Some(hook) = self.hooks.after_create.as_mut() {
                hook(entity);
            }
        }
        Ok(created)
    }

    /// Runs the create validation gate, capturing errors on failure.
    fn check_create(&mut self, attributes: &Attributes) -> bool {
        match self.validator.as_mut() {
            None => true,
            Some(validator) => {
                if validator.valid_create(attributes) {
                    true
                } else {
                    self.last_errors = Some(validator.errors());
                    false
                }
            }
        }
    }

    /// Runs the update validation gate, seeding the `key` placeholder with
    /// the entity's current key first.
    fn check_update(&mut self, entity: &S::Entity, attributes: &Attributes) -> bool {
        let key = self.strategy.entity_key(entity);
        match self.validator.as_mut() {
            None => true,
            Some(validator) => {
                // Null when unset, so no previous call's key can linger.
                validator.replace("key", key.unwrap_or(Value::Null));
                if validator.valid_update(attributes) {
                    true
                } else {
                    self.last_errors = Some(validator.errors());
                    false
                }
            }
        }
    }
}
