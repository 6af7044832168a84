//! Repository-pattern CRUD pipeline over swappable persistence strategies.
//!
//! Every operation runs the same lifecycle — validate, before-hook, perform,
//! after-hook — whether the store is a raw SQLite table or a caller-supplied
//! mapped entity type. Recoverable failures (validation, zero-effect writes)
//! come back as sentinel values; only preconditions and backend faults are
//! errors.

pub mod db;
pub mod logging;
pub mod model;
pub mod query;
pub mod repo;
pub mod validate;

pub use db::{open_db, open_db_in_memory};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::record::{Attributes, Record, Value};
pub use query::sqlite::TableQuery;
pub use query::{Filter, Op, Page, Query};
pub use repo::mapped::{MappedStrategy, Model};
pub use repo::table::TableStrategy;
pub use repo::{Hooks, PersistenceStrategy, RepoError, RepoResult, Repository};
pub use validate::{ErrorBag, Validator};

/// Returns the crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
