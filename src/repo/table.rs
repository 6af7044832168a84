//! Raw-table-backed persistence strategy.
//!
//! # Responsibility
//! - Bind the pipeline to one SQLite table with a configured key column.
//! - Construct schema-less `Record` entities from attribute mappings.
//!
//! # Invariants
//! - Create writes the store-assigned key back onto the record.
//! - Update and delete are keyed single-row operations.

use crate::model::record::{Attributes, Record, Value};
use crate::query::sqlite::TableQuery;
use crate::query::{Op, Query};
use crate::repo::{PersistenceStrategy, RepoError, RepoResult};
use rusqlite::Connection;

const DEFAULT_PRIMARY_KEY: &str = "id";

/// Persistence strategy over a plain data-store table.
#[derive(Debug)]
pub struct TableStrategy<'conn> {
    conn: &'conn Connection,
    table: String,
    primary_key: String,
}

impl<'conn> TableStrategy<'conn> {
    /// Builds a strategy with the default `id` primary-key column.
    ///
    /// # Errors
    /// An empty table name is a configuration fault, not bad input, and is
    /// rejected with [`RepoError::Precondition`].
    pub fn new(conn: &'conn Connection, table: impl Into<String>) -> RepoResult<Self> {
        Self::with_key(conn, table, DEFAULT_PRIMARY_KEY)
    }

    /// Builds a strategy with an explicit primary-key column.
    pub fn with_key(
        conn: &'conn Connection,
        table: impl Into<String>,
        primary_key: impl Into<String>,
    ) -> RepoResult<Self> {
        let table = table.into();
        if table.trim().is_empty() {
            return Err(RepoError::Precondition(
                "table-backed strategy requires a non-empty table name".to_string(),
            ));
        }
        let primary_key = primary_key.into();
        if primary_key.trim().is_empty() {
            return Err(RepoError::Precondition(
                "table-backed strategy requires a non-empty primary key column".to_string(),
            ));
        }
        Ok(Self {
            conn,
            table,
            primary_key,
        })
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Keyed query scoped to the given entity, `Value::Null` when unset so
    /// a key-less update/delete matches nothing instead of everything.
    fn keyed_query(&self, entity: &Record) -> TableQuery<'conn> {
        let mut query = self.new_query();
        let key = self.entity_key(entity).unwrap_or(Value::Null);
        query.filter(&self.key_name(), Op::Eq, key);
        query
    }
}

impl<'conn> PersistenceStrategy for TableStrategy<'conn> {
    type Entity = Record;
    type Query = TableQuery<'conn>;

    fn table(&self) -> &str {
        &self.table
    }

    fn key_name(&self) -> String {
        format!("{}.{}", self.table, self.primary_key)
    }

    fn new_query(&self) -> TableQuery<'conn> {
        TableQuery::new(self.conn, self.table.clone())
    }

    fn new_entity(&self, attributes: Attributes) -> Record {
        Record::new(attributes)
    }

    fn from_record(&self, record: Attributes) -> Record {
        // Raw rows go through the same factory create uses.
        self.new_entity(record)
    }

    fn entity_key(&self, entity: &Record) -> Option<Value> {
        match entity.get(&self.primary_key) {
            None | Some(Value::Null) => None,
            Some(value) => Some(value.clone()),
        }
    }

    fn entity_attributes(&self, entity: &Record) -> Attributes {
        entity.attributes().clone()
    }

    fn perform_create(&self, entity: &mut Record, attributes: &Attributes) -> RepoResult<bool> {
        entity.fill(attributes);
        let mut query = self.new_query();
        match query.insert_get_id(entity.attributes())? {
            Some(key) => {
                entity.set(self.primary_key.clone(), key);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn perform_update(&self, entity: &mut Record, attributes: &Attributes) -> RepoResult<bool> {
        entity.fill(attributes);
        let mut query = self.keyed_query(entity);
        Ok(query.update(entity.attributes())? > 0)
    }

    fn perform_delete(&self, entity: &mut Record) -> RepoResult<bool> {
        let mut query = self.keyed_query(entity);
        Ok(query.delete()? > 0)
    }
}
