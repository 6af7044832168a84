//! Query collaborator contract for pending persistence operations.
//!
//! # Responsibility
//! - Define the opaque query handle the pipeline builds, filters, hands to
//!   `before_query` hooks, and finally executes.
//! - Define the paginated result shape.
//!
//! # Invariants
//! - A query is built fresh per pipeline invocation and never reused.
//! - Filters only accumulate; execution does not clear them.

use crate::model::record::{Attributes, Value};
use crate::repo::RepoResult;
use serde::Serialize;

pub mod sqlite;

/// Closed set of comparison operators accepted in filter position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
}

impl Op {
    /// SQL rendering of the operator.
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Like => "LIKE",
        }
    }
}

/// One accumulated filter condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub op: Op,
    pub value: Value,
}

/// Pending persistence operation against a backing store.
///
/// Execution methods take `&mut self` so implementations may cache prepared
/// state; the pipeline discards the handle after a single execution.
pub trait Query {
    /// Raw result shape produced by this engine before entity mapping.
    type Record;

    /// Adds a filter condition; conditions combine conjunctively.
    fn filter(&mut self, column: &str, op: Op, value: Value);

    /// Inserts one row and returns the store-assigned key, or `None` when
    /// the store reports no row was inserted.
    fn insert_get_id(&mut self, attributes: &Attributes) -> RepoResult<Option<Value>>;

    /// Applies an update to all matching rows, returning the affected count.
    fn update(&mut self, attributes: &Attributes) -> RepoResult<u64>;

    /// Deletes all matching rows, returning the affected count.
    fn delete(&mut self) -> RepoResult<u64>;

    /// Fetches all matching rows.
    fn get(&mut self) -> RepoResult<Vec<Self::Record>>;

    /// Fetches the first matching row, if any.
    fn first(&mut self) -> RepoResult<Option<Self::Record>>;

    /// Fetches one page of matching rows plus the unpaginated total.
    fn paginate(&mut self, page: u32, per_page: u32) -> RepoResult<Page<Self::Record>>;
}

/// One page of results plus pagination bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Total matching rows across all pages.
    pub total: u64,
    /// 1-based page number.
    pub page: u32,
    pub per_page: u32,
}

impl<T> Page<T> {
    /// Highest page number that holds any rows; 1 when there are none.
    pub fn last_page(&self) -> u32 {
        if self.total == 0 || self.per_page == 0 {
            return 1;
        }
        self.total.div_ceil(u64::from(self.per_page)).min(u64::from(u32::MAX)) as u32
    }

    /// Maps items into another shape, keeping the bookkeeping.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
        }
    }
}
