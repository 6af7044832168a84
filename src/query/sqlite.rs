//! Raw-table query implementation of the `Query` contract over SQLite.
//!
//! # Responsibility
//! - Assemble and execute single-table SQL from accumulated filter state.
//! - Keep SQL details inside this module; callers see only the contract.
//!
//! # Invariants
//! - Every user-supplied value is bound, never interpolated into SQL text.
//! - Operators come from the closed `Op` set, so filter rendering cannot be
//!   steered into arbitrary SQL.

use crate::model::record::{Attributes, Value};
use crate::query::{Filter, Op, Page, Query};
use crate::repo::RepoResult;
use rusqlite::{params_from_iter, Connection};

/// Query handle scoped to one table on one connection.
pub struct TableQuery<'conn> {
    conn: &'conn Connection,
    table: String,
    filters: Vec<Filter>,
}

impl<'conn> TableQuery<'conn> {
    pub fn new(conn: &'conn Connection, table: impl Into<String>) -> Self {
        Self {
            conn,
            table: table.into(),
            filters: Vec::new(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// Renders accumulated filters as a WHERE clause plus bind values.
    fn where_clause(&self) -> (String, Vec<Value>) {
        if self.filters.is_empty() {
            return (String::new(), Vec::new());
        }

        let mut sql = String::from(" WHERE ");
        let mut bind_values = Vec::with_capacity(self.filters.len());
        for (idx, filter) in self.filters.iter().enumerate() {
            if idx > 0 {
                sql.push_str(" AND ");
            }
            sql.push_str(&filter.column);
            sql.push(' ');
            sql.push_str(filter.op.as_sql());
            sql.push_str(" ?");
            bind_values.push(filter.value.clone());
        }
        (sql, bind_values)
    }

    fn select_rows(&self, limit_sql: &str, extra_binds: Vec<Value>) -> RepoResult<Vec<Attributes>> {
        let (where_sql, mut bind_values) = self.where_clause();
        bind_values.extend(extra_binds);
        let sql = format!("SELECT * FROM {}{}{}", self.table, where_sql, limit_sql);

        let mut stmt = self.conn.prepare(&sql)?;
        let column_names: Vec<String> = stmt
            .column_names()
            .iter()
            .map(|name| name.to_string())
            .collect();

        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            let mut attributes = Attributes::new();
            for (idx, name) in column_names.iter().enumerate() {
                let value: Value = row.get(idx)?;
                attributes.set(name.clone(), value);
            }
            records.push(attributes);
        }
        Ok(records)
    }

    fn count(&self) -> RepoResult<u64> {
        let (where_sql, bind_values) = self.where_clause();
        let sql = format!("SELECT COUNT(*) FROM {}{}", self.table, where_sql);
        let total: i64 =
            self.conn
                .query_row(&sql, params_from_iter(bind_values), |row| row.get(0))?;
        Ok(total.max(0) as u64)
    }
}

impl Query for TableQuery<'_> {
    type Record = Attributes;

    fn filter(&mut self, column: &str, op: Op, value: Value) {
        self.filters.push(Filter {
            column: column.to_string(),
            op,
            value,
        });
    }

    fn insert_get_id(&mut self, attributes: &Attributes) -> RepoResult<Option<Value>> {
        let changed = if attributes.is_empty() {
            self.conn
                .execute(&format!("INSERT INTO {} DEFAULT VALUES", self.table), [])?
        } else {
            let mut columns = String::new();
            let mut placeholders = String::new();
            let mut bind_values = Vec::with_capacity(attributes.len());
            for (idx, (name, value)) in attributes.iter().enumerate() {
                if idx > 0 {
                    columns.push_str(", ");
                    placeholders.push_str(", ");
                }
                columns.push_str(name);
                placeholders.push('?');
                bind_values.push(value.clone());
            }
            let sql = format!(
                "INSERT INTO {} ({}) VALUES ({})",
                self.table, columns, placeholders
            );
            self.conn.execute(&sql, params_from_iter(bind_values))?
        };

        if changed == 0 {
            return Ok(None);
        }
        Ok(Some(Value::Integer(self.conn.last_insert_rowid())))
    }

    fn update(&mut self, attributes: &Attributes) -> RepoResult<u64> {
        if attributes.is_empty() {
            return Ok(0);
        }

        let mut assignments = String::new();
        let mut bind_values = Vec::with_capacity(attributes.len() + self.filters.len());
        for (idx, (name, value)) in attributes.iter().enumerate() {
            if idx > 0 {
                assignments.push_str(", ");
            }
            assignments.push_str(name);
            assignments.push_str(" = ?");
            bind_values.push(value.clone());
        }

        let (where_sql, where_binds) = self.where_clause();
        bind_values.extend(where_binds);
        let sql = format!("UPDATE {} SET {}{}", self.table, assignments, where_sql);
        let changed = self.conn.execute(&sql, params_from_iter(bind_values))?;
        Ok(changed as u64)
    }

    fn delete(&mut self) -> RepoResult<u64> {
        let (where_sql, bind_values) = self.where_clause();
        let sql = format!("DELETE FROM {}{}", self.table, where_sql);
        let changed = self.conn.execute(&sql, params_from_iter(bind_values))?;
        Ok(changed as u64)
    }

    fn get(&mut self) -> RepoResult<Vec<Attributes>> {
        self.select_rows("", Vec::new())
    }

    fn first(&mut self) -> RepoResult<Option<Attributes>> {
        let mut rows = self.select_rows(" LIMIT 1", Vec::new())?;
        Ok(if rows.is_empty() {
            None
        } else {
            Some(rows.swap_remove(0))
        })
    }

    fn paginate(&mut self, page: u32, per_page: u32) -> RepoResult<Page<Attributes>> {
        let page = page.max(1);
        let total = self.count()?;
        let offset = i64::from(page - 1) * i64::from(per_page);
        let items = self.select_rows(
            " LIMIT ? OFFSET ?",
            vec![
                Value::Integer(i64::from(per_page)),
                Value::Integer(offset),
            ],
        )?;

        Ok(Page {
            items,
            total,
            page,
            per_page,
        })
    }
}
