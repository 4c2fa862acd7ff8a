// Copyright (C) 2026 Ryan Daum <ryan.daum@gmail.com> This program is free
// software: you can redistribute it and/or modify it under the terms of the GNU
// General Public License as published by the Free Software Foundation, version
// 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! The SQL session interface the write engine is built on.
//!
//! A session is one open connection with at most one transaction in flight. Statements are
//! either executed immediately, or prepared into a [`Plan`] that accumulates parameter batches
//! and is then executed in one round trip.

pub mod sqlite;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::dialect::{Dialect, LockMode};

pub use sqlite::SqliteSession;

#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Int(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            SqlValue::Blob(b) => Some(b),
            _ => None,
        }
    }

    fn matches(&self, arg_type: ArgType) -> bool {
        matches!(
            (self, arg_type),
            (SqlValue::Null, _)
                | (SqlValue::Int(_), ArgType::Int)
                | (SqlValue::Real(_), ArgType::Real)
                | (SqlValue::Text(_), ArgType::Text)
                | (SqlValue::Blob(_), ArgType::Blob)
        )
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Int(value)
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        SqlValue::Int(value as i64)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(value: Vec<u8>) -> Self {
        SqlValue::Blob(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// The declared type of one statement parameter.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ArgType {
    Int,
    Real,
    Text,
    Blob,
}

/// One result row. Values are positional, in select-list order.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlRow {
    columns: Arc<[String]>,
    values: Vec<SqlValue>,
}

impl SqlRow {
    pub fn new(columns: Arc<[String]>, values: Vec<SqlValue>) -> Self {
        Self { columns, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&SqlValue> {
        self.values.get(index)
    }

    pub fn by_name(&self, name: &str) -> Option<&SqlValue> {
        let index = self.columns.iter().position(|c| c == name)?;
        self.values.get(index)
    }

    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }
}

/// The outcome of one executed statement: the rows it returned, or the number of rows it
/// changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cursor {
    rows: Vec<SqlRow>,
    affected: usize,
}

impl Cursor {
    pub fn with_rows(rows: Vec<SqlRow>) -> Self {
        Self { rows, affected: 0 }
    }

    pub fn with_affected(affected: usize) -> Self {
        Self {
            rows: vec![],
            affected,
        }
    }

    pub fn affected(&self) -> usize {
        self.affected
    }

    pub fn rows(&self) -> &[SqlRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<SqlRow> {
        self.rows
    }
}

/// A prepared statement plus the parameter batches queued against it.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    sql: String,
    arg_types: Vec<ArgType>,
    batches: Vec<Vec<SqlValue>>,
}

impl Plan {
    pub fn new(sql: &str, arg_types: &[ArgType]) -> Self {
        Self {
            sql: sql.to_string(),
            arg_types: arg_types.to_vec(),
            batches: vec![],
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn arg_types(&self) -> &[ArgType] {
        &self.arg_types
    }

    /// Queue one set of parameters. They must line up with the declared argument types.
    pub fn add_batch(&mut self, args: Vec<SqlValue>) -> Result<(), SessionError> {
        if args.len() != self.arg_types.len() {
            return Err(SessionError::InvalidArgument(format!(
                "expected {} parameters, got {}",
                self.arg_types.len(),
                args.len()
            )));
        }
        if let Some(position) = args
            .iter()
            .zip(&self.arg_types)
            .position(|(value, arg_type)| !value.matches(*arg_type))
        {
            return Err(SessionError::InvalidArgument(format!(
                "parameter {} is not of type {:?}",
                position + 1,
                self.arg_types[position]
            )));
        }
        self.batches.push(args);
        Ok(())
    }

    pub fn batches(&self) -> &[Vec<SqlValue>] {
        &self.batches
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}

/// Per-item result of a batched execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    /// The item ran and changed this many rows.
    Applied(usize),
    Failed(String),
    /// An earlier item failed and this one was never issued.
    NotExecuted,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
    #[error("Lock conflict: {0}")]
    LockConflict(String),
    #[error("Statement failed: {0}")]
    Execution(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// One connection to the backing store.
///
/// Statements run inside a transaction the session opens on first use and which stays open
/// until `commit` or `rollback`.
pub trait SqlSession {
    fn dialect(&self) -> Arc<dyn Dialect>;

    /// How the session reacts to locks held by other transactions. `wait` bounds blocking under
    /// [`LockMode::Wait`]. Backends that lock rows in the prefetch query itself need nothing here.
    fn set_lock_mode(&mut self, _mode: LockMode, _wait: Duration) -> Result<(), SessionError> {
        Ok(())
    }

    fn execute(&mut self, sql: &str, args: &[SqlValue]) -> Result<Cursor, SessionError>;

    fn prepare(&mut self, sql: &str, arg_types: &[ArgType]) -> Result<Plan, SessionError>;

    /// Run every queued batch of `plan` in order. Execution stops at the first failed item; the
    /// items after it are reported as [`BatchOutcome::NotExecuted`].
    fn execute_batch(&mut self, plan: &Plan) -> Result<Vec<BatchOutcome>, SessionError>;

    fn commit(&mut self) -> Result<(), SessionError>;

    fn rollback(&mut self) -> Result<(), SessionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_validates_batches() {
        let mut plan = Plan::new("DELETE FROM t WHERE id = ?", &[ArgType::Text]);
        assert!(plan.add_batch(vec!["a".into()]).is_ok());
        assert!(plan.add_batch(vec![SqlValue::Null]).is_ok());
        assert!(matches!(
            plan.add_batch(vec![SqlValue::Int(1)]),
            Err(SessionError::InvalidArgument(_))
        ));
        assert!(matches!(
            plan.add_batch(vec!["a".into(), "b".into()]),
            Err(SessionError::InvalidArgument(_))
        ));
        assert_eq!(plan.len(), 2);
    }

    #[test]
    fn test_row_access() {
        let columns: Arc<[String]> = vec!["id".to_string(), "version".to_string()].into();
        let row = SqlRow::new(columns, vec!["f1".into(), SqlValue::Int(7)]);
        assert_eq!(row.by_name("version").and_then(SqlValue::as_i64), Some(7));
        assert_eq!(row.get(0).and_then(SqlValue::as_str), Some("f1"));
        assert!(row.by_name("nope").is_none());
        assert_eq!(SqlValue::from(None::<String>), SqlValue::Null);
    }
}
