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

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use rusqlite::types::{ToSqlOutput, Value, ValueRef};
use rusqlite::{Connection, ToSql, params_from_iter};
use tracing::{debug, warn};

use crate::dialect::{Dialect, LockMode, SqliteDialect};
use crate::session::{
    ArgType, BatchOutcome, Cursor, Plan, SessionError, SqlRow, SqlSession, SqlValue,
};

const STATEMENT_CACHE_CAPACITY: usize = 128;
/// What rusqlite configures on every new connection.
const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// A [`SqlSession`] over a single SQLite connection.
pub struct SqliteSession {
    conn: Connection,
    in_transaction: bool,
    busy_timeout: Duration,
    dialect: Arc<SqliteDialect>,
}

impl SqliteSession {
    pub fn open(path: &Path) -> Result<Self, SessionError> {
        let conn = Connection::open(path)?;
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self, SessionError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: Connection) -> Self {
        conn.set_prepared_statement_cache_capacity(STATEMENT_CACHE_CAPACITY);
        Self {
            conn,
            in_transaction: false,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            dialect: Arc::new(SqliteDialect),
        }
    }

    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    fn begin_if_needed(&mut self) -> Result<(), SessionError> {
        if !self.in_transaction {
            self.conn.execute_batch("BEGIN IMMEDIATE")?;
            self.in_transaction = true;
        }
        Ok(())
    }
}

impl SqlSession for SqliteSession {
    fn dialect(&self) -> Arc<dyn Dialect> {
        self.dialect.clone()
    }

    fn set_lock_mode(&mut self, mode: LockMode, wait: Duration) -> Result<(), SessionError> {
        // The write transaction locks the whole database; the busy timeout decides whether a
        // second writer fails straight away or waits for it.
        let timeout = match mode {
            LockMode::NoWait => Duration::ZERO,
            LockMode::Wait | LockMode::None => wait,
        };
        if timeout != self.busy_timeout {
            self.conn.busy_timeout(timeout)?;
            self.busy_timeout = timeout;
        }
        Ok(())
    }

    fn execute(&mut self, sql: &str, args: &[SqlValue]) -> Result<Cursor, SessionError> {
        self.begin_if_needed()?;
        let mut stmt = self.conn.prepare_cached(sql)?;
        let column_count = stmt.column_count();
        if column_count == 0 {
            let affected = stmt.execute(params_from_iter(args.iter()))?;
            return Ok(Cursor::with_affected(affected));
        }

        let columns: Arc<[String]> = stmt
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        let mut rows = stmt.query(params_from_iter(args.iter()))?;
        let mut result = vec![];
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(column_count);
            for index in 0..column_count {
                values.push(from_value_ref(row.get_ref(index)?));
            }
            result.push(SqlRow::new(columns.clone(), values));
        }
        Ok(Cursor::with_rows(result))
    }

    fn prepare(&mut self, sql: &str, arg_types: &[ArgType]) -> Result<Plan, SessionError> {
        let stmt = self.conn.prepare_cached(sql)?;
        if stmt.parameter_count() != arg_types.len() {
            return Err(SessionError::InvalidArgument(format!(
                "statement takes {} parameters, {} declared",
                stmt.parameter_count(),
                arg_types.len()
            )));
        }
        Ok(Plan::new(sql, arg_types))
    }

    fn execute_batch(&mut self, plan: &Plan) -> Result<Vec<BatchOutcome>, SessionError> {
        self.begin_if_needed()?;
        let mut stmt = self.conn.prepare_cached(plan.sql())?;
        let mut outcomes = Vec::with_capacity(plan.len());
        let mut failed = false;
        for args in plan.batches() {
            if failed {
                outcomes.push(BatchOutcome::NotExecuted);
                continue;
            }
            match stmt.execute(params_from_iter(args.iter())) {
                Ok(affected) => outcomes.push(BatchOutcome::Applied(affected)),
                Err(e) => {
                    failed = true;
                    outcomes.push(BatchOutcome::Failed(e.to_string()));
                }
            }
        }
        Ok(outcomes)
    }

    fn commit(&mut self) -> Result<(), SessionError> {
        if self.in_transaction {
            self.conn.execute_batch("COMMIT")?;
            self.in_transaction = false;
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), SessionError> {
        if self.in_transaction {
            self.in_transaction = false;
            self.conn.execute_batch("ROLLBACK")?;
        }
        Ok(())
    }
}

impl Drop for SqliteSession {
    fn drop(&mut self) {
        if self.in_transaction {
            debug!("Rolling back open transaction on session close");
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                warn!(error = ?e, "Failed to roll back open transaction");
            }
        }
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlValue::Null => ToSqlOutput::Owned(Value::Null),
            SqlValue::Int(i) => ToSqlOutput::Owned(Value::Integer(*i)),
            SqlValue::Real(r) => ToSqlOutput::Owned(Value::Real(*r)),
            SqlValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            SqlValue::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b.as_slice())),
        })
    }
}

fn from_value_ref(value: ValueRef<'_>) -> SqlValue {
    match value {
        ValueRef::Null => SqlValue::Null,
        ValueRef::Integer(i) => SqlValue::Int(i),
        ValueRef::Real(r) => SqlValue::Real(r),
        ValueRef::Text(t) => SqlValue::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => SqlValue::Blob(b.to_vec()),
    }
}

impl From<rusqlite::Error> for SessionError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(err, _) => match err.code {
                rusqlite::ErrorCode::ConstraintViolation => {
                    SessionError::ConstraintViolation(e.to_string())
                }
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked => {
                    SessionError::LockConflict(e.to_string())
                }
                _ => SessionError::Execution(e.to_string()),
            },
            _ => SessionError::Execution(e.to_string()),
        }
    }
}
