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

use std::sync::Arc;

use tracing::trace;

use crate::catalog::WriteTarget;
use crate::dialect::Dialect;
use crate::error::WriteError;
use crate::executor::{Phase, StatementCache, Submission, WriteExecutor};
use crate::session::{SessionError, SqlSession};

/// Runs every statement as soon as it is submitted, so failures are attributed to the exact
/// feature that caused them.
pub struct InstantExecutor<'a, S: SqlSession + ?Sized> {
    session: &'a mut S,
    dialect: Arc<dyn Dialect>,
    statements: StatementCache,
    executed: usize,
}

impl<'a, S: SqlSession + ?Sized> InstantExecutor<'a, S> {
    pub fn new(session: &'a mut S) -> Self {
        let dialect = session.dialect();
        Self {
            session,
            dialect,
            statements: StatementCache::default(),
            executed: 0,
        }
    }

    pub fn executed(&self) -> usize {
        self.executed
    }
}

fn conflict(target: &WriteTarget, id: &str) -> WriteError {
    WriteError::Conflict {
        collection: target.collection_id().to_string(),
        id: id.to_string(),
    }
}

impl<S: SqlSession + ?Sized> WriteExecutor for InstantExecutor<'_, S> {
    fn submit(&mut self, submission: Submission<'_>) -> Result<(), WriteError> {
        let Submission {
            phase,
            target,
            id,
            args,
        } = submission;
        let statement = self.statements.get(self.dialect.as_ref(), phase, target)?;
        trace!(%phase, table = %phase.relation(target), id, "Executing");
        let cursor = self
            .session
            .execute(&statement.sql, &args)
            .map_err(|e| match (phase, e) {
                (Phase::InsertHead, SessionError::ConstraintViolation(_)) => {
                    WriteError::FeatureExists {
                        collection: target.collection_id().to_string(),
                        id: id.to_string(),
                    }
                }
                (_, SessionError::ConstraintViolation(_)) => conflict(target, id),
                (_, e) => WriteError::Session(e),
            })?;
        self.executed += 1;
        if !phase.accepts(cursor.affected()) {
            return Err(conflict(target, id));
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), WriteError> {
        Ok(())
    }
}
