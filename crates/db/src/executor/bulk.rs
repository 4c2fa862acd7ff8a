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

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::dialect::Dialect;
use crate::error::WriteError;
use crate::executor::{Phase, StatementCache, Submission, WriteExecutor};
use crate::session::{BatchOutcome, Plan, SqlSession};

/// Statements queued against one phase and relation.
struct PendingBatch {
    plan: Plan,
    /// Feature id of each queued item, for error reporting.
    ids: Vec<String>,
}

/// Queues submitted statements per phase and relation, then runs every queue as one batch in
/// phase order. The first failed item aborts the whole execution.
pub struct BulkExecutor<'a, S: SqlSession + ?Sized> {
    session: &'a mut S,
    dialect: Arc<dyn Dialect>,
    statements: StatementCache,
    pending: BTreeMap<(Phase, String), PendingBatch>,
}

impl<'a, S: SqlSession + ?Sized> BulkExecutor<'a, S> {
    pub fn new(session: &'a mut S) -> Self {
        let dialect = session.dialect();
        Self {
            session,
            dialect,
            statements: StatementCache::default(),
            pending: BTreeMap::new(),
        }
    }

    pub fn queued(&self) -> usize {
        self.pending.values().map(|b| b.plan.len()).sum()
    }
}

impl<S: SqlSession + ?Sized> WriteExecutor for BulkExecutor<'_, S> {
    fn submit(&mut self, submission: Submission<'_>) -> Result<(), WriteError> {
        let Submission {
            phase,
            target,
            id,
            args,
        } = submission;
        let key = (phase, phase.relation(target));
        if !self.pending.contains_key(&key) {
            let statement = self.statements.get(self.dialect.as_ref(), phase, target)?;
            let plan = self.session.prepare(&statement.sql, &statement.arg_types)?;
            self.pending.insert(
                key.clone(),
                PendingBatch {
                    plan,
                    ids: vec![],
                },
            );
        }
        let Some(batch) = self.pending.get_mut(&key) else {
            return Err(WriteError::MalformedRow(format!("no batch for {phase}")));
        };
        batch.plan.add_batch(args)?;
        batch.ids.push(id.to_string());
        Ok(())
    }

    fn finish(&mut self) -> Result<(), WriteError> {
        let pending = std::mem::take(&mut self.pending);
        for ((phase, table), batch) in pending {
            debug!(%phase, %table, items = batch.plan.len(), "Executing batch");
            let fatal = |index: usize, reason: String| {
                warn!(%phase, %table, index, %reason, "Batch execution failed");
                WriteError::BatchExecution {
                    phase: phase.to_string(),
                    table: table.clone(),
                    index,
                    reason,
                }
            };
            let outcomes = self
                .session
                .execute_batch(&batch.plan)
                .map_err(|e| fatal(0, e.to_string()))?;
            if outcomes.len() != batch.ids.len() {
                return Err(fatal(
                    outcomes.len(),
                    format!("{} outcomes for {} items", outcomes.len(), batch.ids.len()),
                ));
            }
            for (index, (outcome, id)) in outcomes.into_iter().zip(&batch.ids).enumerate() {
                match outcome {
                    BatchOutcome::Applied(affected) if phase.accepts(affected) => {}
                    BatchOutcome::Applied(affected) => {
                        return Err(fatal(
                            index,
                            format!("{id}: {affected} rows affected, expected one"),
                        ));
                    }
                    BatchOutcome::Failed(reason) => {
                        return Err(fatal(index, format!("{id}: {reason}")));
                    }
                    BatchOutcome::NotExecuted => {
                        return Err(fatal(index, format!("{id}: not executed")));
                    }
                }
            }
        }
        Ok(())
    }
}
