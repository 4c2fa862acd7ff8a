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

//! Write executors: the statements each operation handler issues, and two ways of running them.
//!
//! Handlers describe a write as a sequence of [`Phase`]s against a [`WriteTarget`]. The
//! [`InstantExecutor`] runs each statement as it is submitted, the [`BulkExecutor`] queues them
//! per phase and relation and runs the queues in phase order on `finish`.

mod bulk;
mod instant;

use std::collections::HashMap;
use std::hash::BuildHasherDefault;
use std::sync::Arc;

use ahash::AHasher;
use sea_query::{Condition, Expr, Query, SelectStatement, SimpleExpr};
use strum::Display;
use tessera_common::{Metadata, Tuple, Version};

use crate::catalog::WriteTarget;
use crate::dialect::{Dialect, Params, ident, idents, render};
use crate::error::WriteError;
use crate::schema::{
    COLUMNS, ID, NEXT_VERSION, UID, VERSION, metadata_columns, metadata_params, payload_columns,
    tuple_params,
};
use crate::session::{ArgType, SqlValue};

pub use bulk::BulkExecutor;
pub use instant::InstantExecutor;

/// The statements of a write, in the order a bulk execution runs them.
///
/// The order matters: stale del rows go before tombstones are copied in, and the head is copied
/// to del and history before it is overwritten or deleted.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
pub enum Phase {
    RemoveStaleDel,
    CopyHeadToDel,
    CopyHeadToHistory,
    UpdateHead,
    CopyDelToHistory,
    DeleteHead,
    InsertHead,
    PurgeDel,
}

impl Phase {
    /// Whether `affected` rows is a successful outcome for one item of this phase.
    pub fn accepts(&self, affected: usize) -> bool {
        match self {
            Phase::RemoveStaleDel | Phase::PurgeDel => affected <= 1,
            _ => affected == 1,
        }
    }

    /// Whether the statement is keyed by the head relation, or only touches del and history.
    fn reads_head(&self) -> bool {
        !matches!(
            self,
            Phase::RemoveStaleDel | Phase::CopyDelToHistory | Phase::PurgeDel
        )
    }

    /// The relation a statement is grouped under.
    pub fn relation(&self, target: &WriteTarget) -> String {
        if self.reads_head() {
            target.head.clone()
        } else {
            target.del()
        }
    }
}

/// SQL text and parameter types for one phase against one relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub sql: String,
    pub arg_types: Vec<ArgType>,
}

impl Statement {
    pub fn build(
        dialect: &dyn Dialect,
        phase: Phase,
        target: &WriteTarget,
    ) -> Result<Self, WriteError> {
        let mut params = Params::default();
        let sql = match phase {
            Phase::RemoveStaleDel | Phase::PurgeDel => {
                let mut delete = Query::delete();
                delete
                    .from_table(ident(&target.del()))
                    .and_where(Expr::col(ident(ID)).eq(params.bind(ArgType::Text)));
                render(dialect, &delete)
            }
            Phase::CopyHeadToDel => {
                let mut select = Query::select();
                for column in metadata_columns() {
                    select.expr(params.bind(column.kind.arg_type()));
                }
                select
                    .columns(idents(payload_columns()))
                    .from(ident(&target.head))
                    .and_where(Expr::col(ident(ID)).eq(params.bind(ArgType::Text)));
                copy_into(dialect, &target.del(), select)?
            }
            Phase::CopyHeadToHistory | Phase::CopyDelToHistory => {
                let source = if phase == Phase::CopyHeadToHistory {
                    target.head.clone()
                } else {
                    target.del()
                };
                let mut select = Query::select();
                for column in COLUMNS.iter() {
                    if column.name == NEXT_VERSION {
                        select.expr(params.bind(ArgType::Int));
                    } else {
                        select.column(ident(column.name));
                    }
                }
                select
                    .from(ident(&source))
                    .and_where(Expr::col(ident(ID)).eq(params.bind(ArgType::Text)));
                copy_into(dialect, &target.history(), select)?
            }
            Phase::UpdateHead => {
                let mut update = Query::update();
                update.table(ident(&target.head));
                for column in COLUMNS.iter() {
                    update.value(ident(column.name), params.bind(column.kind.arg_type()));
                }
                update.cond_where(by_state(&mut params));
                render(dialect, &update)
            }
            Phase::DeleteHead => {
                let mut delete = Query::delete();
                delete
                    .from_table(ident(&target.head))
                    .cond_where(by_state(&mut params));
                render(dialect, &delete)
            }
            Phase::InsertHead => {
                let values: Vec<SimpleExpr> = COLUMNS
                    .iter()
                    .map(|c| params.bind(c.kind.arg_type()))
                    .collect();
                let mut insert = Query::insert();
                insert
                    .into_table(ident(&target.head))
                    .columns(idents(COLUMNS.iter()))
                    .values(values)
                    .map_err(|e| WriteError::Statement(e.to_string()))?;
                render(dialect, &insert)
            }
        };
        Ok(Self {
            sql,
            arg_types: params.into_types(),
        })
    }
}

/// `INSERT INTO table (every column) SELECT ...`.
fn copy_into(
    dialect: &dyn Dialect,
    table: &str,
    select: SelectStatement,
) -> Result<String, WriteError> {
    let mut insert = Query::insert();
    insert
        .into_table(ident(table))
        .columns(idents(COLUMNS.iter()))
        .select_from(select)
        .map_err(|e| WriteError::Statement(e.to_string()))?;
    Ok(render(dialect, &insert))
}

/// Matches the head row still in the expected `(id, version, uid)` state.
fn by_state(params: &mut Params) -> Condition {
    Condition::all()
        .add(Expr::col(ident(ID)).eq(params.bind(ArgType::Text)))
        .add(Expr::col(ident(VERSION)).eq(params.bind(ArgType::Int)))
        .add(Expr::col(ident(UID)).eq(params.bind(ArgType::Int)))
}

/// Statement text memoized per phase and relation for the lifetime of an executor.
#[derive(Default)]
pub(crate) struct StatementCache {
    statements: HashMap<(Phase, String), Arc<Statement>, BuildHasherDefault<AHasher>>,
}

impl StatementCache {
    pub(crate) fn get(
        &mut self,
        dialect: &dyn Dialect,
        phase: Phase,
        target: &WriteTarget,
    ) -> Result<Arc<Statement>, WriteError> {
        let key = (phase, phase.relation(target));
        if let Some(statement) = self.statements.get(&key) {
            return Ok(statement.clone());
        }
        let statement = Arc::new(Statement::build(dialect, phase, target)?);
        self.statements.insert(key, statement.clone());
        Ok(statement)
    }
}

/// One statement submitted by a handler.
pub struct Submission<'a> {
    pub phase: Phase,
    pub target: &'a WriteTarget,
    pub id: &'a str,
    pub args: Vec<SqlValue>,
}

/// Runs the statements produced by the operation handlers.
pub trait WriteExecutor {
    fn submit(&mut self, submission: Submission<'_>) -> Result<(), WriteError>;

    /// Runs anything still queued. Must be called once all handlers have run.
    fn finish(&mut self) -> Result<(), WriteError>;

    fn remove_stale_del(&mut self, target: &WriteTarget, id: &str) -> Result<(), WriteError> {
        self.submit(Submission {
            phase: Phase::RemoveStaleDel,
            target,
            id,
            args: vec![id.into()],
        })
    }

    /// Copies the current head row into del, with `tombstone` as its metadata.
    fn copy_head_to_del(
        &mut self,
        target: &WriteTarget,
        tombstone: &Metadata,
    ) -> Result<(), WriteError> {
        let mut args = metadata_params(tombstone);
        args.push(tombstone.id.as_str().into());
        self.submit(Submission {
            phase: Phase::CopyHeadToDel,
            target,
            id: &tombstone.id,
            args,
        })
    }

    fn copy_head_to_history(
        &mut self,
        target: &WriteTarget,
        id: &str,
        next_version: Version,
    ) -> Result<(), WriteError> {
        self.submit(Submission {
            phase: Phase::CopyHeadToHistory,
            target,
            id,
            args: vec![next_version.0.into(), id.into()],
        })
    }

    /// Overwrites the head row, provided it is still in the `previous` state.
    fn update_head(
        &mut self,
        target: &WriteTarget,
        tuple: &Tuple,
        previous: &Metadata,
    ) -> Result<(), WriteError> {
        let mut args = tuple_params(tuple);
        args.extend(state_args(previous));
        self.submit(Submission {
            phase: Phase::UpdateHead,
            target,
            id: tuple.id(),
            args,
        })
    }

    fn copy_del_to_history(
        &mut self,
        target: &WriteTarget,
        id: &str,
        next_version: Version,
    ) -> Result<(), WriteError> {
        self.submit(Submission {
            phase: Phase::CopyDelToHistory,
            target,
            id,
            args: vec![next_version.0.into(), id.into()],
        })
    }

    /// Removes the head row, provided it is still in the `previous` state.
    fn delete_head(&mut self, target: &WriteTarget, previous: &Metadata) -> Result<(), WriteError> {
        self.submit(Submission {
            phase: Phase::DeleteHead,
            target,
            id: &previous.id,
            args: state_args(previous).to_vec(),
        })
    }

    fn insert_head(&mut self, target: &WriteTarget, tuple: &Tuple) -> Result<(), WriteError> {
        self.submit(Submission {
            phase: Phase::InsertHead,
            target,
            id: tuple.id(),
            args: tuple_params(tuple),
        })
    }

    fn purge_del(&mut self, target: &WriteTarget, id: &str) -> Result<(), WriteError> {
        self.submit(Submission {
            phase: Phase::PurgeDel,
            target,
            id,
            args: vec![id.into()],
        })
    }
}

fn state_args(previous: &Metadata) -> [SqlValue; 3] {
    [
        previous.id.as_str().into(),
        previous.version.0.into(),
        previous.uid.into(),
    ]
}
