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


//! Named counters kept in the sequence table.

use sea_query::{ColumnDef, Expr, Iden, OnConflict, Query, SchemaStatementBuilder, Table};

use crate::catalog::SEQUENCE_TABLE;
use crate::dialect::{Params, ident, render};
use crate::error::WriteError;
use crate::session::{ArgType, SqlSession, SqlValue};

/// Allocates transaction numbers, which become row versions.
pub const TXN_SEQUENCE: &str = "txn";
/// Allocates collection numbers. Zero belongs to the catalog.
pub const COLLECTION_SEQUENCE: &str = "collection_number";

pub const ALL_SEQUENCES: [&str; 2] = [TXN_SEQUENCE, COLLECTION_SEQUENCE];

#[derive(Iden)]
enum Sequence {
    Name,
    Value,
}

/// Creates the sequence table if needed and seeds each of `names` at zero, leaving existing
/// counters alone.
pub fn create_sequences<S: SqlSession + ?Sized>(
    session: &mut S,
    names: &[&str],
) -> Result<(), WriteError> {
    let dialect = session.dialect();
    let create = Table::create()
        .table(ident(SEQUENCE_TABLE))
        .if_not_exists()
        .col(ColumnDef::new(Sequence::Name).text().not_null().primary_key())
        .col(ColumnDef::new(Sequence::Value).integer().not_null())
        .build_any(dialect.schema_builder());
    session.execute(&create, &[])?;

    let mut params = Params::default();
    let mut seed = Query::insert();
    seed.into_table(ident(SEQUENCE_TABLE))
        .columns([Sequence::Name, Sequence::Value])
        .values([params.bind(ArgType::Text), params.bind(ArgType::Int)])
        .map_err(|e| WriteError::Statement(e.to_string()))?
        .on_conflict(OnConflict::column(Sequence::Name).do_nothing().to_owned());
    let seed = render(dialect.as_ref(), &seed);
    for name in names {
        session.execute(&seed, &[SqlValue::from(*name), SqlValue::Int(0)])?;
    }
    Ok(())
}

/// Advances the named sequence and returns its new value. The increment is part of the session's
/// transaction, so it is undone by a rollback.
pub fn next_value<S: SqlSession + ?Sized>(session: &mut S, name: &str) -> Result<i64, WriteError> {
    let dialect = session.dialect();

    let mut params = Params::default();
    let mut update = Query::update();
    update
        .table(ident(SEQUENCE_TABLE))
        .value(
            Sequence::Value,
            Expr::col(Sequence::Value).add(params.bind(ArgType::Int)),
        )
        .and_where(Expr::col(Sequence::Name).eq(params.bind(ArgType::Text)));
    let update = render(dialect.as_ref(), &update);
    let cursor = session.execute(&update, &[SqlValue::Int(1), SqlValue::from(name)])?;
    if cursor.affected() != 1 {
        return Err(WriteError::Uninitialized(format!("sequence {name}")));
    }

    let mut params = Params::default();
    let mut select = Query::select();
    select
        .column(Sequence::Value)
        .from(ident(SEQUENCE_TABLE))
        .and_where(Expr::col(Sequence::Name).eq(params.bind(ArgType::Text)));
    let select = render(dialect.as_ref(), &select);
    session
        .execute(&select, &[SqlValue::from(name)])?
        .rows()
        .first()
        .and_then(|row| row.get(0))
        .and_then(SqlValue::as_i64)
        .ok_or_else(|| WriteError::Uninitialized(format!("sequence {name}")))
}
