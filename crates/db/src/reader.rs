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

//! Read access to the stored states of a feature, mostly for inspection and tests. Tables are
//! resolved from the collection id alone; the head relation of a partitioned collection is the
//! view over its partitions.

use sea_query::{Expr, Func, Order, Query};
use tessera_common::Tuple;

use crate::dialect::{Params, ident, idents, render};
use crate::error::WriteError;
use crate::schema::{COLUMNS, ID, UID, VERSION, tuple_from_row};
use crate::session::{ArgType, SqlSession, SqlValue};

pub struct TupleReader<'a, S: SqlSession + ?Sized> {
    session: &'a mut S,
}

impl<'a, S: SqlSession + ?Sized> TupleReader<'a, S> {
    pub fn new(session: &'a mut S) -> Self {
        Self { session }
    }

    /// The live state of a feature.
    pub fn head(&mut self, collection_id: &str, id: &str) -> Result<Option<Tuple>, WriteError> {
        Ok(self.select(collection_id, Some(id))?.into_iter().next())
    }

    /// The tombstone of a deleted (not yet purged) feature.
    pub fn deleted(&mut self, collection_id: &str, id: &str) -> Result<Option<Tuple>, WriteError> {
        let table = format!("{collection_id}$del");
        Ok(self.select(&table, Some(id))?.into_iter().next())
    }

    /// Every superseded state of a feature, oldest first.
    pub fn history(&mut self, collection_id: &str, id: &str) -> Result<Vec<Tuple>, WriteError> {
        self.select(&format!("{collection_id}$hst"), Some(id))
    }

    /// Every live state in a collection, ordered by id.
    pub fn scan_head(&mut self, collection_id: &str) -> Result<Vec<Tuple>, WriteError> {
        self.select(collection_id, None)
    }

    pub fn count(&mut self, table: &str) -> Result<i64, WriteError> {
        let dialect = self.session.dialect();
        let mut select = Query::select();
        select
            .expr(Func::count(Expr::col(ident(ID))))
            .from(ident(table));
        let sql = render(dialect.as_ref(), &select);
        self.session
            .execute(&sql, &[])?
            .rows()
            .first()
            .and_then(|row| row.get(0))
            .and_then(SqlValue::as_i64)
            .ok_or_else(|| WriteError::MalformedRow(format!("no count for {table}")))
    }

    fn select(&mut self, table: &str, id: Option<&str>) -> Result<Vec<Tuple>, WriteError> {
        let dialect = self.session.dialect();
        let mut params = Params::default();
        let mut select = Query::select();
        select.columns(idents(&COLUMNS)).from(ident(table));
        let mut args = vec![];
        if let Some(id) = id {
            select.and_where(Expr::col(ident(ID)).eq(params.bind(ArgType::Text)));
            args.push(SqlValue::from(id));
        }
        select
            .order_by(ident(ID), Order::Asc)
            .order_by(ident(VERSION), Order::Asc)
            .order_by(ident(UID), Order::Asc);
        let sql = render(dialect.as_ref(), &select);
        self.session
            .execute(&sql, &args)?
            .rows()
            .iter()
            .map(tuple_from_row)
            .collect()
    }
}
