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


//! SQL flavours. Statements are built with `sea-query`; a [`Dialect`] supplies the builders that
//! render them, plus the DDL shape of a collection's relations.

use std::fmt::Debug;

use itertools::Itertools;
use sea_query::{
    Alias, Asterisk, ColumnDef, Iden, Index, LockBehavior, LockType, Query, QueryBuilder,
    QueryStatementBuilder, QuotedBuilder, SchemaBuilder, SchemaStatementBuilder, SelectStatement,
    SimpleExpr, SqliteQueryBuilder, Table, Value,
};
use serde::{Deserialize, Serialize};

use crate::catalog::StorageClass;
use crate::schema::{COLUMNS, Column, GEO_GRID, ID, TableLayout, UID, VERSION};
use crate::session::ArgType;

/// How the metadata prefetch locks the head rows it reads.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockMode {
    /// Lock, failing immediately if another transaction holds the row.
    #[default]
    NoWait,
    /// Lock, blocking until the row is free.
    Wait,
    None,
}

impl LockMode {
    /// Adds the row lock to a prefetch query. Backends without row locks render nothing.
    pub fn apply(self, select: &mut SelectStatement) {
        match self {
            LockMode::NoWait => {
                select.lock_with_behavior(LockType::Update, LockBehavior::Nowait);
            }
            LockMode::Wait => {
                select.lock(LockType::Update);
            }
            LockMode::None => {}
        }
    }
}

/// The SQL flavour of a backend: the builders statements are rendered with, and DDL.
pub trait Dialect: Debug + Send + Sync {
    fn name(&self) -> &'static str;

    fn query_builder(&self) -> &dyn QueryBuilder;

    fn schema_builder(&self) -> &dyn SchemaBuilder;

    fn quote_ident(&self, ident: &str) -> String {
        let mut quoted = String::new();
        Alias::new(ident).prepare(&mut quoted, self.query_builder().quote());
        quoted
    }

    /// Upper bound on bound parameters in one statement.
    fn max_params(&self) -> usize;

    /// Whether writes against the head relation of a partitioned collection are routed to the
    /// right partition by the backend itself.
    fn routes_partitioned_head(&self) -> bool;

    /// Statements creating every relation of `layout` that does not yet exist.
    fn create_collection_tables(&self, layout: &TableLayout) -> Vec<String>;

    fn drop_collection_tables(&self, layout: &TableLayout) -> Vec<String>;
}

/// A table or column named at runtime.
pub fn ident(name: &str) -> Alias {
    Alias::new(name)
}

pub fn idents<'a>(columns: impl IntoIterator<Item = &'a Column>) -> Vec<Alias> {
    columns.into_iter().map(|c| ident(c.name)).collect()
}

/// The parameters of a statement under construction, recorded in the order their placeholders
/// are added. Statements must be assembled in rendering order for the two to line up.
#[derive(Debug, Default)]
pub struct Params {
    types: Vec<ArgType>,
}

impl Params {
    /// A placeholder for one parameter of type `arg_type`.
    pub fn bind(&mut self, arg_type: ArgType) -> SimpleExpr {
        self.types.push(arg_type);
        let value: Value = match arg_type {
            ArgType::Int => 0i64.into(),
            ArgType::Real => 0f64.into(),
            ArgType::Text => "".into(),
            ArgType::Blob => Vec::<u8>::new().into(),
        };
        SimpleExpr::Value(value)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn into_types(self) -> Vec<ArgType> {
        self.types
    }
}

/// Renders `statement` with positional placeholders.
pub fn render<Q: QueryStatementBuilder>(dialect: &dyn Dialect, statement: &Q) -> String {
    statement.build_any(dialect.query_builder()).0
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteDialect;

impl SqliteDialect {
    fn create_table(&self, name: &str, storage: StorageClass, primary_key: &[&str]) -> String {
        let mut table = Table::create();
        table.table(ident(name)).if_not_exists();
        for column in COLUMNS.iter() {
            let mut def = ColumnDef::new(ident(column.name));
            match column.kind.arg_type() {
                ArgType::Int => def.integer(),
                ArgType::Real => def.double(),
                ArgType::Text => def.text(),
                ArgType::Blob => def.blob(),
            };
            if !column.kind.nullable() {
                def.not_null();
            }
            table.col(&mut def);
        }
        let mut key = Index::create();
        for column in primary_key {
            key.col(ident(column));
        }
        table.primary_key(&mut key);
        with_storage(table.build_any(self.schema_builder()), "TABLE", storage)
    }

    fn create_grid_index(&self, table: &str) -> String {
        Index::create()
            .if_not_exists()
            .name(format!("{table}$grid"))
            .table(ident(table))
            .col(ident(GEO_GRID))
            .build_any(self.schema_builder())
    }

    fn create_head_view(&self, layout: &TableLayout) -> String {
        let union = layout
            .partitions
            .iter()
            .map(|p| {
                let mut select = Query::select();
                select.column(Asterisk).from(ident(p));
                render(self, &select)
            })
            .join(" UNION ALL ");
        with_storage(
            format!(
                "CREATE VIEW IF NOT EXISTS {} AS {union}",
                self.quote_ident(&layout.head)
            ),
            "VIEW",
            layout.storage_class,
        )
    }
}

/// Marks a `CREATE` statement for `kind` as temporary when the storage class asks for it. SQLite
/// has no unlogged relations; those are created as regular ones.
fn with_storage(statement: String, kind: &str, storage: StorageClass) -> String {
    match storage {
        StorageClass::Temporary => {
            statement.replacen(&format!("CREATE {kind}"), &format!("CREATE TEMP {kind}"), 1)
        }
        StorageClass::Regular | StorageClass::Unlogged => statement,
    }
}

impl Dialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn query_builder(&self) -> &dyn QueryBuilder {
        &SqliteQueryBuilder
    }

    fn schema_builder(&self) -> &dyn SchemaBuilder {
        &SqliteQueryBuilder
    }

    fn max_params(&self) -> usize {
        32766
    }

    fn routes_partitioned_head(&self) -> bool {
        false
    }

    fn create_collection_tables(&self, layout: &TableLayout) -> Vec<String> {
        let mut statements = vec![];
        for table in layout.head_tables() {
            statements.push(self.create_table(table, layout.storage_class, &[ID]));
            statements.push(self.create_grid_index(table));
        }
        if layout.is_partitioned() {
            statements.push(self.create_head_view(layout));
        }
        statements.push(self.create_table(&layout.del, layout.storage_class, &[ID]));
        if layout.history_enabled {
            statements.push(self.create_table(
                &layout.history,
                layout.storage_class,
                &[ID, VERSION, UID],
            ));
        }
        statements
    }

    fn drop_collection_tables(&self, layout: &TableLayout) -> Vec<String> {
        let mut statements = vec![];
        if layout.is_partitioned() {
            // Views are outside what the schema builder drops.
            statements.push(format!(
                "DROP VIEW IF EXISTS {}",
                self.quote_ident(&layout.head)
            ));
        }
        for table in layout
            .head_tables()
            .into_iter()
            .chain([layout.del.as_str(), layout.history.as_str()])
        {
            statements.push(
                Table::drop()
                    .table(ident(table))
                    .if_exists()
                    .build_any(self.schema_builder()),
            );
        }
        statements
    }
}
