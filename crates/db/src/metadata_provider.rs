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

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::hash::BuildHasherDefault;
use std::sync::Arc;

use ahash::AHasher;
use sea_query::{Expr, Query};
use tessera_common::Metadata;
use tracing::debug;

use crate::catalog::Collection;
use crate::dialect::{LockMode, Params, ident, idents, render};
use crate::error::WriteError;
use crate::schema::{ID, metadata_columns, metadata_from_row};
use crate::session::{ArgType, SqlSession, SqlValue};

type MetadataMap = HashMap<(String, String), Metadata, BuildHasherDefault<AHasher>>;

/// The features of one collection whose current state a request needs.
#[derive(Debug)]
pub struct MetadataRequest {
    pub collection: Arc<Collection>,
    pub head: BTreeSet<String>,
    pub deleted: BTreeSet<String>,
}

impl MetadataRequest {
    pub fn new(collection: Arc<Collection>) -> Self {
        Self {
            collection,
            head: BTreeSet::new(),
            deleted: BTreeSet::new(),
        }
    }
}

/// Request-scoped cache of the current head (and del) metadata of every feature a request
/// touches, read up front with a handful of queries. Head rows are read under the configured
/// row lock.
#[derive(Debug, Default)]
pub struct ExistingMetadataProvider {
    head: MetadataMap,
    deleted: MetadataMap,
}

impl ExistingMetadataProvider {
    pub fn fetch<S: SqlSession + ?Sized>(
        session: &mut S,
        requests: &BTreeMap<String, MetadataRequest>,
        lock_mode: LockMode,
        max_params: usize,
    ) -> Result<Self, WriteError> {
        let mut provider = Self::default();
        for request in requests.values() {
            let collection = &request.collection;
            let found = select_metadata(
                session,
                &collection.head_table(),
                &request.head,
                lock_mode,
                max_params,
            )?;
            debug!(
                collection = %collection.id,
                requested = request.head.len(),
                found = found.len(),
                "Fetched head metadata"
            );
            for meta in found {
                if !meta.is_head() {
                    return Err(WriteError::StaleHead {
                        collection: collection.id.clone(),
                        id: meta.id.clone(),
                        tuple_number: meta.tuple_number(),
                    });
                }
                provider
                    .head
                    .insert((collection.id.clone(), meta.id.clone()), meta);
            }

            let deleted = select_metadata(
                session,
                &collection.del_table(),
                &request.deleted,
                LockMode::None,
                max_params,
            )?;
            for meta in deleted {
                provider
                    .deleted
                    .insert((collection.id.clone(), meta.id.clone()), meta);
            }
        }
        Ok(provider)
    }

    pub fn head(&self, collection_id: &str, id: &str) -> Option<&Metadata> {
        self.head.get(&(collection_id.to_string(), id.to_string()))
    }

    pub fn deleted(&self, collection_id: &str, id: &str) -> Option<&Metadata> {
        self.deleted.get(&(collection_id.to_string(), id.to_string()))
    }

    pub fn head_count(&self) -> usize {
        self.head.len()
    }
}

fn select_metadata<S: SqlSession + ?Sized>(
    session: &mut S,
    table: &str,
    ids: &BTreeSet<String>,
    lock_mode: LockMode,
    max_params: usize,
) -> Result<Vec<Metadata>, WriteError> {
    if ids.is_empty() {
        return Ok(vec![]);
    }
    let dialect = session.dialect();
    let chunk_size = max_params.min(dialect.max_params()).max(1);
    let ids: Vec<&String> = ids.iter().collect();
    let mut result = Vec::with_capacity(ids.len());
    for chunk in ids.chunks(chunk_size) {
        let mut params = Params::default();
        let placeholders: Vec<_> = chunk.iter().map(|_| params.bind(ArgType::Text)).collect();
        let mut select = Query::select();
        select
            .columns(idents(metadata_columns()))
            .from(ident(table))
            .and_where(Expr::col(ident(ID)).is_in(placeholders));
        lock_mode.apply(&mut select);
        let sql = render(dialect.as_ref(), &select);
        let args: Vec<SqlValue> = chunk.iter().map(|id| SqlValue::from(id.as_str())).collect();
        for row in session.execute(&sql, &args)?.into_rows() {
            result.push(metadata_from_row(&row)?);
        }
    }
    Ok(result)
}
