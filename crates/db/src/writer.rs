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

//! The write orchestrator: validates a request, resolves collections and existing state, and
//! drives the operation handlers through an executor.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::hash::BuildHasherDefault;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use ahash::AHasher;
use tessera_common::{Codec, JsonCodec, Tuple, Version};
use tracing::{debug, error, info, warn};

use crate::catalog::{
    CATALOG_COLLECTION, Collection, CollectionCatalog, CollectionSpec, validate_collection_id,
};
use crate::config::EngineConfig;
use crate::error::WriteError;
use crate::executor::{BulkExecutor, InstantExecutor, WriteExecutor};
use crate::metadata_provider::{ExistingMetadataProvider, MetadataRequest};
use crate::ops::collection::CollectionOps;
use crate::ops::{PlannedOp, apply, classify};
use crate::reader::TupleReader;
use crate::request::{
    ExecutorChoice, OpKind, Payload, ResultRow, Response, WriteOp, WriteRequest,
};
use crate::row_updater::WriteContext;
use crate::sequences::{ALL_SEQUENCES, TXN_SEQUENCE, create_sequences, next_value};
use crate::session::SqlSession;

/// A write session over one SQL session. Writes accumulate in the session's transaction until
/// `commit` or `rollback`; each write request carries its own transaction number.
pub struct WriteSession<S: SqlSession> {
    session: S,
    config: EngineConfig,
    codec: Arc<dyn Codec>,
    context: Option<WriteContext>,
}

impl<S: SqlSession> WriteSession<S> {
    pub fn new(session: S, config: EngineConfig) -> Self {
        Self {
            session,
            config,
            codec: Arc::new(JsonCodec),
            context: None,
        }
    }

    pub fn with_codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    pub fn into_session(self) -> S {
        self.session
    }

    pub fn reader(&mut self) -> TupleReader<'_, S> {
        TupleReader::new(&mut self.session)
    }

    /// The transaction number of the latest write in the open transaction, if there was one.
    pub fn current_txn(&self) -> Option<Version> {
        self.context.as_ref().map(|ctx| ctx.txn)
    }

    /// Creates the sequence table and the catalog collection if they are missing, and commits.
    pub fn initialize(&mut self) -> Result<(), WriteError> {
        let result = self.create_storage();
        self.commit_or_rollback(result)
    }

    fn create_storage(&mut self) -> Result<(), WriteError> {
        self.apply_lock_mode()?;
        let dialect = self.session.dialect();
        create_sequences(&mut self.session, &ALL_SEQUENCES)?;
        let catalog = Collection::catalog(self.config.map.number);
        for statement in dialect.create_collection_tables(&catalog.layout()) {
            self.session.execute(&statement, &[])?;
        }
        info!(
            dialect = dialect.name(),
            map = %self.config.map.id,
            "Initialized storage"
        );
        Ok(())
    }

    fn apply_lock_mode(&mut self) -> Result<(), WriteError> {
        let wait = Duration::from_millis(self.config.lock_wait_ms);
        self.session.set_lock_mode(self.config.lock_mode, wait)?;
        Ok(())
    }

    pub fn commit(&mut self) -> Result<(), WriteError> {
        self.session.commit()?;
        if let Some(ctx) = self.context.take() {
            debug!(last_txn = ctx.txn.0, "Committed");
        }
        Ok(())
    }

    pub fn rollback(&mut self) -> Result<(), WriteError> {
        if let Some(ctx) = self.context.take() {
            debug!(txn = ctx.txn.0, "Rolling back");
        }
        self.session.rollback()?;
        Ok(())
    }

    fn commit_or_rollback<T>(&mut self, result: Result<T, WriteError>) -> Result<T, WriteError> {
        match result {
            Ok(value) => {
                self.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_error) = self.rollback() {
                    error!(error = %rollback_error, "Rollback failed");
                }
                Err(e)
            }
        }
    }

    /// Applies every operation of `request`, or fails as a whole. A failed write may have
    /// issued statements; the caller is expected to roll back.
    pub fn write(&mut self, request: WriteRequest) -> Response {
        let result = self.try_write(request);
        if let Err(e) = &result {
            warn!(code = %e.code(), error = %e, "Write failed");
        }
        Response::from(result)
    }

    pub fn create_collection(&mut self, id: &str, spec: CollectionSpec) -> Response {
        let feature = Collection::new(id, self.config.map.number, spec).to_feature();
        self.write(WriteRequest::new(vec![WriteOp::insert(CATALOG_COLLECTION, feature)]))
    }

    /// Applies `change` to the stored spec of collection `id` and writes it back. Fields fixed at
    /// creation keep their stored values unless `change` touches them, which is rejected.
    pub fn update_collection(
        &mut self,
        id: &str,
        change: impl FnOnce(&mut CollectionSpec),
    ) -> Response {
        let mut spec = match self.collection(id) {
            Ok(Some(spec)) => spec,
            Ok(None) => return Response::from(Err(WriteError::CollectionNotFound(id.to_string()))),
            Err(e) => return Response::from(Err(e)),
        };
        change(&mut spec);
        let feature = Collection::new(id, self.config.map.number, spec).to_feature();
        self.write(WriteRequest::new(vec![WriteOp::update(CATALOG_COLLECTION, feature)]))
    }

    /// Drops a collection in a transaction of its own: commits on success, rolls back on
    /// failure.
    pub fn drop_collection(&mut self, id: &str) -> Response {
        let result = self
            .try_write(WriteRequest::new(vec![WriteOp::delete(CATALOG_COLLECTION, id)]));
        Response::from(self.commit_or_rollback(result))
    }

    /// The current spec of a collection, if it exists.
    pub fn collection(&mut self, id: &str) -> Result<Option<CollectionSpec>, WriteError> {
        let catalog = CollectionCatalog::load(
            &mut self.session,
            self.codec.as_ref(),
            self.config.map.number,
            [id],
            self.config.max_query_params,
        )?;
        Ok(catalog.get(id).map(|entry| entry.collection.spec.clone()))
    }

    fn try_write(&mut self, request: WriteRequest) -> Result<Vec<ResultRow>, WriteError> {
        let WriteRequest {
            ops,
            no_results,
            executor,
        } = request;
        if ops.is_empty() {
            return Ok(vec![]);
        }
        validate_ops(&ops)?;
        self.apply_lock_mode()?;

        let mut ctx = self.new_context()?;
        debug!(ops = ops.len(), txn = ctx.txn.0, "Processing write request");
        let result = self.execute_ops(&mut ctx, &ops, executor);
        self.context = Some(ctx);

        let rows = result?;
        if !no_results {
            return Ok(rows);
        }
        Ok(rows
            .into_iter()
            .map(|row| ResultRow {
                tuple: row.tuple.map(Tuple::without_payload),
                ..row
            })
            .collect())
    }

    /// A fresh context for one request. Every request draws its own transaction number, so a
    /// feature written twice in one database transaction still gets increasing versions.
    fn new_context(&mut self) -> Result<WriteContext, WriteError> {
        let txn = next_value(&mut self.session, TXN_SEQUENCE)?;
        Ok(WriteContext::new(
            Version(txn),
            now_millis(),
            self.config.author.clone(),
            &self.config.app_id,
        ))
    }

    fn execute_ops(
        &mut self,
        ctx: &mut WriteContext,
        ops: &[WriteOp],
        choice: ExecutorChoice,
    ) -> Result<Vec<ResultRow>, WriteError> {
        let config = &self.config;
        let codec = self.codec.as_ref();
        let map_number = config.map.number;
        let max_params = config.max_query_params;
        let mut results: Vec<Option<ResultRow>> = vec![None; ops.len()];

        let (mut catalog_ops, feature_ops): (Vec<_>, Vec<_>) = ops
            .iter()
            .enumerate()
            .partition(|(_, op)| op.collection == CATALOG_COLLECTION);

        let referenced: BTreeSet<&str> = feature_ops
            .iter()
            .map(|(_, op)| op.collection.as_str())
            .chain(catalog_ops.iter().map(|(_, op)| op.id()))
            .collect();
        let mut catalog = CollectionCatalog::load(
            &mut self.session,
            codec,
            map_number,
            referenced,
            max_params,
        )?;

        // Collection lifecycle first, so feature operations see the new catalog.
        catalog_ops.sort_by(|(_, a), (_, b)| a.id().cmp(b.id()));
        let mut dropped = BTreeSet::new();
        {
            let mut lifecycle = CollectionOps {
                session: &mut self.session,
                codec,
                catalog: &mut catalog,
                map_number,
                default_partitions: config.default_partitions,
                max_partitions: config.max_partitions,
            };
            for (index, op) in catalog_ops {
                if matches!(op.kind, OpKind::Delete | OpKind::Purge) {
                    dropped.insert(op.id());
                }
                results[index] = Some(lifecycle.apply(ctx, op)?);
            }
        }
        if feature_ops.is_empty() {
            return Ok(results.into_iter().flatten().collect());
        }

        let mut requests: BTreeMap<String, MetadataRequest> = BTreeMap::new();
        for (_, op) in &feature_ops {
            if dropped.contains(op.collection.as_str()) {
                return Err(WriteError::InvalidArgument(format!(
                    "collection {} is dropped by the same request",
                    op.collection
                )));
            }
            let collection = catalog.collection(&op.collection)?;
            let request = requests
                .entry(op.collection.clone())
                .or_insert_with(|| MetadataRequest::new(collection.clone()));
            if op.kind != OpKind::Insert {
                request.head.insert(op.id().to_string());
            }
            if op.kind == OpKind::Purge || (op.kind == OpKind::Delete && collection.auto_purge()) {
                request.deleted.insert(op.id().to_string());
            }
        }
        let existing = ExistingMetadataProvider::fetch(
            &mut self.session,
            &requests,
            config.lock_mode,
            max_params,
        )?;

        let routes_head = self.session.dialect().routes_partitioned_head();
        let planned = plan(&feature_ops, &catalog, &existing, codec, routes_head)?;
        let use_bulk = match choice {
            ExecutorChoice::Auto => planned.len() >= config.bulk_threshold,
            ExecutorChoice::Instant => false,
            ExecutorChoice::Bulk => true,
        };
        debug!(
            features = planned.len(),
            collections = requests.len(),
            found = existing.head_count(),
            bulk = use_bulk,
            "Executing feature operations"
        );

        let mut executor: Box<dyn WriteExecutor + '_> = if use_bulk {
            Box::new(BulkExecutor::new(&mut self.session))
        } else {
            Box::new(InstantExecutor::new(&mut self.session))
        };
        for op in planned {
            let index = op.index;
            results[index] = Some(apply(ctx, executor.as_mut(), op)?);
        }
        executor.finish()?;

        Ok(results.into_iter().flatten().collect())
    }
}

/// Classifies and routes feature operations, in processing order.
fn plan(
    feature_ops: &[(usize, &WriteOp)],
    catalog: &CollectionCatalog,
    existing: &ExistingMetadataProvider,
    codec: &dyn Codec,
    backend_routes_head: bool,
) -> Result<Vec<PlannedOp>, WriteError> {
    let mut classified = Vec::with_capacity(feature_ops.len());
    let mut partitions: BTreeMap<&str, BTreeSet<u8>> = BTreeMap::new();
    for (index, op) in feature_ops {
        let collection = catalog.collection(&op.collection)?;
        let resolved = classify(op, &collection, existing, codec)?;
        let partition = collection.partition_of(op.id());
        partitions
            .entry(op.collection.as_str())
            .or_default()
            .insert(partition);
        classified.push((*index, op, collection, partition, resolved));
    }

    let mut planned: Vec<PlannedOp> = classified
        .into_iter()
        .map(|(index, op, collection, partition, resolved)| {
            let spread = partitions.get(op.collection.as_str()).map_or(1, BTreeSet::len);
            PlannedOp {
                index,
                target: collection.write_target(partition, spread, backend_routes_head),
                id: op.id().to_string(),
                resolved,
            }
        })
        .collect();
    planned.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    Ok(planned)
}

/// Checks collection ids, and that a request touches each feature at most once.
fn validate_ops(ops: &[WriteOp]) -> Result<(), WriteError> {
    let mut seen: HashSet<(&str, &str), BuildHasherDefault<AHasher>> = HashSet::default();
    for op in ops {
        if op.collection != CATALOG_COLLECTION {
            validate_collection_id(&op.collection)?;
        }
        if op.id().is_empty() {
            return Err(WriteError::InvalidArgument(format!(
                "operation on {} without a feature id",
                op.collection
            )));
        }
        if op.kind.writes_payload() && matches!(op.payload, Payload::Id(_)) {
            return Err(WriteError::InvalidArgument(format!(
                "{} of {} in {} carries no feature state",
                op.kind,
                op.id(),
                op.collection
            )));
        }
        if !seen.insert((op.collection.as_str(), op.id())) {
            return Err(WriteError::DuplicateOperation {
                collection: op.collection.clone(),
                id: op.id().to_string(),
            });
        }
    }
    Ok(())
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}
