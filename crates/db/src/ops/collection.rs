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

//! Collection lifecycle: operations addressed to the catalog collection create, reconfigure and
//! drop the physical tables of the collection they name.

use std::sync::Arc;

use tessera_common::{Codec, Feature, Flags, Guid};
use tracing::info;

use crate::catalog::{
    CATALOG_COLLECTION, CatalogEntry, Collection, CollectionCatalog, CollectionSpec, WriteTarget,
    validate_collection_id,
};
use crate::error::WriteError;
use crate::executor::InstantExecutor;
use crate::ops::{
    check_expected, delete_feature, encode_payload, insert_feature, purge_feature,
    update_feature,
};
use crate::request::{ExecutedOp, OpKind, Payload, ResultRow, WriteOp};
use crate::row_updater::WriteContext;
use crate::sequences::{COLLECTION_SEQUENCE, next_value};
use crate::session::SqlSession;

/// Everything the lifecycle handlers need besides the transaction context.
pub(crate) struct CollectionOps<'a, S: SqlSession + ?Sized> {
    pub session: &'a mut S,
    pub codec: &'a dyn Codec,
    pub catalog: &'a mut CollectionCatalog,
    pub map_number: u16,
    pub default_partitions: u16,
    pub max_partitions: u16,
}

impl<S: SqlSession + ?Sized> CollectionOps<'_, S> {
    /// Dispatches an operation on the catalog collection.
    pub fn apply(
        &mut self,
        ctx: &mut WriteContext,
        op: &WriteOp,
    ) -> Result<ResultRow, WriteError> {
        let id = op.id();
        validate_collection_id(id)?;
        let expected = op.expected.as_ref();
        match op.kind {
            OpKind::Insert if expected.is_some() => Err(WriteError::InvalidArgument(format!(
                "creation of collection {id} cannot be conditional"
            ))),
            OpKind::Insert => {
                let feature = self.spec_feature(op)?;
                self.create_collection(ctx, &feature)
            }
            OpKind::Update => {
                let feature = self.spec_feature(op)?;
                self.update_collection(ctx, &feature, expected)
            }
            OpKind::Upsert => {
                let feature = self.spec_feature(op)?;
                if self.catalog.get(id).is_some() {
                    self.update_collection(ctx, &feature, expected)
                } else {
                    check_expected(expected, CATALOG_COLLECTION, id, None)?;
                    self.create_collection(ctx, &feature)
                }
            }
            OpKind::Delete => self.drop_collection(ctx, id, expected, false),
            OpKind::Purge => self.drop_collection(ctx, id, expected, true),
        }
    }

    /// The collection feature carried by a catalog operation, decoding pre-encoded rows.
    fn spec_feature(&self, op: &WriteOp) -> Result<Feature, WriteError> {
        match &op.payload {
            Payload::Feature(feature) => Ok(feature.clone()),
            Payload::Row(raw) => {
                let flags = Flags::from_raw(raw.flags)?;
                let body = match &raw.feature {
                    Some(bytes) => self.codec.decode_feature(bytes, flags, None)?,
                    None => serde_json::Value::Null,
                };
                Ok(Feature::new(&raw.id).with_properties(body["properties"].clone()))
            }
            Payload::Id(id) => Err(WriteError::InvalidArgument(format!(
                "collection {id} needs a spec"
            ))),
        }
    }

    fn catalog_target(&self) -> WriteTarget {
        Arc::new(Collection::catalog(self.map_number)).write_target(0, 1, false)
    }

    fn run_ddl(&mut self, statements: Vec<String>) -> Result<(), WriteError> {
        for statement in statements {
            self.session.execute(&statement, &[])?;
        }
        Ok(())
    }

    pub fn create_collection(
        &mut self,
        ctx: &mut WriteContext,
        feature: &Feature,
    ) -> Result<ResultRow, WriteError> {
        let id = feature.id.as_str();
        validate_collection_id(id)?;
        if self.catalog.get(id).is_some() {
            return Err(WriteError::CollectionExists(id.to_string()));
        }
        let spec = CollectionSpec::from_properties(&feature.properties)?
            .normalized(self.default_partitions, self.max_partitions)?;
        let number = next_value(&mut *self.session, COLLECTION_SEQUENCE)?;
        let collection = Collection::new(id, self.map_number, CollectionSpec { number, ..spec });
        // Fails early if the number no longer fits a store number.
        collection.store_number(0)?;

        let target = self.catalog_target();
        let row = encode_payload(self.codec, &Payload::Feature(collection.to_feature()))?;
        let tuple = {
            let mut executor = InstantExecutor::new(&mut *self.session);
            insert_feature(ctx, &mut executor, &target, row).map_err(|e| match e {
                WriteError::FeatureExists { .. } => WriteError::CollectionExists(id.to_string()),
                e => e,
            })?
        };
        let ddl = self
            .session
            .dialect()
            .create_collection_tables(&collection.layout());
        self.run_ddl(ddl)?;

        info!(
            collection = id,
            number,
            partitions = collection.partition_count(),
            storage = %collection.spec.storage_class,
            "Created collection"
        );
        self.catalog.insert(CatalogEntry {
            collection: Arc::new(collection),
            meta: tuple.meta.clone(),
        });
        Ok(ResultRow {
            op: ExecutedOp::Created,
            collection: CATALOG_COLLECTION.to_string(),
            id: id.to_string(),
            tuple: Some(tuple),
        })
    }

    /// Changes the mutable parts of a collection's spec. The partition count and storage class
    /// are fixed at creation.
    pub fn update_collection(
        &mut self,
        ctx: &mut WriteContext,
        feature: &Feature,
        expected: Option<&Guid>,
    ) -> Result<ResultRow, WriteError> {
        let id = feature.id.as_str();
        let entry = self
            .catalog
            .get(id)
            .cloned()
            .ok_or_else(|| WriteError::CollectionNotFound(id.to_string()))?;
        check_expected(expected, CATALOG_COLLECTION, id, Some(&entry.meta))?;

        let requested = CollectionSpec::from_properties(&feature.properties)?;
        let current = &entry.collection.spec;
        if requested.partitions != 0 && requested.partitions != current.partitions {
            return Err(WriteError::InvalidArgument(format!(
                "partition count of collection {id} cannot change"
            )));
        }
        if feature.properties.get("storage_class").is_some()
            && requested.storage_class != current.storage_class
        {
            return Err(WriteError::InvalidArgument(format!(
                "storage class of collection {id} cannot change"
            )));
        }
        let collection = Collection::new(
            id,
            self.map_number,
            CollectionSpec {
                disable_history: requested.disable_history,
                auto_purge: requested.auto_purge,
                ..current.clone()
            },
        );

        let target = self.catalog_target();
        let row = encode_payload(self.codec, &Payload::Feature(collection.to_feature()))?;
        let tuple = {
            let mut executor = InstantExecutor::new(&mut *self.session);
            update_feature(ctx, &mut executor, &target, row, &entry.meta)?
        };
        // Creates whatever the new spec needs that is missing, e.g. history when it is enabled.
        let ddl = self
            .session
            .dialect()
            .create_collection_tables(&collection.layout());
        self.run_ddl(ddl)?;

        info!(
            collection = id,
            history = collection.history_enabled(),
            auto_purge = collection.auto_purge(),
            "Updated collection"
        );
        self.catalog.insert(CatalogEntry {
            collection: Arc::new(collection),
            meta: tuple.meta.clone(),
        });
        Ok(ResultRow {
            op: ExecutedOp::Updated,
            collection: CATALOG_COLLECTION.to_string(),
            id: id.to_string(),
            tuple: Some(tuple),
        })
    }

    /// Drops the physical tables of a collection and retires its catalog feature. Dropping a
    /// collection that does not exist is a no-op.
    pub fn drop_collection(
        &mut self,
        ctx: &mut WriteContext,
        id: &str,
        expected: Option<&Guid>,
        purge: bool,
    ) -> Result<ResultRow, WriteError> {
        let entry = self.catalog.get(id).cloned();
        check_expected(expected, CATALOG_COLLECTION, id, entry.as_ref().map(|e| &e.meta))?;
        let Some(entry) = entry else {
            return Ok(ResultRow {
                op: ExecutedOp::Retained,
                collection: CATALOG_COLLECTION.to_string(),
                id: id.to_string(),
                tuple: None,
            });
        };

        let ddl = self
            .session
            .dialect()
            .drop_collection_tables(&entry.collection.layout());
        self.run_ddl(ddl)?;

        let target = self.catalog_target();
        let tuple = {
            let mut executor = InstantExecutor::new(&mut *self.session);
            if purge {
                purge_feature(ctx, &mut executor, &target, id, Some(&entry.meta), None)?
            } else {
                delete_feature(ctx, &mut executor, &target, &entry.meta)?
            }
        };

        info!(
            collection = id,
            number = entry.collection.number(),
            purge,
            "Dropped collection"
        );
        self.catalog.remove(id);
        Ok(ResultRow {
            op: if purge {
                ExecutedOp::Purged
            } else {
                ExecutedOp::Deleted
            },
            collection: CATALOG_COLLECTION.to_string(),
            id: id.to_string(),
            tuple: Some(tuple),
        })
    }
}
