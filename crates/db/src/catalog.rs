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

//! Collections: identifiers, specs, physical naming and partition routing, plus the
//! request-scoped view of the collection catalog.

use std::collections::HashMap;
use std::hash::BuildHasherDefault;
use std::sync::Arc;

use ahash::AHasher;
use md5::{Digest, Md5};
use sea_query::{Expr, Query};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};
use tessera_common::{Codec, Feature, Metadata, StoreNumber};
use tracing::debug;

use crate::dialect::{Params, ident, idents, render};
use crate::error::WriteError;
use crate::schema::{COLUMNS, FEATURE_INDEX, ID, TableLayout, metadata_from_row};
use crate::session::{ArgType, SqlSession, SqlValue};

/// The collection whose features describe every other collection.
pub const CATALOG_COLLECTION: &str = "tessera~collections";
pub const CATALOG_COLLECTION_NUMBER: i64 = 0;
/// Holds the named counters (transaction numbers, collection numbers).
pub const SEQUENCE_TABLE: &str = "tessera~sequences";

pub const MAX_COLLECTION_ID_LEN: usize = 32;
pub const MAX_PARTITIONS: u16 = 256;

const COLLECTION_FEATURE_TYPE: &str = "Collection";

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StorageClass {
    #[default]
    Regular,
    Unlogged,
    Temporary,
}

/// The persisted description of a collection, stored as the properties of its catalog feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSpec {
    /// Assigned when the collection is created; ignored on input.
    #[serde(default)]
    pub number: i64,
    /// Zero means "use the configured default".
    #[serde(default)]
    pub partitions: u16,
    #[serde(default)]
    pub storage_class: StorageClass,
    #[serde(default)]
    pub disable_history: bool,
    #[serde(default)]
    pub auto_purge: bool,
}

impl Default for CollectionSpec {
    fn default() -> Self {
        Self {
            number: 0,
            partitions: 1,
            storage_class: StorageClass::Regular,
            disable_history: false,
            auto_purge: false,
        }
    }
}

impl CollectionSpec {
    pub fn with_partitions(mut self, partitions: u16) -> Self {
        self.partitions = partitions;
        self
    }

    pub fn with_storage_class(mut self, storage_class: StorageClass) -> Self {
        self.storage_class = storage_class;
        self
    }

    pub fn without_history(mut self) -> Self {
        self.disable_history = true;
        self
    }

    pub fn with_auto_purge(mut self) -> Self {
        self.auto_purge = true;
        self
    }

    pub fn from_properties(properties: &Value) -> Result<Self, WriteError> {
        let properties = match properties {
            Value::Null => Value::Object(Default::default()),
            other => other.clone(),
        };
        serde_json::from_value(properties)
            .map_err(|e| WriteError::InvalidArgument(format!("invalid collection spec: {e}")))
    }

    pub fn to_properties(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Fills in defaults and checks bounds.
    pub fn normalized(
        mut self,
        default_partitions: u16,
        max_partitions: u16,
    ) -> Result<Self, WriteError> {
        if self.partitions == 0 {
            self.partitions = default_partitions.max(1);
        }
        let max = max_partitions.min(MAX_PARTITIONS);
        if self.partitions > max {
            return Err(WriteError::InvalidArgument(format!(
                "{} partitions requested, at most {max} allowed",
                self.partitions
            )));
        }
        Ok(self)
    }
}

/// Checks a caller-supplied collection id. `$` and `~` are reserved for engine relations.
pub fn validate_collection_id(id: &str) -> Result<(), WriteError> {
    let invalid =
        |why: &str| Err(WriteError::InvalidArgument(format!("collection id {id:?} {why}")));
    let Some(first) = id.chars().next() else {
        return invalid("is empty");
    };
    if id.len() > MAX_COLLECTION_ID_LEN {
        return invalid("is too long");
    }
    if !first.is_ascii_lowercase() {
        return invalid("must start with a lowercase letter");
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
    {
        return invalid("may only contain a-z, 0-9, '_' and '-'");
    }
    Ok(())
}

/// The partition a feature id lives in: the first byte of its MD5 digest folded into
/// `[0, partition_count)`.
pub fn partition_number(feature_id: &str, partition_count: u16) -> u8 {
    if partition_count <= 1 {
        return 0;
    }
    let digest = Md5::digest(feature_id.as_bytes());
    (digest[0] as u16 % partition_count) as u8
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collection {
    pub id: String,
    pub map_number: u16,
    pub spec: CollectionSpec,
}

impl Collection {
    pub fn new(id: &str, map_number: u16, spec: CollectionSpec) -> Self {
        Self {
            id: id.to_string(),
            map_number,
            spec,
        }
    }

    pub fn catalog(map_number: u16) -> Self {
        Self::new(
            CATALOG_COLLECTION,
            map_number,
            CollectionSpec {
                number: CATALOG_COLLECTION_NUMBER,
                ..CollectionSpec::default()
            },
        )
    }

    pub fn is_catalog(&self) -> bool {
        self.id == CATALOG_COLLECTION
    }

    pub fn number(&self) -> i64 {
        self.spec.number
    }

    pub fn partition_count(&self) -> u16 {
        self.spec.partitions.max(1)
    }

    pub fn is_partitioned(&self) -> bool {
        self.partition_count() > 1
    }

    pub fn history_enabled(&self) -> bool {
        !self.spec.disable_history
    }

    pub fn auto_purge(&self) -> bool {
        self.spec.auto_purge
    }

    pub fn head_table(&self) -> String {
        self.id.clone()
    }

    pub fn del_table(&self) -> String {
        format!("{}$del", self.id)
    }

    pub fn history_table(&self) -> String {
        format!("{}$hst", self.id)
    }

    pub fn partition_table(&self, partition: u8) -> String {
        format!("{}$p{partition:03}", self.id)
    }

    pub fn partition_of(&self, feature_id: &str) -> u8 {
        partition_number(feature_id, self.partition_count())
    }

    pub fn store_number(&self, partition: u8) -> Result<StoreNumber, WriteError> {
        Ok(StoreNumber::new(self.map_number, self.number(), partition)?)
    }

    pub fn layout(&self) -> TableLayout {
        let partitions = if self.is_partitioned() {
            (0..self.partition_count())
                .map(|p| self.partition_table(p as u8))
                .collect()
        } else {
            vec![]
        };
        TableLayout {
            head: self.head_table(),
            del: self.del_table(),
            history: self.history_table(),
            partitions,
            storage_class: self.spec.storage_class,
            history_enabled: self.history_enabled(),
        }
    }

    /// Where head-row statements for `partition` go. Partition tables are targeted directly
    /// unless the backend routes writes through the partitioned head itself and the batch spans
    /// more than one partition.
    pub fn write_target(
        self: &Arc<Self>,
        partition: u8,
        partitions_in_batch: usize,
        backend_routes_head: bool,
    ) -> WriteTarget {
        let head = if !self.is_partitioned() || (backend_routes_head && partitions_in_batch > 1) {
            self.head_table()
        } else {
            self.partition_table(partition)
        };
        WriteTarget {
            collection: self.clone(),
            partition,
            head,
        }
    }

    pub fn to_feature(&self) -> Feature {
        Feature::new(&self.id)
            .with_type(COLLECTION_FEATURE_TYPE)
            .with_properties(self.spec.to_properties())
    }
}

/// The resolved relations one feature's statements run against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteTarget {
    pub collection: Arc<Collection>,
    pub partition: u8,
    /// Physical relation holding the head row.
    pub head: String,
}

impl WriteTarget {
    pub fn collection_id(&self) -> &str {
        &self.collection.id
    }

    pub fn del(&self) -> String {
        self.collection.del_table()
    }

    pub fn history(&self) -> String {
        self.collection.history_table()
    }

    pub fn store_number(&self) -> Result<StoreNumber, WriteError> {
        self.collection.store_number(self.partition)
    }
}

/// A live collection together with the metadata of its catalog row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub collection: Arc<Collection>,
    pub meta: Metadata,
}

/// The collections one request touches, read once from the catalog at the start of the request.
#[derive(Debug, Default)]
pub struct CollectionCatalog {
    entries: HashMap<String, CatalogEntry, BuildHasherDefault<AHasher>>,
}

impl CollectionCatalog {
    pub fn load<'a, S: SqlSession + ?Sized>(
        session: &mut S,
        codec: &dyn Codec,
        map_number: u16,
        ids: impl IntoIterator<Item = &'a str>,
        max_params: usize,
    ) -> Result<Self, WriteError> {
        let ids: Vec<&str> = ids.into_iter().filter(|id| *id != CATALOG_COLLECTION).collect();
        let mut catalog = Self::default();
        if ids.is_empty() {
            return Ok(catalog);
        }

        let dialect = session.dialect();
        for chunk in ids.chunks(max_params.max(1)) {
            let mut params = Params::default();
            let placeholders: Vec<_> = chunk.iter().map(|_| params.bind(ArgType::Text)).collect();
            let mut select = Query::select();
            select
                .columns(idents(&COLUMNS[..=FEATURE_INDEX]))
                .from(ident(CATALOG_COLLECTION))
                .and_where(Expr::col(ident(ID)).is_in(placeholders));
            let sql = render(dialect.as_ref(), &select);
            let args: Vec<SqlValue> = chunk.iter().map(|id| SqlValue::from(*id)).collect();
            for row in session.execute(&sql, &args)?.into_rows() {
                let meta = metadata_from_row(&row)?;
                let body = match row.get(FEATURE_INDEX) {
                    Some(SqlValue::Blob(bytes)) => codec.decode_feature(bytes, meta.flags, None)?,
                    _ => {
                        return Err(WriteError::MalformedRow(format!(
                            "catalog row {} has no feature",
                            meta.id
                        )));
                    }
                };
                let spec = CollectionSpec::from_properties(&body["properties"])?;
                let collection = Collection::new(&meta.id, map_number, spec);
                debug!(
                    collection = %collection.id,
                    number = collection.number(),
                    "Loaded collection"
                );
                catalog.insert(CatalogEntry {
                    collection: Arc::new(collection),
                    meta,
                });
            }
        }
        Ok(catalog)
    }

    pub fn get(&self, id: &str) -> Option<&CatalogEntry> {
        self.entries.get(id)
    }

    pub fn collection(&self, id: &str) -> Result<Arc<Collection>, WriteError> {
        self.entries
            .get(id)
            .map(|e| e.collection.clone())
            .ok_or_else(|| WriteError::CollectionNotFound(id.to_string()))
    }

    pub fn insert(&mut self, entry: CatalogEntry) {
        self.entries.insert(entry.collection.id.clone(), entry);
    }

    pub fn remove(&mut self, id: &str) -> Option<CatalogEntry> {
        self.entries.remove(id)
    }
}
