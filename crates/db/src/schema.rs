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

//! Physical row layout shared by the head, del and history tables, and the conversions between
//! rows and [`Metadata`] / [`Tuple`].

use tessera_common::{Flags, Metadata, StoreNumber, Tuple, Version};

use crate::catalog::StorageClass;
use crate::error::WriteError;
use crate::session::{ArgType, SqlRow, SqlValue};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ColumnKind {
    Int,
    OptionalInt,
    Text,
    OptionalText,
    Blob,
}

impl ColumnKind {
    pub fn arg_type(&self) -> ArgType {
        match self {
            ColumnKind::Int | ColumnKind::OptionalInt => ArgType::Int,
            ColumnKind::Text | ColumnKind::OptionalText => ArgType::Text,
            ColumnKind::Blob => ArgType::Blob,
        }
    }

    pub fn nullable(&self) -> bool {
        matches!(
            self,
            ColumnKind::OptionalInt | ColumnKind::OptionalText | ColumnKind::Blob
        )
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnKind,
}

const fn column(name: &'static str, kind: ColumnKind) -> Column {
    Column { name, kind }
}

pub const ID: &str = "id";
pub const VERSION: &str = "version";
pub const UID: &str = "uid";
pub const NEXT_VERSION: &str = "next_version";
pub const GEO_GRID: &str = "geo_grid";

/// Every column of a feature table, metadata first, in storage order.
pub const COLUMNS: [Column; 23] = [
    column("store_number", ColumnKind::Int),
    column(VERSION, ColumnKind::Int),
    column(UID, ColumnKind::Int),
    column(ID, ColumnKind::Text),
    column("prev_version", ColumnKind::OptionalInt),
    column("puid", ColumnKind::OptionalInt),
    column(NEXT_VERSION, ColumnKind::OptionalInt),
    column("created_at", ColumnKind::Int),
    column("updated_at", ColumnKind::Int),
    column("author_ts", ColumnKind::Int),
    column("author", ColumnKind::OptionalText),
    column("app_id", ColumnKind::Text),
    column("type", ColumnKind::OptionalText),
    column("origin", ColumnKind::OptionalText),
    column("flags", ColumnKind::Int),
    column("hash", ColumnKind::Int),
    column("change_count", ColumnKind::Int),
    column(GEO_GRID, ColumnKind::Int),
    column("feature", ColumnKind::Blob),
    column("tags", ColumnKind::Blob),
    column("geo", ColumnKind::Blob),
    column("geo_ref", ColumnKind::Blob),
    column("attachment", ColumnKind::Blob),
];

pub const METADATA_COLUMNS: usize = 18;
pub const NEXT_VERSION_INDEX: usize = 6;
pub const FEATURE_INDEX: usize = 18;

pub fn metadata_columns() -> &'static [Column] {
    &COLUMNS[..METADATA_COLUMNS]
}

pub fn payload_columns() -> &'static [Column] {
    &COLUMNS[METADATA_COLUMNS..]
}

/// The physical relations backing one collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableLayout {
    pub head: String,
    pub del: String,
    pub history: String,
    /// Empty unless the collection is partitioned.
    pub partitions: Vec<String>,
    pub storage_class: StorageClass,
    pub history_enabled: bool,
}

impl TableLayout {
    pub fn is_partitioned(&self) -> bool {
        !self.partitions.is_empty()
    }

    /// The tables that hold head rows.
    pub fn head_tables(&self) -> Vec<&str> {
        if self.is_partitioned() {
            self.partitions.iter().map(String::as_str).collect()
        } else {
            vec![self.head.as_str()]
        }
    }
}

pub fn metadata_params(meta: &Metadata) -> Vec<SqlValue> {
    vec![
        meta.store_number.raw().into(),
        meta.version.0.into(),
        meta.uid.into(),
        meta.id.as_str().into(),
        meta.prev_version.map(|v| v.0).into(),
        meta.puid.into(),
        meta.next_version.map(|v| v.0).into(),
        meta.created_at.into(),
        meta.updated_at.into(),
        meta.author_ts.into(),
        meta.author.clone().into(),
        meta.app_id.as_str().into(),
        meta.feature_type.clone().into(),
        meta.origin.clone().into(),
        meta.flags.raw().into(),
        meta.hash.into(),
        meta.change_count.into(),
        meta.geo_grid.into(),
    ]
}

pub fn tuple_params(tuple: &Tuple) -> Vec<SqlValue> {
    let mut params = metadata_params(&tuple.meta);
    let payload: [SqlValue; 5] = [
        tuple.feature.clone().into(),
        tuple.tags.clone().into(),
        tuple.geo.clone().into(),
        tuple.geo_ref.clone().into(),
        tuple.attachment.clone().into(),
    ];
    params.extend(payload);
    params
}

struct RowReader<'a> {
    row: &'a SqlRow,
}

impl RowReader<'_> {
    fn value(&self, index: usize) -> Result<&SqlValue, WriteError> {
        self.row
            .get(index)
            .ok_or_else(|| WriteError::MalformedRow(format!("missing column {}", COLUMNS[index].name)))
    }

    fn mismatch(&self, index: usize) -> WriteError {
        WriteError::MalformedRow(format!("unexpected value in column {}", COLUMNS[index].name))
    }

    fn int(&self, index: usize) -> Result<i64, WriteError> {
        self.value(index)?.as_i64().ok_or_else(|| self.mismatch(index))
    }

    fn int32(&self, index: usize) -> Result<i32, WriteError> {
        i32::try_from(self.int(index)?).map_err(|_| self.mismatch(index))
    }

    fn optional_int(&self, index: usize) -> Result<Option<i64>, WriteError> {
        match self.value(index)? {
            SqlValue::Null => Ok(None),
            SqlValue::Int(i) => Ok(Some(*i)),
            _ => Err(self.mismatch(index)),
        }
    }

    fn text(&self, index: usize) -> Result<String, WriteError> {
        self.value(index)?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| self.mismatch(index))
    }

    fn optional_text(&self, index: usize) -> Result<Option<String>, WriteError> {
        match self.value(index)? {
            SqlValue::Null => Ok(None),
            SqlValue::Text(s) => Ok(Some(s.clone())),
            _ => Err(self.mismatch(index)),
        }
    }

    fn blob(&self, index: usize) -> Result<Option<Vec<u8>>, WriteError> {
        match self.value(index)? {
            SqlValue::Null => Ok(None),
            SqlValue::Blob(b) => Ok(Some(b.clone())),
            // SQLite hands back text for blobs written through a text affinity column.
            SqlValue::Text(s) => Ok(Some(s.as_bytes().to_vec())),
            _ => Err(self.mismatch(index)),
        }
    }
}

/// Reads the metadata columns, which must lead the select list in storage order.
pub fn metadata_from_row(row: &SqlRow) -> Result<Metadata, WriteError> {
    let r = RowReader { row };
    let puid = match r.optional_int(5)? {
        Some(puid) => Some(i32::try_from(puid).map_err(|_| r.mismatch(5))?),
        None => None,
    };
    Ok(Metadata {
        store_number: StoreNumber::from_raw(r.int(0)?),
        version: Version(r.int(1)?),
        uid: r.int32(2)?,
        id: r.text(3)?,
        prev_version: r.optional_int(4)?.map(Version),
        puid,
        next_version: r.optional_int(NEXT_VERSION_INDEX)?.map(Version),
        created_at: r.int(7)?,
        updated_at: r.int(8)?,
        author_ts: r.int(9)?,
        author: r.optional_text(10)?,
        app_id: r.text(11)?,
        feature_type: r.optional_text(12)?,
        origin: r.optional_text(13)?,
        flags: Flags::from_raw(r.int32(14)?)?,
        hash: r.int32(15)?,
        change_count: r.int32(16)?,
        geo_grid: r.int32(17)?,
    })
}

/// Reads a full row selected with every column in storage order.
pub fn tuple_from_row(row: &SqlRow) -> Result<Tuple, WriteError> {
    let meta = metadata_from_row(row)?;
    let r = RowReader { row };
    Ok(Tuple {
        meta,
        feature: r.blob(FEATURE_INDEX)?,
        tags: r.blob(FEATURE_INDEX + 1)?,
        geo: r.blob(FEATURE_INDEX + 2)?,
        geo_ref: r.blob(FEATURE_INDEX + 3)?,
        attachment: r.blob(FEATURE_INDEX + 4)?,
    })
}
