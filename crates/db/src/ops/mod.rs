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

//! Operation handlers. Each handler turns one classified operation into metadata transitions and
//! the executor statements that persist them.

pub mod collection;
mod delete;
mod insert;
mod update;

use serde_json::json;
use tessera_common::geo::{geo_grid, reference_point};
use tessera_common::{Codec, Flags, Guid, Metadata};

use crate::catalog::{Collection, WriteTarget};
use crate::error::WriteError;
use crate::executor::WriteExecutor;
use crate::metadata_provider::ExistingMetadataProvider;
use crate::request::{ExecutedOp, OpKind, Payload, ResultRow, WriteOp};
use crate::row_updater::{NewRow, WriteContext};

pub(crate) use delete::{delete_feature, purge_feature};
pub(crate) use insert::insert_feature;
pub(crate) use update::update_feature;

/// What an operation turned out to be once the current state of its feature is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Resolved {
    Insert(NewRow),
    Update { row: NewRow, previous: Metadata },
    Delete { previous: Metadata },
    Purge {
        head: Option<Metadata>,
        deleted: Option<Metadata>,
    },
    Retain,
}

/// A classified feature operation, routed to its physical relations.
#[derive(Debug, Clone)]
pub(crate) struct PlannedOp {
    /// Position in the request.
    pub index: usize,
    pub target: WriteTarget,
    pub id: String,
    pub resolved: Resolved,
}

impl PlannedOp {
    /// Processing order: collection, then partition, then feature id.
    pub fn sort_key(&self) -> (&str, u8, &str) {
        (self.target.collection_id(), self.target.partition, &self.id)
    }
}

/// Resolves `op` against the prefetched state of its feature.
pub(crate) fn classify(
    op: &WriteOp,
    collection: &Collection,
    existing: &ExistingMetadataProvider,
    codec: &dyn Codec,
) -> Result<Resolved, WriteError> {
    let id = op.id();
    let head = existing.head(&collection.id, id);
    let not_found = || WriteError::FeatureNotFound {
        collection: collection.id.clone(),
        id: id.to_string(),
    };
    match op.kind {
        OpKind::Insert => {
            if op.expected.is_some() {
                return Err(WriteError::InvalidArgument(format!(
                    "insert of {id} cannot be conditional"
                )));
            }
            Ok(Resolved::Insert(encode_payload(codec, &op.payload)?))
        }
        OpKind::Update => {
            let previous = head.ok_or_else(not_found)?;
            check_expected(op.expected.as_ref(), &collection.id, id, Some(previous))?;
            Ok(Resolved::Update {
                row: encode_payload(codec, &op.payload)?,
                previous: previous.clone(),
            })
        }
        OpKind::Upsert => {
            check_expected(op.expected.as_ref(), &collection.id, id, head)?;
            let row = encode_payload(codec, &op.payload)?;
            Ok(match head {
                Some(previous) => Resolved::Update {
                    row,
                    previous: previous.clone(),
                },
                None => Resolved::Insert(row),
            })
        }
        OpKind::Delete if !collection.auto_purge() => {
            check_expected(op.expected.as_ref(), &collection.id, id, head)?;
            Ok(match head {
                Some(previous) => Resolved::Delete {
                    previous: previous.clone(),
                },
                None => Resolved::Retain,
            })
        }
        OpKind::Delete | OpKind::Purge => {
            let deleted = existing.deleted(&collection.id, id);
            check_expected(op.expected.as_ref(), &collection.id, id, head.or(deleted))?;
            Ok(match (head, deleted) {
                (None, None) => Resolved::Retain,
                (head, deleted) => Resolved::Purge {
                    head: head.cloned(),
                    deleted: deleted.cloned(),
                },
            })
        }
    }
}

/// Enforces the optimistic check of an atomic operation: the current state must be exactly the
/// one the caller last saw.
pub(crate) fn check_expected(
    expected: Option<&Guid>,
    collection_id: &str,
    id: &str,
    current: Option<&Metadata>,
) -> Result<(), WriteError> {
    let Some(expected) = expected else {
        return Ok(());
    };
    let actual = current.map(|meta| meta.guid(collection_id));
    match &actual {
        Some(actual) if expected.same_state(actual) => Ok(()),
        _ => Err(WriteError::AtomicConflict {
            collection: collection_id.to_string(),
            id: id.to_string(),
            expected: expected.clone(),
            actual: actual
                .map(|guid| guid.to_string())
                .unwrap_or_else(|| "absent".to_string()),
        }),
    }
}

/// Encodes the new state carried by a payload. Pre-encoded rows are taken as they are, apart
/// from validating their flags and deriving the grid bucket.
pub(crate) fn encode_payload(codec: &dyn Codec, payload: &Payload) -> Result<NewRow, WriteError> {
    match payload {
        Payload::Feature(feature) => {
            let flags = codec.default_flags();
            let reference = feature.effective_reference_point();
            let geo = match &feature.geometry {
                Some(geometry) => Some(codec.encode_geometry(geometry, flags)?),
                None => None,
            };
            let geo_ref = match reference {
                Some([x, y]) => Some(codec.encode_geometry(
                    &json!({"type": "Point", "coordinates": [x, y]}),
                    flags,
                )?),
                None => None,
            };
            let tags = if feature.tags.is_empty() {
                None
            } else {
                Some(codec.encode_tags(&feature.tags, flags, None)?)
            };
            Ok(NewRow {
                id: feature.id.clone(),
                feature_type: feature.feature_type.clone(),
                origin: feature.origin.clone(),
                flags,
                feature: Some(codec.encode_feature(&feature.body(), flags, None)?),
                tags,
                geo,
                geo_ref,
                attachment: feature.attachment.clone(),
                geo_grid: reference.map(geo_grid).unwrap_or(0),
            })
        }
        Payload::Row(raw) => {
            let flags = Flags::from_raw(raw.flags)?;
            let point = match raw.geo_ref.as_ref().or(raw.geo.as_ref()) {
                Some(bytes) => reference_point(&codec.decode_geometry(bytes, flags)?),
                None => None,
            };
            Ok(NewRow {
                id: raw.id.clone(),
                feature_type: raw.feature_type.clone(),
                origin: raw.origin.clone(),
                flags,
                feature: raw.feature.clone(),
                tags: raw.tags.clone(),
                geo: raw.geo.clone(),
                geo_ref: raw.geo_ref.clone(),
                attachment: raw.attachment.clone(),
                geo_grid: point.map(geo_grid).unwrap_or(0),
            })
        }
        Payload::Id(id) => Err(WriteError::InvalidArgument(format!(
            "a new state of {id} needs a feature or row payload"
        ))),
    }
}

/// Runs the handler for a planned operation.
pub(crate) fn apply(
    ctx: &mut WriteContext,
    executor: &mut dyn WriteExecutor,
    planned: PlannedOp,
) -> Result<ResultRow, WriteError> {
    let PlannedOp {
        target, id, resolved, ..
    } = planned;
    let (op, tuple) = match resolved {
        Resolved::Insert(row) => (
            ExecutedOp::Created,
            Some(insert_feature(ctx, executor, &target, row)?),
        ),
        Resolved::Update { row, previous } => (
            ExecutedOp::Updated,
            Some(update_feature(ctx, executor, &target, row, &previous)?),
        ),
        Resolved::Delete { previous } => (
            ExecutedOp::Deleted,
            Some(delete_feature(ctx, executor, &target, &previous)?),
        ),
        Resolved::Purge { head, deleted } => (
            ExecutedOp::Purged,
            Some(purge_feature(
                ctx,
                executor,
                &target,
                &id,
                head.as_ref(),
                deleted.as_ref(),
            )?),
        ),
        Resolved::Retain => (ExecutedOp::Retained, None),
    };
    Ok(ResultRow {
        op,
        collection: target.collection_id().to_string(),
        id,
        tuple,
    })
}
