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

//! The metadata state machine. Pure transitions from a previous state (or none) to the next one;
//! nothing here touches storage.

use tessera_common::{Action, Flags, Metadata, StoreNumber, Tuple, Version, content_hash};

use crate::error::WriteError;

/// Per-request write state: the version rows written by one request carry, and the counter
/// handing out uids within it.
#[derive(Debug, Clone)]
pub struct WriteContext {
    pub txn: Version,
    /// Milliseconds since the epoch, refreshed for every request.
    pub now: i64,
    pub author: Option<String>,
    pub app_id: String,
    next_uid: i32,
}

impl WriteContext {
    pub fn new(txn: Version, now: i64, author: Option<String>, app_id: &str) -> Self {
        Self {
            txn,
            now,
            author,
            app_id: app_id.to_string(),
            next_uid: 0,
        }
    }

    pub fn next_uid(&mut self) -> i32 {
        let uid = self.next_uid;
        self.next_uid += 1;
        uid
    }

    pub fn uids_issued(&self) -> i32 {
        self.next_uid
    }

    fn author_or(&self, previous: &Metadata) -> (Option<String>, i64) {
        match &self.author {
            Some(author) => (Some(author.clone()), self.now),
            None => (previous.author.clone(), previous.author_ts),
        }
    }
}

/// The encoded payload and caller-controlled metadata of a new state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRow {
    pub id: String,
    pub feature_type: Option<String>,
    pub origin: Option<String>,
    pub flags: Flags,
    pub feature: Option<Vec<u8>>,
    pub tags: Option<Vec<u8>>,
    pub geo: Option<Vec<u8>>,
    pub geo_ref: Option<Vec<u8>>,
    pub attachment: Option<Vec<u8>>,
    pub geo_grid: i32,
}

impl NewRow {
    pub fn hash(&self) -> i32 {
        content_hash(&[
            self.feature.as_deref(),
            self.tags.as_deref(),
            self.geo.as_deref(),
            self.geo_ref.as_deref(),
            self.attachment.as_deref(),
        ])
    }

    fn into_tuple(self, meta: Metadata) -> Tuple {
        Tuple {
            meta,
            feature: self.feature,
            tags: self.tags,
            geo: self.geo,
            geo_ref: self.geo_ref,
            attachment: self.attachment,
        }
    }
}

/// First state of a feature.
pub fn insert(ctx: &mut WriteContext, store_number: StoreNumber, row: NewRow) -> Tuple {
    let meta = Metadata {
        store_number,
        version: ctx.txn,
        uid: ctx.next_uid(),
        id: row.id.clone(),
        prev_version: None,
        puid: None,
        next_version: None,
        created_at: ctx.now,
        updated_at: ctx.now,
        author_ts: ctx.now,
        author: ctx.author.clone(),
        app_id: ctx.app_id.clone(),
        feature_type: row.feature_type.clone(),
        origin: row.origin.clone(),
        flags: row.flags.with_action(Action::Created),
        hash: row.hash(),
        change_count: 1,
        geo_grid: row.geo_grid,
    };
    row.into_tuple(meta)
}

/// Supersedes `previous` with a new payload.
pub fn update(
    ctx: &mut WriteContext,
    collection_id: &str,
    store_number: StoreNumber,
    row: NewRow,
    previous: &Metadata,
) -> Result<Tuple, WriteError> {
    if row.id != previous.id {
        return Err(WriteError::InvalidArgument(format!(
            "cannot update {} from the state of {}",
            row.id, previous.id
        )));
    }
    let (version, uid) = successor(ctx, collection_id, previous)?;
    let (author, author_ts) = ctx.author_or(previous);
    let meta = Metadata {
        store_number,
        version,
        uid,
        id: previous.id.clone(),
        prev_version: Some(previous.version),
        puid: Some(previous.uid),
        next_version: None,
        created_at: previous.created_at,
        updated_at: ctx.now,
        author_ts,
        author,
        app_id: ctx.app_id.clone(),
        feature_type: row.feature_type.clone(),
        origin: row.origin.clone(),
        flags: row.flags.with_action(Action::Updated),
        hash: row.hash(),
        change_count: previous.change_count + 1,
        geo_grid: row.geo_grid,
    };
    Ok(row.into_tuple(meta))
}

/// The tombstone superseding `previous`. Payload-derived fields carry over unchanged.
pub fn delete(
    ctx: &mut WriteContext,
    collection_id: &str,
    previous: &Metadata,
) -> Result<Metadata, WriteError> {
    let (version, uid) = successor(ctx, collection_id, previous)?;
    let (author, author_ts) = ctx.author_or(previous);
    Ok(Metadata {
        version,
        uid,
        prev_version: Some(previous.version),
        puid: Some(previous.uid),
        next_version: None,
        updated_at: ctx.now,
        author_ts,
        author,
        app_id: ctx.app_id.clone(),
        flags: previous.flags.with_action(Action::Deleted),
        change_count: previous.change_count + 1,
        ..previous.clone()
    })
}

/// The version a purge records as superseding the deleted state `tombstone`.
pub fn purge_version(ctx: &WriteContext, tombstone: &Metadata) -> Version {
    ctx.txn.max(tombstone.version.next())
}

/// The version and uid of the state following `previous`, which must be a head. The version is
/// the request's, unless the chain is already at or past it.
fn successor(
    ctx: &mut WriteContext,
    collection_id: &str,
    previous: &Metadata,
) -> Result<(Version, i32), WriteError> {
    if !previous.is_head() {
        return Err(WriteError::StaleHead {
            collection: collection_id.to_string(),
            id: previous.id.clone(),
            tuple_number: previous.tuple_number(),
        });
    }
    Ok((ctx.txn.max(previous.version.next()), ctx.next_uid()))
}
