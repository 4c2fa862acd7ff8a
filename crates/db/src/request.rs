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

//! The request and response model of a write.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tessera_common::{Feature, Guid, Tuple};

use crate::error::WriteError;

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OpKind {
    Insert,
    Update,
    Upsert,
    Delete,
    Purge,
}

impl OpKind {
    /// Parses an operation name, rejecting anything outside the closed set.
    pub fn parse(kind: &str) -> Result<Self, WriteError> {
        OpKind::from_str(kind).map_err(|_| WriteError::Unsupported(kind.to_string()))
    }

    /// Whether the operation carries a new feature state.
    pub fn writes_payload(&self) -> bool {
        matches!(self, OpKind::Insert | OpKind::Update | OpKind::Upsert)
    }
}

/// A row whose payload parts were already encoded by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRow {
    pub id: String,
    pub flags: i32,
    #[serde(default)]
    pub feature_type: Option<String>,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub feature: Option<Vec<u8>>,
    #[serde(default)]
    pub tags: Option<Vec<u8>>,
    #[serde(default)]
    pub geo: Option<Vec<u8>>,
    #[serde(default)]
    pub geo_ref: Option<Vec<u8>>,
    #[serde(default)]
    pub attachment: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Feature(Feature),
    Row(RawRow),
    /// Identifies a feature without a new state; only valid for delete and purge.
    Id(String),
}

impl Payload {
    pub fn id(&self) -> &str {
        match self {
            Payload::Feature(feature) => &feature.id,
            Payload::Row(row) => &row.id,
            Payload::Id(id) => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WriteOp {
    pub kind: OpKind,
    pub collection: String,
    pub payload: Payload,
    /// When set, the write only applies if the feature's head is exactly this state.
    pub expected: Option<Guid>,
}

impl WriteOp {
    pub fn new(kind: OpKind, collection: &str, payload: Payload) -> Self {
        Self {
            kind,
            collection: collection.to_string(),
            payload,
            expected: None,
        }
    }

    pub fn insert(collection: &str, feature: Feature) -> Self {
        Self::new(OpKind::Insert, collection, Payload::Feature(feature))
    }

    pub fn update(collection: &str, feature: Feature) -> Self {
        Self::new(OpKind::Update, collection, Payload::Feature(feature))
    }

    pub fn upsert(collection: &str, feature: Feature) -> Self {
        Self::new(OpKind::Upsert, collection, Payload::Feature(feature))
    }

    pub fn delete(collection: &str, id: &str) -> Self {
        Self::new(OpKind::Delete, collection, Payload::Id(id.to_string()))
    }

    pub fn purge(collection: &str, id: &str) -> Self {
        Self::new(OpKind::Purge, collection, Payload::Id(id.to_string()))
    }

    pub fn atomic(mut self, expected: Guid) -> Self {
        self.expected = Some(expected);
        self
    }

    pub fn id(&self) -> &str {
        self.payload.id()
    }
}

/// Which executor runs the statements of a request.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum ExecutorChoice {
    /// Instant below the configured bulk threshold, bulk at or above it.
    #[default]
    Auto,
    Instant,
    Bulk,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteRequest {
    pub ops: Vec<WriteOp>,
    /// Return metadata only, without payloads.
    pub no_results: bool,
    pub executor: ExecutorChoice,
}

impl WriteRequest {
    pub fn new(ops: Vec<WriteOp>) -> Self {
        Self {
            ops,
            ..Self::default()
        }
    }

    pub fn with(mut self, op: WriteOp) -> Self {
        self.ops.push(op);
        self
    }

    pub fn without_results(mut self) -> Self {
        self.no_results = true;
        self
    }

    pub fn with_executor(mut self, executor: ExecutorChoice) -> Self {
        self.executor = executor;
        self
    }
}

/// What a write did to one feature.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum ExecutedOp {
    Created,
    Updated,
    Deleted,
    Purged,
    /// Nothing to do, e.g. deleting a feature that does not exist.
    Retained,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRow {
    pub op: ExecutedOp,
    pub collection: String,
    pub id: String,
    /// The state written (or, for deletes, the tombstone). Absent when nothing was written.
    pub tuple: Option<Tuple>,
}

impl ResultRow {
    pub fn guid(&self) -> Option<Guid> {
        self.tuple
            .as_ref()
            .map(|t| Guid::new(&self.collection, &self.id, t.tuple_number()))
    }
}

/// The outcome of a write request. There is no partial success: either every operation
/// succeeded, or the request failed as a whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Success(Vec<ResultRow>),
    Error(WriteError),
}

impl Response {
    pub fn is_success(&self) -> bool {
        matches!(self, Response::Success(_))
    }

    pub fn rows(&self) -> &[ResultRow] {
        match self {
            Response::Success(rows) => rows,
            Response::Error(_) => &[],
        }
    }

    pub fn error(&self) -> Option<&WriteError> {
        match self {
            Response::Success(_) => None,
            Response::Error(e) => Some(e),
        }
    }

    pub fn into_result(self) -> Result<Vec<ResultRow>, WriteError> {
        match self {
            Response::Success(rows) => Ok(rows),
            Response::Error(e) => Err(e),
        }
    }
}

impl From<Result<Vec<ResultRow>, WriteError>> for Response {
    fn from(result: Result<Vec<ResultRow>, WriteError>) -> Self {
        match result {
            Ok(rows) => Response::Success(rows),
            Err(e) => Response::Error(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case("insert", OpKind::Insert)]
    #[test_case("update", OpKind::Update)]
    #[test_case("upsert", OpKind::Upsert)]
    #[test_case("delete", OpKind::Delete)]
    #[test_case("purge", OpKind::Purge)]
    fn test_parse_op_kind(name: &str, kind: OpKind) {
        assert_eq!(OpKind::parse(name).unwrap(), kind);
        assert_eq!(kind.to_string(), name);
    }

    #[test]
    fn test_unknown_op_kind_is_unsupported() {
        let err = OpKind::parse("merge").unwrap_err();
        assert_eq!(err, WriteError::Unsupported("merge".to_string()));
        assert_eq!(err.code().as_str(), "UNSUPPORTED_OPERATION");
    }

    #[test]
    fn test_executed_op_names() {
        assert_eq!(ExecutedOp::Retained.to_string(), "RETAINED");
        assert_eq!(
            serde_json::to_string(&ExecutedOp::Purged).unwrap(),
            "\"PURGED\""
        );
    }

    #[test]
    fn test_response_accessors() {
        let response = Response::from(Err(WriteError::CollectionNotFound("x".to_string())));
        assert!(!response.is_success());
        assert!(response.rows().is_empty());
        assert!(response.error().is_some());
        let ok = Response::Success(vec![]);
        assert_eq!(ok.into_result(), Ok(vec![]));
    }
}
