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

use strum::Display;
use tessera_common::{CodecError, Guid, ModelError, TupleNumber};
use thiserror::Error;

use crate::session::SessionError;

/// Stable error codes reported to callers alongside a failed write.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    IllegalArgument,
    CheckViolation,
    IllegalState,
    #[strum(serialize = "ERR_FATAL")]
    Fatal,
    UnsupportedOperation,
    NotFound,
    Conflict,
    Exception,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::IllegalArgument => "ILLEGAL_ARGUMENT",
            ErrorCode::CheckViolation => "CHECK_VIOLATION",
            ErrorCode::IllegalState => "ILLEGAL_STATE",
            ErrorCode::Fatal => "ERR_FATAL",
            ErrorCode::UnsupportedOperation => "UNSUPPORTED_OPERATION",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::Exception => "EXCEPTION",
        }
    }
}

/// Everything that can fail a write request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WriteError {
    #[error("Duplicate operation for feature {id} in collection {collection}")]
    DuplicateOperation { collection: String, id: String },
    #[error("Atomic write of {id} in {collection} expected {expected}, but the head is {actual}")]
    AtomicConflict {
        collection: String,
        id: String,
        expected: Guid,
        actual: String,
    },
    #[error("Feature {id} in {collection}: state {tuple_number} is not the head")]
    StaleHead {
        collection: String,
        id: String,
        tuple_number: TupleNumber,
    },
    #[error("Batched {phase} on {table} failed at item {index}: {reason}")]
    BatchExecution {
        phase: String,
        table: String,
        index: usize,
        reason: String,
    },
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
    #[error("Feature {id} not found in {collection}")]
    FeatureNotFound { collection: String, id: String },
    #[error("Feature {id} already exists in {collection}")]
    FeatureExists { collection: String, id: String },
    #[error("Feature {id} in {collection} was modified concurrently")]
    Conflict { collection: String, id: String },
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),
    #[error("Collection already exists: {0}")]
    CollectionExists(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Storage is not initialized: {0}")]
    Uninitialized(String),
    #[error("Malformed stored row: {0}")]
    MalformedRow(String),
    #[error("Cannot build statement: {0}")]
    Statement(String),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("SQL session failure: {0}")]
    Session(#[from] SessionError),
}

impl WriteError {
    pub fn code(&self) -> ErrorCode {
        match self {
            WriteError::DuplicateOperation { .. } | WriteError::InvalidArgument(_) => {
                ErrorCode::IllegalArgument
            }
            WriteError::AtomicConflict { .. } => ErrorCode::CheckViolation,
            WriteError::StaleHead { .. }
            | WriteError::Uninitialized(_)
            | WriteError::MalformedRow(_)
            | WriteError::Statement(_) => ErrorCode::IllegalState,
            WriteError::BatchExecution { .. } => ErrorCode::Fatal,
            WriteError::Unsupported(_) => ErrorCode::UnsupportedOperation,
            WriteError::FeatureNotFound { .. } | WriteError::CollectionNotFound(_) => {
                ErrorCode::NotFound
            }
            WriteError::FeatureExists { .. }
            | WriteError::CollectionExists(_)
            | WriteError::Conflict { .. } => ErrorCode::Conflict,
            WriteError::Session(SessionError::LockConflict(_)) => ErrorCode::Conflict,
            WriteError::Codec(_) | WriteError::Model(_) | WriteError::Session(_) => {
                ErrorCode::Exception
            }
        }
    }
}
