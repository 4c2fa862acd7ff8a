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


//! A multi-version, partitioned feature write engine over a relational backend.
//!
//! Every collection is stored as three relations: the head relation holding the live state of
//! each feature, the `$del` relation holding tombstones, and the `$hst` relation holding every
//! superseded state. A [`WriteSession`] turns a batch of insert, update, upsert, delete and purge
//! operations into row movements between these relations, executed either one statement at a
//! time or as phase-ordered batches.

pub use catalog::{
    CATALOG_COLLECTION, Collection, CollectionSpec, SEQUENCE_TABLE, StorageClass,
    partition_number, validate_collection_id,
};
pub use config::{EngineConfig, MapConfig};
pub use dialect::{Dialect, LockMode, SqliteDialect};
pub use error::{ErrorCode, WriteError};
pub use executor::{BulkExecutor, InstantExecutor, Phase, WriteExecutor};
pub use reader::TupleReader;
pub use request::{
    ExecutedOp, ExecutorChoice, OpKind, Payload, RawRow, Response, ResultRow, WriteOp,
    WriteRequest,
};
pub use session::{SessionError, SqlSession, SqliteSession};
pub use writer::WriteSession;

pub mod catalog;
pub mod config;
pub mod dialect;
mod error;
pub mod executor;
pub mod metadata_provider;
mod ops;
pub mod reader;
pub mod request;
pub mod row_updater;
pub mod schema;
pub mod sequences;
pub mod session;
#[cfg(test)]
mod testing;
mod writer;
