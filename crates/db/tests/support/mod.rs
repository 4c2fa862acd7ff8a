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


//! Shared setup for the write engine integration tests.

#![allow(dead_code)]

use serde_json::json;
use tessera_common::tracing::init_tracing;
use tessera_common::{Feature, Tuple};
use tessera_db::{
    CollectionSpec, EngineConfig, Response, ResultRow, SqliteSession, WriteOp, WriteRequest,
    WriteSession,
};

/// An initialized engine over a fresh in-memory database.
pub fn engine() -> WriteSession<SqliteSession> {
    engine_with(EngineConfig::default())
}

pub fn engine_with(config: EngineConfig) -> WriteSession<SqliteSession> {
    init_tracing(false).expect("install tracing");
    let session = SqliteSession::open_in_memory().expect("open in-memory database");
    let mut engine = WriteSession::new(session, config);
    engine.initialize().expect("initialize storage");
    engine
}

/// Creates a collection in a transaction of its own.
pub fn create(engine: &mut WriteSession<SqliteSession>, id: &str, spec: CollectionSpec) {
    let response = engine.create_collection(id, spec);
    assert!(response.is_success(), "create {id}: {response:?}");
    engine.commit().expect("commit collection");
}

pub fn road(id: &str, name: &str) -> Feature {
    let mut feature = Feature::new(id)
        .with_type("Road")
        .with_property("name", name)
        .with_tag("highway", "primary")
        .with_geometry(json!({"type": "LineString", "coordinates": [[8.0, 50.0], [8.1, 50.1]]}));
    feature.reference_point = Some([8.05, 50.05]);
    feature
}

/// Runs `ops` and unwraps the successful result rows.
pub fn write(engine: &mut WriteSession<SqliteSession>, ops: Vec<WriteOp>) -> Vec<ResultRow> {
    match engine.write(WriteRequest::new(ops)) {
        Response::Success(rows) => rows,
        Response::Error(e) => panic!("write failed: {e} ({})", e.code()),
    }
}

pub fn written(row: &ResultRow) -> &Tuple {
    row.tuple.as_ref().expect("result row carries a tuple")
}

pub fn head(engine: &mut WriteSession<SqliteSession>, collection: &str, id: &str) -> Option<Tuple> {
    engine.reader().head(collection, id).expect("read head")
}

pub fn count(engine: &mut WriteSession<SqliteSession>, table: &str) -> i64 {
    engine.reader().count(table).expect("count rows")
}
