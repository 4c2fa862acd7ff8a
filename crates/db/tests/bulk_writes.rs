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


//! The bulk executor must leave the store exactly as the instant executor does, and fail the
//! whole request when any batched statement fails.

mod support;

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tessera_common::{Action, Flags};
    use tessera_db::{
        CollectionSpec, EngineConfig, ExecutedOp, ExecutorChoice, ResultRow, SqlSession,
        SqliteSession, WriteError, WriteOp, WriteRequest, WriteSession,
    };

    use crate::support::{count, create, engine, engine_with, road, write};

    type Row = (String, i64, i32, Action, Option<i64>, Option<i64>);

    fn seeded(choice: ExecutorChoice) -> WriteSession<SqliteSession> {
        let mut engine = engine();
        create(&mut engine, "foo", CollectionSpec::default());
        let ops = (0..40)
            .map(|i| WriteOp::insert("foo", road(&format!("f{i:02}"), "A")))
            .collect();
        let response = engine.write(WriteRequest::new(ops).with_executor(choice));
        assert!(response.is_success(), "{response:?}");
        engine.commit().unwrap();
        engine
    }

    fn mixed_request(choice: ExecutorChoice) -> WriteRequest {
        let mut ops = vec![];
        ops.extend((0..10).map(|i| WriteOp::update("foo", road(&format!("f{i:02}"), "B"))));
        ops.extend((10..20).map(|i| WriteOp::delete("foo", &format!("f{i:02}"))));
        ops.extend((20..25).map(|i| WriteOp::purge("foo", &format!("f{i:02}"))));
        ops.extend((38..45).map(|i| WriteOp::upsert("foo", road(&format!("f{i:02}"), "C"))));
        ops.push(WriteOp::insert("foo", road("g1", "D")));
        ops.push(WriteOp::delete("foo", "missing"));
        WriteRequest::new(ops).with_executor(choice)
    }

    fn rows(engine: &mut WriteSession<SqliteSession>, table: &str) -> Vec<Row> {
        let sql = format!(
            "SELECT id, version, uid, flags, prev_version, next_version FROM \"{table}\" \
             ORDER BY id, version, uid"
        );
        engine
            .session_mut()
            .execute(&sql, &[])
            .unwrap()
            .rows()
            .iter()
            .map(|row| {
                let flags = Flags::from_raw(row.get(3).unwrap().as_i64().unwrap() as i32).unwrap();
                (
                    row.get(0).unwrap().as_str().unwrap().to_string(),
                    row.get(1).unwrap().as_i64().unwrap(),
                    row.get(2).unwrap().as_i64().unwrap() as i32,
                    flags.action(),
                    row.get(4).unwrap().as_i64(),
                    row.get(5).unwrap().as_i64(),
                )
            })
            .collect()
    }

    fn snapshot(engine: &mut WriteSession<SqliteSession>) -> [Vec<Row>; 3] {
        [rows(engine, "foo"), rows(engine, "foo$del"), rows(engine, "foo$hst")]
    }

    #[test]
    fn test_bulk_matches_instant() {
        let mut instant = seeded(ExecutorChoice::Instant);
        let mut bulk = seeded(ExecutorChoice::Bulk);
        assert_eq!(snapshot(&mut instant), snapshot(&mut bulk));

        let from_instant = instant
            .write(mixed_request(ExecutorChoice::Instant))
            .into_result()
            .unwrap();
        let from_bulk = bulk
            .write(mixed_request(ExecutorChoice::Bulk))
            .into_result()
            .unwrap();
        let ops = |rows: &[ResultRow]| rows.iter().map(|r| r.op).collect::<Vec<_>>();
        assert_eq!(ops(&from_instant), ops(&from_bulk));
        assert_eq!(from_bulk[0].op, ExecutedOp::Updated);
        assert_eq!(from_bulk[10].op, ExecutedOp::Deleted);
        assert_eq!(from_bulk[20].op, ExecutedOp::Purged);
        assert_eq!(from_bulk[25].op, ExecutedOp::Updated);
        assert_eq!(from_bulk[27].op, ExecutedOp::Created);
        assert_eq!(from_bulk.last().unwrap().op, ExecutedOp::Retained);
        instant.commit().unwrap();
        bulk.commit().unwrap();

        let [head, del, history] = snapshot(&mut bulk);
        assert_eq!([head.clone(), del.clone(), history.clone()], snapshot(&mut instant));
        // 40 seeded, 15 removed, 5 upserted in, 1 inserted.
        assert_eq!(head.len(), 31);
        assert_eq!(del.len(), 10);
        // 10 updates, 10 deletes, 5 purges of live features (head and tombstone), 2 upserts.
        assert_eq!(history.len(), 32);
    }

    #[test]
    fn test_auto_choice_follows_threshold() {
        let config = EngineConfig {
            bulk_threshold: 2,
            ..EngineConfig::default()
        };
        let mut engine = engine_with(config);
        create(&mut engine, "foo", CollectionSpec::default());
        write(&mut engine, vec![WriteOp::insert("foo", road("f1", "A"))]);

        // Two operations run in bulk, where a conflicting insert is fatal rather than a conflict.
        let response = engine.write(WriteRequest::new(vec![
            WriteOp::insert("foo", road("f1", "A")),
            WriteOp::insert("foo", road("f2", "A")),
        ]));
        assert_eq!(response.error().unwrap().code().as_str(), "ERR_FATAL");
    }

    #[test]
    fn test_bulk_failure_is_fatal() {
        let mut engine = seeded(ExecutorChoice::Bulk);
        let response = engine.write(
            WriteRequest::new(vec![
                WriteOp::update("foo", road("f01", "B")),
                WriteOp::insert("foo", road("f02", "B")),
                WriteOp::insert("foo", road("z1", "B")),
            ])
            .with_executor(ExecutorChoice::Bulk),
        );
        match response.error() {
            Some(WriteError::BatchExecution { phase, table, .. }) => {
                assert_eq!(phase, "InsertHead");
                assert_eq!(table, "foo");
            }
            other => panic!("expected a batch failure, got {other:?}"),
        }
        engine.rollback().unwrap();
        assert_eq!(count(&mut engine, "foo$hst"), 0);
        assert_eq!(count(&mut engine, "foo"), 40);
    }
}
